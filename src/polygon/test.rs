use similar_asserts::assert_eq;

use super::*;

fn test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn exchange() -> PolygonDiagram {
    PolygonDiagram::contact(4, 0)
        .unwrap()
        .cut_edge(0, 2, 0)
        .unwrap()
}

fn is_descending(list: &[PolygonDiagram]) -> bool {
    list.windows(2).all(|w| w[0] > w[1])
}

#[test]
fn test_contact_symmetry() {
    for ngons in [4, 6, 8, 10] {
        let contact = PolygonDiagram::contact(ngons, 1).unwrap();
        assert_eq!(contact.symmetry(), ngons);
        assert_eq!(contact.n_parts(), 1);
        assert_eq!(contact.flavour_split(), vec![ngons]);
        assert!(!contact.is_zero_flavour_split());
    }
    assert_eq!(
        PolygonDiagram::contact(3, 0).err(),
        Some(PolygonError::InvalidSize(3))
    );
}

#[test]
fn test_cut_edge() {
    let cut = exchange();
    assert_eq!(cut.n_legs(), 6);
    assert_eq!(cut.corners(), &[0, 4, 5, 1, 2, 3]);
    assert_eq!(cut.side_owner(), &[1, 1, 1, 0, 0, 0]);
    assert_eq!(cut.corner_pos()[4], 1);

    let polys = cut.polygons();
    assert_eq!(polys[0].sides()[0], Side::Propagator(1));
    assert_eq!(polys[1].corners(), &[0, 4, 5, 1]);
    assert_eq!(
        polys[1].sides(),
        &[
            Side::External,
            Side::External,
            Side::External,
            Side::Propagator(0)
        ]
    );
    // only the half-turn survives
    assert_eq!(cut.symmetry(), 2);

    assert_eq!(
        cut.cut_edge(6, 2, 0).err(),
        Some(PolygonError::InvalidEdge(6))
    );
}

#[test]
fn test_grow_skips_symmetric_edges() {
    test_logger();
    let contact = PolygonDiagram::contact(4, 0).unwrap();
    let grown = grow(std::slice::from_ref(&contact), 2, 0).unwrap();
    assert_eq!(grown.len(), 1);
    assert_eq!(grown[0], exchange());
    assert!(grow(&grown, 0, 0).unwrap().is_empty());

    // the exchange diagram has three inequivalent edges up to its half-turn
    let eight = grow(&grown, 2, 0).unwrap();
    assert!(!eight.is_empty());
    assert!(eight.len() <= 3);
    assert!(is_descending(&eight));
    assert!(eight.iter().all(|d| d.n_legs() == 8 && d.polygons().len() == 3));
}

#[test]
fn test_split_polygon() {
    let contact = PolygonDiagram::contact(4, 1).unwrap();
    let split = contact.split_polygon(0).unwrap();
    assert_eq!(split.len(), 1);

    let d = &split[0];
    assert_eq!(d.polygons().len(), 2);
    assert_eq!(d.flavour_split(), vec![2, 2]);
    assert_eq!(d.symmetry(), 8);
    let budgets: Vec<_> = d.polygons().iter().map(Polygon::split_budget).collect();
    assert_eq!(budgets, vec![0, 0]);
    assert!(d.polygons()[0]
        .sides()
        .iter()
        .any(|s| *s == Side::FlavourSplit(1)));
    assert!(!d.is_zero_flavour_split());

    // no budget, no split
    assert!(PolygonDiagram::contact(4, 0)
        .unwrap()
        .split_polygon(0)
        .unwrap()
        .is_empty());
}

#[test]
fn test_split_budget() {
    let contact = PolygonDiagram::contact(6, 2).unwrap();
    let split = contact.split_polygon(0).unwrap();
    assert!(is_descending(&split));
    for d in &split {
        let budgets: Vec<_> = d.polygons().iter().map(Polygon::split_budget).collect();
        let sizes: Vec<_> = d.polygons().iter().map(Polygon::len).collect();
        assert!(budgets.iter().sum::<usize>() <= 1, "{d}");
        if sizes[0] != sizes[1] {
            let larger = if sizes[0] > sizes[1] { 0 } else { 1 };
            assert_eq!(budgets[1 - larger], 0);
        }
    }
    // an odd chord is drawn with a budget of two
    assert!(split.iter().any(|d| d.flavour_split() == vec![3, 3]));
}

#[test]
fn test_singlet_propagators() {
    let base = PolygonDiagram::contact(4, 1)
        .unwrap()
        .cut_edge(0, 2, 1)
        .unwrap();
    let singlet = base.singlet_propagators(0).unwrap();
    assert_eq!(singlet.len(), 1);

    let d = &singlet[0];
    assert_eq!(d.polygons()[0].sides()[0], Side::Singlet(1));
    assert_eq!(d.polygons()[1].sides()[3], Side::Singlet(0));
    assert_eq!(d.n_parts(), 2);
    assert_eq!(d.flavour_split(), vec![3, 3]);
    // the two parts swap
    assert_eq!(d.symmetry(), 2);

    // only handled from the lower end
    assert!(base.singlet_propagators(1).unwrap().is_empty());
    assert!(exchange().singlet_propagators(0).unwrap().is_empty());
}

#[test]
fn test_zero_flavour_split() {
    let base = PolygonDiagram::contact(4, 1)
        .unwrap()
        .cut_edge(0, 2, 1)
        .unwrap();
    let mut list = split_all(vec![base]).unwrap();
    assert!(is_descending(&list));
    let before = list.len();
    remove_zero(&mut list);
    assert!(list.len() <= before);
    assert!(list.iter().all(|d| !d.is_zero_flavour_split()));
}

#[test]
fn test_merge_and_insert() {
    let a = PolygonDiagram::contact(6, 0).unwrap();
    let b = grow(
        std::slice::from_ref(&PolygonDiagram::contact(4, 0).unwrap()),
        2,
        0,
    )
    .unwrap();

    let mut list = vec![];
    insert(&mut list, a.clone());
    insert(&mut list, a.clone());
    assert_eq!(list.len(), 1);

    let merged = merge(list.clone(), b.clone());
    assert_eq!(merged.len(), 2);
    assert!(is_descending(&merged));
    assert_eq!(merge(merged.clone(), merged.clone()).len(), 2);
    assert_eq!(merge(vec![], b.clone()).len(), 1);
}

#[test]
fn test_display() {
    insta::assert_snapshot!(exchange().to_string(), @r"
    O(p^2) 6-point diagram, symmetry factor 2:
    poly 0[0:0]:(0p1 - 3. - 4. - 5. - 0)
    poly 1[0:0]:(0. - 1. - 2. - 3p0 - 0)
    part 0:
      gon 0:
        line 0: 1 gons down, order 0, no connection.
      gon 1:
        line 0: 1 gons down, order 0, no connection.
      gon 2:
        line 0: 1 gons down, order 0, no connection.
        line 1: 3 gons down, order 0, no connection.
      gon 3:
        line 0: 1 gons down, order 0, no connection.
      gon 4:
        line 0: 1 gons down, order 0, no connection.
      gon 5:
        line 0: 1 gons down, order 0, no connection.
        line 1: 3 gons down, order 0, no connection.
    ");
}

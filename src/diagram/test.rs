use similar_asserts::assert_eq;

use super::*;
use crate::permutation::Permutation;

fn test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn splits(diagrams: &[Diagram]) -> Vec<Vec<usize>> {
    diagrams.iter().map(|d| d.flav_split().to_vec()).collect()
}

#[derive(Default)]
struct Census {
    vertices: Vec<(usize, usize, Vec<usize>)>,
    propagators: Vec<(usize, Momenta, bool)>,
    legs: Vec<Momenta>,
}

impl DiagramVisitor for Census {
    fn vertex(&mut self, depth: usize, order: usize, flav_split: &[usize]) {
        self.vertices.push((depth, order, flav_split.to_vec()));
    }

    fn propagator(&mut self, depth: usize, momenta: Momenta, singlet: bool) {
        self.propagators.push((depth, momenta, singlet));
    }

    fn leg(&mut self, _depth: usize, momenta: Momenta) {
        self.legs.push(momenta);
    }
}

#[test]
fn test_flav_splits() {
    assert_eq!(Diagram::valid_flav_splits(0, 4, 2), Vec::<Vec<usize>>::new());
    assert_eq!(Diagram::valid_flav_splits(2, 8, 2), vec![vec![8]]);
    assert_eq!(Diagram::valid_flav_splits(4, 4, 2), vec![vec![4], vec![2, 2]]);
    // an odd split of an even leg count costs four orders
    assert_eq!(Diagram::valid_flav_splits(4, 6, 2), vec![vec![6], vec![2, 4]]);
    assert_eq!(
        Diagram::valid_flav_splits(6, 6, 2),
        vec![vec![6], vec![2, 4], vec![2, 2, 2], vec![3, 3]]
    );

    let vertices = Diagram::valid_vertices(4, 4);
    assert_eq!(vertices.len(), 2);
    assert!(vertices.iter().all(|v| v.order == 4));
}

#[test]
fn test_leading_order_contact() {
    test_logger();
    let diagrams = Diagram::generate(2, 4, true, true).unwrap();
    assert_eq!(diagrams.len(), 1);
    let d = &diagrams[0];
    assert_eq!(d.flav_split(), &[4]);
    assert_eq!(d.labellings().len(), 1);
    assert!(d.labellings()[0].propagators().is_empty());
    assert!(!d.is_zero());
    assert!(!d.is_singlet());
}

#[test]
fn test_six_point_exchange() {
    test_logger();
    let diagrams = Diagram::generate(2, 6, true, true).unwrap();
    assert_eq!(splits(&diagrams), vec![vec![6], vec![6]]);

    // the contact diagram sorts first: it has no propagators
    assert_eq!(diagrams[0].labellings().len(), 1);

    let exchange = &diagrams[1];
    assert_eq!(exchange.order(), 2);
    assert_eq!(exchange.n_legs(), 6);
    let lines: Vec<String> = exchange
        .labellings()
        .iter()
        .map(|l| l.to_string())
        .collect();
    insta::assert_snapshot!(lines.join("\n"), @r"
    () [0 1 2 3 4 5] | XXX... (2 -> 2)
    (0 1 2 3 4 5) [1 2 3 4 5 0] | .XXX.. (2 -> 2)
    (0 2 4) (1 3 5) [2 3 4 5 0 1] | ..XXX. (2 -> 2)
    ");
}

#[test]
fn test_next_to_leading_four_point() {
    test_logger();
    let diagrams = Diagram::generate(4, 4, true, true).unwrap();
    assert_eq!(splits(&diagrams), vec![vec![4], vec![2, 2]]);
    assert!(diagrams.windows(2).all(|w| w[0] < w[1]));

    let summary = Diagram::summarise(&diagrams);
    assert_eq!(summary.total(), 2);
    assert_eq!(summary.count(4, 4, &[2, 2], false), 1);
    insta::assert_snapshot!(summary.to_string(), @r"
    O(p^4) 4-point: 2 diagrams
      [4]: 1
      [2, 2]: 1
    ");
}

#[test]
fn test_invalid_input() {
    assert_eq!(
        Diagram::generate(2, 5, true, true),
        Err(DiagramError::InvalidLegCount(5))
    );
    assert_eq!(
        Diagram::generate(2, 2, true, true),
        Err(DiagramError::InvalidLegCount(2))
    );
    assert_eq!(
        Diagram::generate(2, 66, true, true),
        Err(DiagramError::TooManyLegs(66))
    );
    assert_eq!(
        Diagram::generate(5, 4, true, true),
        Err(DiagramError::InvalidOrder(5))
    );
    assert_eq!(
        Diagram::generate(0, 4, true, true),
        Err(DiagramError::InvalidOrder(0))
    );
}

#[test]
fn test_generated_lists_are_canonical() {
    test_logger();
    for (order, n_legs) in [(2, 8), (4, 6), (6, 4)] {
        let diagrams = Diagram::generate(order, n_legs, true, true).unwrap();
        assert!(!diagrams.is_empty());
        for w in diagrams.windows(2) {
            assert!(w[0] < w[1], "{}{}", w[0], w[1]);
        }
        for d in &diagrams {
            assert_eq!(d.order(), order);
            assert_eq!(d.n_legs(), n_legs);
            assert_eq!(d.flav_split().iter().sum::<usize>(), n_legs);

            // the labellings form one orbit of Z_R
            let group = ZrGenerator::new(d.flav_split()).group_order().unwrap();
            assert_eq!(group % d.labellings().len(), 0, "{d}");
            assert!(d.labellings().windows(2).all(|w| w[0] < w[1]));
        }
    }
}

#[test]
fn test_zero_diagrams_are_removed() {
    test_logger();
    let all = Diagram::generate(6, 6, true, false).unwrap();
    let nonzero = Diagram::generate(6, 6, true, true).unwrap();

    let expected: Vec<_> = all.iter().filter(|d| !d.is_zero()).cloned().collect();
    assert_eq!(nonzero, expected);
    assert!(all.len() > nonzero.len());
    assert!(all.iter().any(Diagram::is_singlet));
    assert!(nonzero.iter().all(|d| d.flav_split()[0] > 1));
}

#[test]
fn test_without_singlets() {
    let diagrams = Diagram::generate(6, 6, false, false).unwrap();
    assert!(diagrams.iter().all(|d| !d.is_singlet()));
    assert!(diagrams
        .iter()
        .flat_map(|d| d.labellings())
        .flat_map(|l| l.propagators())
        .all(|p| !p.is_singlet()));
}

#[test]
fn test_filter() {
    let mut diagrams = Diagram::generate(4, 4, true, true).unwrap();
    let removed = Diagram::filter_flav_split(&mut diagrams, &[vec![2, 2]], false);
    assert_eq!(removed, 1);
    assert_eq!(splits(&diagrams), vec![vec![4]]);

    let config = GenerationConfig::new(4, 4).flavour_filter(FlavourFilter::include(vec![vec![2, 2]]));
    let kept = Diagram::generate_with(&config).unwrap();
    assert_eq!(splits(&kept), vec![vec![2, 2]]);
}

#[test]
fn test_walk() {
    let diagrams = Diagram::generate(2, 6, true, true).unwrap();
    let mut census = Census::default();
    diagrams[1].walk(&mut census);

    assert_eq!(
        census.vertices,
        vec![(0, 2, vec![4]), (1, 2, vec![4])]
    );
    assert_eq!(census.propagators, vec![(1, Momenta(0b000111), false)]);
    assert_eq!(census.legs.len(), 6);
    let all = census.legs.iter().fold(Momenta::EMPTY, |acc, &m| acc | m);
    assert_eq!(all, Momenta::all(6));
}

#[test]
fn test_identity_relabelling() {
    let d = Diagram::new(2, vec![4]).unwrap();
    let base = &d.labellings()[0];
    let same = Labelling::relabelled(base, &Permutation::id(4)).unwrap();
    assert_eq!(&same, base);
    assert_eq!(same.index_locations(), Permutation::id(4));
}

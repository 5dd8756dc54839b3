//! # Polygon diagrams
//!
//! The second diagram model: a diagram is a disc whose perimeter carries the
//! external legs, tiled by polygons. Each polygon is a vertex and each side is
//! either an external leg or shared with another polygon. A shared side is a
//! propagator, a singlet propagator, or a flavour split inside one vertex.
//!
//! Diagrams are built from contact diagrams by cutting perimeter edges
//! ([`PolygonDiagram::cut_edge`]), splitting polygons along chords
//! ([`PolygonDiagram::split_polygon`]) and turning propagators into singlets
//! ([`PolygonDiagram::singlet_propagators`]). Every diagram carries its
//! canonical [`CompoundRep`], which orders and deduplicates them, and the
//! symmetry factor derived from it.
//!
//! Lists of diagrams are kept sorted in descending order without duplicates;
//! see [`insert`] and [`merge`].

use std::{cmp::Ordering, fmt};

use itertools::Itertools;
use log::trace;
use thiserror::Error;

use crate::cycrep::{compare_comprep, CompoundRep, RepresentationError};

pub mod represent;
pub mod table;

pub use represent::represent_diagram;
pub use table::{DiagramTable, Fill, SplitCount};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolygonError {
    #[error("Invalid diagram size: {0}")]
    InvalidSize(usize),
    #[error("Order {order} exceeds the table maximum {max}")]
    InvalidOrder { order: usize, max: usize },
    #[error("Edge {0} is not on the perimeter")]
    InvalidEdge(usize),
    #[error("Split budget of polygon {0} exceeded")]
    SplitBudgetExceeded(usize),
    #[error("Diagram count overflows")]
    CountOverflow,
    #[error("Polygon {polygon} has no corner {corner}")]
    DanglingSide { polygon: usize, corner: usize },
    #[error(transparent)]
    Representation(#[from] RepresentationError),
}

/// What lies across the side of a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    External,
    Propagator(usize),
    Singlet(usize),
    FlavourSplit(usize),
}

impl Side {
    /// External legs and propagators carry a flavour index; singlets and
    /// flavour splits do not.
    pub fn carries_flavour(&self) -> bool {
        matches!(self, Side::External | Side::Propagator(_))
    }

    pub fn target(&self) -> Option<usize> {
        match self {
            Side::External => None,
            Side::Propagator(t) | Side::Singlet(t) | Side::FlavourSplit(t) => Some(*t),
        }
    }

    fn retargeted(&self, target: usize) -> Side {
        match self {
            Side::External => Side::External,
            Side::Propagator(_) => Side::Propagator(target),
            Side::Singlet(_) => Side::Singlet(target),
            Side::FlavourSplit(_) => Side::FlavourSplit(target),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::External => write!(f, "."),
            Side::Propagator(t) => write!(f, "p{t}"),
            Side::Singlet(t) => write!(f, "s{t}"),
            Side::FlavourSplit(t) => write!(f, "f{t}"),
        }
    }
}

/// A vertex. Side `i` runs from `corners[i]` to `corners[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    corners: Vec<usize>,
    sides: Vec<Side>,
    order: usize,
    split_budget: usize,
}

impl Polygon {
    pub fn new(corners: Vec<usize>, sides: Vec<Side>, order: usize) -> Self {
        debug_assert_eq!(corners.len(), sides.len());
        Polygon {
            corners,
            sides,
            order,
            split_budget: order,
        }
    }

    pub fn len(&self) -> usize {
        self.corners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corners.is_empty()
    }

    pub fn corners(&self) -> &[usize] {
        &self.corners
    }

    pub fn sides(&self) -> &[Side] {
        &self.sides
    }

    /// `0` is O(p^2), `n` is O(p^{2(n+1)}).
    pub fn order(&self) -> usize {
        self.order
    }

    /// How many more orders may be spent on flavour splits.
    pub fn split_budget(&self) -> usize {
        self.split_budget
    }

    pub fn position(&self, corner: usize) -> Option<usize> {
        self.corners.iter().position(|&c| c == corner)
    }

    /// Replaces the first side equal to `from`.
    fn replace_side(&mut self, from: Side, to: Side) -> bool {
        match self.sides.iter().position(|&s| s == from) {
            Some(i) => {
                self.sides[i] = to;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolygonDiagram {
    order: usize,
    /// Corner ids in perimeter order.
    corners: Vec<usize>,
    /// Perimeter position of every corner id.
    corner_pos: Vec<usize>,
    /// The polygon owning perimeter side `i`.
    side_owner: Vec<usize>,
    polygons: Vec<Polygon>,
    rep: CompoundRep,
    symmetry: usize,
}

impl PolygonDiagram {
    fn assemble(
        order: usize,
        corners: Vec<usize>,
        side_owner: Vec<usize>,
        polygons: Vec<Polygon>,
    ) -> Result<Self, PolygonError> {
        let mut corner_pos = vec![0; corners.len()];
        for (i, &c) in corners.iter().enumerate() {
            corner_pos[c] = i;
        }
        let rep = represent::represent_polygons(&polygons)?;
        let symmetry = rep.symmetry()?;
        Ok(PolygonDiagram {
            order,
            corners,
            corner_pos,
            side_owner,
            polygons,
            rep,
            symmetry,
        })
    }

    /// A single polygon with every side external.
    pub fn contact(ngons: usize, order: usize) -> Result<Self, PolygonError> {
        if ngons < 4 || ngons % 2 != 0 {
            return Err(PolygonError::InvalidSize(ngons));
        }
        let corners: Vec<usize> = (0..ngons).collect();
        let polygon = Polygon::new(corners.clone(), vec![Side::External; ngons], order);
        Self::assemble(order, corners, vec![0; ngons], vec![polygon])
    }

    /// Glues a new polygon of `ngons + 2` corners and order `order` onto
    /// perimeter side `edge`, which becomes a propagator.
    pub fn cut_edge(&self, edge: usize, ngons: usize, order: usize) -> Result<Self, PolygonError> {
        let base_n = self.corners.len();
        if edge >= base_n {
            return Err(PolygonError::InvalidEdge(edge));
        }
        let new = self.polygons.len();
        let owner = self.side_owner[edge];
        let from = self.corners[edge];
        let to = self.corners[(edge + 1) % base_n];

        let mut corners = Vec::with_capacity(base_n + ngons);
        corners.extend_from_slice(&self.corners[..=edge]);
        corners.extend(base_n..base_n + ngons);
        corners.extend_from_slice(&self.corners[edge + 1..]);

        let mut side_owner = Vec::with_capacity(base_n + ngons);
        side_owner.extend_from_slice(&self.side_owner[..edge]);
        side_owner.extend(std::iter::repeat(new).take(ngons + 1));
        side_owner.extend_from_slice(&self.side_owner[edge + 1..]);

        let mut polygons = self.polygons.clone();
        let cut = &mut polygons[owner];
        let at = cut.position(from).ok_or(PolygonError::DanglingSide {
            polygon: owner,
            corner: from,
        })?;
        cut.sides[at] = Side::Propagator(new);

        let new_corners = std::iter::once(from)
            .chain(base_n..base_n + ngons)
            .chain(std::iter::once(to))
            .collect();
        let mut new_sides = vec![Side::External; ngons + 1];
        new_sides.push(Side::Propagator(owner));
        polygons.push(Polygon::new(new_corners, new_sides, order));

        trace!("cut edge {edge} of {base_n}-point diagram with a {}-gon", ngons + 2);
        Self::assemble(self.order + order, corners, side_owner, polygons)
    }

    /// Every admissible way of splitting polygon `p` along a chord.
    ///
    /// Both halves keep the order of `p` and need at least two
    /// flavour-carrying sides. A chord spanning an odd number of sides costs
    /// two orders and is only drawn when the budget is exactly two; an even
    /// one costs one. The larger half keeps what is left of the budget.
    pub fn split_polygon(&self, p: usize) -> Result<Vec<Self>, PolygonError> {
        let poly = &self.polygons[p];
        let n = poly.len();
        let mut out = vec![];
        if poly.split_budget == 0 || n < 4 {
            return Ok(out);
        }
        let new = self.polygons.len();

        for i in 0..n / 2 {
            for j in i + 2..n {
                let odd = (j - i) % 2 == 1;
                if (odd && poly.split_budget != 2) || (i == 0 && j == n - 1) {
                    continue;
                }
                let flavoured = |k: usize| poly.sides[k % n].carries_flavour();
                let left_degen = (i..j).filter(|&k| flavoured(k)).count();
                let right_degen = (j..i + n).filter(|&k| flavoured(k)).count();
                if left_degen < 2 || right_degen < 2 {
                    continue;
                }

                let mut polygons = self.polygons.clone();
                let mut side_owner = self.side_owner.clone();

                let mut left_corners = poly.corners[i..j].to_vec();
                let mut left_sides = poly.sides[i..j].to_vec();
                left_corners.push(poly.corners[j]);
                left_sides.push(Side::FlavourSplit(new));

                let mut right_corners = Vec::with_capacity(n - (j - i) + 1);
                let mut right_sides = Vec::with_capacity(n - (j - i) + 1);
                for k in 0..n - (j - i) {
                    let kj = (k + j) % n;
                    let side = poly.sides[kj];
                    match side.target() {
                        None => side_owner[self.corner_pos[poly.corners[kj]]] = new,
                        Some(t) => {
                            if !polygons[t].replace_side(side.retargeted(p), side.retargeted(new)) {
                                return Err(PolygonError::DanglingSide {
                                    polygon: t,
                                    corner: poly.corners[(kj + 1) % n],
                                });
                            }
                        }
                    }
                    right_corners.push(poly.corners[kj]);
                    right_sides.push(side);
                }
                right_corners.push(poly.corners[i]);
                right_sides.push(Side::FlavourSplit(p));

                let mut left = Polygon::new(left_corners, left_sides, poly.order);
                let mut right = Polygon::new(right_corners, right_sides, poly.order);
                let remaining = poly
                    .split_budget
                    .checked_sub(if odd { 2 } else { 1 })
                    .ok_or(PolygonError::SplitBudgetExceeded(p))?;
                let (larger, smaller) = if left.len() > right.len() {
                    (&mut left, &mut right)
                } else {
                    (&mut right, &mut left)
                };
                larger.split_budget = remaining;
                smaller.split_budget = 0;

                polygons[p] = left;
                polygons.push(right);

                trace!("split polygon {p} along ({i}, {j})");
                let split =
                    Self::assemble(self.order, self.corners.clone(), side_owner, polygons)?;
                insert(&mut out, split);
            }
        }
        Ok(out)
    }

    /// Every way of turning one propagator of polygon `p` into a singlet.
    /// Both ends need order at least 1, and each propagator is handled from
    /// its lower-indexed end only.
    pub fn singlet_propagators(&self, p: usize) -> Result<Vec<Self>, PolygonError> {
        let poly = &self.polygons[p];
        let mut out = vec![];
        if poly.order < 1 {
            return Ok(out);
        }

        for (g, side) in poly.sides.iter().enumerate() {
            let Side::Propagator(t) = *side else {
                continue;
            };
            if t < p || self.polygons[t].order < 1 {
                continue;
            }
            let mut polygons = self.polygons.clone();
            polygons[p].sides[g] = Side::Singlet(t);
            if !polygons[t].replace_side(Side::Propagator(p), Side::Singlet(p)) {
                return Err(PolygonError::DanglingSide {
                    polygon: t,
                    corner: poly.corners[(g + 1) % poly.len()],
                });
            }
            let singlet = Self::assemble(
                self.order,
                self.corners.clone(),
                self.side_owner.clone(),
                polygons,
            )?;
            insert(&mut out, singlet);
        }
        Ok(out)
    }

    /// A diagram vanishes if some polygon has exactly one flavour-carrying
    /// side, or none and fewer than two singlets.
    pub fn is_zero_flavour_split(&self) -> bool {
        self.polygons.iter().any(|poly| {
            let flavoured = poly.sides.iter().filter(|s| s.carries_flavour()).count();
            let singlets = poly
                .sides
                .iter()
                .filter(|s| matches!(s, Side::Singlet(_)))
                .count();
            flavoured == 1 || (flavoured == 0 && singlets < 2)
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn n_legs(&self) -> usize {
        self.corners.len()
    }

    pub fn corners(&self) -> &[usize] {
        &self.corners
    }

    pub fn corner_pos(&self) -> &[usize] {
        &self.corner_pos
    }

    pub fn side_owner(&self) -> &[usize] {
        &self.side_owner
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn rep(&self) -> &CompoundRep {
        &self.rep
    }

    pub fn symmetry(&self) -> usize {
        self.symmetry
    }

    /// Number of flavour parts.
    pub fn n_parts(&self) -> usize {
        self.rep.len()
    }

    /// Flavour indices per part, up to the first part without any.
    pub fn flavour_split(&self) -> Vec<usize> {
        self.rep
            .parts()
            .iter()
            .map(|part| part.n_flavidx())
            .take_while(|&n| n > 0)
            .collect()
    }
}

impl PartialEq for PolygonDiagram {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PolygonDiagram {}

impl PartialOrd for PolygonDiagram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PolygonDiagram {
    /// More parts first, then fewer polygons, then the representations.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rep
            .len()
            .cmp(&self.rep.len())
            .then(self.polygons.len().cmp(&other.polygons.len()))
            .then_with(|| compare_comprep(Some(&self.rep), Some(&other.rep)))
    }
}

impl fmt::Display for PolygonDiagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "O(p^{}) {}-point diagram, symmetry factor {}:",
            2 * (self.order + 1),
            self.n_legs(),
            self.symmetry
        )?;
        for (p, poly) in self.polygons.iter().enumerate() {
            let perimeter = poly
                .corners
                .iter()
                .zip(&poly.sides)
                .map(|(&c, side)| format!("{}{side}", self.corner_pos[c]))
                .join(" - ");
            let first = poly.corners.first().map_or(0, |&c| self.corner_pos[c]);
            writeln!(
                f,
                "poly {p}[{}:{}]:({perimeter} - {first})",
                poly.order, poly.split_budget
            )?;
        }
        write!(f, "{}", self.rep)
    }
}

/// Inserts into a list sorted in descending order, unless an equal diagram is
/// already present.
pub fn insert(list: &mut Vec<PolygonDiagram>, diagram: PolygonDiagram) {
    if let Err(i) = list.binary_search_by(|probe| diagram.cmp(probe)) {
        list.insert(i, diagram);
    }
}

/// Merges two descending lists. On ties the diagram from `first` is kept.
pub fn merge(first: Vec<PolygonDiagram>, second: Vec<PolygonDiagram>) -> Vec<PolygonDiagram> {
    if second.is_empty() {
        return first;
    }
    if first.is_empty() {
        return second;
    }
    let mut out = Vec::with_capacity(first.len() + second.len());
    let mut first = first.into_iter().peekable();
    let mut second = second.into_iter().peekable();
    loop {
        let comp = match (first.peek(), second.peek()) {
            (Some(a), Some(b)) => a.cmp(b),
            _ => break,
        };
        match comp {
            Ordering::Greater => out.extend(first.next()),
            Ordering::Less => out.extend(second.next()),
            Ordering::Equal => {
                out.extend(first.next());
                second.next();
            }
        }
    }
    out.extend(first);
    out.extend(second);
    out
}

/// Grows every diagram of `base` by a new polygon of `ngons + 2` corners on
/// each edge not related to an earlier one by symmetry.
pub fn grow(
    base: &[PolygonDiagram],
    ngons: usize,
    order: usize,
) -> Result<Vec<PolygonDiagram>, PolygonError> {
    let mut grown = vec![];
    if ngons == 0 {
        return Ok(grown);
    }
    for diagram in base {
        let mut cut = vec![];
        for edge in 0..diagram.n_legs() / diagram.symmetry {
            insert(&mut cut, diagram.cut_edge(edge, ngons, order)?);
        }
        grown = merge(grown, cut);
    }
    Ok(grown)
}

/// Adds every diagram reachable through repeated flavour splits.
pub fn split_all(base: Vec<PolygonDiagram>) -> Result<Vec<PolygonDiagram>, PolygonError> {
    let mut split = vec![];
    for diagram in &base {
        for p in 0..diagram.polygons.len() {
            split = merge(split, diagram.split_polygon(p)?);
        }
    }
    if split.is_empty() {
        return Ok(base);
    }
    Ok(merge(base, split_all(split)?))
}

/// Adds every diagram reachable through repeated singlet propagators.
pub fn singlet_all(base: Vec<PolygonDiagram>) -> Result<Vec<PolygonDiagram>, PolygonError> {
    let mut singlet = vec![];
    for diagram in &base {
        for p in 0..diagram.polygons.len().saturating_sub(1) {
            singlet = merge(singlet, diagram.singlet_propagators(p)?);
        }
    }
    if singlet.is_empty() {
        return Ok(base);
    }
    Ok(merge(base, singlet_all(singlet)?))
}

pub fn remove_zero(list: &mut Vec<PolygonDiagram>) {
    list.retain(|d| !d.is_zero_flavour_split());
}

#[cfg(test)]
mod test;

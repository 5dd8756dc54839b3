//! # Flavour-ordered diagrams
//!
//! A [`Diagram`] is a tree of vertices whose legs are grouped into cyclically
//! ordered flavour traces. Diagrams of a given order and leg count are built
//! recursively: every smaller diagram is extended by attaching one more vertex
//! to one of its external legs, and the results are deduplicated through their
//! canonical set of [`Labelling`]s.
//!
//! ## Key pieces
//!
//! - [`Diagram::generate`]: every distinct diagram of a given order and size.
//! - [`Diagram::valid_flav_splits`] and [`Diagram::valid_vertices`]: the
//!   vertices the Lagrangian allows at a given order.
//! - [`Diagram::is_zero`]: diagrams that vanish identically because of
//!   singlet propagators.
//! - [`DiagramVisitor`]: read-only traversal for exporters.
//!
//! Orders are counted as powers of momentum, so `order == 2` is leading order
//! and every loop adds two.

use std::{cmp::Ordering, fmt};

use ahash::AHashMap;
use bitvec::vec::BitVec;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, trace};
use thiserror::Error;

use crate::permutation::{
    generator::{Generator, ZrGenerator},
    PermutationError,
};

pub mod config;
pub mod labelling;
pub mod momenta;
pub mod node;
pub mod propagator;

pub use config::{FilterMode, FlavourFilter, GenerationConfig};
use labelling::Labelling;
use momenta::Momenta;
use node::{DiagramNode, IndexBuckets};

/// Largest number of external legs a [`Momenta`] mask can carry.
pub const MAX_LEGS: usize = u64::BITS as usize;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiagramError {
    #[error("Invalid number of legs {0}: must be even and at least 4")]
    InvalidLegCount(usize),
    #[error("Too many legs: {0} > {MAX_LEGS}")]
    TooManyLegs(usize),
    #[error("Invalid order {0}: must be even and at least 2")]
    InvalidOrder(usize),
    #[error("No free flavour block of size {0}")]
    MissingIndexBucket(usize),
    #[error("External leg reached without a flavour index")]
    UnindexedLeg,
    #[error("Attachment path leaves the tree at depth {depth}")]
    InvalidPath { depth: usize },
    #[error(transparent)]
    Permutation(#[from] PermutationError),
}

/// A vertex that can be attached to a diagram: its order and flavour split.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub order: usize,
    pub flav_split: Vec<usize>,
}

/// Read-only traversal of a diagram tree.
///
/// [`Diagram::walk`] visits the tree depth first in trace order. A vertex
/// below the root is announced by the propagator leading to it, then by the
/// vertex itself, then its legs one level deeper.
pub trait DiagramVisitor {
    fn vertex(&mut self, _depth: usize, _order: usize, _flav_split: &[usize]) {}

    fn propagator(&mut self, _depth: usize, _momenta: Momenta, _singlet: bool) {}

    fn leg(&mut self, _depth: usize, _momenta: Momenta) {}
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagram {
    order: usize,
    n_legs: usize,
    flav_split: Vec<usize>,
    singlet: bool,
    root: DiagramNode,
    labellings: Vec<Labelling>,
}

impl Diagram {
    /// The single-vertex diagram with the given order and flavour split.
    pub fn new(order: usize, mut flav_split: Vec<usize>) -> Result<Self, DiagramError> {
        flav_split.sort_unstable();
        let n_legs = flav_split.iter().sum();
        if n_legs > MAX_LEGS {
            return Err(DiagramError::TooManyLegs(n_legs));
        }
        let mut diagram = Diagram {
            order,
            n_legs,
            root: DiagramNode::root(order, &flav_split),
            flav_split,
            singlet: false,
            labellings: vec![],
        };
        diagram.find_flav_split();
        diagram.index()?;
        diagram.label()?;
        Ok(diagram)
    }

    /// Every distinct diagram with `n_legs` external legs at `order`, sorted.
    ///
    /// With `singlets` set, diagrams with singlet propagators are included.
    /// With `remove_zero` set, identically vanishing diagrams are dropped.
    pub fn generate(
        order: usize,
        n_legs: usize,
        singlets: bool,
        remove_zero: bool,
    ) -> Result<Vec<Diagram>, DiagramError> {
        Self::check_input(order, n_legs)?;

        let mut memo = AHashMap::new();
        let mut diagrams = Self::generate_memo(order, n_legs, singlets, &mut memo)?;
        if remove_zero {
            diagrams.retain(|d| !d.is_zero());
        }
        debug!(
            "generated {} O(p^{order}) {n_legs}-point diagrams",
            diagrams.len()
        );
        Ok(diagrams)
    }

    /// [`Diagram::generate`] followed by the configured flavour-split filter.
    pub fn generate_with(config: &GenerationConfig) -> Result<Vec<Diagram>, DiagramError> {
        config.validate()?;
        let mut diagrams = Self::generate(
            config.order,
            config.n_legs,
            config.singlets,
            config.remove_zero,
        )?;
        if let Some(filter) = &config.flavour_filter {
            let removed = Self::filter_flav_split(
                &mut diagrams,
                &filter.splits,
                filter.mode == FilterMode::Include,
            );
            debug!("flavour filter removed {removed} diagrams");
        }
        Ok(diagrams)
    }

    pub(crate) fn check_input(order: usize, n_legs: usize) -> Result<(), DiagramError> {
        if n_legs % 2 != 0 || n_legs < 4 {
            return Err(DiagramError::InvalidLegCount(n_legs));
        }
        if n_legs > MAX_LEGS {
            return Err(DiagramError::TooManyLegs(n_legs));
        }
        if order % 2 != 0 || order < 2 {
            return Err(DiagramError::InvalidOrder(order));
        }
        Ok(())
    }

    /// Sorted, deduplicated and zero-inclusive. Zero diagrams are kept since an
    /// extension can make them nonzero again.
    fn generate_memo(
        order: usize,
        n_legs: usize,
        singlets: bool,
        memo: &mut AHashMap<(usize, usize), Vec<Diagram>>,
    ) -> Result<Vec<Diagram>, DiagramError> {
        if let Some(known) = memo.get(&(order, n_legs)) {
            return Ok(known.clone());
        }

        let mut diagrams = Self::valid_flav_splits(order, n_legs, 2)
            .into_iter()
            .map(|split| Diagram::new(order, split))
            .collect::<Result<Vec<_>, _>>()?;

        // An extension never adds more orders than the extended diagram has,
        // and at equal orders never more legs.
        let mut o = order;
        while o > order / 2 {
            let n_min = if n_legs <= 8 || 2 * o != 2 + order {
                4
            } else {
                n_legs / 2
            };
            for n in (n_min..=n_legs - 2).rev().step_by(2) {
                let vertices = Self::valid_vertices(2 + order - o, 2 + n_legs - n);
                let allow_singlets = singlets && o > 2 && order > 4;
                debug!(
                    "extending O(p^{o}) {n}-point diagrams by {} vertices",
                    vertices.len()
                );
                for d in Self::generate_memo(o, n, singlets, memo)? {
                    diagrams.extend(d.extend(&vertices, allow_singlets)?);
                }
            }
            o -= 2;
        }

        diagrams.sort();
        diagrams.dedup();
        memo.insert((order, n_legs), diagrams.clone());
        Ok(diagrams)
    }

    /// All diagrams obtained by attaching one of `vertices` to a leg of `self`.
    ///
    /// Only legs that carry a representative flavour index in at least one
    /// labelling are used: attaching anywhere else is equivalent to attaching
    /// at a representative under the diagram's symmetry.
    pub fn extend(&self, vertices: &[Vertex], singlets: bool) -> Result<Vec<Diagram>, DiagramError> {
        // first index of every trace that starts a run of equal sizes
        let mut idx_reps = vec![0];
        let mut start = 0;
        for (prev, next) in self.flav_split.iter().tuple_windows() {
            start += prev;
            if next != prev {
                idx_reps.push(start);
            }
        }

        let mut reps: BitVec = BitVec::repeat(false, self.n_legs);
        for lbl in &self.labellings {
            let locations = lbl.index_locations();
            for &rep in &idx_reps {
                let leg = locations.image(rep)?;
                reps.set(leg, true);
            }
        }
        trace!("attaching to legs {:?}", reps.iter_ones().collect_vec());

        let mut out = vec![];
        let mut path = vec![];
        self.root
            .extend(&reps, &mut path, singlets, &mut |path, singlet| {
                for v in vertices {
                    self.attach(v, path, singlet && v.order > 2, &mut out)?;
                }
                Ok(())
            })?;
        Ok(out)
    }

    /// Attaches `vertex` at the leg reached by `path`, once through every
    /// distinct trace size of the vertex, and once more as a singlet when
    /// allowed and the trace has more than two legs.
    fn attach(
        &self,
        vertex: &Vertex,
        path: &[(usize, usize)],
        singlet: bool,
        out: &mut Vec<Diagram>,
    ) -> Result<(), DiagramError> {
        for (i, &size) in vertex.flav_split.iter().enumerate() {
            if i > 0 && size == vertex.flav_split[i - 1] {
                continue;
            }
            trace!(
                "attaching O(p^{}) vertex {:?} through trace {i} at {path:?}",
                vertex.order,
                vertex.flav_split
            );
            out.push(self.attached(vertex, i, path, false)?);
            if singlet && size > 2 {
                out.push(self.attached(vertex, i, path, true)?);
            }
        }
        Ok(())
    }

    fn attached(
        &self,
        vertex: &Vertex,
        split_idx: usize,
        path: &[(usize, usize)],
        singlet: bool,
    ) -> Result<Diagram, DiagramError> {
        let mut d = self.clone();
        d.order += vertex.order - 2;
        d.root
            .attach(vertex.order, &vertex.flav_split, split_idx, path, singlet)?;
        d.singlet |= singlet;
        d.find_flav_split();
        if d.n_legs > MAX_LEGS {
            return Err(DiagramError::TooManyLegs(d.n_legs));
        }
        d.index()?;
        d.label()?;
        Ok(d)
    }

    fn find_flav_split(&mut self) {
        self.flav_split.clear();
        self.root.find_flav_split(&mut self.flav_split);
        self.flav_split.sort_unstable();
        self.n_legs = self.flav_split.iter().sum();
        trace!("flavour split {:?}", self.flav_split);
    }

    fn index(&mut self) -> Result<(), DiagramError> {
        let mut buckets = IndexBuckets::default();
        let mut start = 0;
        for &size in &self.flav_split {
            buckets.entry(size).or_default().push_back(start);
            start += size;
        }
        self.root.index(&mut buckets, None)?;
        Ok(())
    }

    /// Rebuilds the canonical labelling set: the labelling of the tree and its
    /// images under every element of `Z_R` for the flavour split `R`.
    fn label(&mut self) -> Result<(), DiagramError> {
        let base = Labelling::from_tree(&mut self.root, self.n_legs);
        let mut labellings = vec![base.clone()];
        for perm in ZrGenerator::new(&self.flav_split).elements() {
            labellings.push(Labelling::relabelled(&base, &perm)?);
        }
        labellings.sort();
        labellings.dedup();
        self.labellings = labellings;
        Ok(())
    }

    /// Whether the diagram vanishes identically: a single-index trace, or one
    /// of the node patterns of [`DiagramNode::is_zero`].
    pub fn is_zero(&self) -> bool {
        if self.flav_split.first() == Some(&1) {
            return true;
        }
        if self.order < 6 {
            return false;
        }
        self.root.is_zero()
    }

    /// The flavour splits allowed for a vertex of `order` with `n_legs` legs,
    /// each sorted ascending, with every part at least `smallest`.
    ///
    /// The unsplit `{n_legs}` is always allowed from order 2 on. Splitting off
    /// a trace of size `s` costs two orders, or four when `s` is odd and the
    /// leg count even.
    pub fn valid_flav_splits(order: usize, n_legs: usize, smallest: usize) -> Vec<Vec<usize>> {
        if order < 2 {
            return vec![];
        }
        let mut splits = vec![vec![n_legs]];
        if order == 2 {
            return splits;
        }
        for s in smallest.max(1)..=n_legs / 2 {
            let cost = if s % 2 == 1 && n_legs % 2 == 0 { 4 } else { 2 };
            let Some(rest) = order.checked_sub(cost) else {
                continue;
            };
            for mut split in Self::valid_flav_splits(rest, n_legs - s, s) {
                split.insert(0, s);
                splits.push(split);
            }
        }
        splits
    }

    pub fn valid_vertices(order: usize, n_legs: usize) -> Vec<Vertex> {
        Self::valid_flav_splits(order, n_legs, 2)
            .into_iter()
            .map(|flav_split| Vertex { order, flav_split })
            .collect()
    }

    /// Keeps the diagrams whose flavour split is among `splits` (when
    /// `include`) or not among them. Returns the number removed.
    pub fn filter_flav_split(diagrams: &mut Vec<Diagram>, splits: &[Vec<usize>], include: bool) -> usize {
        let wanted: Vec<Vec<usize>> = splits
            .iter()
            .map(|s| s.iter().copied().sorted_unstable().collect())
            .collect();
        let before = diagrams.len();
        diagrams.retain(|d| wanted.contains(&d.flav_split) == include);
        before - diagrams.len()
    }

    /// Counts diagrams per leg count and order, then per flavour split.
    pub fn summarise(diagrams: &[Diagram]) -> Summary {
        let mut groups: IndexMap<(usize, usize), IndexMap<(Vec<usize>, bool), usize>> =
            IndexMap::new();
        for d in diagrams {
            *groups
                .entry((d.n_legs, d.order))
                .or_default()
                .entry((d.flav_split.clone(), d.singlet))
                .or_default() += 1;
        }
        Summary { groups }
    }

    pub fn walk<V: DiagramVisitor>(&self, visitor: &mut V) {
        self.root.walk(visitor, 0);
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn n_legs(&self) -> usize {
        self.n_legs
    }

    pub fn flav_split(&self) -> &[usize] {
        &self.flav_split
    }

    /// Whether any propagator of the diagram is a singlet.
    pub fn is_singlet(&self) -> bool {
        self.singlet
    }

    pub fn root(&self) -> &DiagramNode {
        &self.root
    }

    pub fn labellings(&self) -> &[Labelling] {
        &self.labellings
    }
}

impl PartialEq for Diagram {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Diagram {}

impl PartialOrd for Diagram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Smaller and lower-order diagrams first. Flavour splits compare in reverse so
/// that unsplit diagrams come first and single-index traces last.
impl Ord for Diagram {
    fn cmp(&self, other: &Self) -> Ordering {
        self.n_legs
            .cmp(&other.n_legs)
            .then(self.order.cmp(&other.order))
            .then_with(|| other.flav_split.cmp(&self.flav_split))
            .then_with(|| self.labellings.cmp(&other.labellings))
    }
}

impl fmt::Display for Diagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "O(p^{}) {}-point diagram, flavour split {:?}, {} distinct labellings:",
            self.order,
            self.n_legs,
            self.flav_split,
            self.labellings.len()
        )?;
        if let Some(first) = self.labellings.first() {
            writeln!(f, "\t{}", first.header())?;
        }
        for lbl in &self.labellings {
            writeln!(f, "\t{lbl}")?;
        }
        Ok(())
    }
}

/// Diagram counts per `(legs, order)`, then per flavour split and singlet-ness,
/// in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    groups: IndexMap<(usize, usize), IndexMap<(Vec<usize>, bool), usize>>,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.groups.values().flat_map(|g| g.values()).sum()
    }

    pub fn count(&self, n_legs: usize, order: usize, flav_split: &[usize], singlet: bool) -> usize {
        self.groups
            .get(&(n_legs, order))
            .and_then(|g| g.get(&(flav_split.to_vec(), singlet)))
            .copied()
            .unwrap_or(0)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ((n_legs, order), splits) in &self.groups {
            let total: usize = splits.values().sum();
            writeln!(f, "O(p^{order}) {n_legs}-point: {total} diagrams")?;
            for ((split, singlet), count) in splits {
                let tag = if *singlet { " singlet" } else { "" };
                writeln!(f, "  {split:?}{tag}: {count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test;

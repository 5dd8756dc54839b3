//! The recursive tree behind a [`Diagram`](super::Diagram).
//!
//! A diagram is a rooted tree of vertices. Every vertex groups its legs into
//! flavour traces; a leg is either an external line ([`DiagramNode::Leaf`]) or
//! a propagator leading to a child vertex. A child is linked into exactly one
//! trace of its own, the connected trace, which continues the flavour flow of
//! the parent trace it hangs off. Singlet-linked children break that flow and
//! start fresh flavour indices on every trace.

use std::collections::VecDeque;

use ahash::AHashMap;
use bitvec::slice::BitSlice;
use log::trace;

use super::{momenta::Momenta, propagator::Propagator, DiagramError, DiagramVisitor};

/// Free starting indices of the flavour blocks, keyed by block size.
pub(crate) type IndexBuckets = AHashMap<usize, VecDeque<usize>>;

/// How a vertex hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParentLink {
    Root,
    /// `connect_idx` is the trace that carries the parent's flavour flow.
    Propagator { singlet: bool, connect_idx: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlavourTrace {
    legs: Vec<DiagramNode>,
    connected: bool,
    n_idcs: usize,
    momenta: Momenta,
}

impl FlavourTrace {
    fn with_leaves(size: usize, connected: bool) -> Self {
        FlavourTrace {
            legs: vec![DiagramNode::Leaf(Momenta::EMPTY); size],
            connected,
            n_idcs: 0,
            momenta: Momenta::EMPTY,
        }
    }

    pub fn legs(&self) -> &[DiagramNode] {
        &self.legs
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Flavour indices carried by this trace, singlet children excluded.
    pub fn n_idcs(&self) -> usize {
        self.n_idcs
    }

    pub fn momenta(&self) -> Momenta {
        self.momenta
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VertexNode {
    order: usize,
    n_legs: usize,
    momenta: Momenta,
    link: ParentLink,
    traces: Vec<FlavourTrace>,
}

impl VertexNode {
    pub fn order(&self) -> usize {
        self.order
    }

    /// Legs below this vertex, not counting the one towards the parent.
    pub fn n_legs(&self) -> usize {
        self.n_legs
    }

    pub fn momenta(&self) -> Momenta {
        self.momenta
    }

    pub fn link(&self) -> ParentLink {
        self.link
    }

    pub fn traces(&self) -> &[FlavourTrace] {
        &self.traces
    }

    pub fn is_singlet(&self) -> bool {
        matches!(self.link, ParentLink::Propagator { singlet: true, .. })
    }

    /// The flavour split of the vertex itself, counting the parent leg.
    pub fn flav_split(&self) -> Vec<usize> {
        self.traces
            .iter()
            .map(|tr| tr.legs.len() + usize::from(tr.connected))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagramNode {
    /// An external leg and the momentum it carries once indexed.
    Leaf(Momenta),
    Vertex(VertexNode),
}

impl DiagramNode {
    /// The single vertex of a contact diagram, with `flav_split` external legs
    /// per trace. The split must be sorted.
    pub fn root(order: usize, flav_split: &[usize]) -> Self {
        DiagramNode::Vertex(VertexNode {
            order,
            n_legs: flav_split.iter().sum(),
            momenta: Momenta::EMPTY,
            link: ParentLink::Root,
            traces: flav_split
                .iter()
                .map(|&size| FlavourTrace::with_leaves(size, false))
                .collect(),
        })
    }

    /// A vertex to be hung off a parent through trace `split_idx`, which
    /// therefore gets one external leg fewer.
    pub fn interior(order: usize, flav_split: &[usize], split_idx: usize, singlet: bool) -> Self {
        let traces: Vec<_> = flav_split
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                let connected = i == split_idx;
                FlavourTrace::with_leaves(size - usize::from(connected), connected)
            })
            .collect();
        DiagramNode::Vertex(VertexNode {
            order,
            n_legs: traces.iter().map(|tr| tr.legs.len()).sum(),
            momenta: Momenta::EMPTY,
            link: ParentLink::Propagator {
                singlet,
                connect_idx: split_idx,
            },
            traces,
        })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, DiagramNode::Leaf(_))
    }

    pub fn is_singlet(&self) -> bool {
        match self {
            DiagramNode::Leaf(_) => false,
            DiagramNode::Vertex(v) => v.is_singlet(),
        }
    }

    pub fn momenta(&self) -> Momenta {
        match self {
            DiagramNode::Leaf(m) => *m,
            DiagramNode::Vertex(v) => v.momenta,
        }
    }

    pub fn as_vertex(&self) -> Option<&VertexNode> {
        match self {
            DiagramNode::Leaf(_) => None,
            DiagramNode::Vertex(v) => Some(v),
        }
    }

    /// Whether the subtree forces the whole diagram to vanish: a trace whose
    /// only leg disagrees with the vertex on being singlet, or a two-leg trace
    /// mixing a singlet and an ordinary leg.
    pub fn is_zero(&self) -> bool {
        let DiagramNode::Vertex(v) = self else {
            return false;
        };
        let singlet = v.is_singlet();
        v.traces.iter().any(|tr| match tr.legs.as_slice() {
            [only] if only.is_singlet() != singlet => true,
            [a, b] if a.is_singlet() != b.is_singlet() => true,
            legs => legs.iter().any(DiagramNode::is_zero),
        })
    }

    /// Collects the sizes of the flavour traces of the subtree into `out` and
    /// caches the per-trace index counts.
    ///
    /// Returns the number of indices that continue into the parent's trace. A
    /// leaf returns 1; the root's return value is meaningless.
    pub(crate) fn find_flav_split(&mut self, out: &mut Vec<usize>) -> usize {
        let DiagramNode::Vertex(v) = self else {
            return 1;
        };
        let mut con_sum = 0;
        for tr in &mut v.traces {
            let mut sum = 0;
            for leg in &mut tr.legs {
                if leg.is_singlet() {
                    let singlet_sum = leg.find_flav_split(out);
                    if singlet_sum > 0 {
                        out.push(singlet_sum);
                    }
                } else {
                    sum += leg.find_flav_split(out);
                }
            }
            tr.n_idcs = sum;
            if tr.connected {
                con_sum = sum;
            } else if sum > 0 {
                out.push(sum);
            }
        }
        con_sum
    }

    /// Hands out flavour indices to the leaves.
    ///
    /// Every trace that starts a flavour block draws the first free start of
    /// its size from `buckets`; a connected trace keeps counting from `idx`,
    /// the parent's running index. Returns the running index after this
    /// subtree.
    pub(crate) fn index(
        &mut self,
        buckets: &mut IndexBuckets,
        mut idx: Option<usize>,
    ) -> Result<Option<usize>, DiagramError> {
        let v = match self {
            DiagramNode::Leaf(momenta) => {
                let i = idx.ok_or(DiagramError::UnindexedLeg)?;
                *momenta = Momenta::single(i);
                return Ok(Some(i + 1));
            }
            DiagramNode::Vertex(v) => v,
        };

        let singlet = v.is_singlet();
        for tr in &mut v.traces {
            let mut sub_idx = if (!tr.connected || singlet) && tr.n_idcs > 0 {
                let start = buckets
                    .get_mut(&tr.n_idcs)
                    .and_then(VecDeque::pop_front)
                    .ok_or(DiagramError::MissingIndexBucket(tr.n_idcs))?;
                trace!("trace of {} indices starts at {start}", tr.n_idcs);
                Some(start)
            } else {
                idx
            };

            for leg in &mut tr.legs {
                if leg.is_singlet() {
                    leg.index(buckets, None)?;
                } else {
                    sub_idx = leg.index(buckets, sub_idx)?;
                }
                if tr.connected {
                    idx = sub_idx;
                }
            }
        }
        Ok(idx)
    }

    /// Propagates the leaf momenta up the tree. Returns the momenta flowing
    /// into the parent.
    pub(crate) fn set_momenta(&mut self) -> Momenta {
        let v = match self {
            DiagramNode::Leaf(m) => return *m,
            DiagramNode::Vertex(v) => v,
        };
        v.momenta = Momenta::EMPTY;
        for tr in &mut v.traces {
            tr.momenta = Momenta::EMPTY;
            for leg in &mut tr.legs {
                tr.momenta |= leg.set_momenta();
            }
            v.momenta |= tr.momenta;
        }
        v.momenta
    }

    /// Pushes one propagator per internal edge of the tree onto `props`.
    pub(crate) fn label(&self, props: &mut Vec<Propagator>, n_idcs: usize) {
        self.label_below(props, n_idcs, 0, Momenta::EMPTY);
    }

    fn label_below(
        &self,
        props: &mut Vec<Propagator>,
        n_idcs: usize,
        parent_order: usize,
        parent_prev: Momenta,
    ) {
        let DiagramNode::Vertex(v) = self else {
            return;
        };

        for tr in &v.traces {
            // the edge towards the parent is outgoing, so read it inverted
            let mut prev = if tr.connected {
                v.momenta.complement(n_idcs)
            } else {
                tr.legs.last().map_or(Momenta::EMPTY, DiagramNode::momenta)
            };
            for leg in &tr.legs {
                leg.label_below(props, n_idcs, v.order, prev);
                prev = leg.momenta();
            }
        }

        match v.link {
            ParentLink::Root => {}
            ParentLink::Propagator {
                singlet: false, ..
            } => props.push(Propagator::new(v.momenta, n_idcs, v.order, parent_order)),
            ParentLink::Propagator {
                singlet: true,
                connect_idx,
            } => {
                let prev = v
                    .traces
                    .get(connect_idx)
                    .and_then(|tr| tr.legs.last())
                    .map_or(Momenta::EMPTY, DiagramNode::momenta);
                props.push(Propagator::singlet(
                    v.momenta,
                    n_idcs,
                    v.order,
                    prev,
                    parent_order,
                    parent_prev,
                ));
            }
        }
    }

    /// Depth-first search for the leaves whose index is marked in `reps`.
    ///
    /// `path` holds the `(trace, leg)` steps from the root to the current
    /// node. For every marked leaf `on_leaf` receives that path and whether a
    /// singlet edge may be attached there.
    pub(crate) fn extend<F>(
        &self,
        reps: &BitSlice,
        path: &mut Vec<(usize, usize)>,
        singlet: bool,
        on_leaf: &mut F,
    ) -> Result<(), DiagramError>
    where
        F: FnMut(&[(usize, usize)], bool) -> Result<(), DiagramError>,
    {
        let v = match self {
            DiagramNode::Leaf(m) => {
                let marked = m
                    .lowest()
                    .and_then(|i| reps.get(i))
                    .is_some_and(|b| *b);
                if marked {
                    on_leaf(path, singlet)?;
                }
                return Ok(());
            }
            DiagramNode::Vertex(v) => v,
        };

        for (t, tr) in v.traces.iter().enumerate() {
            for (l, leg) in tr.legs.iter().enumerate() {
                path.push((t, l));
                leg.extend(
                    reps,
                    path,
                    singlet && (!leg.is_leaf() || v.order > 2),
                    on_leaf,
                )?;
                path.pop();
            }
        }
        Ok(())
    }

    /// Replaces the node at the end of `path` with a fresh vertex hung off its
    /// parent through trace `split_idx`.
    pub(crate) fn attach(
        &mut self,
        order: usize,
        flav_split: &[usize],
        split_idx: usize,
        path: &[(usize, usize)],
        singlet: bool,
    ) -> Result<(), DiagramError> {
        let mut node = self;
        for (depth, &(t, l)) in path.iter().enumerate() {
            node = match node {
                DiagramNode::Vertex(v) => v
                    .traces
                    .get_mut(t)
                    .and_then(|tr| tr.legs.get_mut(l))
                    .ok_or(DiagramError::InvalidPath { depth })?,
                DiagramNode::Leaf(_) => return Err(DiagramError::InvalidPath { depth }),
            };
        }
        *node = DiagramNode::interior(order, flav_split, split_idx, singlet);
        Ok(())
    }

    pub(crate) fn walk<V: DiagramVisitor>(&self, visitor: &mut V, depth: usize) {
        let v = match self {
            DiagramNode::Leaf(m) => {
                visitor.leg(depth, *m);
                return;
            }
            DiagramNode::Vertex(v) => v,
        };
        if let ParentLink::Propagator { singlet, .. } = v.link {
            visitor.propagator(depth, v.momenta, singlet);
        }
        visitor.vertex(depth, v.order, &v.flav_split());
        for tr in &v.traces {
            for leg in &tr.legs {
                leg.walk(visitor, depth + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buckets(split: &[usize]) -> IndexBuckets {
        let mut out = IndexBuckets::default();
        let mut start = 0;
        for &s in split {
            out.entry(s).or_default().push_back(start);
            start += s;
        }
        out
    }

    #[test]
    fn test_contact_vertex() {
        let mut root = DiagramNode::root(4, &[2, 2]);
        let mut split = vec![];
        root.find_flav_split(&mut split);
        split.sort();
        assert_eq!(split, vec![2, 2]);

        root.index(&mut buckets(&split), None).unwrap();
        assert_eq!(root.set_momenta(), Momenta::all(4));

        let v = root.as_vertex().unwrap();
        assert_eq!(v.traces()[0].momenta(), Momenta(0b0011));
        assert_eq!(v.traces()[1].momenta(), Momenta(0b1100));

        let mut props = vec![];
        root.label(&mut props, 4);
        assert!(props.is_empty());
    }

    #[test]
    fn test_attach_continues_trace() {
        let mut root = DiagramNode::root(2, &[4]);
        root.attach(2, &[4], 0, &[(0, 3)], false).unwrap();

        let mut split = vec![];
        root.find_flav_split(&mut split);
        assert_eq!(split, vec![6]);

        root.index(&mut buckets(&split), None).unwrap();
        root.set_momenta();

        let child = &root.as_vertex().unwrap().traces()[0].legs()[3];
        assert_eq!(child.momenta(), Momenta(0b111000));

        let mut props = vec![];
        root.label(&mut props, 6);
        assert_eq!(props, vec![Propagator::new(Momenta(0b111000), 6, 2, 2)]);
    }

    #[test]
    fn test_singlet_starts_new_traces() {
        let mut root = DiagramNode::root(4, &[4]);
        root.attach(2, &[4], 0, &[(0, 3)], true).unwrap();

        let mut split = vec![];
        root.find_flav_split(&mut split);
        split.sort();
        assert_eq!(split, vec![3, 3]);

        root.index(&mut buckets(&split), None).unwrap();
        root.set_momenta();
        assert_eq!(root.momenta(), Momenta::all(6));

        let mut props = vec![];
        root.label(&mut props, 6);
        assert_eq!(props.len(), 1);
        assert!(props[0].is_singlet());
    }

    #[test]
    fn test_zero_patterns() {
        // a singlet edge alone next to one ordinary leg in a two-leg trace
        let mut root = DiagramNode::root(4, &[2]);
        root.attach(4, &[4], 0, &[(0, 1)], true).unwrap();
        assert!(root.is_zero());

        let mut ordinary = DiagramNode::root(4, &[2]);
        ordinary.attach(4, &[4], 0, &[(0, 1)], false).unwrap();
        assert!(!ordinary.is_zero());

        assert!(!DiagramNode::Leaf(Momenta::EMPTY).is_zero());
    }

    #[test]
    fn test_bad_path() {
        let mut root = DiagramNode::root(2, &[4]);
        assert_eq!(
            root.attach(2, &[4], 0, &[(0, 7)], false),
            Err(DiagramError::InvalidPath { depth: 0 })
        );
        assert_eq!(
            root.attach(2, &[4], 0, &[(0, 1), (0, 0)], false),
            Err(DiagramError::InvalidPath { depth: 1 })
        );
    }

    #[test]
    fn test_missing_bucket() {
        let mut root = DiagramNode::root(2, &[4]);
        let mut split = vec![];
        root.find_flav_split(&mut split);
        assert_eq!(
            root.index(&mut buckets(&[2, 2]), None),
            Err(DiagramError::MissingIndexBucket(4))
        );
    }
}

use std::{cmp::Ordering, fmt};

use crate::permutation::{Permutation, PermutationError};

use super::{node::DiagramNode, propagator::Propagator};

/// One assignment of flavour indices to the legs of a diagram, reduced to the
/// propagators it induces.
///
/// Two labellings are equal when their propagator lists are; the permutation
/// that produced them is bookkeeping only.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Labelling {
    perm: Permutation,
    props: Vec<Propagator>,
}

impl Labelling {
    /// Labels an indexed tree with the identity permutation.
    pub fn from_tree(root: &mut DiagramNode, n_legs: usize) -> Self {
        root.set_momenta();
        let mut props = Vec::new();
        root.label(&mut props, n_legs);
        let mut labelling = Labelling {
            perm: Permutation::id(n_legs),
            props,
        };
        labelling.normalise();
        labelling
    }

    /// `orig` with every momentum index `i` renamed to `cycl[i]`.
    pub fn relabelled(orig: &Labelling, cycl: &Permutation) -> Result<Self, PermutationError> {
        let props = orig
            .props
            .iter()
            .map(|p| p.relabelled(cycl))
            .collect::<Result<_, _>>()?;
        let mut labelling = Labelling {
            perm: cycl.clone(),
            props,
        };
        labelling.normalise();
        Ok(labelling)
    }

    fn normalise(&mut self) {
        self.props.sort();
        self.props.dedup();
    }

    pub fn perm(&self) -> &Permutation {
        &self.perm
    }

    pub fn propagators(&self) -> &[Propagator] {
        &self.props
    }

    /// Maps each index of this labelling to the leg that carries it in the
    /// identity labelling.
    pub fn index_locations(&self) -> Permutation {
        self.perm.inverse()
    }

    /// Column header aligned with the `Display` output.
    pub fn header(&self) -> String {
        let mut out = Permutation::id(self.perm.len()).to_string();
        for p in &self.props {
            out.push_str("   ");
            out.push_str(&p.header());
        }
        if self.props.is_empty() {
            out.push_str(&" ".repeat(" | [no propagators]".len()));
        }
        out
    }
}

impl PartialEq for Labelling {
    fn eq(&self, other: &Self) -> bool {
        self.props == other.props
    }
}

impl Eq for Labelling {}

impl PartialOrd for Labelling {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Fewer propagators first, then lexicographic.
impl Ord for Labelling {
    fn cmp(&self, other: &Self) -> Ordering {
        self.props
            .len()
            .cmp(&other.props.len())
            .then_with(|| self.props.cmp(&other.props))
    }
}

impl fmt::Display for Labelling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.perm)?;
        for p in &self.props {
            write!(f, " | {p}")?;
        }
        if self.props.is_empty() {
            write!(f, " | [no propagators]")?;
        }
        Ok(())
    }
}

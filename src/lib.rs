//! # Fodge
//!
//! Fodge generates flavour-ordered Feynman diagrams of the nonlinear sigma
//! model: all distinct diagrams with a given number of external legs at a given
//! order in the momentum expansion, each with the set of its inequivalent
//! labellings and, in the polygon model, its symmetry factor.
//!
//! - [`diagram`]: tree diagrams, generated recursively from contact vertices,
//!   indexed, labelled and canonicalised under the cyclic relabelling group.
//! - [`permutation`]: the permutation algebra and the generators of the
//!   relabelling groups.
//! - [`cycrep`]: cyclic canonical forms, their comparison and the symmetry
//!   factors they encode.
//! - [`polygon`]: diagrams as tilings of a disc by polygons, represented and
//!   deduplicated through [`cycrep`], and collected in a
//!   [`DiagramTable`](polygon::DiagramTable).

pub mod cycrep;
pub mod diagram;
pub mod permutation;
pub mod polygon;

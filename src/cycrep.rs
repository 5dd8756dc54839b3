//! # Cyclic representations
//!
//! A [`CycRep`] is a cyclic string describing one flavour part of a polygon
//! diagram: one [`GonRep`] per external or singlet line around the perimeter
//! of the part, each listing the internal lines that leave from there. It is
//! compared on three levels, cheapest first:
//!
//! - [`Levels::TOP`]: how far along the perimeter every line reaches,
//! - [`Levels::ORD`]: the order of the vertex each line belongs to,
//! - [`Levels::FSP`]: the parts attached through flavour splits and singlets,
//!   as nested [`CompoundRep`]s.
//!
//! Normalising a representation rotates it into its lexicographically least
//! form with a generalisation of Booth's algorithm, one level at a time. A
//! coarser level fixes a period and the finer levels only ever look at
//! rotations by multiples of it. The final period gives the rotational
//! symmetry of the part, and [`CompoundRep::symmetry`] combines those with the
//! exchange symmetry of identical parts.
//!
//! Parts refer to each other through flavour splits, which would make the
//! nesting cyclic. A nested part therefore never expands the part that
//! requested it, and refers to it through [`PartRep::BackToMaster`] instead.

use std::{
    cmp::Ordering,
    fmt::{self, Write},
};

use derive_more::{BitAnd, BitOr};
use indenter::indented;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepresentationError {
    #[error("Normalised representation has no period")]
    ZeroPeriod,
    #[error("Symmetry factor overflows")]
    SymmetryOverflow,
}

/// A set of comparison levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BitOr, BitAnd)]
pub struct Levels(u8);

impl Levels {
    pub const NONE: Levels = Levels(0);
    pub const TOP: Levels = Levels(1);
    pub const ORD: Levels = Levels(1 << 1);
    pub const FSP: Levels = Levels(1 << 2);
    pub const ALL: Levels = Levels(0b111);

    pub fn contains(self, other: Levels) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Where the nested representation of a line lives in its [`CycRep`].
///
/// Two references are identical only if they point at the same stored
/// representation, which is what period finding needs to avoid counting one
/// symmetry twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConRef {
    Empty,
    /// The flavour-split connections of a polygon.
    Polygon(usize),
    /// The part on the far side of a singlet line.
    Singlet(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRep {
    /// Perimeter distance covered by the line. Zero marks a singlet line.
    pub len: usize,
    pub ord: usize,
    pub con: ConRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GonRep {
    pub lines: Vec<LineRep>,
}

#[derive(Debug, Clone)]
pub struct CycRep {
    array: Vec<GonRep>,
    n_flavidx: usize,
    offset: usize,
    /// Zero until the first normalisation.
    period: usize,
    connections: Vec<Option<CompoundRep>>,
    singlets: Vec<CompoundRep>,
}

impl CycRep {
    pub fn new(array: Vec<GonRep>, n_flavidx: usize) -> Self {
        CycRep {
            array,
            n_flavidx,
            offset: 0,
            period: 0,
            connections: vec![],
            singlets: vec![],
        }
    }

    /// Stores the nested representations that the lines refer to through
    /// [`ConRef::Polygon`] and [`ConRef::Singlet`].
    pub fn with_connections(
        mut self,
        connections: Vec<Option<CompoundRep>>,
        singlets: Vec<CompoundRep>,
    ) -> Self {
        self.connections = connections;
        self.singlets = singlets;
        self
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Positions that carry a flavour index, singlet lines excluded.
    pub fn n_flavidx(&self) -> usize {
        self.n_flavidx
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// The `i`th position, read from the current offset.
    pub fn gon(&self, i: usize) -> &GonRep {
        &self.array[(i + self.offset) % self.array.len()]
    }

    pub fn connection(&self, con: ConRef) -> Option<&CompoundRep> {
        match con {
            ConRef::Empty => None,
            ConRef::Polygon(p) => self.connections.get(p).and_then(Option::as_ref),
            ConRef::Singlet(s) => self.singlets.get(s),
        }
    }

    /// Compares the segments of length `seg_len` starting at `idx_1` and
    /// `idx_2`. With `anti_double_count`, nested representations at the FSP
    /// level are equal only if they are the same one.
    pub(crate) fn compare_self(
        &self,
        idx_1: usize,
        idx_2: usize,
        seg_len: usize,
        levels: Levels,
        anti_double_count: bool,
    ) -> Ordering {
        for i in 0..seg_len {
            let (g1, g2) = (self.gon(i + idx_1), self.gon(i + idx_2));
            let comp = g1.lines.len().cmp(&g2.lines.len()).then_with(|| {
                g1.lines
                    .iter()
                    .zip(&g2.lines)
                    .map(|(l1, l2)| {
                        let fsp = || {
                            if anti_double_count {
                                l1.con.cmp(&l2.con)
                            } else {
                                compare_comprep(self.connection(l1.con), self.connection(l2.con))
                            }
                        };
                        compare_line(l1, l2, levels, fsp)
                    })
                    .find(|c| c.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
            if comp.is_ne() {
                return comp;
            }
        }
        Ordering::Equal
    }

    /// Booth's least rotation, stepping in units of the current period.
    fn booth(&self, levels: Levels) -> usize {
        let length = self.array.len();
        if self.period == length {
            return self.offset;
        }
        let step = if self.period == 0 { 1 } else { self.period };
        let next = |f: Option<usize>| f.map_or(0, |v| v + 1);

        let mut failure: Vec<Option<usize>> = vec![None; 2 * length / step];
        let mut noffs = 0;
        let mut idx = step;
        while idx < 2 * length {
            let mut fval = failure[(idx - noffs) / step - 1];
            let mut comp = self.compare_self(idx, next(fval) * step + noffs, step, levels, false);
            while let (Some(f), true) = (fval, comp.is_ne()) {
                if comp.is_lt() {
                    noffs = idx - (f + 1) * step;
                }
                fval = failure[f];
                comp = self.compare_self(idx, next(fval) * step + noffs, step, levels, false);
            }
            if fval.is_none() && comp.is_ne() {
                if comp.is_lt() {
                    noffs = idx;
                }
                failure[(idx - noffs) / step] = None;
            } else {
                failure[(idx - noffs) / step] = Some(next(fval));
            }
            idx += step;
        }
        (self.offset + noffs) % length
    }

    /// The least rotation that maps the representation onto itself, among
    /// multiples of the current period.
    fn find_period(&self, levels: Levels) -> usize {
        let length = self.array.len();
        let step = if self.period == 0 { 1 } else { self.period };
        (step..=length / 2)
            .step_by(step)
            .filter(|period| length % period == 0)
            .find(|&period| self.compare_self(0, period, length, levels, true).is_eq())
            .unwrap_or(length)
    }

    /// Refines offset and period by one level. Every coarser level must
    /// already have been applied.
    pub fn normalise(&mut self, levels: Levels) {
        self.offset = self.booth(levels);
        self.period = self.find_period(levels);
    }

    /// Normalises on every level, coarsest first.
    pub fn normalise_all(&mut self) -> Result<(), RepresentationError> {
        self.normalise(Levels::TOP);
        self.normalise(Levels::ORD);
        self.normalise(Levels::FSP);
        if self.period == 0 {
            return Err(RepresentationError::ZeroPeriod);
        }
        Ok(())
    }
}

fn compare_line(
    l1: &LineRep,
    l2: &LineRep,
    levels: Levels,
    fsp: impl FnOnce() -> Ordering,
) -> Ordering {
    let mut comp = Ordering::Equal;
    if levels.contains(Levels::TOP) {
        comp = l1.len.cmp(&l2.len);
    }
    if comp.is_eq() && levels.contains(Levels::ORD) {
        comp = l1.ord.cmp(&l2.ord);
    }
    if comp.is_eq() && levels.contains(Levels::FSP) {
        comp = fsp();
    }
    comp
}

/// One part of a [`CompoundRep`].
#[derive(Debug, Clone)]
pub enum PartRep {
    Local(CycRep),
    /// The part that requested this representation, left opaque.
    BackToMaster,
}

impl PartRep {
    pub fn as_local(&self) -> Option<&CycRep> {
        match self {
            PartRep::Local(rep) => Some(rep),
            PartRep::BackToMaster => None,
        }
    }

    pub fn n_flavidx(&self) -> usize {
        self.as_local().map_or(0, CycRep::n_flavidx)
    }
}

/// Compares two parts on the given levels. Opaque parts and parts without
/// flavour indices sort last.
pub fn compare_cycrep(rep_1: &PartRep, rep_2: &PartRep, levels: Levels) -> Ordering {
    let (r1, r2) = match (rep_1, rep_2) {
        (PartRep::BackToMaster, PartRep::BackToMaster) => return Ordering::Equal,
        (PartRep::BackToMaster, _) => return Ordering::Greater,
        (_, PartRep::BackToMaster) => return Ordering::Less,
        (PartRep::Local(r1), PartRep::Local(r2)) => (r1, r2),
    };

    match (r1.n_flavidx, r2.n_flavidx) {
        (0, 0) => return Ordering::Equal,
        (0, _) => return Ordering::Greater,
        (_, 0) => return Ordering::Less,
        _ => {}
    }

    let comp = r1
        .n_flavidx
        .cmp(&r2.n_flavidx)
        .then(r1.len().cmp(&r2.len()));
    if comp.is_ne() {
        return comp;
    }

    for i in 0..r1.len() {
        let (g1, g2) = (r1.gon(i), r2.gon(i));
        let comp = g1.lines.len().cmp(&g2.lines.len());
        if comp.is_ne() {
            return comp;
        }
        for (l1, l2) in g1.lines.iter().zip(&g2.lines) {
            let comp = compare_line(l1, l2, levels, || {
                compare_comprep(r1.connection(l1.con), r2.connection(l2.con))
            });
            if comp.is_ne() {
                return comp;
            }
        }
    }
    Ordering::Equal
}

/// Several interlinked parts, sorted, with the ranks of their equality classes.
#[derive(Debug, Clone)]
pub struct CompoundRep {
    parts: Vec<PartRep>,
    eq_reps: Vec<usize>,
}

impl CompoundRep {
    /// Sorts normalised parts and ranks them.
    pub fn new(mut parts: Vec<PartRep>) -> Self {
        parts.sort_by(|a, b| compare_cycrep(a, b, Levels::ALL));
        let mut eq_reps = Vec::with_capacity(parts.len());
        let mut rank = 0;
        for (i, part) in parts.iter().enumerate() {
            if i > 0 && compare_cycrep(&parts[i - 1], part, Levels::ALL).is_ne() {
                rank += 1;
            }
            eq_reps.push(rank);
        }
        CompoundRep { parts, eq_reps }
    }

    pub fn parts(&self) -> &[PartRep] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Equal ranks mark equal parts.
    pub fn eq_reps(&self) -> &[usize] {
        &self.eq_reps
    }

    /// The symmetry factor: the rotational symmetry of every part that is not
    /// broken by singlets, times `k!` for every run of `k` identical parts.
    pub fn symmetry(&self) -> Result<usize, RepresentationError> {
        let overflow = || RepresentationError::SymmetryOverflow;
        let mut sym: usize = 1;
        let mut eq_fact: usize = 1;
        let mut eq_idx = 0;
        for (i, part) in self.parts.iter().enumerate() {
            if let PartRep::Local(rep) = part {
                if rep.len() == rep.n_flavidx && rep.period > 0 {
                    sym = sym.checked_mul(rep.len() / rep.period).ok_or_else(overflow)?;
                }
            }
            if self.eq_reps[eq_idx] == self.eq_reps[i] {
                eq_fact = eq_fact.checked_mul(1 + i - eq_idx).ok_or_else(overflow)?;
            } else {
                sym = sym.checked_mul(eq_fact).ok_or_else(overflow)?;
                eq_idx = i;
                eq_fact = 1;
            }
        }
        sym.checked_mul(eq_fact).ok_or_else(overflow)
    }
}

/// Compares part counts, then equality patterns, then every part on each level
/// in turn. An absent representation sorts last.
pub fn compare_comprep(crep_1: Option<&CompoundRep>, crep_2: Option<&CompoundRep>) -> Ordering {
    let (c1, c2) = match (crep_1, crep_2) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(c1), Some(c2)) => (c1, c2),
    };

    let comp = c1
        .parts
        .len()
        .cmp(&c2.parts.len())
        .then_with(|| c1.eq_reps.cmp(&c2.eq_reps));
    if comp.is_ne() {
        return comp;
    }

    [Levels::TOP, Levels::ORD, Levels::FSP]
        .into_iter()
        .flat_map(|level| {
            c1.parts
                .iter()
                .zip(&c2.parts)
                .map(move |(p1, p2)| compare_cycrep(p1, p2, level))
        })
        .find(|c| c.is_ne())
        .unwrap_or(Ordering::Equal)
}

impl fmt::Display for CycRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len() {
            writeln!(f, "gon {i}:")?;
            for (j, line) in self.gon(i).lines.iter().enumerate() {
                let mut out = indented(f).with_str("  ");
                let con = self.connection(line.con);
                if line.len == 0 {
                    writeln!(out, "line {j}: singlet-connected to:")?;
                } else if con.is_some() {
                    writeln!(
                        out,
                        "line {j}: {} gons down, order {}, connected to:",
                        line.len, line.ord
                    )?;
                } else {
                    writeln!(
                        out,
                        "line {j}: {} gons down, order {}, no connection.",
                        line.len, line.ord
                    )?;
                }
                if let Some(con) = con {
                    write!(indented(&mut out).with_str("  "), "{con}")?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for CompoundRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            writeln!(f, "part {i}:")?;
            match part {
                PartRep::Local(rep) => write!(indented(f).with_str("  "), "{rep}")?,
                PartRep::BackToMaster => writeln!(indented(f).with_str("  "), "[master]")?,
            }
        }
        Ok(())
    }
}

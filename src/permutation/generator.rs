//! Stateful enumerators of the permutation groups acting on flavour traces.
//!
//! Every generator starts at the identity and steps through each group element
//! exactly once. After `|G|` calls to [`Generator::advance`] it reports
//! [`Generator::is_done`] and is back at the identity, so it can be reused for
//! another pass without being rebuilt.

use itertools::Itertools;

use super::Permutation;

pub trait Generator {
    /// The current group element.
    fn current(&self) -> &Permutation;

    /// Whether the last [`Generator::advance`] completed a pass.
    fn is_done(&self) -> bool;

    /// Steps to the next element. Advancing a finished generator starts a new pass.
    fn advance(&mut self);

    /// `|G|`, or `None` if it does not fit in a `usize`.
    fn group_order(&self) -> Option<usize>;

    /// Iterates over the remainder of the current pass, starting with the
    /// current element.
    fn elements(&mut self) -> Elements<'_, Self>
    where
        Self: Sized,
    {
        Elements {
            generator: self,
            started: false,
        }
    }
}

pub struct Elements<'a, G: Generator> {
    generator: &'a mut G,
    started: bool,
}

impl<G: Generator> Iterator for Elements<'_, G> {
    type Item = Permutation;

    fn next(&mut self) -> Option<Permutation> {
        if self.started {
            self.generator.advance();
            if self.generator.is_done() {
                return None;
            }
        } else {
            self.started = true;
        }
        Some(self.generator.current().clone())
    }
}

/// The cyclic group `Z_n`, generated by rotating one step at a time.
#[derive(Debug, Clone)]
pub struct ZnGenerator {
    perm: Permutation,
    count: usize,
    done: bool,
}

impl ZnGenerator {
    pub fn new(n: usize) -> Self {
        ZnGenerator {
            perm: Permutation::id(n),
            count: 0,
            done: false,
        }
    }

    pub fn size(&self) -> usize {
        self.perm.len()
    }
}

impl Generator for ZnGenerator {
    fn current(&self) -> &Permutation {
        &self.perm
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn advance(&mut self) {
        self.done = false;
        let n = self.perm.len();
        for i in 1..n {
            self.perm.swap(i - 1, i);
        }
        self.count += 1;
        if self.count >= n.max(1) {
            self.count = 0;
            self.done = true;
        }
    }

    fn group_order(&self) -> Option<usize> {
        Some(self.perm.len().max(1))
    }
}

/// The symmetric group `S_n`, enumerated with Heap's algorithm.
///
/// Consecutive elements differ by a single transposition. The counter stack
/// replaces the recursion of the textbook formulation.
#[derive(Debug, Clone)]
pub struct SnGenerator {
    perm: Permutation,
    counters: Vec<usize>,
    done: bool,
}

impl SnGenerator {
    pub fn new(n: usize) -> Self {
        SnGenerator {
            perm: Permutation::id(n),
            counters: vec![0; n],
            done: false,
        }
    }

    pub fn size(&self) -> usize {
        self.perm.len()
    }
}

impl Generator for SnGenerator {
    fn current(&self) -> &Permutation {
        &self.perm
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn advance(&mut self) {
        self.done = false;
        let mut idx = 0;
        while idx < self.counters.len() {
            if self.counters[idx] < idx {
                if idx % 2 == 1 {
                    self.perm.swap(self.counters[idx], idx);
                } else {
                    self.perm.swap(0, idx);
                }
                self.counters[idx] += 1;
                return;
            }
            self.counters[idx] = 0;
            idx += 1;
        }
        // Heap's algorithm does not end where it started.
        self.perm = Permutation::id(self.perm.len());
        self.done = true;
    }

    fn group_order(&self) -> Option<usize> {
        (1..=self.perm.len()).try_fold(1usize, |acc, k| acc.checked_mul(k))
    }
}

/// The symmetry group of a tuple of flavour traces with sizes `R`: independent
/// rotations within every trace, combined with arbitrary permutations of traces
/// of equal size.
///
/// Traces are laid out contiguously in the order of `R`, which must be sorted
/// so that equal sizes are adjacent.
///
/// # Examples
///
/// ```
/// use fodge::permutation::generator::{Generator, ZrGenerator};
///
/// let mut zr = ZrGenerator::new(&[2, 2]);
/// assert_eq!(zr.elements().count(), 8);
/// assert!(zr.current().is_identity());
/// ```
#[derive(Debug, Clone)]
pub struct ZrGenerator {
    perm: Permutation,
    /// One rotation per trace of size > 1, with the trace's first element.
    cyclings: Vec<(usize, ZnGenerator)>,
    /// One permutation of blocks per run of equal sizes: first element and block size.
    swaps: Vec<(usize, usize, SnGenerator)>,
    done: bool,
}

impl ZrGenerator {
    pub fn new(sizes: &[usize]) -> Self {
        debug_assert!(sizes.windows(2).all(|w| w[0] <= w[1]), "unsorted {sizes:?}");

        let mut cyclings = Vec::new();
        let mut swaps = Vec::new();
        let mut start = 0;
        for (count, &size) in sizes.iter().dedup_with_count() {
            if size > 1 {
                for k in 0..count {
                    cyclings.push((start + k * size, ZnGenerator::new(size)));
                }
            }
            if count > 1 {
                swaps.push((start, size, SnGenerator::new(count)));
            }
            start += count * size;
        }

        ZrGenerator {
            perm: Permutation::id(start),
            cyclings,
            swaps,
            done: false,
        }
    }
}

impl Generator for ZrGenerator {
    fn current(&self) -> &Permutation {
        &self.perm
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn advance(&mut self) {
        self.done = false;
        for (offset, generator) in self.cyclings.iter_mut() {
            self.perm
                .act_on_window(&generator.current().inverse(), *offset, 1);
            generator.advance();
            if !generator.is_done() {
                self.perm.act_on_window(generator.current(), *offset, 1);
                return;
            }
        }
        for (offset, block_len, generator) in self.swaps.iter_mut() {
            self.perm
                .act_on_window(&generator.current().inverse(), *offset, *block_len);
            generator.advance();
            if !generator.is_done() {
                self.perm
                    .act_on_window(generator.current(), *offset, *block_len);
                return;
            }
        }
        self.done = true;
    }

    fn group_order(&self) -> Option<usize> {
        self.cyclings
            .iter()
            .map(|(_, g)| g.group_order())
            .chain(self.swaps.iter().map(|(_, _, g)| g.group_order()))
            .try_fold(1usize, |acc, k| acc.checked_mul(k?))
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashSet;

    use super::*;

    fn visit<G: Generator>(generator: &mut G) -> Vec<Permutation> {
        let mut seen = vec![];
        while !generator.is_done() {
            seen.push(generator.current().clone());
            generator.advance();
        }
        seen
    }

    #[test]
    fn zn_visits_every_rotation() {
        let mut zn = ZnGenerator::new(5);
        let seen = visit(&mut zn);
        assert_eq!(seen.len(), 5);
        for (k, p) in seen.iter().enumerate() {
            assert_eq!(*p, Permutation::cyclic(5, k));
        }
        assert!(zn.current().is_identity());

        // a second pass is identical
        zn.advance();
        assert!(!zn.is_done());
        assert_eq!(*zn.current(), Permutation::cyclic(5, 1));
    }

    #[test]
    fn sn_visits_every_permutation_once() {
        for n in 1..=5 {
            let mut sn = SnGenerator::new(n);
            let seen = visit(&mut sn);
            let distinct: AHashSet<_> = seen.iter().cloned().collect();
            assert_eq!(seen.len(), sn.group_order().unwrap());
            assert_eq!(distinct.len(), seen.len());
            assert!(sn.current().is_identity());

            for w in seen.windows(2) {
                let step = &w[0].inverse() * &w[1];
                assert_eq!(step.fixed_points() + 2, n, "{} -> {}", w[0], w[1]);
            }
        }
    }

    #[test]
    fn zr_group_orders() {
        for (sizes, expected) in [
            (vec![2, 2], 8),
            (vec![2, 3, 3], 36),
            (vec![4], 4),
            (vec![1, 1, 2], 4),
            (vec![2, 2, 2], 48),
        ] {
            let mut zr = ZrGenerator::new(&sizes);
            assert_eq!(zr.group_order(), Some(expected));
            let seen: Vec<_> = zr.elements().collect();
            let distinct: AHashSet<_> = seen.iter().cloned().collect();
            assert_eq!(seen.len(), expected, "{sizes:?}");
            assert_eq!(distinct.len(), expected, "{sizes:?}");
            assert!(zr.is_done());
            assert!(zr.current().is_identity());

            // reusable without rebuilding
            assert_eq!(zr.elements().count(), expected);
        }
    }

    #[test]
    fn zr_preserves_trace_blocks() {
        // every element maps each trace of size 3 onto a trace of size 3, cyclically
        let mut zr = ZrGenerator::new(&[2, 3, 3]);
        for p in zr.elements() {
            assert!(p.map()[..2].iter().all(|&i| i < 2));
            for trace in [2..5, 5..8] {
                let vals: Vec<usize> = p.map()[trace].iter().map(|&v| v - 2).collect();
                let block = vals[0] / 3;
                for k in 0..3 {
                    assert_eq!(vals[k] / 3, block, "{p}");
                    let next = vals[(k + 1) % 3] % 3;
                    assert_eq!((next + 3 - vals[k] % 3) % 3, 1, "{p}");
                }
            }
        }
    }
}

//! # Permutations
//!
//! This module provides the `Permutation` value used throughout the crate to
//! relabel flavour indices, together with the group [`generator`]s that
//! enumerate the symmetry groups of flavour traces.
//!
//! ## Key Features:
//!
//! - **Representation**: A `Permutation` stores its direct mapping (`map[i]` is
//!   the image of `i`) and its inverse mapping.
//! - **Construction**:
//!   - Identity permutation: `Permutation::id(n)`.
//!   - Cyclic shift: `Permutation::cyclic(n, k)`.
//!   - From a mapping vector: `Permutation::from_map(vec![...])`, validated with
//!     `Permutation::try_from_map`.
//!   - From disjoint cycles: `Permutation::from_disjoint_cycles(&[vec![...]])`.
//! - **Algebra**:
//!   - Composition `&p1 * &p2` (applies `p2` then `p1` when acting on slices).
//!   - Inverse, reverse and power (`p.pow(k)`).
//!   - Canonical coset representative `&p1 % &p2`, the least of `p1 * p2^m`.
//! - **Cycle Utilities**: cycle decomposition, cycle type, order, parity, sign
//!   and fixed points.
//! - **Actions**:
//!   - `p.permute_slice(data, offset, block_len)` gathers blocks in place.
//!   - `p.permute_bits(bits, offset, block_len)` scatters bit blocks.

pub mod generator;

use std::{
    cmp::Ordering,
    fmt,
    ops::{Index, Mul, Rem},
};

use thiserror::Error;

/// A permutation of `0..n`, with the ability to act on slices and on the bits of
/// an integer.
///
/// # Examples
///
/// ```
/// use fodge::permutation::Permutation;
///
/// // Create a permutation that maps 0->2, 1->0, 2->1, 3->3
/// let p = Permutation::from_map(vec![2, 0, 1, 3]);
///
/// // Gather the slice through the map
/// let mut data = vec![10, 20, 30, 40];
/// p.permute_slice(&mut data, 0, 1).unwrap();
/// assert_eq!(data, vec![30, 10, 20, 40]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "bincode", derive(bincode::Encode, bincode::Decode))]
pub struct Permutation {
    map: Vec<usize>,
    inv: Vec<usize>,
}

/// Permutations are ordered lexicographically by their `map`.
impl PartialOrd for Permutation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Permutation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.map.cmp(&other.map)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermutationError {
    #[error("Not a permutation: {0:?}")]
    NotAPermutation(Vec<usize>),

    #[error("Index {index} out of range for size {size}")]
    OutOfRange { index: usize, size: usize },

    #[error("Size mismatch: {left} and {right}")]
    SizeMismatch { left: usize, right: usize },

    #[error("Bit window of {bits} bits does not fit in 64")]
    BitWindow { bits: usize },

    #[error("Cycles are not disjoint")]
    OverlappingCycles,
}

impl Permutation {
    // --------------------------------------------------------------------------------------------
    // Basic Constructors and Accessors
    // --------------------------------------------------------------------------------------------

    /// Creates the identity permutation of length `n`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::id(4);
    /// assert!(p.is_identity());
    /// assert_eq!(p.len(), 4);
    /// ```
    pub fn id(n: usize) -> Self {
        Permutation {
            map: (0..n).collect(),
            inv: (0..n).collect(),
        }
    }

    /// The cyclic shift `i -> (i + k) % n`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::cyclic(4, 1);
    /// assert_eq!(p.map(), &[1, 2, 3, 0]);
    /// ```
    pub fn cyclic(n: usize, k: usize) -> Self {
        if n == 0 {
            return Self::id(0);
        }
        Self::from_map((0..n).map(|i| (i + k) % n).collect())
    }

    /// Creates a permutation from a mapping vector without validation.
    /// The `map` vector states where index `i` is sent: `map[i]` is the image of `i`.
    ///
    /// Use [`Permutation::try_from_map`] for values that are not known to be
    /// permutations.
    pub fn from_map(map: Vec<usize>) -> Self {
        let mut inv = vec![0; map.len()];
        for (i, &j) in map.iter().enumerate() {
            inv[j] = i;
        }
        Permutation { map, inv }
    }

    /// Creates a permutation from a mapping vector, checking that every value
    /// of `0..map.len()` occurs exactly once.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// assert!(Permutation::try_from_map(vec![1, 0, 2]).is_ok());
    /// assert!(Permutation::try_from_map(vec![1, 1, 2]).is_err());
    /// ```
    pub fn try_from_map(map: Vec<usize>) -> Result<Self, PermutationError> {
        if !Self::is_permutation(&map) {
            return Err(PermutationError::NotAPermutation(map));
        }
        Ok(Self::from_map(map))
    }

    /// Whether `values` contains each of `0..values.len()` exactly once.
    pub fn is_permutation(values: &[usize]) -> bool {
        let mut seen = vec![false; values.len()];
        for &v in values {
            match seen.get_mut(v) {
                Some(s) if !*s => *s = true,
                _ => return false,
            }
        }
        true
    }

    /// Returns the internal mapping as a slice.
    pub fn map(&self) -> &[usize] {
        &self.map
    }

    /// Returns the internal inverse mapping as a slice.
    pub fn inv(&self) -> &[usize] {
        &self.inv
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The image of `i`, failing outside `0..len()`.
    pub fn image(&self, i: usize) -> Result<usize, PermutationError> {
        self.map
            .get(i)
            .copied()
            .ok_or(PermutationError::OutOfRange {
                index: i,
                size: self.len(),
            })
    }

    // --------------------------------------------------------------------------------------------
    // Basic Operations
    // --------------------------------------------------------------------------------------------

    /// Returns the inverse of the permutation.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::from_map(vec![2, 0, 1]);
    /// assert_eq!(p.inverse().map(), &[1, 2, 0]);
    /// ```
    pub fn inverse(&self) -> Self {
        Permutation {
            map: self.inv.clone(),
            inv: self.map.clone(),
        }
    }

    /// The permutation whose map is `self.map` read backwards.
    pub fn reverse(&self) -> Self {
        Self::from_map(self.map.iter().rev().copied().collect())
    }

    /// Composes `self` with another permutation `other`, returning a new permutation:
    /// `(self ◦ other)(i) = self.map[other.map[i]]`.
    pub fn compose(&self, other: &Self) -> Self {
        let map = other.map.iter().map(|&i| self.map[i]).collect();
        Self::from_map(map)
    }

    /// Checked version of `&self * rhs`.
    pub fn try_mul(&self, rhs: &Self) -> Result<Self, PermutationError> {
        if self.len() != rhs.len() {
            return Err(PermutationError::SizeMismatch {
                left: self.len(),
                right: rhs.len(),
            });
        }
        Ok(rhs.compose(self))
    }

    /// Gathers blocks of `slice` in place, starting at element `offset`: block `i`
    /// (of `block_len` elements) receives the previous content of block `map[i]`.
    /// Elements outside the window are untouched. Only swaps are used, so no
    /// `Clone` bound is needed.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::from_map(vec![1, 0]);
    /// let mut data = vec!['x', 'a', 'b', 'c', 'd'];
    /// p.permute_slice(&mut data, 1, 2).unwrap();
    /// assert_eq!(data, vec!['x', 'c', 'd', 'a', 'b']);
    /// ```
    pub fn permute_slice<T>(
        &self,
        slice: &mut [T],
        offset: usize,
        block_len: usize,
    ) -> Result<(), PermutationError> {
        let end = offset + self.len() * block_len;
        if end > slice.len() {
            return Err(PermutationError::OutOfRange {
                index: end,
                size: slice.len(),
            });
        }
        self.permute_window(slice, offset, block_len);
        Ok(())
    }

    /// Unchecked body of [`Permutation::permute_slice`].
    pub(crate) fn permute_window<T>(&self, slice: &mut [T], offset: usize, block_len: usize) {
        for i in 0..self.len() {
            // Follow the map until we reach a block that has not been placed yet.
            let mut j = self.map[i];
            while j < i {
                j = self.map[j];
            }
            if j != i {
                for t in 0..block_len {
                    slice.swap(offset + i * block_len + t, offset + j * block_len + t);
                }
            }
        }
    }

    /// Applies `sub` to a window of this permutation's own map, keeping the
    /// inverse in sync.
    pub(crate) fn act_on_window(&mut self, sub: &Permutation, offset: usize, block_len: usize) {
        sub.permute_window(&mut self.map, offset, block_len);
        for (i, &j) in self.map.iter().enumerate() {
            self.inv[j] = i;
        }
    }

    /// Swaps the images of `i` and `j`.
    pub(crate) fn swap(&mut self, i: usize, j: usize) {
        self.map.swap(i, j);
        self.inv[self.map[i]] = i;
        self.inv[self.map[j]] = j;
    }

    /// Scatters blocks of bits: after skipping the `offset * block_len` lowest
    /// bits, the bit block `i` moves to block `map[i]`. Bits outside the window
    /// are kept where they are.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::cyclic(4, 1);
    /// assert_eq!(p.permute_bits(0b0001, 0, 1).unwrap(), 0b0010);
    /// assert_eq!(p.permute_bits(0b1000, 0, 1).unwrap(), 0b0001);
    /// ```
    pub fn permute_bits(
        &self,
        bits: u64,
        offset: usize,
        block_len: usize,
    ) -> Result<u64, PermutationError> {
        let low = offset * block_len;
        let width = self.len() * block_len;
        if low + width > u64::BITS as usize {
            return Err(PermutationError::BitWindow { bits: low + width });
        }
        let block_mask = low_mask(block_len);
        let window_mask = low_mask(width) << low;

        let mut result = bits & !window_mask;
        for (i, &target) in self.map.iter().enumerate() {
            let block = (bits >> (low + i * block_len)) & block_mask;
            result |= block << (low + target * block_len);
        }
        Ok(result)
    }

    // --------------------------------------------------------------------------------------------
    // Cycles
    // --------------------------------------------------------------------------------------------

    /// Returns the cycle decomposition of `self` as a `Vec` of cycles,
    /// each cycle represented as a `Vec<usize>`.
    /// Each cycle lists the indices of a single cycle, e.g. `[0, 2, 1]` means `0->2, 2->1, 1->0`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::from_map(vec![2, 0, 1, 3]);
    /// assert_eq!(p.find_cycles(), vec![vec![0, 2, 1], vec![3]]);
    /// ```
    pub fn find_cycles(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.map.len()];
        let mut cycles = Vec::new();
        for i in 0..self.map.len() {
            if visited[i] {
                continue;
            }
            let mut cycle = Vec::new();
            let mut j = i;
            while !visited[j] {
                visited[j] = true;
                cycle.push(j);
                j = self.map[j];
            }
            cycles.push(cycle);
        }
        cycles
    }

    /// The lengths of all cycles, ascending. Sums to `len()`.
    pub fn cycle_type(&self) -> Vec<usize> {
        let mut lengths: Vec<usize> = self.find_cycles().iter().map(Vec::len).collect();
        lengths.sort_unstable();
        lengths
    }

    /// The least common multiple of the cycle lengths, i.e. the smallest `k > 0`
    /// with `p^k == id`.
    pub fn order(&self) -> usize {
        self.cycle_type().into_iter().fold(1, lcm)
    }

    /// The number of even-length cycles, mod 2.
    pub fn parity(&self) -> usize {
        self.cycle_type().iter().filter(|&&l| l % 2 == 0).count() % 2
    }

    /// Returns the sign (+1 or -1) of the permutation.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// assert_eq!(Permutation::from_map(vec![1, 0, 3, 2]).sign(), 1);
    /// assert_eq!(Permutation::from_map(vec![2, 1, 0]).sign(), -1);
    /// ```
    pub fn sign(&self) -> i8 {
        if self.parity() == 0 {
            1
        } else {
            -1
        }
    }

    /// The number of indices mapped to themselves.
    pub fn fixed_points(&self) -> usize {
        self.map.iter().enumerate().filter(|(i, &m)| *i == m).count()
    }

    /// Checks if this permutation is the identity permutation.
    pub fn is_identity(&self) -> bool {
        self.map.iter().enumerate().all(|(i, &m)| i == m)
    }

    /// Computes the k-th power of the permutation by binary exponentiation.
    /// Exponents larger than the size are first reduced modulo [`Permutation::order`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::from_map(vec![1, 2, 0]);
    /// assert_eq!(p.pow(2).map(), &[2, 0, 1]);
    /// assert!(p.pow(300).is_identity());
    /// ```
    pub fn pow(&self, k: usize) -> Self {
        let mut exp = if k > self.len() { k % self.order() } else { k };
        let mut result = Permutation::id(self.map.len());
        if exp == 0 {
            return result;
        }
        let mut base = self.clone();

        while exp > 0 {
            if exp % 2 == 1 {
                result = result.compose(&base);
            }
            base = base.compose(&base);
            exp /= 2;
        }
        result
    }

    /// The lexicographically least permutation among `self * cycl^m` for all `m`.
    pub fn coset_min(&self, cycl: &Self) -> Result<Self, PermutationError> {
        let mut best = self.clone();
        let mut current = self.try_mul(cycl)?;
        while current != *self {
            if current < best {
                best = current.clone();
            }
            current = current.try_mul(cycl)?;
        }
        Ok(best)
    }

    /// Creates a permutation from a set of disjoint cycles.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fodge::permutation::Permutation;
    /// let p = Permutation::from_disjoint_cycles(&[vec![0, 1, 2], vec![3, 4]]).unwrap();
    /// assert_eq!(p.map(), &[1, 2, 0, 4, 3]);
    /// assert!(Permutation::from_disjoint_cycles(&[vec![0, 1], vec![1, 2]]).is_err());
    /// ```
    pub fn from_disjoint_cycles(cycles: &[Vec<usize>]) -> Result<Self, PermutationError> {
        let n = cycles
            .iter()
            .flatten()
            .max()
            .map(|&max| max + 1)
            .unwrap_or(0);

        let mut seen = vec![false; n];
        let mut map: Vec<usize> = (0..n).collect();
        for cycle in cycles {
            for (k, &i) in cycle.iter().enumerate() {
                if seen[i] {
                    return Err(PermutationError::OverlappingCycles);
                }
                seen[i] = true;
                map[i] = cycle[(k + 1) % cycle.len()];
            }
        }
        Ok(Self::from_map(map))
    }
}

fn low_mask(bits: usize) -> u64 {
    if bits >= u64::BITS as usize {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First show cycle notation
        let mut first = true;
        for cycle in self.find_cycles().into_iter().filter(|c| c.len() > 1) {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "(")?;
            for (i, &x) in cycle.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{x}")?;
            }
            write!(f, ")")?;
            first = false;
        }
        if first {
            write!(f, "()")?;
        }

        // Then show one-line notation
        write!(f, " [")?;
        for (i, &x) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{x}")?;
        }
        write!(f, "]")
    }
}

impl Index<usize> for Permutation {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.map[index]
    }
}

/// `&p1 * &p2` applies `p2` first and `p1` second when acting on slices:
/// its map is `i -> p2.map[p1.map[i]]`.
///
/// # Panics
///
/// Panics if the sizes differ; use [`Permutation::try_mul`] to check.
impl Mul for &Permutation {
    type Output = Permutation;

    fn mul(self, rhs: &Permutation) -> Permutation {
        assert_eq!(self.len(), rhs.len(), "composing permutations of different sizes");
        rhs.compose(self)
    }
}

/// `&p1 % &p2` is the canonical representative of `p1` modulo the cyclic group
/// generated by `p2`.
///
/// # Panics
///
/// Panics if the sizes differ; use [`Permutation::coset_min`] to check.
impl Rem for &Permutation {
    type Output = Permutation;

    fn rem(self, rhs: &Permutation) -> Permutation {
        match self.coset_min(rhs) {
            Ok(rep) => rep,
            Err(e) => panic!("reducing permutations of different sizes: {e}"),
        }
    }
}

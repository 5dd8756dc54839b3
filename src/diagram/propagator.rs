use std::{cmp::Ordering, fmt};

use crate::permutation::{Permutation, PermutationError};

use super::momenta::Momenta;

/// An internal edge, reduced to what distinguishes it kinematically.
///
/// Momentum conservation makes a mask and its complement describe the same
/// edge read in opposite directions. The stored masks are always the "smaller
/// half": a mask is complemented if more than half of the `n_mom` bits are set,
/// or exactly half including the highest one. Complementing the main mask also
/// swaps the two endpoints.
///
/// The `*_prev` masks are only set on singlet edges, where they hold the
/// momenta of the legs adjacent to the edge on either side.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Propagator {
    momenta: Momenta,
    n_mom: usize,
    src_order: usize,
    src_prev: Momenta,
    dst_order: usize,
    dst_prev: Momenta,
}

impl Propagator {
    pub fn new(momenta: Momenta, n_mom: usize, src_order: usize, dst_order: usize) -> Self {
        Self::singlet(
            momenta,
            n_mom,
            src_order,
            Momenta::EMPTY,
            dst_order,
            Momenta::EMPTY,
        )
    }

    pub fn singlet(
        momenta: Momenta,
        n_mom: usize,
        src_order: usize,
        src_prev: Momenta,
        dst_order: usize,
        dst_prev: Momenta,
    ) -> Self {
        let mut prop = Propagator {
            momenta,
            n_mom,
            src_order,
            src_prev,
            dst_order,
            dst_prev,
        };
        prop.normalise();
        prop
    }

    /// The same edge after moving every momentum bit `i` to `cycl[i]`.
    pub fn relabelled(&self, cycl: &Permutation) -> Result<Self, PermutationError> {
        if cycl.len() != self.n_mom {
            return Err(PermutationError::SizeMismatch {
                left: self.n_mom,
                right: cycl.len(),
            });
        }
        let permute = |m: Momenta| cycl.permute_bits(m.0, 0, 1).map(Momenta);
        Ok(Self::singlet(
            permute(self.momenta)?,
            self.n_mom,
            self.src_order,
            permute(self.src_prev)?,
            self.dst_order,
            permute(self.dst_prev)?,
        ))
    }

    fn normalise(&mut self) {
        if self.n_mom == 0 {
            return;
        }
        self.src_prev = self.normalise_mask(self.src_prev);
        self.dst_prev = self.normalise_mask(self.dst_prev);
        let norm = self.normalise_mask(self.momenta);
        if norm != self.momenta {
            std::mem::swap(&mut self.src_order, &mut self.dst_order);
            std::mem::swap(&mut self.src_prev, &mut self.dst_prev);
            self.momenta = norm;
        }
    }

    fn normalise_mask(&self, m: Momenta) -> Momenta {
        let half = self.n_mom / 2;
        let count = m.count();
        if count > half || (count == half && m.contains(self.n_mom - 1)) {
            m.complement(self.n_mom)
        } else {
            m
        }
    }

    pub fn momenta(&self) -> Momenta {
        self.momenta
    }

    pub fn n_mom(&self) -> usize {
        self.n_mom
    }

    pub fn src_order(&self) -> usize {
        self.src_order
    }

    pub fn dst_order(&self) -> usize {
        self.dst_order
    }

    pub fn src_prev(&self) -> Momenta {
        self.src_prev
    }

    pub fn dst_prev(&self) -> Momenta {
        self.dst_prev
    }

    pub fn is_singlet(&self) -> bool {
        !self.src_prev.is_empty() || !self.dst_prev.is_empty()
    }

    /// Column header aligned with the `Display` output. The order columns are
    /// as wide as the larger order, so an order of 0 takes one column like
    /// the printed `0`.
    pub fn header(&self) -> String {
        let digits: String = (0..self.n_mom)
            .map(|i| char::from(b'0' + (i % 10) as u8))
            .collect();
        let width = self.src_order.max(self.dst_order).to_string().len();
        let pad = " ".repeat(width);
        let prev = if self.is_singlet() {
            format!(" {digits} ")
        } else {
            String::new()
        };
        format!("{digits}  {pad}{prev}    {pad}{prev} ")
    }
}

impl PartialEq for Propagator {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Propagator {}

impl PartialOrd for Propagator {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Endpoint orders first, then adjacent-leg masks, then the momenta.
impl Ord for Propagator {
    fn cmp(&self, other: &Self) -> Ordering {
        self.src_order
            .cmp(&other.src_order)
            .then(self.dst_order.cmp(&other.dst_order))
            .then(self.src_prev.cmp(&other.src_prev))
            .then(self.dst_prev.cmp(&other.dst_prev))
            .then(self.momenta.cmp(&other.momenta))
    }
}

impl fmt::Display for Propagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.n_mom;
        write!(f, "{} ({}", self.momenta.display(n), self.src_order)?;
        if self.is_singlet() {
            write!(f, "[{}]", self.src_prev.display(n))?;
        }
        write!(f, " -> {}", self.dst_order)?;
        if self.is_singlet() {
            write!(f, "[{}]", self.dst_prev.display(n))?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn normalisation_is_idempotent(mask in 1u64..(1 << 8), src in 2usize..8, dst in 2usize..8) {
            let p = Propagator::new(Momenta(mask), 8, src, dst);
            let again = Propagator::new(p.momenta(), 8, p.src_order(), p.dst_order());
            prop_assert_eq!(&p, &again);
            prop_assert!(p.momenta().count() <= 4);
        }

        #[test]
        fn complement_swaps_endpoints(mask in 1u64..(1 << 8) - 1, src in 2usize..8, dst in 2usize..8) {
            let m = Momenta(mask);
            let p = Propagator::new(m, 8, src, dst);
            let q = Propagator::new(m.complement(8), 8, dst, src);
            prop_assert_eq!(p, q);
        }
    }

    #[test]
    fn test_half_masks() {
        // exactly half the bits, top bit unset: kept
        let p = Propagator::new(Momenta(0b000111), 6, 2, 4);
        assert_eq!(p.momenta(), Momenta(0b000111));
        assert_eq!((p.src_order(), p.dst_order()), (2, 4));

        // exactly half including the top bit: complemented and flipped
        let q = Propagator::new(Momenta(0b111000), 6, 2, 4);
        assert_eq!(q.momenta(), Momenta(0b000111));
        assert_eq!((q.src_order(), q.dst_order()), (4, 2));
    }

    #[test]
    fn test_relabel() {
        let p = Propagator::new(Momenta(0b0011), 4, 2, 2);
        let r = p.relabelled(&Permutation::cyclic(4, 1)).unwrap();
        assert_eq!(r.momenta(), Momenta(0b0110));
        let wrapped = r.relabelled(&Permutation::cyclic(4, 2)).unwrap();
        // 0b1001 has the top bit: stored as its complement
        assert_eq!(wrapped.momenta(), Momenta(0b0110));
        assert!(p.relabelled(&Permutation::id(5)).is_err());
    }

    #[test]
    fn test_display() {
        let p = Propagator::new(Momenta(0b000111), 6, 2, 4);
        insta::assert_snapshot!(p.to_string(), @"XXX... (2 -> 4)");
        let s = Propagator::singlet(Momenta(0b0011), 6, 4, Momenta(0b0010), 2, Momenta(0b0100));
        insta::assert_snapshot!(s.to_string(), @"XX.... (4[.X....] -> 2[..X...])");
    }

    #[test]
    fn test_header_width() {
        let p = Propagator::new(Momenta(0b0011), 4, 0, 0);
        assert_eq!(p.header().len(), p.to_string().len());
        assert_eq!(p.header(), format!("0123{}", " ".repeat(9)));

        let s = Propagator::singlet(Momenta(0b0011), 6, 4, Momenta(0b0010), 2, Momenta(0b0100));
        assert_eq!(s.header().len(), s.to_string().len());
    }
}

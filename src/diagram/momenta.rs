use std::fmt;

use derive_more::{BitAnd, BitOr, BitOrAssign, BitXor, From, Into};

/// A set of external momenta, one bit per flavour index.
///
/// Diagrams have at most 64 legs, so a single `u64` suffices.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Into,
    BitAnd,
    BitOr,
    BitXor,
    BitOrAssign,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Momenta(pub u64);

impl Momenta {
    pub const EMPTY: Momenta = Momenta(0);

    /// The momentum of leg `idx` alone.
    pub fn single(idx: usize) -> Self {
        Momenta(1 << idx)
    }

    /// All `n` momenta.
    pub fn all(n: usize) -> Self {
        if n >= u64::BITS as usize {
            Momenta(u64::MAX)
        } else {
            Momenta((1 << n) - 1)
        }
    }

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, idx: usize) -> bool {
        idx < u64::BITS as usize && self.0 & (1 << idx) != 0
    }

    /// The index of the lowest momentum, `None` if empty.
    pub fn lowest(self) -> Option<usize> {
        (!self.is_empty()).then(|| self.0.trailing_zeros() as usize)
    }

    /// The momenta of `all(n)` that are not in `self`.
    pub fn complement(self, n: usize) -> Self {
        Momenta(self.0 ^ Self::all(n).0)
    }

    /// Renders the first `n` bits lowest first, `X` for set and `.` for unset.
    pub fn display(self, n: usize) -> MomentaDisplay {
        MomentaDisplay { momenta: self, n }
    }
}

pub struct MomentaDisplay {
    momenta: Momenta,
    n: usize,
}

impl fmt::Display for MomentaDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.n {
            if self.momenta.contains(i) {
                write!(f, "X")?;
            } else {
                write!(f, ".")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks() {
        let m = Momenta::single(1) | Momenta::single(3);
        assert_eq!(m.count(), 2);
        assert_eq!(m.lowest(), Some(1));
        assert_eq!(m.complement(5), Momenta(0b10101));
        assert_eq!(Momenta::EMPTY.lowest(), None);
        assert_eq!(Momenta::all(64), Momenta(u64::MAX));
        insta::assert_snapshot!(m.display(6).to_string(), @".X.X..");
    }
}

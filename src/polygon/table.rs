use std::{collections::BTreeMap, fmt};

use ahash::AHashMap;
use log::debug;

use super::{grow, merge, remove_zero, singlet_all, split_all, PolygonDiagram, PolygonError};

/// How much of a [`DiagramTable`] is computed up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fill {
    /// Nothing; every entry is filled on first access.
    #[default]
    None,
    /// The largest entry and whatever it is grown from.
    Min,
    /// The largest leg count at every order.
    Max,
}

/// Memoised lists of polygon diagrams by leg count and order.
///
/// Entries are grown from smaller ones. With `split` (from order 1) and
/// `singlet` (from order 2) set, every entry handed out also contains the
/// diagrams reached through flavour splits and singlet propagators, with
/// vanishing ones removed. Growth always starts from the plain entries.
#[derive(Debug, Clone)]
pub struct DiagramTable {
    max_ngons: usize,
    max_order: usize,
    split: bool,
    singlet: bool,
    grown: AHashMap<(usize, usize), Vec<PolygonDiagram>>,
    finished: AHashMap<(usize, usize), Vec<PolygonDiagram>>,
}

impl DiagramTable {
    pub fn new(
        max_ngons: usize,
        max_order: usize,
        split: bool,
        singlet: bool,
        fill: Fill,
    ) -> Result<Self, PolygonError> {
        if max_ngons < 4 || max_ngons % 2 != 0 {
            return Err(PolygonError::InvalidSize(max_ngons));
        }
        let mut table = DiagramTable {
            max_ngons,
            max_order,
            split,
            singlet,
            grown: AHashMap::new(),
            finished: AHashMap::new(),
        };

        match fill {
            Fill::None => {}
            Fill::Min => table.fill(max_ngons, max_order)?,
            Fill::Max => {
                for order in (0..=max_order).rev() {
                    table.fill(max_ngons, order)?;
                }
            }
        }
        let mut keys: Vec<_> = table.grown.keys().copied().collect();
        keys.sort_unstable();
        for (ngons, order) in keys {
            table.finish(ngons, order)?;
        }
        Ok(table)
    }

    pub fn max_ngons(&self) -> usize {
        self.max_ngons
    }

    pub fn max_order(&self) -> usize {
        self.max_order
    }

    fn check(&self, ngons: usize, order: usize) -> Result<(), PolygonError> {
        if ngons < 4 || ngons > self.max_ngons || ngons % 2 != 0 {
            return Err(PolygonError::InvalidSize(ngons));
        }
        if order > self.max_order {
            return Err(PolygonError::InvalidOrder {
                order,
                max: self.max_order,
            });
        }
        Ok(())
    }

    fn fill(&mut self, ngons: usize, order: usize) -> Result<(), PolygonError> {
        if self.grown.contains_key(&(ngons, order)) {
            return Ok(());
        }
        debug!("Generating O(p^{}) {ngons}-point diagrams", 2 * (order + 1));

        let mut diagrams = vec![PolygonDiagram::contact(ngons, order)?];
        for o in (order / 2..=order).rev() {
            for n in ((ngons / 2).max(4)..=ngons - 2).rev().step_by(2) {
                self.fill(n, o)?;
                let base = self.grown.get(&(n, o)).map_or(&[][..], Vec::as_slice);
                let grown = grow(base, ngons - n, order - o)?;
                diagrams = merge(diagrams, grown);
            }
        }

        debug!(
            "{} O(p^{}) {ngons}-point diagrams",
            diagrams.len(),
            2 * (order + 1)
        );
        self.grown.insert((ngons, order), diagrams);
        Ok(())
    }

    fn finish(&mut self, ngons: usize, order: usize) -> Result<(), PolygonError> {
        if self.finished.contains_key(&(ngons, order)) {
            return Ok(());
        }
        self.fill(ngons, order)?;
        let mut list = self
            .grown
            .get(&(ngons, order))
            .cloned()
            .unwrap_or_default();
        if self.split && order >= 1 {
            list = split_all(list)?;
            remove_zero(&mut list);
        }
        if self.singlet && order >= 2 {
            list = singlet_all(list)?;
            remove_zero(&mut list);
        }
        self.finished.insert((ngons, order), list);
        Ok(())
    }

    /// All diagrams with `ngons` legs at order label `order`, sorted in
    /// descending order.
    pub fn get(&mut self, ngons: usize, order: usize) -> Result<&[PolygonDiagram], PolygonError> {
        self.check(ngons, order)?;
        self.finish(ngons, order)?;
        Ok(self
            .finished
            .get(&(ngons, order))
            .map_or(&[][..], Vec::as_slice))
    }

    pub fn count(&mut self, ngons: usize, order: usize) -> Result<SplitCount, PolygonError> {
        SplitCount::from_diagrams(self.get(ngons, order)?)
    }
}

/// Diagram counts by flavour split and symmetry factor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitCount {
    counts: BTreeMap<Vec<usize>, BTreeMap<usize, usize>>,
    total: usize,
}

impl SplitCount {
    pub fn from_diagrams(diagrams: &[PolygonDiagram]) -> Result<Self, PolygonError> {
        let mut count = SplitCount::default();
        for diagram in diagrams {
            count.add(diagram)?;
        }
        Ok(count)
    }

    pub fn add(&mut self, diagram: &PolygonDiagram) -> Result<usize, PolygonError> {
        let entry = self
            .counts
            .entry(diagram.flavour_split())
            .or_default()
            .entry(diagram.symmetry())
            .or_default();
        *entry = entry.checked_add(1).ok_or(PolygonError::CountOverflow)?;
        self.total = self
            .total
            .checked_add(1)
            .ok_or(PolygonError::CountOverflow)?;
        Ok(*entry)
    }

    pub fn get(&self, split: &[usize], symmetry: usize) -> usize {
        self.counts
            .get(split)
            .and_then(|by_sym| by_sym.get(&symmetry))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Display for SplitCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total: {}", self.total)?;
        for (split, by_sym) in &self.counts {
            writeln!(f, "{split:?}: {}", by_sym.values().sum::<usize>())?;
            for (sym, count) in by_sym {
                writeln!(f, "  sym {sym}: {count}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_table() {
        assert_eq!(
            DiagramTable::new(5, 0, false, false, Fill::None).err(),
            Some(PolygonError::InvalidSize(5))
        );
        let mut table = DiagramTable::new(6, 1, false, false, Fill::None).unwrap();
        assert_eq!(table.get(8, 0).err(), Some(PolygonError::InvalidSize(8)));
        assert_eq!(
            table.get(6, 2).err(),
            Some(PolygonError::InvalidOrder { order: 2, max: 1 })
        );
    }

    #[test]
    fn test_six_point_leading_order() {
        let mut table = DiagramTable::new(6, 0, false, false, Fill::Max).unwrap();
        let list = table.get(6, 0).unwrap();
        assert_eq!(list.len(), 2);
        // fewer polygons sort last
        assert_eq!(list[0].polygons().len(), 2);
        assert_eq!(list[1].polygons().len(), 1);

        let count = table.count(6, 0).unwrap();
        assert_eq!(count.total(), 2);
        assert_eq!(count.get(&[6], 6), 1);
        assert_eq!(count.get(&[6], 2), 1);
        insta::assert_snapshot!(count.to_string(), @r"
        total: 2
        [6]: 2
          sym 2: 1
          sym 6: 1
        ");
    }

    #[test]
    fn test_flavour_split_four_point() {
        let mut table = DiagramTable::new(4, 1, true, false, Fill::Min).unwrap();
        let list = table.get(4, 1).unwrap();
        let splits: Vec<_> = list.iter().map(PolygonDiagram::flavour_split).collect();
        assert_eq!(splits, vec![vec![4], vec![2, 2]]);

        let count = table.count(4, 1).unwrap();
        assert_eq!(count.get(&[4], 4), 1);
        assert_eq!(count.get(&[2, 2], 8), 1);
    }

    #[test]
    fn test_lazy_entries_match_eager_ones() {
        let mut eager = DiagramTable::new(8, 1, true, true, Fill::Max).unwrap();
        let mut lazy = DiagramTable::new(8, 1, true, true, Fill::None).unwrap();
        let a: Vec<_> = eager.get(8, 1).unwrap().to_vec();
        let b = lazy.get(8, 1).unwrap();
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(b).all(|(x, y)| x == y));
        assert!(b.iter().all(|d| !d.is_zero_flavour_split()));
    }
}

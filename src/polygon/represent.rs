//! Building the [`CompoundRep`] of a polygon diagram.
//!
//! A flavour part is a maximal set of polygons joined by propagators. Its
//! perimeter, with flavour splits skipped and singlets counted as legs, gives
//! one [`GonRep`] per leg. Parts joined through flavour splits or singlets are
//! represented from the point of view of the part asking for them: that part
//! is the master, the nested one its slave, and the slave sees the master only
//! as [`PartRep::BackToMaster`]. So every part is represented once as master
//! and again under each part that reaches it.

use bitvec::prelude::*;
use log::trace;

use super::{Polygon, PolygonDiagram, PolygonError, Side};
use crate::cycrep::{CompoundRep, ConRef, CycRep, GonRep, LineRep, PartRep};

/// The canonical representation of the diagram's current polygons.
pub fn represent_diagram(diagram: &PolygonDiagram) -> Result<CompoundRep, PolygonError> {
    represent_polygons(diagram.polygons())
}

pub(crate) fn represent_polygons(polygons: &[Polygon]) -> Result<CompoundRep, PolygonError> {
    let walker = Walker { polygons };
    let n = polygons.len();
    let mut visited = bitvec![0; n];
    let mut parts = vec![];
    for p in 0..n {
        if !visited[p] {
            let mut master = bitvec![0; n];
            parts.push(PartRep::Local(walker.part(p, &mut visited, &mut master)?));
        }
    }
    Ok(CompoundRep::new(parts))
}

/// A position on the boundary of a polygon: polygon index and side index.
type Cursor = (usize, usize);

struct Walker<'a> {
    polygons: &'a [Polygon],
}

impl Walker<'_> {
    fn side(&self, (p, g): Cursor) -> Side {
        self.polygons[p].sides()[g]
    }

    fn next_side(&self, (p, g): Cursor) -> Cursor {
        (p, (g + 1) % self.polygons[p].len())
    }

    /// Moves to the polygon across side `g`, onto the same corner.
    fn cross(&self, (p, g): Cursor) -> Result<Cursor, PolygonError> {
        let corner = self.polygons[p].corners()[g];
        let Some(q) = self.side((p, g)).target() else {
            return Ok(self.next_side((p, g)));
        };
        let h = self.polygons[q]
            .position(corner)
            .ok_or(PolygonError::DanglingSide { polygon: q, corner })?;
        Ok((q, h))
    }

    /// One step along the perimeter of a part.
    fn step_part(&self, at: Cursor) -> Result<Cursor, PolygonError> {
        match self.side(at) {
            Side::Propagator(_) => self.cross(at),
            _ => Ok(self.next_side(at)),
        }
    }

    /// One step around a vertex, through its flavour splits.
    fn step_vertex(&self, at: Cursor) -> Result<Cursor, PolygonError> {
        match self.side(at) {
            Side::FlavourSplit(_) => self.cross(at),
            _ => Ok(self.next_side(at)),
        }
    }

    fn slave(&self, p: usize, master: &mut BitSlice) -> Result<CycRep, PolygonError> {
        let mut visited = bitvec![0; self.polygons.len()];
        self.part(p, &mut visited, master)
    }

    /// Represents the part containing polygon `p`, marking its polygons in
    /// `visited`. `master` marks polygons of every part this one is nested
    /// under and grows as vertices are represented.
    fn part(
        &self,
        p: usize,
        visited: &mut BitSlice,
        master: &mut BitSlice,
    ) -> Result<CycRep, PolygonError> {
        let mut connections: Vec<Option<CompoundRep>> = vec![None; self.polygons.len()];

        visited.set(p, true);
        connections[p] = self.vertex_connections(p, master)?;

        let start = (p, 0);
        let mut at = start;
        let mut length = 0;
        loop {
            match self.side(at) {
                Side::External | Side::Singlet(_) => {
                    length += 1;
                    at = self.next_side(at);
                }
                Side::FlavourSplit(_) => at = self.next_side(at),
                Side::Propagator(_) => {
                    at = self.cross(at)?;
                    let q = at.0;
                    if !visited[q] {
                        visited.set(q, true);
                        connections[q] = self.vertex_connections(q, master)?;
                    }
                }
            }
            if at == start {
                break;
            }
        }

        let con = |q: usize, connections: &[Option<CompoundRep>]| {
            if connections[q].is_some() {
                ConRef::Polygon(q)
            } else {
                ConRef::Empty
            }
        };

        // entries must start right after a leg
        let start = loop {
            match self.side(at) {
                Side::External | Side::Singlet(_) => break self.next_side(at),
                Side::Propagator(_) => at = self.cross(at)?,
                Side::FlavourSplit(_) => at = self.next_side(at),
            }
        };

        let mut array = Vec::with_capacity(length);
        let mut singlets = vec![];
        let mut n_flavidx = 0;
        let mut internal = vec![];
        at = start;
        loop {
            let (q, _) = at;
            let ord = self.polygons[q].order();
            match self.side(at) {
                Side::External => {
                    let leg = LineRep {
                        len: 1,
                        ord,
                        con: con(q, &connections),
                    };
                    array.push(GonRep {
                        lines: std::iter::once(leg).chain(internal.drain(..)).collect(),
                    });
                    n_flavidx += 1;
                    at = self.next_side(at);
                }
                Side::Propagator(_) => {
                    internal.push(LineRep {
                        len: self.actual_dist(at)?,
                        ord,
                        con: con(q, &connections),
                    });
                    at = self.cross(at)?;
                }
                Side::FlavourSplit(_) => at = self.next_side(at),
                Side::Singlet(s) => {
                    let leg = LineRep {
                        len: 1,
                        ord,
                        con: con(q, &connections),
                    };
                    singlets.push(self.singlet_connection(q, s, master)?);
                    let singlet = LineRep {
                        len: 0,
                        ord: 0,
                        con: ConRef::Singlet(singlets.len() - 1),
                    };
                    array.push(GonRep {
                        lines: std::iter::once(leg)
                            .chain(internal.drain(..))
                            .chain(std::iter::once(singlet))
                            .collect(),
                    });
                    at = self.next_side(at);
                }
            }
            if at == start {
                break;
            }
        }
        debug_assert_eq!(array.len(), length);

        let mut rep = CycRep::new(array, n_flavidx).with_connections(connections, singlets);
        rep.normalise_all()?;
        trace!(
            "represented part of polygon {p}: length {}, period {}",
            rep.len(),
            rep.period()
        );
        Ok(rep)
    }

    /// The parts hanging off the vertex of polygon `p` through flavour splits,
    /// or `None` if there are none.
    fn vertex_connections(
        &self,
        p: usize,
        master: &mut BitSlice,
    ) -> Result<Option<CompoundRep>, PolygonError> {
        let mut visited = bitvec![0; self.polygons.len()];
        visited.set(p, true);
        master.set(p, true);

        let start = (p, 0);
        let mut at = start;
        let mut parts = vec![];
        loop {
            let q = at.0;
            if !visited[q] {
                if master[q] {
                    parts.push(PartRep::BackToMaster);
                } else {
                    let mut m = master.to_bitvec();
                    parts.push(PartRep::Local(self.slave(q, &mut m)?));
                }
                visited.set(q, true);
            }
            at = self.step_vertex(at)?;
            if at == start {
                break;
            }
        }

        Ok((!parts.is_empty()).then(|| CompoundRep::new(parts)))
    }

    /// The part across the singlet from polygon `p` to polygon `s`.
    fn singlet_connection(
        &self,
        p: usize,
        s: usize,
        master: &BitSlice,
    ) -> Result<CompoundRep, PolygonError> {
        let part = if master[s] {
            PartRep::BackToMaster
        } else {
            let mut m = master.to_bitvec();
            m.set(p, true);
            PartRep::Local(self.slave(s, &mut m)?)
        };
        Ok(CompoundRep::new(vec![part]))
    }

    /// Legs and singlets passed along the part perimeter between the two ends
    /// of side `at`.
    fn actual_dist(&self, at: Cursor) -> Result<usize, PolygonError> {
        let (p, g) = at;
        let poly = &self.polygons[p];
        let target = poly.corners()[(g + 1) % poly.len()];

        let mut dist = 0;
        let mut at = at;
        loop {
            if matches!(self.side(at), Side::External | Side::Singlet(_)) {
                dist += 1;
            }
            at = self.step_part(at)?;
            if self.polygons[at.0].corners()[at.1] == target {
                return Ok(dist);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_is_one_trace() {
        let contact = PolygonDiagram::contact(6, 0).unwrap();
        let rep = represent_diagram(&contact).unwrap();
        assert_eq!(rep.len(), 1);
        let part = rep.parts()[0].as_local().unwrap();
        assert_eq!(part.len(), 6);
        assert_eq!(part.n_flavidx(), 6);
        assert_eq!(part.period(), 1);
        assert_eq!(rep.symmetry(), Ok(6));
    }

    #[test]
    fn test_exchange_lines() {
        let exchange = PolygonDiagram::contact(4, 0)
            .unwrap()
            .cut_edge(0, 2, 0)
            .unwrap();
        let rep = represent_diagram(&exchange).unwrap();
        assert_eq!(rep.len(), 1);
        let part = rep.parts()[0].as_local().unwrap();
        assert_eq!(part.len(), 6);
        assert_eq!(part.period(), 3);
        let lens: Vec<Vec<usize>> = (0..6)
            .map(|i| part.gon(i).lines.iter().map(|l| l.len).collect())
            .collect();
        assert_eq!(
            lens,
            vec![vec![1], vec![1], vec![1, 3], vec![1], vec![1], vec![1, 3]]
        );
    }

    #[test]
    fn test_split_parts_refer_back() {
        let split = PolygonDiagram::contact(4, 1)
            .unwrap()
            .split_polygon(0)
            .unwrap();
        assert_eq!(split.len(), 1);
        let rep = represent_diagram(&split[0]).unwrap();
        assert_eq!(rep.len(), 2);
        assert_eq!(rep.eq_reps(), &[0, 0]);

        let part = rep.parts()[0].as_local().unwrap();
        let con = part.connection(part.gon(0).lines[0].con).unwrap();
        assert_eq!(con.len(), 1);
        let slave = con.parts()[0].as_local().unwrap();
        let back = slave.connection(slave.gon(0).lines[0].con).unwrap();
        assert!(matches!(back.parts(), [PartRep::BackToMaster]));
    }
}

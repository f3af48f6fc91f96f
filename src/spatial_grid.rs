//! Uniform-grid spatial hash used to accelerate both collision-pair generation
//! and SPH neighbor queries. Rebuilt from scratch every solver step; never
//! observed outside the step that builds it.
use glam::DVec3;
use rustc_hash::FxHashMap;

type Cell = (i64, i64, i64);

#[derive(Clone, Debug)]
pub struct SpatialGrid {
    h: f64,
    cells: FxHashMap<Cell, Vec<usize>>,
}

impl SpatialGrid {
    pub fn new(h: f64) -> SpatialGrid {
        SpatialGrid { h, cells: FxHashMap::default() }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    fn cell_of(&self, p: DVec3) -> Cell {
        (
            (p.x / self.h).floor() as i64,
            (p.y / self.h).floor() as i64,
            (p.z / self.h).floor() as i64,
        )
    }

    pub fn insert(&mut self, p: DVec3, index: usize) {
        let cell = self.cell_of(p);
        self.cells.entry(cell).or_default().push(index);
    }

    /// Visits every unordered pair (p, q) with p < q that share a cell within
    /// the 3x3x3 neighborhood of any occupied cell. A pair whose particles sit
    /// in two cells that are both occupied and mutually neighboring is visited
    /// exactly once, from the cell with the lexicographically smaller coordinate.
    pub fn for_each_neighbor_pair(&self, mut f: impl FnMut(usize, usize)) {
        for (&cell, particles) in &self.cells {
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let neighbor_cell = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                        if neighbor_cell < cell {
                            // Already handled when iterating from `neighbor_cell`.
                            continue;
                        }
                        let Some(neighbor_particles) = self.cells.get(&neighbor_cell) else {
                            continue;
                        };
                        if neighbor_cell == cell {
                            for (i, &p1) in particles.iter().enumerate() {
                                for &p2 in &particles[i + 1..] {
                                    f(p1.min(p2), p1.max(p2));
                                }
                            }
                        } else {
                            for &p1 in particles {
                                for &p2 in neighbor_particles {
                                    f(p1.min(p2), p1.max(p2));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// All particles within the 3x3x3 neighborhood of `p`'s cell, excluding `p` itself.
    pub fn neighbors_of(&self, p: DVec3, self_index: usize, mut f: impl FnMut(usize)) {
        let cell = self.cell_of(p);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor_cell = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                    if let Some(particles) = self.cells.get(&neighbor_cell) {
                        for &q in particles {
                            if q != self_index {
                                f(q);
                            }
                        }
                    }
                }
            }
        }
    }
}

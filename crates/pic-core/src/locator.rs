// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Cell Locator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Point-location and cell-relocation walk.
//!
//! `relocate` walks facet adjacency from a particle's previous cell:
//! the exit facet is the one with maximum outward projection of the
//! vector from facet midpoint to the point. One call resolves a
//! multi-cell crossing (fast particle, large timestep) to a single
//! location result.
//!
//! The walk is a bounded loop, not recursion: for a geometrically
//! valid mesh it terminates within `num_cells` hops, and the hop cap
//! turns any cyclic walk into a hard error instead of a hang.

use rayon::prelude::*;

use pic_types::error::{PicError, PicResult};

use crate::mesh::{Mesh, Point};
use crate::topology::{FacetNeighbor, MeshTopology};

/// Terminal result of a relocation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The cell geometrically containing the point.
    Cell(usize),
    /// The point left the mesh through a facet with this boundary
    /// marker (exterior skin or embedded object).
    Boundary(u32),
}

impl Location {
    #[inline]
    pub fn cell(&self) -> Option<usize> {
        match self {
            Location::Cell(c) => Some(*c),
            Location::Boundary(_) => None,
        }
    }

    #[inline]
    pub fn is_boundary(&self) -> bool {
        matches!(self, Location::Boundary(_))
    }
}

/// Relocation engine. Borrows the mesh (for the exact containment
/// predicate) and the immutable facet topology.
#[derive(Debug)]
pub struct Locator<'a, M: Mesh> {
    mesh: &'a M,
    topology: &'a MeshTopology,
}

// Manual impls keep Copy/Clone independent of whether M itself is
// copyable (the locator only holds borrows).
impl<M: Mesh> Clone for Locator<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Mesh> Copy for Locator<'_, M> {}

impl<'a, M: Mesh> Locator<'a, M> {
    pub fn new(mesh: &'a M, topology: &'a MeshTopology) -> PicResult<Self> {
        if topology.num_cells() != mesh.num_cells() {
            return Err(PicError::MeshTopology(format!(
                "topology cell count {} does not match mesh cell count {}",
                topology.num_cells(),
                mesh.num_cells()
            )));
        }
        Ok(Locator { mesh, topology })
    }

    pub fn mesh(&self) -> &'a M {
        self.mesh
    }

    pub fn topology(&self) -> &'a MeshTopology {
        self.topology
    }

    /// Exact point-in-cell predicate, delegated to the mesh.
    #[inline]
    pub fn contains(&self, cell: usize, x: &Point) -> bool {
        self.mesh.contains(cell, x)
    }

    /// Walk from `start_cell` to the cell containing `x`, or to the
    /// boundary marker the point left through.
    ///
    /// Ties in the outward projection break to the first facet in the
    /// cell's fixed enumeration order, so repeated calls with
    /// identical inputs always agree.
    pub fn relocate(&self, x: &Point, start_cell: usize) -> PicResult<Location> {
        if start_cell >= self.topology.num_cells() {
            return Err(PicError::MeshTopology(format!(
                "relocation start cell {start_cell} out of range ({} cells)",
                self.topology.num_cells()
            )));
        }

        let dim = self.topology.dim();
        let max_hops = self.topology.num_cells();
        let mut cell = start_cell;
        let mut hops = 0usize;
        loop {
            if self.mesh.contains(cell, x) {
                return Ok(Location::Cell(cell));
            }

            let facets = self.topology.cell(cell);
            if facets.is_empty() {
                return Err(PicError::MeshTopology(format!(
                    "cell {cell} has no facets in the topology cache"
                )));
            }

            // Exit facet: maximum projection of (x - midpoint) onto the
            // outward normal. Strict `>` keeps the first occurrence on
            // ties.
            let mut exit = 0usize;
            let mut best = f64::NEG_INFINITY;
            for (k, facet) in facets.iter().enumerate() {
                let mut proj = 0.0;
                for i in 0..dim {
                    proj += (x[i] - facet.midpoint[i]) * facet.normal[i];
                }
                if proj > best {
                    best = proj;
                    exit = k;
                }
            }

            match facets[exit].neighbor {
                FacetNeighbor::Boundary(marker) => return Ok(Location::Boundary(marker)),
                FacetNeighbor::Cell(next) => {
                    hops += 1;
                    if hops > max_hops {
                        return Err(PicError::WalkDidNotTerminate { start_cell, hops });
                    }
                    cell = next;
                }
            }
        }
    }

    /// Global point location with no starting cell: linear scan over
    /// the containment predicate. Used for freshly created particles.
    pub fn locate(&self, x: &Point) -> Option<usize> {
        (0..self.mesh.num_cells()).find(|&cell| self.mesh.contains(cell, x))
    }

    /// Bulk global location for initial loading, parallelized over
    /// points.
    pub fn locate_batch(&self, xs: &[Point]) -> Vec<Option<usize>>
    where
        M: Sync,
    {
        xs.par_iter().map(|x| self.locate(x)).collect()
    }
}

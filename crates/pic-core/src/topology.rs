// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Facet Topology Cache
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Precomputed per-cell facet adjacency, outward normals and facet
//! midpoints.
//!
//! Built once per mesh and immutable afterwards; the relocation walk
//! borrows it. Facets are stored redundantly per cell so a walk step
//! touches one contiguous slice.

use log::debug;
use pic_types::constants::MARKER_NONE;
use pic_types::error::{PicError, PicResult};

use crate::mesh::{Mesh, Point};

/// What lies on the far side of a cell facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetNeighbor {
    /// Another cell of the mesh.
    Cell(usize),
    /// The mesh skin, carrying a boundary marker >= 1.
    Boundary(u32),
}

/// One facet of a cell: adjacency plus the geometry the walk projects
/// against. The normal is outward for the owning cell.
#[derive(Debug, Clone)]
pub struct CellFacet {
    pub neighbor: FacetNeighbor,
    pub normal: Point,
    pub midpoint: Point,
}

/// Facet topology of a whole mesh, indexed by cell.
#[derive(Debug, Clone)]
pub struct MeshTopology {
    cells: Vec<Vec<CellFacet>>,
    dim: usize,
}

impl MeshTopology {
    /// Build the cache from a mesh and its boundary-marker array
    /// (indexed by global facet id, [`MARKER_NONE`] on interior
    /// facets).
    ///
    /// Fatal at setup: marker array length mismatch, a skin facet
    /// carrying the reserved marker 0, a facet bordering no or more
    /// than two cells, a non-finite or zero-length normal.
    pub fn build<M: Mesh>(mesh: &M, facet_markers: &[u32]) -> PicResult<Self> {
        if facet_markers.len() != mesh.num_facets() {
            return Err(PicError::MeshTopology(format!(
                "marker array length {} does not match facet count {}",
                facet_markers.len(),
                mesh.num_facets()
            )));
        }

        let dim = mesh.dim();
        if dim == 0 || dim > 3 {
            return Err(PicError::MeshTopology(format!(
                "unsupported mesh dimension {dim}"
            )));
        }

        let mut cells = Vec::with_capacity(mesh.num_cells());
        for cell in 0..mesh.num_cells() {
            let facet_ids = mesh.cell_facets(cell);
            let mut facets = Vec::with_capacity(facet_ids.len());
            for (local, &fid) in facet_ids.iter().enumerate() {
                let incident = mesh.facet_cells(fid);
                let neighbor = match incident.iter().copied().filter(|&c| c != cell).count() {
                    0 => {
                        let marker = facet_markers[fid];
                        if marker == MARKER_NONE {
                            return Err(PicError::MeshTopology(format!(
                                "facet {fid} of cell {cell} lies on the mesh skin but carries \
                                 the reserved marker 0"
                            )));
                        }
                        FacetNeighbor::Boundary(marker)
                    }
                    1 => {
                        let other = incident
                            .iter()
                            .copied()
                            .find(|&c| c != cell)
                            .ok_or_else(|| {
                                PicError::MeshTopology(format!(
                                    "facet {fid} adjacency lookup failed for cell {cell}"
                                ))
                            })?;
                        FacetNeighbor::Cell(other)
                    }
                    n => {
                        return Err(PicError::MeshTopology(format!(
                            "facet {fid} borders {} cells besides cell {cell}",
                            n
                        )));
                    }
                };

                // Normal from the owning cell, so it is outward without
                // a sign-correction step; truncate both vectors to the
                // topological dimension.
                let mut normal = mesh.cell_facet_normal(cell, local);
                let mut midpoint = mesh.facet_midpoint(fid);
                for k in dim..3 {
                    normal[k] = 0.0;
                    midpoint[k] = 0.0;
                }
                let norm2: f64 = normal.iter().map(|c| c * c).sum();
                if !norm2.is_finite() || norm2 <= 0.0 {
                    return Err(PicError::MeshTopology(format!(
                        "facet {fid} of cell {cell} has a degenerate normal"
                    )));
                }

                facets.push(CellFacet {
                    neighbor,
                    normal,
                    midpoint,
                });
            }
            cells.push(facets);
        }

        debug!(
            "built facet topology: {} cells, dim {}",
            cells.len(),
            dim
        );
        Ok(MeshTopology { cells, dim })
    }

    /// Assemble directly from per-cell facet lists, for meshes whose
    /// adjacency comes precomputed from an external library.
    pub fn from_cells(cells: Vec<Vec<CellFacet>>, dim: usize) -> Self {
        MeshTopology { cells, dim }
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Facets of a cell, in the mesh's fixed enumeration order.
    pub fn cell(&self, cell: usize) -> &[CellFacet] {
        &self.cells[cell]
    }
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Mesh Interface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Consumed mesh-geometry interface and a bundled reference
//! triangulation.
//!
//! The relocation engine only needs the small set of geometric queries
//! in [`Mesh`]; production meshes come from an external mesh library.
//! [`TriangleMesh`] is a uniform triangulation of an axis-aligned
//! rectangle, optionally with a rectangular cut-out acting as an
//! embedded object boundary, so the crate is testable without one.

use std::collections::BTreeMap;

use pic_types::error::{PicError, PicResult};

/// Maximum supported geometric dimension.
pub const DIM_MAX: usize = 3;

/// Coordinate vector. Components beyond the mesh dimension are zero.
pub type Point = [f64; DIM_MAX];

/// Boundary marker for the outer skin of the bundled triangulation.
pub const EXTERIOR_MARKER: u32 = 1;

/// Boundary marker for the cut-out (embedded object) of the bundled
/// triangulation.
pub const OBJECT_MARKER: u32 = 2;

/// Barycentric containment tolerance.
const CONTAINS_TOL: f64 = 1e-12;

/// Geometric queries the relocation engine consumes.
///
/// Facet enumeration order per cell must be fixed and stable: the
/// relocation walk breaks projection ties by first occurrence in this
/// order. Outward normals are taken from the owning cell's own
/// geometric definition, never from an independently oriented facet.
pub trait Mesh {
    /// Topological dimension (1, 2 or 3).
    fn dim(&self) -> usize;

    fn num_cells(&self) -> usize;

    fn num_facets(&self) -> usize;

    /// Global facet ids bounding `cell`, in fixed stable order.
    fn cell_facets(&self, cell: usize) -> &[usize];

    /// Cells incident to a facet (one on the mesh skin, two inside).
    fn facet_cells(&self, facet: usize) -> &[usize];

    fn facet_midpoint(&self, facet: usize) -> Point;

    /// Unit normal of the `local_facet`-th facet of `cell`, outward
    /// with respect to `cell`.
    fn cell_facet_normal(&self, cell: usize, local_facet: usize) -> Point;

    /// Exact point-in-cell predicate.
    fn contains(&self, cell: usize, x: &Point) -> bool;

    /// Total mesh volume (area in 2D).
    fn volume(&self) -> f64;

    /// Axis-aligned bounding box (min corner, max corner).
    fn bounding_box(&self) -> (Point, Point);
}

/// Uniform triangulation of `[0, lx] × [0, ly]`, each grid square split
/// into two triangles. An optional rectangular cut-out removes the
/// cells whose centroid falls inside it; the resulting internal skin is
/// marked [`OBJECT_MARKER`], the outer skin [`EXTERIOR_MARKER`].
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    nx: usize,
    ny: usize,
    points: Vec<[f64; 2]>,
    cells: Vec<[usize; 3]>,
    cell_facets: Vec<[usize; 3]>,
    facet_vertices: Vec<[usize; 2]>,
    facet_cells: Vec<Vec<usize>>,
    facet_markers: Vec<u32>,
    volume: f64,
    bbox: ([f64; 2], [f64; 2]),
}

impl TriangleMesh {
    /// Triangulate the full rectangle.
    pub fn rectangle(nx: usize, ny: usize, lx: f64, ly: f64) -> PicResult<Self> {
        Self::rectangle_with_cutout(nx, ny, lx, ly, None)
    }

    /// Triangulate the rectangle minus an axis-aligned cut-out
    /// `[x0, x1] × [y0, y1]` whose skin becomes an object boundary.
    pub fn rectangle_with_cutout(
        nx: usize,
        ny: usize,
        lx: f64,
        ly: f64,
        cutout: Option<[f64; 4]>,
    ) -> PicResult<Self> {
        if nx == 0 || ny == 0 {
            return Err(PicError::ConfigError(format!(
                "mesh resolution must be >= 1 in each direction, got {nx}x{ny}"
            )));
        }
        if !lx.is_finite() || !ly.is_finite() || lx <= 0.0 || ly <= 0.0 {
            return Err(PicError::ConfigError(format!(
                "mesh extents must be finite and > 0, got {lx}x{ly}"
            )));
        }
        if let Some([x0, y0, x1, y1]) = cutout {
            if !(x0 < x1 && y0 < y1) {
                return Err(PicError::ConfigError(format!(
                    "cut-out corners must satisfy x0 < x1 and y0 < y1, got [{x0}, {y0}, {x1}, {y1}]"
                )));
            }
        }

        let dx = lx / nx as f64;
        let dy = ly / ny as f64;

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                points.push([i as f64 * dx, j as f64 * dy]);
            }
        }
        let vid = |i: usize, j: usize| j * (nx + 1) + i;

        let in_cutout = |cx: f64, cy: f64| match cutout {
            Some([x0, y0, x1, y1]) => cx > x0 && cx < x1 && cy > y0 && cy < y1,
            None => false,
        };

        // Each kept grid square contributes two CCW triangles.
        let mut cells: Vec<[usize; 3]> = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                let cx = (i as f64 + 0.5) * dx;
                let cy = (j as f64 + 0.5) * dy;
                if in_cutout(cx, cy) {
                    continue;
                }
                let p00 = vid(i, j);
                let p10 = vid(i + 1, j);
                let p01 = vid(i, j + 1);
                let p11 = vid(i + 1, j + 1);
                cells.push([p00, p10, p11]);
                cells.push([p00, p11, p01]);
            }
        }
        if cells.is_empty() {
            return Err(PicError::ConfigError(
                "cut-out removes every cell of the mesh".to_string(),
            ));
        }

        // Edge (facet) numbering: shared edges are found through their
        // sorted vertex pair.
        let mut edge_ids: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        let mut facet_vertices: Vec<[usize; 2]> = Vec::new();
        let mut facet_cells: Vec<Vec<usize>> = Vec::new();
        let mut cell_facets: Vec<[usize; 3]> = Vec::with_capacity(cells.len());
        for (cell_id, tri) in cells.iter().enumerate() {
            let mut local = [0usize; 3];
            for (k, (a, b)) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])]
                .into_iter()
                .enumerate()
            {
                let key = (a.min(b), a.max(b));
                let fid = *edge_ids.entry(key).or_insert_with(|| {
                    facet_vertices.push([key.0, key.1]);
                    facet_cells.push(Vec::with_capacity(2));
                    facet_vertices.len() - 1
                });
                facet_cells[fid].push(cell_id);
                local[k] = fid;
            }
            cell_facets.push(local);
        }

        // Skin facets: outer rectangle sides keep the exterior marker,
        // everything else exposed by the cut-out gets the object marker.
        let on_side = |v: usize| {
            let i = v % (nx + 1);
            let j = v / (nx + 1);
            (i == 0, i == nx, j == 0, j == ny)
        };
        let mut facet_markers = vec![0u32; facet_vertices.len()];
        for (fid, fc) in facet_cells.iter().enumerate() {
            if fc.len() != 1 {
                continue;
            }
            let [a, b] = facet_vertices[fid];
            let (al, ar, ab, at) = on_side(a);
            let (bl, br, bb, bt) = on_side(b);
            let exterior = (al && bl) || (ar && br) || (ab && bb) || (at && bt);
            facet_markers[fid] = if exterior {
                EXTERIOR_MARKER
            } else {
                OBJECT_MARKER
            };
        }

        let mut volume = 0.0;
        for tri in &cells {
            let a = points[tri[0]];
            let b = points[tri[1]];
            let c = points[tri[2]];
            let twice = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            debug_assert!(twice > 0.0, "triangulation produced a non-CCW cell");
            volume += 0.5 * twice;
        }

        Ok(TriangleMesh {
            nx,
            ny,
            points,
            cells,
            cell_facets,
            facet_vertices,
            facet_cells,
            facet_markers,
            volume,
            bbox: ([0.0, 0.0], [lx, ly]),
        })
    }

    /// Per-facet boundary markers (0 on interior facets), indexed by
    /// global facet id. Fed to the topology cache at build time.
    pub fn facet_markers(&self) -> &[u32] {
        &self.facet_markers
    }

    /// Vertex indices of a cell.
    pub fn cell_vertices(&self, cell: usize) -> [usize; 3] {
        self.cells[cell]
    }

    pub fn point(&self, vertex: usize) -> [f64; 2] {
        self.points[vertex]
    }

    pub fn cell_centroid(&self, cell: usize) -> [f64; 2] {
        let [a, b, c] = self.cells[cell].map(|v| self.points[v]);
        [
            (a[0] + b[0] + c[0]) / 3.0,
            (a[1] + b[1] + c[1]) / 3.0,
        ]
    }

    pub fn grid_resolution(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }
}

impl Mesh for TriangleMesh {
    fn dim(&self) -> usize {
        2
    }

    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn num_facets(&self) -> usize {
        self.facet_vertices.len()
    }

    fn cell_facets(&self, cell: usize) -> &[usize] {
        &self.cell_facets[cell]
    }

    fn facet_cells(&self, facet: usize) -> &[usize] {
        &self.facet_cells[facet]
    }

    fn facet_midpoint(&self, facet: usize) -> Point {
        let [a, b] = self.facet_vertices[facet].map(|v| self.points[v]);
        [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0, 0.0]
    }

    fn cell_facet_normal(&self, cell: usize, local_facet: usize) -> Point {
        // Edge k runs from vertex k to vertex k+1 of the CCW triangle;
        // rotating its direction by -90 degrees points outward.
        let tri = self.cells[cell];
        let a = self.points[tri[local_facet]];
        let b = self.points[tri[(local_facet + 1) % 3]];
        let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
        let len = (dx * dx + dy * dy).sqrt();
        [dy / len, -dx / len, 0.0]
    }

    fn contains(&self, cell: usize, x: &Point) -> bool {
        let [a, b, c] = self.cells[cell].map(|v| self.points[v]);
        let denom = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
        if denom.abs() < f64::MIN_POSITIVE {
            return false;
        }
        let l1 = ((b[1] - c[1]) * (x[0] - c[0]) + (c[0] - b[0]) * (x[1] - c[1])) / denom;
        let l2 = ((c[1] - a[1]) * (x[0] - c[0]) + (a[0] - c[0]) * (x[1] - c[1])) / denom;
        let l3 = 1.0 - l1 - l2;
        l1 >= -CONTAINS_TOL && l2 >= -CONTAINS_TOL && l3 >= -CONTAINS_TOL
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn bounding_box(&self) -> (Point, Point) {
        let (lo, hi) = self.bbox;
        ([lo[0], lo[1], 0.0], [hi[0], hi[1], 0.0])
    }
}

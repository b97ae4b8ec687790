// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Population Snapshot
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Plain-text population snapshots.
//!
//! One line per particle, tab-separated: `d` position components, `d`
//! velocity components, charge, mass. Rust's shortest round-trip float
//! formatting makes save/load exact.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;

use pic_types::error::{PicError, PicResult};

use crate::mesh::Mesh;
use crate::population::Population;

impl<M: Mesh> Population<'_, M> {
    /// Write every particle to a snapshot file, cell by cell.
    pub fn save_file<P: AsRef<Path>>(&self, path: P) -> PicResult<()> {
        let mut out = BufWriter::new(File::create(path)?);
        let dim = self.dim();
        for cell in 0..self.num_cells() {
            for particle in self.cell_particles(cell) {
                let mut fields = Vec::with_capacity(2 * dim + 2);
                for k in 0..dim {
                    fields.push(particle.pos[k].to_string());
                }
                for k in 0..dim {
                    fields.push(particle.vel[k].to_string());
                }
                fields.push(particle.charge.to_string());
                fields.push(particle.mass.to_string());
                writeln!(out, "{}", fields.join("\t"))?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Reconstruct particles from a snapshot file, locating each one.
    /// Returns the number of particles added.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> PicResult<usize>
    where
        M: Sync,
    {
        let dim = self.dim();
        let fields_per_line = 2 * dim + 2;

        let reader = BufReader::new(File::open(path)?);
        let mut positions: Vec<f64> = Vec::new();
        let mut velocities: Vec<f64> = Vec::new();
        let mut charges: Vec<f64> = Vec::new();
        let mut masses: Vec<f64> = Vec::new();
        let mut count = 0usize;

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let mut values = Vec::with_capacity(fields_per_line);
            for field in line.split('\t') {
                let value: f64 = field.parse().map_err(|_| PicError::SnapshotParse {
                    line: line_idx + 1,
                    message: format!("not a number: {field:?}"),
                })?;
                values.push(value);
            }
            if values.len() != fields_per_line {
                return Err(PicError::SnapshotParse {
                    line: line_idx + 1,
                    message: format!(
                        "expected {fields_per_line} fields for dimension {dim}, got {}",
                        values.len()
                    ),
                });
            }
            positions.extend_from_slice(&values[0..dim]);
            velocities.extend_from_slice(&values[dim..2 * dim]);
            charges.push(values[2 * dim]);
            masses.push(values[2 * dim + 1]);
            count += 1;
        }

        let xs = Array2::from_shape_vec((count, dim), positions).map_err(|e| {
            PicError::SnapshotParse {
                line: 0,
                message: e.to_string(),
            }
        })?;
        let vs = Array2::from_shape_vec((count, dim), velocities).map_err(|e| {
            PicError::SnapshotParse {
                line: 0,
                message: e.to_string(),
            }
        })?;
        self.add_particles(xs.view(), vs.view(), &charges, &masses)
    }
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Loading Samplers
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Initial-loading samplers: drifting Maxwellian velocities and
//! rejection-sampled positions over the mesh.

use ndarray::Array2;
use rand::Rng;
use rand_distr::StandardNormal;

use pic_types::error::{PicError, PicResult};

use crate::locator::Locator;
use crate::mesh::Mesh;

/// Rejection attempts permitted per requested point before giving up.
/// A profile this far below its stated maximum is a setup error, not
/// bad luck.
const MAX_REJECTION_FACTOR: usize = 10_000;

/// Sample `n` velocity vectors of a drifting Maxwellian with isotropic
/// thermal spread `v_thermal` around `v_drift`. A cold species
/// (`v_thermal == 0`) gets exactly the drift velocity.
pub fn maxwellian<R: Rng + ?Sized>(
    v_thermal: f64,
    v_drift: &[f64; 3],
    n: usize,
    dim: usize,
    rng: &mut R,
) -> PicResult<Array2<f64>> {
    if !v_thermal.is_finite() || v_thermal < 0.0 {
        return Err(PicError::ConfigError(format!(
            "thermal velocity must be finite and >= 0, got {v_thermal}"
        )));
    }
    if dim == 0 || dim > 3 {
        return Err(PicError::ConfigError(format!(
            "velocity dimension must be 1..=3, got {dim}"
        )));
    }
    if v_drift.iter().any(|c| !c.is_finite()) {
        return Err(PicError::ConfigError(
            "drift velocity components must be finite".to_string(),
        ));
    }

    let mut out = Array2::zeros((n, dim));
    for mut row in out.rows_mut() {
        for (k, v) in row.iter_mut().enumerate() {
            let xi: f64 = rng.sample(StandardNormal);
            *v = v_drift[k] + v_thermal * xi;
        }
    }
    Ok(out)
}

/// Sample `n` positions inside the mesh, rejection-sampling the
/// bounding box against the containment predicate and an optional
/// density profile bounded above by `pdf_max`.
pub fn random_domain_points<M, R>(
    locator: &Locator<M>,
    pdf: Option<&(dyn Fn(&[f64]) -> f64 + Sync)>,
    pdf_max: f64,
    n: usize,
    rng: &mut R,
) -> PicResult<Array2<f64>>
where
    M: Mesh,
    R: Rng + ?Sized,
{
    if !pdf_max.is_finite() || pdf_max <= 0.0 {
        return Err(PicError::ConfigError(format!(
            "pdf_max must be finite and > 0, got {pdf_max}"
        )));
    }
    let mesh = locator.mesh();
    let dim = mesh.dim();
    let (lo, hi) = mesh.bounding_box();
    for k in 0..dim {
        if !(lo[k] < hi[k]) {
            return Err(PicError::ConfigError(format!(
                "degenerate bounding box along axis {k}: [{}, {}]",
                lo[k], hi[k]
            )));
        }
    }

    let mut out = Array2::zeros((n, dim));
    let mut accepted = 0usize;
    let mut attempts = 0usize;
    let budget = n.saturating_mul(MAX_REJECTION_FACTOR).max(MAX_REJECTION_FACTOR);
    while accepted < n {
        attempts += 1;
        if attempts > budget {
            return Err(PicError::ConfigError(format!(
                "rejection sampling accepted only {accepted} of {n} points in {budget} \
                 attempts; check the density profile and its pdf_max bound"
            )));
        }

        let mut x = [0.0; 3];
        for k in 0..dim {
            x[k] = rng.gen_range(lo[k]..hi[k]);
        }
        if locator.locate(&x).is_none() {
            continue;
        }
        if let Some(pdf) = pdf {
            let density = pdf(&x[..dim]);
            if !density.is_finite() || density < 0.0 {
                return Err(PicError::ConfigError(format!(
                    "density profile returned {density} at {:?}",
                    &x[..dim]
                )));
            }
            if rng.gen_range(0.0..pdf_max) >= density {
                continue;
            }
        }
        for k in 0..dim {
            out[[accepted, k]] = x[k];
        }
        accepted += 1;
    }
    Ok(out)
}

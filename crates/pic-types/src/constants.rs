// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Electron mass (kg)
pub const M_ELECTRON: f64 = 9.10938188e-31;

/// Elementary charge (C)
pub const Q_ELEMENTARY: f64 = 1.60217646e-19;

/// Vacuum permittivity (F/m)
pub const EPSILON_0: f64 = 8.854187817e-12;

/// Proton-to-electron mass ratio (dimensionless)
pub const MASS_RATIO_PROTON: f64 = 1836.15267389;

/// Default number of macro-particles loaded per mesh cell
pub const DEFAULT_NUM_PER_CELL: usize = 16;

/// Boundary marker value reserved for "interior facet, no marker".
/// Real boundary markers start at 1.
pub const MARKER_NONE: u32 = 0;

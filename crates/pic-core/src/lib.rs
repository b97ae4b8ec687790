// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Particle population container and cell-relocation engine.
//!
//! Charged macro-particles move continuously through a fixed
//! unstructured mesh; each timestep they are reassigned to the cell
//! that geometrically contains them, and particles crossing the outer
//! boundary or an embedded absorbing body are removed, depositing
//! their charge on that body.

pub mod locator;
pub mod mesh;
pub mod population;
pub mod sampling;
pub mod snapshot;
pub mod species;
pub mod topology;

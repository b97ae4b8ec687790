// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Species Registry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Species bookkeeping and unit normalization.
//!
//! The first registered species is the normalization reference: under
//! the plasma-parameter policies its angular plasma frequency is
//! scaled to one by a single statistical weight applied to every
//! species' charge and mass,
//!
//!   w = (V / N_ref) · (m_ref / q_ref²),
//!
//! with V the mesh volume and N_ref the reference particle count.

use pic_types::config::{NormalizationPolicy, SpeciesConfig};
use pic_types::constants::{EPSILON_0, M_ELECTRON, Q_ELEMENTARY};
use pic_types::error::{PicError, PicResult};

/// One species after registration. Raw fields are in physical input
/// units (elementary charges, electron masses); the unprefixed fields
/// are in simulation units.
#[derive(Debug, Clone)]
pub struct Species {
    pub charge_raw: f64,
    pub mass_raw: f64,
    pub v_thermal_raw: f64,
    pub temperature_raw: Option<f64>,
    pub v_drift_raw: [f64; 3],
    pub num_per_cell: usize,
    pub num_total: usize,

    pub charge: f64,
    pub mass: f64,
    pub v_thermal: f64,
    pub v_drift: [f64; 3],
}

/// Handle to a registered species (its registration index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeciesHandle(pub(crate) usize);

impl SpeciesHandle {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Physical-unit conversion factors derived from a physical plasma
/// frequency and Debye length. Read-only utility, no mutable state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenormFactors {
    pub time: f64,
    pub length: f64,
    pub charge: f64,
    pub mass: f64,
    pub velocity: f64,
    pub charge_density: f64,
    pub potential: f64,
    pub current: f64,
}

/// Ordered species collection with the normalization policy fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct SpeciesRegistry {
    species: Vec<Species>,
    policy: NormalizationPolicy,
    volume: f64,
    num_cells: usize,
    weight: f64,
}

impl SpeciesRegistry {
    pub fn new(volume: f64, num_cells: usize, policy: NormalizationPolicy) -> PicResult<Self> {
        if !volume.is_finite() || volume <= 0.0 {
            return Err(PicError::ConfigError(format!(
                "mesh volume must be finite and > 0, got {volume}"
            )));
        }
        if num_cells == 0 {
            return Err(PicError::ConfigError(
                "species registry requires a mesh with at least one cell".to_string(),
            ));
        }
        Ok(SpeciesRegistry {
            species: Vec::new(),
            policy,
            volume,
            num_cells,
            weight: 1.0,
        })
    }

    /// Register a species and normalize it under the registry policy.
    pub fn register(&mut self, config: &SpeciesConfig) -> PicResult<SpeciesHandle> {
        config.validate()?;

        let num_total = config
            .num_total
            .unwrap_or(config.num_per_cell * self.num_cells);
        let raw = Species {
            charge_raw: config.kind.raw_charge(),
            mass_raw: config.kind.raw_mass(),
            v_thermal_raw: config.v_thermal.unwrap_or(0.0),
            temperature_raw: config.temperature,
            v_drift_raw: config.v_drift.unwrap_or([0.0; 3]),
            num_per_cell: config.num_per_cell,
            num_total,
            charge: config.kind.raw_charge(),
            mass: config.kind.raw_mass(),
            v_thermal: config.v_thermal.unwrap_or(0.0),
            v_drift: config.v_drift.unwrap_or([0.0; 3]),
        };
        self.species.push(raw);
        let idx = self.species.len() - 1;

        match self.policy {
            NormalizationPolicy::Identity => {
                self.weight = 1.0;
            }
            NormalizationPolicy::PlasmaParams => self.normalize_plasma_params(idx)?,
            NormalizationPolicy::ParticleScaling => self.normalize_particle_scaling(idx)?,
        }
        Ok(SpeciesHandle(idx))
    }

    /// Plasma-parameter normalization: unit reference plasma frequency
    /// and, with temperatures, unit reference thermal velocity.
    fn normalize_plasma_params(&mut self, idx: usize) -> PicResult<()> {
        self.apply_weight(idx);

        let ref_temperature = self.species[0].temperature_raw;
        let ref_v_thermal_raw = self.species[0].v_thermal_raw;

        match (ref_temperature, self.species[idx].temperature_raw) {
            (Some(t_ref), Some(_)) => {
                // Thermal velocities follow from temperatures relative
                // to the reference species:
                //   v_th = v_th_ref · sqrt((T / T_ref) · (m_ref / m)).
                if t_ref <= 0.0 {
                    return Err(PicError::ConfigError(
                        "reference species temperature must be > 0".to_string(),
                    ));
                }
                let m_ref = self.species[0].mass_raw;
                self.species[0].v_thermal = 1.0;
                for s in &mut self.species {
                    let t = s.temperature_raw.ok_or_else(|| {
                        PicError::ConfigError(
                            "temperature must be specified for every species or none".to_string(),
                        )
                    })?;
                    s.v_thermal = (t / t_ref * m_ref / s.mass_raw).sqrt();
                }
            }
            (None, None) => {
                if self.species[idx].v_thermal_raw == 0.0 {
                    self.species[idx].v_thermal = 0.0;
                } else {
                    if ref_v_thermal_raw == 0.0 {
                        return Err(PicError::ConfigError(
                            "cannot scale a thermal velocity against a cold reference species"
                                .to_string(),
                        ));
                    }
                    self.species[idx].v_thermal =
                        self.species[idx].v_thermal_raw / ref_v_thermal_raw;
                }
            }
            _ => {
                return Err(PicError::ConfigError(
                    "temperature must be specified for every species or none".to_string(),
                ));
            }
        }

        let drift_raw = self.species[idx].v_drift_raw;
        if drift_raw.iter().all(|&c| c == 0.0) {
            self.species[idx].v_drift = [0.0; 3];
        } else {
            if ref_v_thermal_raw == 0.0 {
                return Err(PicError::ConfigError(
                    "cannot scale a drift velocity against a cold reference species".to_string(),
                ));
            }
            self.species[idx].v_drift = drift_raw.map(|c| c / ref_v_thermal_raw);
        }
        Ok(())
    }

    /// Particle-weight scaling: same charge/mass weight as the
    /// plasma-parameter policy, velocities already in mesh units.
    fn normalize_particle_scaling(&mut self, idx: usize) -> PicResult<()> {
        if self.species[idx].temperature_raw.is_some() {
            return Err(PicError::ConfigError(
                "particle-scaling normalization does not support temperatures".to_string(),
            ));
        }
        self.apply_weight(idx);
        self.species[idx].v_thermal = self.species[idx].v_thermal_raw;
        self.species[idx].v_drift = self.species[idx].v_drift_raw;
        Ok(())
    }

    fn apply_weight(&mut self, idx: usize) {
        let reference = &self.species[0];
        self.weight = (self.volume / reference.num_total as f64)
            * (reference.mass_raw / reference.charge_raw.powi(2));
        self.species[idx].charge = self.weight * self.species[idx].charge_raw;
        self.species[idx].mass = self.weight * self.species[idx].mass_raw;
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn get(&self, handle: SpeciesHandle) -> &Species {
        &self.species[handle.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    pub fn policy(&self) -> NormalizationPolicy {
        self.policy
    }

    /// Statistical weight derived from the reference species.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Multiplicative factors dimensionalizing simulation units to SI,
    /// from the physical angular plasma frequency [rad/s], the
    /// physical Debye length [m], and the Debye length in mesh units.
    pub fn denorm_factors(
        &self,
        phys_plasma_freq: f64,
        phys_debye: f64,
        sim_debye: f64,
    ) -> PicResult<DenormFactors> {
        if self.species.is_empty() {
            return Err(PicError::ConfigError(
                "denormalization requires a registered reference species".to_string(),
            ));
        }
        for (name, v) in [
            ("phys_plasma_freq", phys_plasma_freq),
            ("phys_debye", phys_debye),
            ("sim_debye", sim_debye),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(PicError::ConfigError(format!(
                    "{name} must be finite and > 0, got {v}"
                )));
            }
        }

        let reference = &self.species[0];
        let ref_charge_si = Q_ELEMENTARY * reference.charge_raw;
        let ref_mass_si = M_ELECTRON * reference.mass_raw;
        let qm_ratio = (reference.charge / reference.mass) / (ref_charge_si / ref_mass_si);

        let time = 1.0 / phys_plasma_freq;
        let length = phys_debye / sim_debye;
        Ok(DenormFactors {
            time,
            length,
            charge: ref_charge_si / reference.charge,
            mass: ref_mass_si / reference.mass,
            velocity: length / time,
            charge_density: qm_ratio * EPSILON_0 / (time * time),
            potential: qm_ratio * (length / time).powi(2),
            current: (EPSILON_0 / qm_ratio) * length.powi(3) / time.powi(4),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(policy: NormalizationPolicy) -> SpeciesRegistry {
        SpeciesRegistry::new(2.0, 64, policy).expect("registry")
    }

    #[test]
    fn test_identity_keeps_raw_values() {
        let mut reg = registry(NormalizationPolicy::Identity);
        let h = reg
            .register(&SpeciesConfig::custom(-2.0, 3.0).with_thermal_velocity(0.5))
            .expect("register");
        let s = reg.get(h);
        assert_eq!(s.charge, -2.0);
        assert_eq!(s.mass, 3.0);
        assert_eq!(s.v_thermal, 0.5);
        assert_eq!(reg.weight(), 1.0);
    }

    #[test]
    fn test_num_total_defaults_to_per_cell_times_cells() {
        let mut reg = registry(NormalizationPolicy::Identity);
        let h = reg.register(&SpeciesConfig::electron()).expect("register");
        assert_eq!(reg.get(h).num_total, 16 * 64);
        let h = reg
            .register(&SpeciesConfig::proton().with_num_total(100))
            .expect("register");
        assert_eq!(reg.get(h).num_total, 100);
    }

    #[test]
    fn test_plasma_params_weight_formula_cold_species() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        let h = reg
            .register(&SpeciesConfig::electron().with_num_total(1000))
            .expect("register");
        // w = V/N · m/q² = 2/1000 · 1/1 = 2e-3.
        let w = 2.0e-3;
        assert!((reg.weight() - w).abs() < 1e-15);
        let s = reg.get(h);
        assert!((s.charge - (-w)).abs() < 1e-15);
        assert!((s.mass - w).abs() < 1e-15);
        assert_eq!(s.v_thermal, 0.0);
        assert_eq!(s.v_drift, [0.0; 3]);
    }

    #[test]
    fn test_plasma_params_scales_second_species_with_reference_weight() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron().with_num_total(1000))
            .expect("electron");
        let h = reg
            .register(&SpeciesConfig::proton().with_num_total(500))
            .expect("proton");
        let w = 2.0e-3;
        let s = reg.get(h);
        assert!((s.charge - w).abs() < 1e-15);
        assert!((s.mass - w * 1836.15267389).abs() < 1e-10);
    }

    #[test]
    fn test_plasma_params_thermal_velocity_ratio() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron().with_thermal_velocity(2.0))
            .expect("electron");
        let h = reg
            .register(&SpeciesConfig::proton().with_thermal_velocity(0.5))
            .expect("proton");
        assert!((reg.get(h).v_thermal - 0.25).abs() < 1e-15);
        // The cold companion stays cold.
        let h = reg
            .register(&SpeciesConfig::custom(1.0, 10.0))
            .expect("cold");
        assert_eq!(reg.get(h).v_thermal, 0.0);
    }

    #[test]
    fn test_plasma_params_temperature_derivation() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        let he = reg
            .register(&SpeciesConfig::electron().with_temperature(1.0))
            .expect("electron");
        let hp = reg
            .register(&SpeciesConfig::proton().with_temperature(4.0))
            .expect("proton");
        assert_eq!(reg.get(he).v_thermal, 1.0);
        // v_th,p = sqrt((4/1) · (1/1836.15267389)).
        let expected = (4.0 / 1836.15267389f64).sqrt();
        assert!((reg.get(hp).v_thermal - expected).abs() < 1e-12);
    }

    #[test]
    fn test_plasma_params_temperature_all_or_none() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron().with_temperature(1.0))
            .expect("electron");
        let err = reg.register(&SpeciesConfig::proton()).unwrap_err();
        match err {
            PicError::ConfigError(msg) => assert!(msg.contains("every species or none")),
            other => panic!("Unexpected error: {other:?}"),
        }

        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron()).expect("electron");
        assert!(reg
            .register(&SpeciesConfig::proton().with_temperature(1.0))
            .is_err());
    }

    #[test]
    fn test_plasma_params_drift_scaled_by_reference_thermal() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron().with_thermal_velocity(2.0))
            .expect("electron");
        let h = reg
            .register(&SpeciesConfig::proton().with_drift_velocity([1.0, -4.0, 0.0]))
            .expect("proton");
        assert_eq!(reg.get(h).v_drift, [0.5, -2.0, 0.0]);
    }

    #[test]
    fn test_cold_reference_cannot_scale_velocities() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron()).expect("electron");
        assert!(reg
            .register(&SpeciesConfig::proton().with_thermal_velocity(1.0))
            .is_err());
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron()).expect("electron");
        assert!(reg
            .register(&SpeciesConfig::proton().with_drift_velocity([1.0, 0.0, 0.0]))
            .is_err());
    }

    #[test]
    fn test_particle_scaling_keeps_velocities_rejects_temperature() {
        let mut reg = registry(NormalizationPolicy::ParticleScaling);
        let h = reg
            .register(
                &SpeciesConfig::electron()
                    .with_thermal_velocity(0.3)
                    .with_drift_velocity([0.1, 0.0, 0.0])
                    .with_num_total(1000),
            )
            .expect("electron");
        let s = reg.get(h);
        assert_eq!(s.v_thermal, 0.3);
        assert_eq!(s.v_drift, [0.1, 0.0, 0.0]);
        assert!((s.charge - (-2.0e-3)).abs() < 1e-15);

        let err = reg
            .register(&SpeciesConfig::proton().with_temperature(1.0))
            .unwrap_err();
        match err {
            PicError::ConfigError(msg) => assert!(msg.contains("does not support temperatures")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_denorm_factors_consistency() {
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron().with_num_total(1000))
            .expect("electron");
        let f = reg.denorm_factors(5.64e4, 7.43e-3, 1.0).expect("factors");
        assert!((f.time - 1.0 / 5.64e4).abs() < 1e-12);
        assert!((f.length - 7.43e-3).abs() < 1e-15);
        assert!((f.velocity - f.length / f.time).abs() < 1e-12);
        assert!((f.potential - (f.length / f.time).powi(2) * f.charge_density * f.time * f.time / EPSILON_0)
            .abs()
            < f.potential.abs() * 1e-12);
        assert!(f.current > 0.0);
    }

    #[test]
    fn test_denorm_requires_reference_and_valid_inputs() {
        let reg = registry(NormalizationPolicy::PlasmaParams);
        assert!(reg.denorm_factors(1.0, 1.0, 1.0).is_err());
        let mut reg = registry(NormalizationPolicy::PlasmaParams);
        reg.register(&SpeciesConfig::electron()).expect("electron");
        assert!(reg.denorm_factors(0.0, 1.0, 1.0).is_err());
        assert!(reg.denorm_factors(1.0, -1.0, 1.0).is_err());
        assert!(reg.denorm_factors(1.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_registry_rejects_degenerate_mesh() {
        assert!(SpeciesRegistry::new(0.0, 10, NormalizationPolicy::Identity).is_err());
        assert!(SpeciesRegistry::new(1.0, 0, NormalizationPolicy::Identity).is_err());
    }
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Plasma PIC — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_NUM_PER_CELL, MASS_RATIO_PROTON};
use crate::error::{PicError, PicResult};

/// Unit-normalization policy, fixed at species-registry construction.
///
/// `PlasmaParams` scales the reference species so its angular plasma
/// frequency and thermal velocity are one (hence a Debye length of one).
/// `ParticleScaling` applies the same statistical weight to charge and
/// mass but leaves velocities in mesh units, so the geometry-to-Debye
/// ratio can be changed without remeshing. `Identity` uses all values
/// as supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizationPolicy {
    Identity,
    PlasmaParams,
    ParticleScaling,
}

/// Species identity: a built-in preset or an explicit (charge, mass)
/// pair in elementary charges and electron masses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesKind {
    Electron,
    Proton,
    Custom { charge: f64, mass: f64 },
}

impl SpeciesKind {
    /// Raw charge in elementary charges.
    pub fn raw_charge(&self) -> f64 {
        match self {
            SpeciesKind::Electron => -1.0,
            SpeciesKind::Proton => 1.0,
            SpeciesKind::Custom { charge, .. } => *charge,
        }
    }

    /// Raw mass in electron masses.
    pub fn raw_mass(&self) -> f64 {
        match self {
            SpeciesKind::Electron => 1.0,
            SpeciesKind::Proton => MASS_RATIO_PROTON,
            SpeciesKind::Custom { mass, .. } => *mass,
        }
    }
}

/// Per-species setup record.
///
/// Thermal velocity and temperature are mutually exclusive; `num_total`
/// overrides `num_per_cell` when given. Validation happens at
/// construction time via [`SpeciesConfig::validate`], not at use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub kind: SpeciesKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_thermal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_drift: Option<[f64; 3]>,
    #[serde(default = "default_num_per_cell")]
    pub num_per_cell: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_total: Option<usize>,
}

fn default_num_per_cell() -> usize {
    DEFAULT_NUM_PER_CELL
}

impl SpeciesConfig {
    pub fn new(kind: SpeciesKind) -> Self {
        SpeciesConfig {
            kind,
            v_thermal: None,
            temperature: None,
            v_drift: None,
            num_per_cell: DEFAULT_NUM_PER_CELL,
            num_total: None,
        }
    }

    pub fn electron() -> Self {
        Self::new(SpeciesKind::Electron)
    }

    pub fn proton() -> Self {
        Self::new(SpeciesKind::Proton)
    }

    pub fn custom(charge: f64, mass: f64) -> Self {
        Self::new(SpeciesKind::Custom { charge, mass })
    }

    pub fn with_thermal_velocity(mut self, v_thermal: f64) -> Self {
        self.v_thermal = Some(v_thermal);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_drift_velocity(mut self, v_drift: [f64; 3]) -> Self {
        self.v_drift = Some(v_drift);
        self
    }

    pub fn with_num_per_cell(mut self, num_per_cell: usize) -> Self {
        self.num_per_cell = num_per_cell;
        self
    }

    pub fn with_num_total(mut self, num_total: usize) -> Self {
        self.num_total = Some(num_total);
        self
    }

    /// Check the record for fatal misconfiguration.
    pub fn validate(&self) -> PicResult<()> {
        let charge = self.kind.raw_charge();
        let mass = self.kind.raw_mass();
        if !charge.is_finite() || charge == 0.0 {
            return Err(PicError::ConfigError(format!(
                "species charge must be finite and nonzero, got {charge}"
            )));
        }
        if !mass.is_finite() || mass == 0.0 {
            return Err(PicError::ConfigError(format!(
                "species mass must be finite and nonzero, got {mass}"
            )));
        }
        if self.v_thermal.is_some() && self.temperature.is_some() {
            return Err(PicError::ConfigError(
                "thermal velocity and temperature are mutually exclusive".to_string(),
            ));
        }
        if let Some(v) = self.v_thermal {
            if !v.is_finite() || v < 0.0 {
                return Err(PicError::ConfigError(format!(
                    "thermal velocity must be finite and >= 0, got {v}"
                )));
            }
        }
        if let Some(t) = self.temperature {
            if !t.is_finite() || t < 0.0 {
                return Err(PicError::ConfigError(format!(
                    "temperature must be finite and >= 0, got {t}"
                )));
            }
        }
        if let Some(v) = self.v_drift {
            if v.iter().any(|c| !c.is_finite()) {
                return Err(PicError::ConfigError(
                    "drift velocity components must be finite".to_string(),
                ));
            }
        }
        if self.num_total.is_none() && self.num_per_cell == 0 {
            return Err(PicError::ConfigError(
                "num_per_cell must be >= 1 when num_total is not given".to_string(),
            ));
        }
        if let Some(n) = self.num_total {
            if n == 0 {
                return Err(PicError::ConfigError(
                    "num_total must be >= 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Top-level population setup: the normalization policy and the species
/// list, in registration order (the first species is the normalization
/// reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub normalization: NormalizationPolicy,
    pub species: Vec<SpeciesConfig>,
}

impl PopulationConfig {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> PicResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        for s in &config.species {
            s.validate()?;
        }
        Ok(config)
    }
}

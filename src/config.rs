//! TOML run configuration.
//!
//! Every section is optional; missing values fall back to the constrained
//! Lennard-Jones sample (50^3 box, 30 particles, `min_dist` 0.9, kT 1).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::vector::{Vec3, DIM};
use crate::error::{Error, Result};
use crate::warmup::WarmupConfig;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub warmup: WarmupSection,
    #[serde(default)]
    pub thermostat: ThermostatConfig,
    #[serde(default)]
    pub production: ProductionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemConfig {
    pub box_length: Vec3,
    pub time_step: f64,
    /// Neighbor-list margin.
    pub skin: f64,
    pub seed: u64,
    pub num_particles: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            box_length: [50.0; DIM],
            time_step: 0.01,
            skin: 10.0,
            seed: 1234,
            num_particles: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarmupSection {
    pub min_dist: f64,
    pub warm_steps: u64,
    /// Ceiling on overlap-removal blocks.
    pub warm_n_times: usize,
    pub initial_force_cap: f64,
}

impl Default for WarmupSection {
    fn default() -> Self {
        Self {
            min_dist: 0.9,
            warm_steps: 200,
            warm_n_times: 100,
            initial_force_cap: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermostatConfig {
    pub kt: f64,
    pub gamma: f64,
    pub temperature_increment: f64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            kt: 1.0,
            gamma: 1.0,
            temperature_increment: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductionConfig {
    pub blocks: usize,
    pub steps_per_block: u64,
}

impl Default for ProductionConfig {
    fn default() -> Self {
        Self {
            blocks: 300,
            steps_per_block: 1000,
        }
    }
}

impl RunConfig {
    /// Parse and validate.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loaded run configuration from {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    /// Reject configurations the engine or the warmup controller cannot run.
    pub fn validate(&self) -> Result<()> {
        let s = &self.system;
        if !s.box_length.iter().all(|&l| l.is_finite() && l > 0.0) {
            return Err(Error::InvalidParam(
                "system.box_length components must be finite and > 0".into(),
            ));
        }
        if !s.time_step.is_finite() || s.time_step <= 0.0 {
            return Err(Error::InvalidParam("system.time_step must be finite and > 0".into()));
        }
        if !s.skin.is_finite() || s.skin < 0.0 {
            return Err(Error::InvalidParam("system.skin must be finite and >= 0".into()));
        }
        if s.num_particles == 0 {
            return Err(Error::InvalidParam("system.num_particles must be > 0".into()));
        }
        if self.warmup.warm_n_times == 0 {
            return Err(Error::InvalidParam("warmup.warm_n_times must be > 0".into()));
        }
        self.warmup_config().validate()
    }

    /// Warmup controller parameters.
    pub fn warmup_config(&self) -> WarmupConfig {
        WarmupConfig {
            min_dist: self.warmup.min_dist,
            kt_target: self.thermostat.kt,
            gamma: self.thermostat.gamma,
            warm_steps: self.warmup.warm_steps,
            initial_force_cap: self.warmup.initial_force_cap,
            temperature_increment: self.thermostat.temperature_increment,
            max_iterations: self.warmup.warm_n_times,
        }
    }
}

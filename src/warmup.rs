//! Warmup of an overlapping, wall-bounded configuration.
//!
//! The controller runs in three phases against a [`Dynamics`] engine:
//!
//! 1. **Overlap removal** at zero temperature with a force cap that grows by
//!    one per block, until the closest particle pair and every wall are at least
//!    `min_dist` apart.
//! 2. **Uncapped relaxation**: one block with the cap removed.
//! 3. **Temperature ramp** from 0 to the target in fixed increments.
//!
//! Overlap removal is bounded by `max_iterations` blocks and reports
//! [`Error::Convergence`] instead of looping forever.

use crate::core::engine::{ConstraintHandle, Dynamics, Thermostat};
use crate::error::{Error, Result};

/// Relative slack when comparing accumulated ramp temperatures to the target.
const RAMP_SLACK: f64 = 1e-9;

/// Most thermostat blocks a temperature ramp may take.
pub const MAX_RAMP_BLOCKS: u64 = 100_000;

/// Parameters of a warmup run.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupConfig {
    /// Required separation between particles and from every wall.
    pub min_dist: f64,
    /// Final thermostat temperature.
    pub kt_target: f64,
    /// Langevin friction used throughout.
    pub gamma: f64,
    /// Integration steps per block.
    pub warm_steps: u64,
    /// Force cap applied to the first overlap-removal block.
    pub initial_force_cap: f64,
    /// Temperature step of the ramp.
    pub temperature_increment: f64,
    /// Ceiling on overlap-removal blocks.
    pub max_iterations: usize,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            min_dist: 0.9,
            kt_target: 1.0,
            gamma: 1.0,
            warm_steps: 200,
            initial_force_cap: 5.0,
            temperature_increment: 0.1,
            max_iterations: 100,
        }
    }
}

impl WarmupConfig {
    /// Errors: `Error::InvalidParam` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !self.min_dist.is_finite() || self.min_dist <= 0.0 {
            return Err(Error::InvalidParam("min_dist must be finite and > 0".into()));
        }
        if !self.kt_target.is_finite() || self.kt_target < 0.0 {
            return Err(Error::InvalidParam("kt_target must be finite and >= 0".into()));
        }
        if !self.gamma.is_finite() || self.gamma <= 0.0 {
            return Err(Error::InvalidParam("gamma must be finite and > 0".into()));
        }
        if self.warm_steps == 0 {
            return Err(Error::InvalidParam("warm_steps must be > 0".into()));
        }
        if !self.initial_force_cap.is_finite() || self.initial_force_cap < 0.0 {
            return Err(Error::InvalidParam(
                "initial_force_cap must be finite and >= 0".into(),
            ));
        }
        if !self.temperature_increment.is_finite() || self.temperature_increment <= 0.0 {
            return Err(Error::InvalidParam(
                "temperature_increment must be finite and > 0".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidParam("max_iterations must be > 0".into()));
        }
        if self.kt_target / self.temperature_increment > MAX_RAMP_BLOCKS as f64 {
            return Err(Error::InvalidParam(format!(
                "kt_target / temperature_increment must be <= {MAX_RAMP_BLOCKS} ramp blocks"
            )));
        }
        Ok(())
    }
}

/// Where the controller is in its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupPhase {
    Pending,
    RemovingOverlaps,
    Relaxing,
    Ramping,
    Done,
}

/// One distance measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MinDistances {
    /// Minimum pairwise particle separation.
    pub particles: f64,
    /// Minimum distance to each tracked wall, in registration order.
    pub walls: Vec<f64>,
}

impl MinDistances {
    /// Smallest of all measured distances.
    pub fn smallest(&self) -> f64 {
        self.walls.iter().copied().fold(self.particles, f64::min)
    }

    /// True when every distance is at least `min_dist` (NaN never satisfies).
    pub fn satisfies(&self, min_dist: f64) -> bool {
        self.particles >= min_dist && self.walls.iter().all(|&d| d >= min_dist)
    }
}

/// Mutable state of a warmup run.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupState {
    /// Current force cap (0 = uncapped).
    pub force_cap: f64,
    /// Current thermostat temperature.
    pub temperature: f64,
    /// Overlap-removal blocks run so far.
    pub iteration: usize,
    /// Integration steps issued so far.
    pub steps_run: u64,
    pub phase: WarmupPhase,
    /// Most recent measurement, if any.
    pub distances: Option<MinDistances>,
}

/// Summary of a completed warmup.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupReport {
    pub iterations: usize,
    pub steps_run: u64,
    /// Every force cap applied, in order; the last entry is the reset to 0.
    pub cap_history: Vec<f64>,
    /// Every thermostat temperature applied, in order.
    pub temperature_history: Vec<f64>,
    /// Distances measured when overlap removal converged.
    pub final_distances: MinDistances,
}

/// Drives the warmup schedule against an engine.
#[derive(Debug, Clone)]
pub struct WarmupController {
    config: WarmupConfig,
    walls: Vec<ConstraintHandle>,
    state: WarmupState,
    cap_history: Vec<f64>,
    temperature_history: Vec<f64>,
}

impl WarmupController {
    /// `walls` are the wall constraints whose distance takes part in the convergence test.
    pub fn new(config: WarmupConfig, walls: Vec<ConstraintHandle>) -> Result<Self> {
        config.validate()?;
        let state = WarmupState {
            force_cap: config.initial_force_cap,
            temperature: 0.0,
            iteration: 0,
            steps_run: 0,
            phase: WarmupPhase::Pending,
            distances: None,
        };
        Ok(Self {
            config,
            walls,
            state,
            cap_history: Vec::new(),
            temperature_history: Vec::new(),
        })
    }

    pub fn config(&self) -> &WarmupConfig {
        &self.config
    }

    pub fn state(&self) -> &WarmupState {
        &self.state
    }

    /// Whether the last measurement meets `min_dist` everywhere.
    pub fn is_converged(&self) -> bool {
        self.state
            .distances
            .as_ref()
            .is_some_and(|d| d.satisfies(self.config.min_dist))
    }

    /// Zero-temperature thermostat, initial force cap, first measurement.
    pub fn begin<D: Dynamics + ?Sized>(&mut self, engine: &mut D) -> Result<()> {
        self.apply_temperature(engine, 0.0)?;
        self.apply_force_cap(engine, self.config.initial_force_cap)?;
        self.state.distances = Some(self.measure(engine)?);
        self.state.phase = WarmupPhase::RemovingOverlaps;
        log::info!(
            "warmup: removing overlaps (target min_dist {}, initial cap {})",
            self.config.min_dist,
            self.config.initial_force_cap
        );
        Ok(())
    }

    /// Minimum particle-particle distance and minimum distance to every tracked wall.
    pub fn measure<D: Dynamics + ?Sized>(&self, engine: &D) -> Result<MinDistances> {
        let particles = engine.min_particle_distance()?;
        let walls = self
            .walls
            .iter()
            .map(|&h| engine.constraint_min_distance(h))
            .collect::<Result<Vec<_>>>()?;
        Ok(MinDistances { particles, walls })
    }

    /// Run one capped block of `warm_steps + cap` steps and re-measure.
    ///
    /// If the configuration is still too close, the cap is raised by one and
    /// applied for the next block. Returns whether the configuration converged.
    pub fn advance_warmup<D: Dynamics + ?Sized>(&mut self, engine: &mut D) -> Result<bool> {
        if self.state.phase == WarmupPhase::Pending {
            self.begin(engine)?;
        }
        if self.state.phase != WarmupPhase::RemovingOverlaps {
            return Err(Error::InvalidParam(format!(
                "advance_warmup called in phase {:?}",
                self.state.phase
            )));
        }
        // capped forces are weaker; give them proportionally more steps
        let extra = self.state.force_cap.ceil();
        let steps = (extra < u64::MAX as f64)
            .then_some(extra as u64)
            .and_then(|extra| self.config.warm_steps.checked_add(extra))
            .ok_or_else(|| {
                Error::InvalidParam(format!(
                    "block of {} + force cap {} steps overflows",
                    self.config.warm_steps, self.state.force_cap
                ))
            })?;
        self.integrate(engine, steps)?;
        self.state.iteration += 1;

        let distances = self.measure(engine)?;
        log::debug!(
            "warmup block {}: cap {}, particle min_dist {}, wall min_dists {:?}",
            self.state.iteration,
            self.state.force_cap,
            distances.particles,
            distances.walls
        );
        self.state.distances = Some(distances);
        if self.is_converged() {
            return Ok(true);
        }
        self.apply_force_cap(engine, self.state.force_cap + 1.0)?;
        Ok(false)
    }

    /// Repeat [`advance_warmup`](Self::advance_warmup) until converged.
    ///
    /// Errors: `Error::Convergence` after `max_iterations` unsuccessful blocks.
    pub fn remove_overlaps<D: Dynamics + ?Sized>(&mut self, engine: &mut D) -> Result<()> {
        if self.state.phase == WarmupPhase::Pending {
            self.begin(engine)?;
        }
        while !self.is_converged() {
            if self.state.iteration >= self.config.max_iterations {
                let min_distance = self
                    .state
                    .distances
                    .as_ref()
                    .map_or(f64::NAN, MinDistances::smallest);
                log::warn!(
                    "warmup: no convergence after {} blocks (smallest distance {})",
                    self.state.iteration,
                    min_distance
                );
                return Err(Error::Convergence {
                    iterations: self.state.iteration,
                    force_cap: self.state.force_cap,
                    min_distance,
                    target: self.config.min_dist,
                });
            }
            self.advance_warmup(engine)?;
        }
        log::info!(
            "warmup: overlaps removed after {} blocks (cap {})",
            self.state.iteration,
            self.state.force_cap
        );
        Ok(())
    }

    /// Remove the force cap and run one block at natural force magnitude.
    pub fn relax_uncapped<D: Dynamics + ?Sized>(&mut self, engine: &mut D) -> Result<()> {
        self.state.phase = WarmupPhase::Relaxing;
        self.apply_force_cap(engine, 0.0)?;
        self.integrate(engine, self.config.warm_steps)
    }

    /// Raise the thermostat from 0 to the target in fixed increments, one block each,
    /// then one final block exactly at the target.
    pub fn ramp_temperature<D: Dynamics + ?Sized>(&mut self, engine: &mut D) -> Result<()> {
        self.state.phase = WarmupPhase::Ramping;
        let target = self.config.kt_target;
        let limit = target - RAMP_SLACK * target.max(1.0);
        // k * increment rather than a running sum, so 10 x 0.1 lands on 1.0
        for k in 0..MAX_RAMP_BLOCKS {
            let kt = k as f64 * self.config.temperature_increment;
            if kt >= limit {
                break;
            }
            self.apply_temperature(engine, kt)?;
            self.integrate(engine, self.config.warm_steps)?;
        }
        self.apply_temperature(engine, target)?;
        self.integrate(engine, self.config.warm_steps)?;
        self.state.phase = WarmupPhase::Done;
        log::info!(
            "warmup: done at kT {} after {} steps",
            target,
            self.state.steps_run
        );
        Ok(())
    }

    /// The whole schedule.
    pub fn run<D: Dynamics + ?Sized>(&mut self, engine: &mut D) -> Result<WarmupReport> {
        self.remove_overlaps(engine)?;
        let final_distances = self.state.distances.clone().ok_or_else(|| {
            Error::Engine("no distance measurement after overlap removal".into())
        })?;
        self.relax_uncapped(engine)?;
        self.ramp_temperature(engine)?;
        Ok(WarmupReport {
            iterations: self.state.iteration,
            steps_run: self.state.steps_run,
            cap_history: self.cap_history.clone(),
            temperature_history: self.temperature_history.clone(),
            final_distances,
        })
    }

    // ============ Internal helpers ============

    fn integrate<D: Dynamics + ?Sized>(&mut self, engine: &mut D, steps: u64) -> Result<()> {
        let total = self.state.steps_run.checked_add(steps).ok_or_else(|| {
            Error::InvalidParam(format!(
                "{} steps after {} overflow the step counter",
                steps, self.state.steps_run
            ))
        })?;
        engine.run_integration(steps)?;
        self.state.steps_run = total;
        Ok(())
    }

    fn apply_force_cap<D: Dynamics + ?Sized>(&mut self, engine: &mut D, cap: f64) -> Result<()> {
        engine.set_force_cap(cap)?;
        self.state.force_cap = cap;
        self.cap_history.push(cap);
        Ok(())
    }

    fn apply_temperature<D: Dynamics + ?Sized>(&mut self, engine: &mut D, kt: f64) -> Result<()> {
        engine.set_thermostat(Thermostat::langevin(kt, self.config.gamma))?;
        self.state.temperature = kt;
        self.temperature_history.push(kt);
        Ok(())
    }
}

//! In-memory engine used by the integration tests.
//!
//! Overdamped dynamics (`dx = dt * F / gamma`, no noise) with soft harmonic
//! repulsion between particles and from walls, plus the external fields the
//! crate defines. Deterministic, so warmup tests converge reproducibly.
#![allow(dead_code)]

use mdfield::core::engine::{
    ConstraintHandle, ConstraintSpec, Dynamics, EnergyBreakdown, Engine, ParticleHandle, Thermostat,
};
use mdfield::core::particle::{ParticleSpec, ParticleState};
use mdfield::core::vector::{self, Vec3, ZERO};
use mdfield::error::{Error, Result};
use mdfield::field::ExternalField;

/// Contact distance of the pair repulsion.
pub const SIGMA: f64 = 1.0;
/// Range of the wall repulsion.
pub const WALL_RANGE: f64 = 1.0;
pub const STIFFNESS: f64 = 10.0;

/// Deliberate engine bugs the checker must catch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Electric fields act with the wrong charge sign.
    FlippedCharge,
    /// Flow fields exert no friction.
    NoFlowFriction,
    /// Clearing particles and constraints fails.
    ClearFails,
}

#[derive(Debug)]
pub struct MockEngine {
    particles: Vec<(ParticleHandle, ParticleState)>,
    constraints: Vec<(ConstraintHandle, ConstraintSpec)>,
    next_id: u64,
    pub thermostat: Option<Thermostat>,
    pub force_cap: f64,
    pub time_step: f64,
    pub fault: Option<Fault>,
    /// `kt=`, `cap=` and `run=` entries in call order.
    pub calls: Vec<String>,
    non_bonded: f64,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            particles: Vec::new(),
            constraints: Vec::new(),
            next_id: 0,
            thermostat: None,
            force_cap: 0.0,
            time_step: 0.01,
            fault: None,
            calls: Vec::new(),
            non_bonded: 0.0,
        }
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fault(fault: Fault) -> Self {
        Self {
            fault: Some(fault),
            ..Self::default()
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|(_, p)| p.position).collect()
    }

    /// Every force cap passed to the engine, in order.
    pub fn cap_calls(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|c| c.strip_prefix("cap="))
            .filter_map(|v| v.parse().ok())
            .collect()
    }

    fn fresh_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn gamma(&self) -> f64 {
        match self.thermostat {
            Some(Thermostat::Langevin { gamma, .. }) if gamma > 0.0 => gamma,
            _ => 1.0,
        }
    }

    /// The state an external field sees, with any injected fault applied.
    fn as_seen_by(&self, field: &ExternalField, p: &ParticleState) -> ParticleState {
        let mut seen = p.clone();
        if self.fault == Some(Fault::FlippedCharge)
            && matches!(
                field,
                ExternalField::LinearElectricPotential { .. }
                    | ExternalField::ElectricPotential { .. }
            )
        {
            seen.charge = -seen.charge;
        }
        seen
    }

    fn field_force(&self, field: &ExternalField, p: &ParticleState) -> Result<Vec3> {
        if self.fault == Some(Fault::NoFlowFriction)
            && matches!(
                field,
                ExternalField::FlowField { .. } | ExternalField::HomogeneousFlowField { .. }
            )
        {
            return Ok(ZERO);
        }
        field.force_on(&self.as_seen_by(field, p))
    }

    fn compute_forces(&mut self) -> Result<()> {
        let n = self.particles.len();
        let mut forces = vec![ZERO; n];
        let mut non_bonded = 0.0;

        for i in 0..n {
            for j in (i + 1)..n {
                let d = vector::sub(&self.particles[i].1.position, &self.particles[j].1.position);
                let r = vector::norm(&d);
                if r > 0.0 && r < SIGMA {
                    let f = vector::scale(STIFFNESS * (SIGMA - r) / r, &d);
                    forces[i] = vector::add(&forces[i], &f);
                    forces[j] = vector::sub(&forces[j], &f);
                    non_bonded += 0.5 * STIFFNESS * (SIGMA - r).powi(2);
                }
            }
        }

        for (_, spec) in &self.constraints {
            for (i, (_, p)) in self.particles.iter().enumerate() {
                let f = match spec {
                    ConstraintSpec::Wall(w) => {
                        if !w.applies_to(p.particle_type) {
                            continue;
                        }
                        let s = w.wall.signed_distance(&p.position);
                        if s >= WALL_RANGE {
                            continue;
                        }
                        non_bonded += 0.5 * STIFFNESS * (WALL_RANGE - s).powi(2);
                        vector::scale(STIFFNESS * (WALL_RANGE - s), &w.wall.normal())
                    }
                    ConstraintSpec::Field(field) => self.field_force(field, p)?,
                };
                forces[i] = vector::add(&forces[i], &f);
            }
        }

        if self.force_cap > 0.0 {
            for f in &mut forces {
                let m = vector::norm(f);
                if m > self.force_cap {
                    *f = vector::scale(self.force_cap / m, f);
                }
            }
        }

        for ((_, p), f) in self.particles.iter_mut().zip(forces) {
            p.force = f;
        }
        self.non_bonded = non_bonded;
        Ok(())
    }

    fn find(&self, handle: ParticleHandle) -> Result<&ParticleState> {
        self.particles
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, p)| p)
            .ok_or_else(|| Error::UnknownHandle(format!("particle {}", handle.0)))
    }
}

impl Dynamics for MockEngine {
    fn set_thermostat(&mut self, thermostat: Thermostat) -> Result<()> {
        self.calls.push(format!("kt={}", thermostat.kt()));
        self.thermostat = Some(thermostat);
        Ok(())
    }

    fn set_force_cap(&mut self, cap: f64) -> Result<()> {
        self.calls.push(format!("cap={cap}"));
        self.force_cap = cap;
        Ok(())
    }

    fn run_integration(&mut self, steps: u64) -> Result<()> {
        self.calls.push(format!("run={steps}"));
        self.compute_forces()?;
        let mobility = self.time_step / self.gamma();
        for _ in 0..steps {
            for (_, p) in &mut self.particles {
                p.position = vector::add(&p.position, &vector::scale(mobility, &p.force));
            }
            self.compute_forces()?;
        }
        Ok(())
    }

    fn min_particle_distance(&self) -> Result<f64> {
        let mut min = f64::INFINITY;
        for (i, (_, a)) in self.particles.iter().enumerate() {
            for (_, b) in &self.particles[i + 1..] {
                min = min.min(vector::norm(&vector::sub(&a.position, &b.position)));
            }
        }
        Ok(min)
    }

    fn constraint_min_distance(&self, handle: ConstraintHandle) -> Result<f64> {
        let spec = self
            .constraints
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, c)| c)
            .ok_or_else(|| Error::UnknownHandle(format!("constraint {}", handle.0)))?;
        match spec {
            ConstraintSpec::Wall(w) => Ok(w.min_distance(
                self.particles
                    .iter()
                    .map(|(_, p)| (&p.position, p.particle_type)),
            )),
            ConstraintSpec::Field(f) => Err(Error::InvalidParam(format!(
                "constraint {} is a {} field, not a wall",
                handle.0,
                f.name()
            ))),
        }
    }
}

impl Engine for MockEngine {
    fn create_particle(&mut self, spec: ParticleSpec) -> Result<ParticleHandle> {
        spec.validate()?;
        let handle = ParticleHandle(self.fresh_id());
        self.particles.push((handle, ParticleState::from_spec(&spec)));
        Ok(handle)
    }

    fn add_constraint(&mut self, spec: ConstraintSpec) -> Result<ConstraintHandle> {
        let handle = ConstraintHandle(self.fresh_id());
        self.constraints.push((handle, spec));
        Ok(handle)
    }

    fn total_energy(&self) -> Result<EnergyBreakdown> {
        let kinetic: f64 = self.particles.iter().map(|(_, p)| p.kinetic_energy()).sum();
        let mut external_fields = 0.0;
        for (_, spec) in &self.constraints {
            if let ConstraintSpec::Field(field) = spec {
                for (_, p) in &self.particles {
                    external_fields += field.energy_of(&self.as_seen_by(field, p))?;
                }
            }
        }
        Ok(EnergyBreakdown {
            total: kinetic + external_fields + self.non_bonded,
            kinetic,
            external_fields,
            non_bonded: self.non_bonded,
            bonded: 0.0,
        })
    }

    fn particle_state(&self, handle: ParticleHandle) -> Result<ParticleState> {
        self.find(handle).cloned()
    }

    fn set_particle_position(&mut self, handle: ParticleHandle, position: Vec3) -> Result<()> {
        let p = self
            .particles
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .map(|(_, p)| p)
            .ok_or_else(|| Error::UnknownHandle(format!("particle {}", handle.0)))?;
        p.set_position(position)
    }

    fn clear_constraints(&mut self) -> Result<()> {
        if self.fault == Some(Fault::ClearFails) {
            return Err(Error::Engine("constraint list is locked".into()));
        }
        self.constraints.clear();
        Ok(())
    }

    fn clear_particles(&mut self) -> Result<()> {
        if self.fault == Some(Fault::ClearFails) {
            return Err(Error::Engine("particle list is locked".into()));
        }
        self.particles.clear();
        self.non_bonded = 0.0;
        Ok(())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

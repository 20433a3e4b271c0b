//! The seam between this crate and an external simulation engine.
//!
//! The engine owns particles, constraints, the integrator and the thermostat.
//! Everything here is expressed against two traits: [`Dynamics`], the narrow
//! surface the warmup controller drives, and [`Engine`], which adds particle
//! and constraint management for scenario setup and field verification.

use std::ops::{Deref, DerefMut};

use crate::core::particle::{ParticleSpec, ParticleState};
use crate::core::vector::Vec3;
use crate::core::wall::WallConstraint;
use crate::error::Result;
use crate::field::ExternalField;

/// Opaque engine-assigned particle id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleHandle(pub u64);

/// Opaque engine-assigned constraint id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle(pub u64);

/// Thermostat settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Thermostat {
    /// Langevin thermostat at temperature `kt` (energy units) with friction `gamma`.
    Langevin { kt: f64, gamma: f64 },
}

impl Thermostat {
    pub fn langevin(kt: f64, gamma: f64) -> Self {
        Self::Langevin { kt, gamma }
    }

    pub fn kt(&self) -> f64 {
        match *self {
            Self::Langevin { kt, .. } => kt,
        }
    }
}

/// Keyed energy breakdown reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnergyBreakdown {
    pub total: f64,
    pub kinetic: f64,
    pub external_fields: f64,
    pub non_bonded: f64,
    pub bonded: f64,
}

/// What to add to the engine's constraint list.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintSpec {
    Wall(WallConstraint),
    Field(ExternalField),
}

impl From<WallConstraint> for ConstraintSpec {
    fn from(w: WallConstraint) -> Self {
        Self::Wall(w)
    }
}

impl From<ExternalField> for ConstraintSpec {
    fn from(f: ExternalField) -> Self {
        Self::Field(f)
    }
}

/// Integration control and distance queries.
pub trait Dynamics {
    fn set_thermostat(&mut self, thermostat: Thermostat) -> Result<()>;

    /// Cap on per-particle force magnitude; `0` disables capping.
    fn set_force_cap(&mut self, cap: f64) -> Result<()>;

    /// Advance `steps` integration steps. `0` only recomputes forces.
    fn run_integration(&mut self, steps: u64) -> Result<()>;

    /// Global minimum pairwise particle separation.
    fn min_particle_distance(&self) -> Result<f64>;

    /// Minimum signed distance between a wall constraint and the particles it applies to.
    fn constraint_min_distance(&self, handle: ConstraintHandle) -> Result<f64>;
}

/// Full engine surface: particles, constraints and observables.
pub trait Engine: Dynamics {
    fn create_particle(&mut self, spec: ParticleSpec) -> Result<ParticleHandle>;

    fn add_constraint(&mut self, spec: ConstraintSpec) -> Result<ConstraintHandle>;

    fn total_energy(&self) -> Result<EnergyBreakdown>;

    fn particle_state(&self, handle: ParticleHandle) -> Result<ParticleState>;

    fn set_particle_position(&mut self, handle: ParticleHandle, position: Vec3) -> Result<()>;

    fn clear_constraints(&mut self) -> Result<()>;

    fn clear_particles(&mut self) -> Result<()>;

    fn particle_force(&self, handle: ParticleHandle) -> Result<Vec3> {
        Ok(self.particle_state(handle)?.force)
    }

    fn particle_position(&self, handle: ParticleHandle) -> Result<Vec3> {
        Ok(self.particle_state(handle)?.position)
    }
}

/// Scoped use of an engine. On drop every constraint and every particle in
/// the engine is cleared, including any that existed before the session.
#[derive(Debug)]
pub struct Session<'a, E: Engine> {
    engine: &'a mut E,
}

impl<'a, E: Engine> Session<'a, E> {
    pub fn new(engine: &'a mut E) -> Self {
        Self { engine }
    }
}

impl<E: Engine> Deref for Session<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        self.engine
    }
}

impl<E: Engine> DerefMut for Session<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        self.engine
    }
}

impl<E: Engine> Drop for Session<'_, E> {
    fn drop(&mut self) {
        if let Err(e) = self.engine.clear_constraints() {
            log::warn!("session teardown: clearing constraints failed: {e}");
        }
        if let Err(e) = self.engine.clear_particles() {
            log::warn!("session teardown: clearing particles failed: {e}");
        }
    }
}

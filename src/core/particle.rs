use crate::core::vector::{self, Vec3, ZERO};
use crate::error::{Error, Result};

/// Parameters for creating a particle in the engine.
///
/// Fields:
/// - `position`: position vector [x, y, z]
/// - `velocity`: velocity vector [vx, vy, vz] (default zero)
/// - `mass`: particle mass (> 0, default 1.0)
/// - `charge`: particle charge (default 0.0)
/// - `particle_type`: type id used by constraint filters (default 0)
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSpec {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f64,
    pub charge: f64,
    pub particle_type: u32,
}

impl ParticleSpec {
    /// A particle at rest at `position` with unit mass, no charge and type 0.
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: ZERO,
            mass: 1.0,
            charge: 0.0,
            particle_type: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_charge(mut self, charge: f64) -> Self {
        self.charge = charge;
        self
    }

    pub fn with_type(mut self, particle_type: u32) -> Self {
        self.particle_type = particle_type;
        self
    }

    /// Check invariants before the particle is handed to an engine.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `mass` is non-positive or any component is NaN/inf.
    pub fn validate(&self) -> Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !self.charge.is_finite() {
            return Err(Error::InvalidParam("charge must be finite".into()));
        }
        if !vector::is_finite(&self.position) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !vector::is_finite(&self.velocity) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(())
    }
}

/// Read-back snapshot of an engine-owned particle.
///
/// `force` is whatever the engine computed in its last force evaluation; it is
/// output only and never written back.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    pub position: Vec3,
    pub velocity: Vec3,
    pub force: Vec3,
    pub mass: f64,
    pub charge: f64,
    pub particle_type: u32,
}

impl ParticleState {
    /// Snapshot of a freshly created particle (no force evaluated yet).
    pub fn from_spec(spec: &ParticleSpec) -> Self {
        Self {
            position: spec.position,
            velocity: spec.velocity,
            force: ZERO,
            mass: spec.mass,
            charge: spec.charge,
            particle_type: spec.particle_type,
        }
    }

    /// Returns the particle's kinetic energy: 1/2 m |v|^2.
    #[inline]
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * vector::dot(&self.velocity, &self.velocity)
    }

    /// Set position (validated as finite).
    pub fn set_position(&mut self, position: Vec3) -> Result<()> {
        if !vector::is_finite(&position) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        self.position = position;
        Ok(())
    }
}

//! Core data types shared by the warmup controller and the field checker.
//!
//! The simulation engine itself is external; this module defines the values
//! that cross that boundary and the traits an engine implements.

pub mod engine;
pub mod particle;
pub mod vector;
pub mod wall;

pub use engine::{
    ConstraintHandle, ConstraintSpec, Dynamics, EnergyBreakdown, Engine, ParticleHandle, Session,
    Thermostat,
};
pub use particle::{ParticleSpec, ParticleState};
pub use vector::{Vec3, DIM};
pub use wall::{Wall, WallConstraint};

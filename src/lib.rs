//! Warmup control and external-field verification for particle simulations.
//!
//! The engine is external and reached through [`core::Engine`]. On top of it:
//! - [`warmup`]: force-capped overlap removal followed by a temperature ramp
//! - [`field`]: uniform fields and tabulated grid fields with multilinear interpolation
//! - [`checker`]: compares engine forces and energies against analytic expectations
//! - [`sample`]: the constrained Lennard-Jones scenario driven by a [`config::RunConfig`]

pub mod checker;
pub mod config;
pub mod core;
pub mod error;
pub mod field;
pub mod sample;
pub mod warmup;

#[cfg(feature = "python")]
mod python;

pub use crate::checker::{FieldCase, FieldChecker, SuiteReport};
pub use crate::config::RunConfig;
pub use crate::error::{Error, Result};
pub use crate::field::{ExternalField, ScalarField, VectorField};
pub use crate::warmup::{WarmupConfig, WarmupController, WarmupReport};

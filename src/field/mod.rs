//! External fields acting on single particles.
//!
//! Every field variant knows the force it exerts on a particle and the
//! potential energy it contributes. Engines are expected to reproduce these
//! relations; the checker in [`crate::checker`] verifies that they do.

pub mod grid;

pub use grid::{multi_indices, ScalarField, TabulatedField, VectorField};

use crate::core::particle::ParticleState;
use crate::core::vector::{self, Vec3};
use crate::error::{Error, Result};

/// Closed set of external-field constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ExternalField {
    /// Uniform acceleration `g`.
    Gravity { g: Vec3 },
    /// Electric potential `phi(x) = -E·x + phi0`.
    LinearElectricPotential { e: Vec3, phi0: f64 },
    /// Friction towards a uniform flow velocity `u`.
    HomogeneousFlowField { u: Vec3, gamma: f64 },
    /// Tabulated scalar potential, scaled by `scale`.
    PotentialField { field: ScalarField, scale: f64 },
    /// Tabulated electric potential, coupling to charge.
    ElectricPotential { field: ScalarField },
    /// Tabulated force field, scaled by `scale`.
    ForceField { field: VectorField, scale: f64 },
    /// Friction towards a tabulated flow velocity.
    FlowField { field: VectorField, gamma: f64 },
}

/// Raw sample of a field at a point: a potential or a vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Scalar(f64),
    Vector(Vec3),
}

impl ExternalField {
    /// Short label for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gravity { .. } => "gravity",
            Self::LinearElectricPotential { .. } => "linear_electric_potential",
            Self::HomogeneousFlowField { .. } => "homogeneous_flow_field",
            Self::PotentialField { .. } => "potential_field",
            Self::ElectricPotential { .. } => "electric_potential",
            Self::ForceField { .. } => "force_field",
            Self::FlowField { .. } => "flow_field",
        }
    }

    /// Grid spacing of tabulated variants.
    pub fn grid_spacing(&self) -> Option<Vec3> {
        match self {
            Self::PotentialField { field, .. } | Self::ElectricPotential { field } => {
                Some(field.spacing())
            }
            Self::ForceField { field, .. } | Self::FlowField { field, .. } => Some(field.spacing()),
            Self::Gravity { .. }
            | Self::LinearElectricPotential { .. }
            | Self::HomogeneousFlowField { .. } => None,
        }
    }

    /// Reject non-finite parameters and negative friction.
    pub fn validate(&self) -> Result<()> {
        let ok = match self {
            Self::Gravity { g } => vector::is_finite(g),
            Self::LinearElectricPotential { e, phi0 } => vector::is_finite(e) && phi0.is_finite(),
            Self::HomogeneousFlowField { u, gamma } => {
                vector::is_finite(u) && gamma.is_finite() && *gamma >= 0.0
            }
            Self::PotentialField { scale, .. } | Self::ForceField { scale, .. } => {
                scale.is_finite()
            }
            Self::ElectricPotential { .. } => true,
            Self::FlowField { gamma, .. } => gamma.is_finite() && *gamma >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidParam(format!(
                "{} parameters must be finite (friction >= 0)",
                self.name()
            )))
        }
    }

    /// Sampled field value at `x`, before any scale or coupling is applied.
    ///
    /// Uniform fields report their defining quantity (g, the potential, u).
    pub fn eval_field(&self, x: &Vec3) -> Result<FieldValue> {
        Ok(match self {
            Self::Gravity { g } => FieldValue::Vector(*g),
            Self::LinearElectricPotential { e, phi0 } => {
                FieldValue::Scalar(-vector::dot(e, x) + phi0)
            }
            Self::HomogeneousFlowField { u, .. } => FieldValue::Vector(*u),
            Self::PotentialField { field, .. } | Self::ElectricPotential { field } => {
                FieldValue::Scalar(field.value(x)?)
            }
            Self::ForceField { field, .. } | Self::FlowField { field, .. } => {
                FieldValue::Vector(field.interpolate(x)?)
            }
        })
    }

    /// Force exerted on `p`.
    pub fn force_on(&self, p: &ParticleState) -> Result<Vec3> {
        Ok(match self {
            Self::Gravity { g } => vector::scale(p.mass, g),
            Self::LinearElectricPotential { e, .. } => vector::scale(p.charge, e),
            Self::HomogeneousFlowField { u, gamma } => {
                vector::scale(*gamma, &vector::sub(u, &p.velocity))
            }
            Self::PotentialField { field, scale } => {
                vector::scale(-scale, &field.gradient(&p.position)?)
            }
            Self::ElectricPotential { field } => {
                vector::scale(-p.charge, &field.gradient(&p.position)?)
            }
            Self::ForceField { field, scale } => {
                vector::scale(*scale, &field.interpolate(&p.position)?)
            }
            Self::FlowField { field, gamma } => {
                let u = field.interpolate(&p.position)?;
                vector::scale(-gamma, &vector::sub(&p.velocity, &u))
            }
        })
    }

    /// Potential energy contributed by `p`; zero for non-conservative and uniform-gravity fields.
    pub fn energy_of(&self, p: &ParticleState) -> Result<f64> {
        Ok(match self {
            Self::LinearElectricPotential { e, phi0 } => {
                p.charge * (-vector::dot(e, &p.position) + phi0)
            }
            Self::PotentialField { field, scale } => scale * field.value(&p.position)?,
            Self::ElectricPotential { field } => p.charge * field.value(&p.position)?,
            Self::Gravity { .. }
            | Self::HomogeneousFlowField { .. }
            | Self::ForceField { .. }
            | Self::FlowField { .. } => 0.0,
        })
    }
}

//! Verification that an engine applies external fields correctly.
//!
//! A case places one particle in a field, asks the engine for a zero-step force
//! evaluation and compares the reported force and energy with the relation
//! that field type must satisfy. Tabulated fields are probed at every node of
//! a block of the grid and additionally compared against the continuous
//! function they were sampled from.
//!
//! Each case runs inside a [`Session`], so the engine is cleared between cases.
//! Mismatches are collected, never retried; a failing case does not stop the
//! suite.

pub mod tolerances;

use std::fmt;

use crate::core::engine::{Dynamics, Engine, ParticleHandle, Session};
use crate::core::particle::ParticleSpec;
use crate::core::vector::{self, Vec3, DIM};
use crate::error::{Error, Result};
use crate::field::{multi_indices, ExternalField, FieldValue, ScalarField, VectorField};

pub use tolerances::{Tolerance, ToleranceSet};

/// What was compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// Raw sampled field value vs the continuous reference.
    FieldValue,
    Force,
    /// Force divided by mass.
    Acceleration,
    TotalEnergy,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FieldValue => "field value",
            Self::Force => "force",
            Self::Acceleration => "force/mass",
            Self::TotalEnergy => "total energy",
        };
        f.write_str(s)
    }
}

/// One failed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub case: String,
    pub quantity: Quantity,
    /// Particle position (grid node for tabulated cases).
    pub coordinate: Vec3,
    /// Vector component, `None` for scalars.
    pub component: Option<usize>,
    pub expected: f64,
    pub actual: f64,
    pub tolerance: Tolerance,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {:?}", self.case, self.quantity, self.coordinate)?;
        if let Some(k) = self.component {
            write!(f, "[{k}]")?;
        }
        write!(
            f,
            ": expected {}, got {} ({})",
            self.expected, self.actual, self.tolerance
        )
    }
}

/// Outcome of one case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseReport {
    pub name: String,
    /// Comparisons performed.
    pub checks: usize,
    pub mismatches: Vec<Mismatch>,
    /// Engine or setup failure that aborted the case.
    pub error: Option<String>,
}

impl CaseReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: 0,
            mismatches: Vec::new(),
            error: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.mismatches.is_empty() && self.error.is_none()
    }

    /// `Error::Assertion` describing the first failure if the case did not pass.
    pub fn into_result(self) -> Result<Self> {
        if let Some(e) = &self.error {
            return Err(Error::Assertion(format!("{}: aborted: {e}", self.name)));
        }
        match self.mismatches.first() {
            None => Ok(self),
            Some(m) => Err(Error::Assertion(format!(
                "{m} ({} of {} checks failed)",
                self.mismatches.len(),
                self.checks
            ))),
        }
    }

    fn compare(
        &mut self,
        quantity: Quantity,
        coordinate: Vec3,
        component: Option<usize>,
        actual: f64,
        expected: f64,
        tolerance: Tolerance,
    ) {
        self.checks += 1;
        if !tolerance.accepts(actual, expected) {
            self.mismatches.push(Mismatch {
                case: self.name.clone(),
                quantity,
                coordinate,
                component,
                expected,
                actual,
                tolerance,
            });
        }
    }

    fn compare_vec(
        &mut self,
        quantity: Quantity,
        coordinate: Vec3,
        actual: &Vec3,
        expected: &Vec3,
        tolerance: Tolerance,
    ) {
        for k in 0..DIM {
            self.compare(quantity, coordinate, Some(k), actual[k], expected[k], tolerance);
        }
    }
}

/// Outcomes of a whole suite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteReport {
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.passed()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| !c.passed())
    }
}

/// Continuous function a tabulated field was sampled from.
#[derive(Clone, Copy)]
pub enum Reference<'a> {
    /// A potential and its analytic force `-grad(potential)`.
    Scalar {
        potential: &'a dyn Fn(Vec3) -> f64,
        force: &'a dyn Fn(Vec3) -> Vec3,
    },
    /// A force or velocity field.
    Vector { field: &'a dyn Fn(Vec3) -> Vec3 },
}

impl fmt::Debug for Reference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar { .. } => f.write_str("Reference::Scalar"),
            Self::Vector { .. } => f.write_str("Reference::Vector"),
        }
    }
}

/// Where a case probes the field.
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    /// Only at the particle's initial position.
    AtParticle,
    /// At every node `h * i`, `i` in `[0, nodes)` per axis.
    Grid {
        nodes: [usize; DIM],
        reference: Reference<'a>,
    },
}

/// A named field/particle setup to verify.
#[derive(Debug, Clone)]
pub struct FieldCase<'a> {
    pub name: String,
    pub field: ExternalField,
    pub particle: ParticleSpec,
    pub probe: Probe<'a>,
}

impl<'a> FieldCase<'a> {
    pub fn uniform(name: &str, field: ExternalField, particle: ParticleSpec) -> Self {
        Self {
            name: name.to_string(),
            field,
            particle,
            probe: Probe::AtParticle,
        }
    }

    pub fn tabulated(
        name: &str,
        field: ExternalField,
        particle: ParticleSpec,
        nodes: [usize; DIM],
        reference: Reference<'a>,
    ) -> Self {
        Self {
            name: name.to_string(),
            field,
            particle,
            probe: Probe::Grid { nodes, reference },
        }
    }
}

/// Runs field cases against an engine.
#[derive(Debug, Clone, Default)]
pub struct FieldChecker {
    tolerances: ToleranceSet,
}

impl FieldChecker {
    pub fn new(tolerances: ToleranceSet) -> Self {
        Self { tolerances }
    }

    pub fn tolerances(&self) -> &ToleranceSet {
        &self.tolerances
    }

    /// Run every case; failures are reported, not propagated.
    ///
    /// Each case clears all particles and constraints from `engine` when it ends.
    pub fn run_suite<E: Engine>(&self, engine: &mut E, cases: &[FieldCase<'_>]) -> SuiteReport {
        let cases = cases
            .iter()
            .map(|case| self.run_case(engine, case))
            .collect::<Vec<_>>();
        let report = SuiteReport { cases };
        log::info!(
            "field checks: {}/{} cases passed",
            report.passed_count(),
            report.cases.len()
        );
        report
    }

    /// Run one case in a fresh [`Session`]; the engine is left empty afterwards.
    pub fn run_case<E: Engine>(&self, engine: &mut E, case: &FieldCase<'_>) -> CaseReport {
        let report = match case.probe {
            Probe::AtParticle => {
                self.check_uniform(engine, &case.name, &case.field, &case.particle)
            }
            Probe::Grid { nodes, reference } => self.check_tabulated(
                engine,
                &case.name,
                &case.field,
                &case.particle,
                nodes,
                reference,
            ),
        };
        for m in &report.mismatches {
            log::warn!("{m}");
        }
        if let Some(e) = &report.error {
            log::warn!("{}: aborted: {e}", report.name);
        }
        report
    }

    /// One particle, one zero-step force evaluation.
    pub fn check_uniform<E: Engine>(
        &self,
        engine: &mut E,
        name: &str,
        field: &ExternalField,
        particle: &ParticleSpec,
    ) -> CaseReport {
        let mut report = CaseReport::new(name);
        if let Err(e) = self.uniform_inner(engine, field, particle, &mut report) {
            report.error = Some(e.to_string());
        }
        report
    }

    /// Probe every node of a `nodes` block of a tabulated field.
    pub fn check_tabulated<E: Engine>(
        &self,
        engine: &mut E,
        name: &str,
        field: &ExternalField,
        particle: &ParticleSpec,
        nodes: [usize; DIM],
        reference: Reference<'_>,
    ) -> CaseReport {
        let mut report = CaseReport::new(name);
        if let Err(e) = self.tabulated_inner(engine, field, particle, nodes, reference, &mut report)
        {
            report.error = Some(e.to_string());
        }
        report
    }

    fn uniform_inner<E: Engine>(
        &self,
        engine: &mut E,
        field: &ExternalField,
        particle: &ParticleSpec,
        report: &mut CaseReport,
    ) -> Result<()> {
        let tol = &self.tolerances;
        let mut session = Session::new(engine);
        let handle = setup(&mut session, field, particle)?;
        session.run_integration(0)?;
        let state = session.particle_state(handle)?;
        let energy = session.total_energy()?;
        let at = state.position;

        match field {
            ExternalField::Gravity { g } => {
                let accel = vector::scale(1.0 / state.mass, &state.force);
                report.compare_vec(Quantity::Acceleration, at, &accel, g, tol.uniform_force);
                report.compare(
                    Quantity::TotalEnergy,
                    at,
                    None,
                    energy.total,
                    0.0,
                    tol.uniform_energy,
                );
            }
            ExternalField::LinearElectricPotential { .. } => {
                let expected = field.force_on(&state)?;
                report.compare_vec(Quantity::Force, at, &state.force, &expected, tol.uniform_force);
                let e_field = field.energy_of(&state)?;
                report.compare(
                    Quantity::TotalEnergy,
                    at,
                    None,
                    energy.total,
                    e_field,
                    tol.uniform_energy,
                );
                report.compare(
                    Quantity::TotalEnergy,
                    at,
                    None,
                    energy.total,
                    energy.external_fields,
                    tol.uniform_energy,
                );
            }
            ExternalField::HomogeneousFlowField { .. } => {
                let expected = field.force_on(&state)?;
                report.compare_vec(Quantity::Force, at, &state.force, &expected, tol.uniform_force);
                report.compare(
                    Quantity::TotalEnergy,
                    at,
                    None,
                    energy.total,
                    energy.kinetic,
                    tol.uniform_energy,
                );
            }
            ExternalField::PotentialField { .. }
            | ExternalField::ElectricPotential { .. }
            | ExternalField::ForceField { .. }
            | ExternalField::FlowField { .. } => {
                let expected = field.force_on(&state)?;
                report.compare_vec(
                    Quantity::Force,
                    at,
                    &state.force,
                    &expected,
                    tol.force_field_force,
                );
                let e_field = field.energy_of(&state)?;
                report.compare(
                    Quantity::TotalEnergy,
                    at,
                    None,
                    energy.external_fields,
                    e_field,
                    tol.grid_energy,
                );
            }
        }
        Ok(())
    }

    fn tabulated_inner<E: Engine>(
        &self,
        engine: &mut E,
        field: &ExternalField,
        particle: &ParticleSpec,
        nodes: [usize; DIM],
        reference: Reference<'_>,
        report: &mut CaseReport,
    ) -> Result<()> {
        let tol = &self.tolerances;
        let h = field.grid_spacing().ok_or_else(|| {
            Error::InvalidParam(format!("{} is not a tabulated field", field.name()))
        })?;
        let mut session = Session::new(engine);
        let handle = setup(&mut session, field, particle)?;

        for i in multi_indices(nodes) {
            let x = [h[0] * i[0] as f64, h[1] * i[1] as f64, h[2] * i[2] as f64];
            let sample = field.eval_field(&x)?;

            session.set_particle_position(handle, x)?;
            session.run_integration(0)?;
            let state = session.particle_state(handle)?;
            let energy = session.total_energy()?;

            match (field, sample, reference) {
                (
                    ExternalField::PotentialField { .. } | ExternalField::ElectricPotential { .. },
                    FieldValue::Scalar(phi),
                    Reference::Scalar { potential, force },
                ) => {
                    report.compare(
                        Quantity::FieldValue,
                        x,
                        None,
                        phi,
                        potential(x),
                        tol.scalar_field_value,
                    );
                    let coupling = match field {
                        ExternalField::PotentialField { scale, .. } => *scale,
                        _ => state.charge,
                    };
                    report.compare(
                        Quantity::TotalEnergy,
                        x,
                        None,
                        energy.total,
                        coupling * phi,
                        tol.grid_energy,
                    );
                    let expected = vector::scale(coupling, &force(x));
                    report.compare_vec(
                        Quantity::Force,
                        x,
                        &state.force,
                        &expected,
                        tol.potential_force,
                    );
                }
                (
                    ExternalField::ForceField { scale, .. },
                    FieldValue::Vector(f_val),
                    Reference::Vector { field: reference },
                ) => {
                    report.compare_vec(
                        Quantity::FieldValue,
                        x,
                        &f_val,
                        &reference(x),
                        tol.vector_field_value,
                    );
                    let expected = vector::scale(*scale, &f_val);
                    report.compare_vec(
                        Quantity::Force,
                        x,
                        &state.force,
                        &expected,
                        tol.force_field_force,
                    );
                }
                (
                    ExternalField::FlowField { gamma, .. },
                    FieldValue::Vector(u),
                    Reference::Vector { field: reference },
                ) => {
                    report.compare_vec(
                        Quantity::FieldValue,
                        x,
                        &u,
                        &reference(x),
                        tol.vector_field_value,
                    );
                    let expected = vector::scale(-gamma, &vector::sub(&state.velocity, &u));
                    report.compare_vec(Quantity::Force, x, &state.force, &expected, tol.flow_force);
                }
                (_, _, reference) => {
                    return Err(Error::InvalidParam(format!(
                        "{} cannot be checked against {reference:?}",
                        field.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn setup<E: Engine>(
    session: &mut Session<'_, E>,
    field: &ExternalField,
    particle: &ParticleSpec,
) -> Result<ParticleHandle> {
    field.validate()?;
    particle.validate()?;
    let handle = session.create_particle(particle.clone())?;
    session.add_constraint(field.clone().into())?;
    Ok(handle)
}

// ============ Reference suite ============

/// `0.1 * sum((x - 5)^2)`, the potential used by the reference suite.
pub fn quadratic_potential(x: Vec3) -> f64 {
    0.1 * x.iter().map(|c| (c - 5.0).powi(2)).sum::<f64>()
}

/// `-0.2 * (x - 5)`, the negative gradient of [`quadratic_potential`].
pub fn quadratic_force(x: Vec3) -> Vec3 {
    x.map(|c| -0.2 * (c - 5.0))
}

/// The seven field cases of the engine's field test-suite, on a `[10, 10, 10]`
/// box tabulated with spacing `0.2` and probed on the first 10 nodes per axis.
pub fn reference_suite() -> Result<Vec<FieldCase<'static>>> {
    let box_length = [10.0; DIM];
    let h = [0.2; DIM];
    let nodes = [10; DIM];
    let potential = ScalarField::scalar_from_fn(box_length, h, quadratic_potential)?;
    let force = VectorField::field_from_fn(box_length, h, quadratic_force)?;
    let scalar_ref = Reference::Scalar {
        potential: &quadratic_potential,
        force: &quadratic_force,
    };
    let vector_ref = Reference::Vector {
        field: &quadratic_force,
    };
    let origin = ParticleSpec::new([0.0; DIM]);

    Ok(vec![
        FieldCase::uniform(
            "gravity",
            ExternalField::Gravity { g: [1.0, 2.0, 3.0] },
            origin.clone().with_mass(3.1),
        ),
        FieldCase::uniform(
            "linear_electric_potential",
            ExternalField::LinearElectricPotential {
                e: [1.0, 2.0, 3.0],
                phi0: 4.0,
            },
            ParticleSpec::new([0.5; DIM]).with_charge(-3.1),
        ),
        FieldCase::uniform(
            "homogeneous_flow_field",
            ExternalField::HomogeneousFlowField {
                u: [1.0, 2.0, 3.0],
                gamma: 2.3,
            },
            ParticleSpec::new([0.5; DIM]).with_velocity([3.0, 4.0, 5.0]),
        ),
        FieldCase::tabulated(
            "potential_field",
            ExternalField::PotentialField {
                field: potential.clone(),
                scale: 2.6,
            },
            origin.clone(),
            nodes,
            scalar_ref,
        ),
        FieldCase::tabulated(
            "electric_potential",
            ExternalField::ElectricPotential { field: potential },
            origin.clone().with_charge(-3.1),
            nodes,
            scalar_ref,
        ),
        FieldCase::tabulated(
            "force_field",
            ExternalField::ForceField {
                field: force.clone(),
                scale: 2.6,
            },
            origin.clone(),
            nodes,
            vector_ref,
        ),
        FieldCase::tabulated(
            "flow_field",
            ExternalField::FlowField {
                field: force,
                gamma: 2.6,
            },
            origin.with_velocity([1.0, 2.0, 3.0]),
            nodes,
            vector_ref,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_force_is_negative_gradient() {
        let x = [1.0, 2.5, 7.0];
        let f = quadratic_force(x);
        let eps = 1e-6;
        for k in 0..DIM {
            let mut xp = x;
            let mut xm = x;
            xp[k] += eps;
            xm[k] -= eps;
            let g = (quadratic_potential(xp) - quadratic_potential(xm)) / (2.0 * eps);
            assert!((f[k] + g).abs() < 1e-6);
        }
    }

    #[test]
    fn reference_suite_has_every_variant() -> Result<()> {
        let cases = reference_suite()?;
        let names: Vec<_> = cases.iter().map(|c| c.field.name()).collect();
        assert_eq!(
            names,
            vec![
                "gravity",
                "linear_electric_potential",
                "homogeneous_flow_field",
                "potential_field",
                "electric_potential",
                "force_field",
                "flow_field",
            ]
        );
        Ok(())
    }

    #[test]
    fn case_report_into_result() {
        let mut r = CaseReport::new("demo");
        r.compare(Quantity::Force, [0.0; 3], Some(1), 1.0, 1.0, Tolerance::Absolute(1e-9));
        assert!(r.passed());
        r.compare(Quantity::Force, [0.2, 0.0, 0.0], Some(2), 1.5, 1.0, Tolerance::Absolute(1e-9));
        assert_eq!(r.checks, 2);
        let err = r.into_result().unwrap_err().to_string();
        assert!(err.contains("demo: force at [0.2, 0.0, 0.0][2]"));
        assert!(err.contains("expected 1, got 1.5"));
        assert!(err.contains("1 of 2 checks failed"));
    }
}

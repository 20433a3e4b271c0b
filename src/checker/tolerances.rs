//! Acceptance thresholds for field/force/energy comparisons.
//!
//! The values mirror the assertions the engine's own field test-suite makes,
//! so a passing check here means the same thing as a passing test there.

use std::fmt;

/// How a threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    /// |actual - expected| < tol
    Absolute(f64),
    /// |actual - expected| <= atol + rtol * |expected|
    AllClose { rtol: f64, atol: f64 },
}

impl Tolerance {
    /// Pure relative check, `atol = 0`.
    pub const fn relative(rtol: f64) -> Self {
        Self::AllClose { rtol, atol: 0.0 }
    }

    /// Whether `actual` is acceptable. NaN on either side never is.
    pub fn accepts(&self, actual: f64, expected: f64) -> bool {
        let diff = (actual - expected).abs();
        match *self {
            Self::Absolute(tol) => diff < tol,
            Self::AllClose { rtol, atol } => diff <= atol + rtol * expected.abs(),
        }
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Absolute(tol) => write!(f, "abs {tol:e}"),
            Self::AllClose { rtol, atol } if atol == 0.0 => write!(f, "rel {rtol:e}"),
            Self::AllClose { rtol, atol } => write!(f, "rel {rtol:e} + abs {atol:e}"),
        }
    }
}

/// Uniform-field force components: 7 decimals, `1.5e-7`.
pub const UNIFORM_FORCE: Tolerance = Tolerance::Absolute(1.5e-7);

/// Uniform-field energies: 7 places, `0.5e-7`.
pub const UNIFORM_ENERGY: Tolerance = Tolerance::Absolute(5e-8);

/// Tabulated potential sampled at a node vs the continuous function.
pub const SCALAR_FIELD_VALUE: Tolerance = Tolerance::relative(1e-3);

/// Tabulated vector field sampled at a node vs the continuous function.
pub const VECTOR_FIELD_VALUE: Tolerance = Tolerance::relative(1e-7);

/// Force from a tabulated potential vs the analytic negative gradient.
pub const POTENTIAL_FORCE: Tolerance = Tolerance::relative(1e-5);

/// Force from a tabulated force field vs the scaled sample.
pub const FORCE_FIELD_FORCE: Tolerance = Tolerance::relative(1e-7);

/// Friction force from a tabulated flow field.
pub const FLOW_FORCE: Tolerance = Tolerance::AllClose {
    rtol: 1e-7,
    atol: 1e-12,
};

/// Energy of a particle in a tabulated potential: 5 places.
pub const GRID_ENERGY: Tolerance = Tolerance::Absolute(5e-6);

/// The full set used by a [`FieldChecker`](super::FieldChecker).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToleranceSet {
    pub uniform_force: Tolerance,
    pub uniform_energy: Tolerance,
    pub scalar_field_value: Tolerance,
    pub vector_field_value: Tolerance,
    pub potential_force: Tolerance,
    pub force_field_force: Tolerance,
    pub flow_force: Tolerance,
    pub grid_energy: Tolerance,
}

impl Default for ToleranceSet {
    fn default() -> Self {
        Self {
            uniform_force: UNIFORM_FORCE,
            uniform_energy: UNIFORM_ENERGY,
            scalar_field_value: SCALAR_FIELD_VALUE,
            vector_field_value: VECTOR_FIELD_VALUE,
            potential_force: POTENTIAL_FORCE,
            force_field_force: FORCE_FIELD_FORCE,
            flow_force: FLOW_FORCE,
            grid_energy: GRID_ENERGY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_is_strict() {
        let t = Tolerance::Absolute(1e-3);
        assert!(t.accepts(1.0009, 1.0));
        assert!(!t.accepts(1.002, 1.0));
    }

    #[test]
    fn allclose_scales_with_expected() {
        let t = Tolerance::relative(1e-3);
        assert!(t.accepts(1000.9, 1000.0));
        assert!(!t.accepts(1.01, 1.0));
        // zero expected with atol = 0 needs an exact match
        assert!(t.accepts(0.0, 0.0));
        assert!(!t.accepts(1e-300, 0.0));
        assert!(FLOW_FORCE.accepts(1e-13, 0.0));
    }

    #[test]
    fn nan_never_accepted() {
        assert!(!UNIFORM_FORCE.accepts(f64::NAN, 0.0));
        assert!(!POTENTIAL_FORCE.accepts(1.0, f64::NAN));
    }

    #[test]
    fn display_names_mode() {
        assert_eq!(Tolerance::Absolute(0.5).to_string(), "abs 5e-1");
        assert_eq!(Tolerance::relative(1e-5).to_string(), "rel 1e-5");
        assert!(FLOW_FORCE.to_string().contains("abs 1e-12"));
    }
}

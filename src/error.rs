use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by the warmup controller, the field checker and the engine seam.
///
/// Library code never panics on bad input; every failure is one of these variants with
/// enough context to act on.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter (rejected at setup).
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Warmup did not reach the requested minimum distance within the iteration ceiling.
    #[error(
        "warmup did not converge after {iterations} iterations \
         (force cap {force_cap}, smallest distance {min_distance} < {target})"
    )]
    Convergence {
        iterations: usize,
        force_cap: f64,
        min_distance: f64,
        target: f64,
    },

    /// A force/energy/field comparison exceeded its tolerance.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// A tabulated field was queried outside its grid.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// The engine was handed a particle or constraint handle it does not know.
    #[error("unknown handle: {0}")]
    UnknownHandle(String),

    /// Failure reported by the external simulation engine.
    #[error("engine error: {0}")]
    Engine(String),

    /// Malformed TOML run configuration.
    #[error(transparent)]
    Config(#[from] toml::de::Error),

    /// Propagated I/O errors (configuration files).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::InvalidParam("time_step must be > 0".to_string());
        let msg = format!("{e}");
        assert!(msg.contains("invalid parameter"));
        assert!(msg.contains("time_step"));
    }

    #[test]
    fn convergence_error_reports_state() {
        let e = Error::Convergence {
            iterations: 100,
            force_cap: 105.0,
            min_distance: 0.42,
            target: 0.9,
        };
        let msg = e.to_string();
        assert!(msg.contains("100 iterations"));
        assert!(msg.contains("0.42"));
        assert!(msg.contains("0.9"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.toml");
        let e: Error = io.into();
        assert!(e.to_string().contains("missing.toml"));
    }

    #[test]
    fn result_type_alias_compiles() -> Result<()> {
        Ok(())
    }
}

//! Python bindings (feature `python`).
//!
//! Exposes the tabulated fields and the warmup controller. The warmup drives any
//! Python engine object that provides:
//! - `set_thermostat(kT, gamma)`
//! - `set_force_cap(cap)`
//! - `run_integration(steps)`
//! - `min_particle_distance() -> float`
//! - `constraint_min_distance(handle) -> float`

use numpy::ndarray::{Array3, Array4};
use numpy::{IntoPyArray, PyArray1, PyArray3, PyArray4};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::core::engine::{ConstraintHandle, Dynamics, Thermostat};
use crate::core::vector::{Vec3, DIM};
use crate::error::{Error, Result};
use crate::field::{ScalarField, VectorField};
use crate::warmup::{WarmupConfig, WarmupController};

fn py_err(e: Error) -> PyErr {
    match e {
        Error::InvalidParam(_) | Error::OutOfBounds(_) | Error::Config(_) => {
            PyValueError::new_err(e.to_string())
        }
        _ => PyRuntimeError::new_err(e.to_string()),
    }
}

fn engine_err(e: PyErr) -> Error {
    Error::Engine(e.to_string())
}

fn vec3(v: &[f64], what: &str) -> PyResult<Vec3> {
    <Vec3>::try_from(v).map_err(|_| {
        PyValueError::new_err(format!("{what} must have length {DIM}, got {}", v.len()))
    })
}

/// Call `f(x)` with `x` as a NumPy array.
fn call_at<'py>(f: &Bound<'py, PyAny>, x: Vec3) -> Result<Bound<'py, PyAny>> {
    let arr = PyArray1::from_slice(f.py(), &x);
    f.call1((arr,)).map_err(|e| {
        Error::InvalidParam(format!("field function failed at {x:?}: {e}"))
    })
}

/// Tabulated scalar potential.
#[pyclass(name = "ScalarField")]
pub struct PyScalarField {
    inner: ScalarField,
}

#[pymethods]
impl PyScalarField {
    /// Sample `fn(x) -> float` on the grid covering `box_length` with `spacing` (halo included).
    #[staticmethod]
    fn field_from_fn(
        box_length: Vec<f64>,
        spacing: Vec<f64>,
        f: Bound<'_, PyAny>,
    ) -> PyResult<Self> {
        let b = vec3(&box_length, "box_length")?;
        let h = vec3(&spacing, "spacing")?;
        let inner = ScalarField::try_field_from_fn(b, h, |x| {
            let v = call_at(&f, x)?.extract::<f64>().map_err(|e| {
                Error::InvalidParam(format!("field function must return a float: {e}"))
            })?;
            Ok([v])
        })
        .map_err(py_err)?;
        Ok(Self { inner })
    }

    /// Interpolated potential at `x`.
    fn eval(&self, x: Vec<f64>) -> PyResult<f64> {
        self.inner.value(&vec3(&x, "x")?).map_err(py_err)
    }

    /// Central-difference gradient of the interpolated potential at `x`.
    fn gradient<'py>(&self, py: Python<'py>, x: Vec<f64>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let g = self.inner.gradient(&vec3(&x, "x")?).map_err(py_err)?;
        Ok(PyArray1::from_slice(py, &g))
    }

    #[getter]
    fn shape(&self) -> (usize, usize, usize) {
        let s = self.inner.shape();
        (s[0], s[1], s[2])
    }

    #[getter]
    fn spacing(&self) -> (f64, f64, f64) {
        let h = self.inner.spacing();
        (h[0], h[1], h[2])
    }

    /// Samples as an array of shape `shape`.
    fn values<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray3<f64>>> {
        let s = self.inner.shape();
        let flat: Vec<f64> = self.inner.values().iter().map(|v| v[0]).collect();
        let arr = Array3::from_shape_vec((s[0], s[1], s[2]), flat)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(arr.into_pyarray(py))
    }
}

/// Tabulated vector (force or flow) field.
#[pyclass(name = "VectorField")]
pub struct PyVectorField {
    inner: VectorField,
}

#[pymethods]
impl PyVectorField {
    /// Sample `fn(x) -> 3-vector` on the grid covering `box_length` with `spacing` (halo included).
    #[staticmethod]
    fn field_from_fn(
        box_length: Vec<f64>,
        spacing: Vec<f64>,
        f: Bound<'_, PyAny>,
    ) -> PyResult<Self> {
        let b = vec3(&box_length, "box_length")?;
        let h = vec3(&spacing, "spacing")?;
        let inner = VectorField::try_field_from_fn(b, h, |x| {
            let v = call_at(&f, x)?.extract::<Vec<f64>>().map_err(|e| {
                Error::InvalidParam(format!("field function must return a vector: {e}"))
            })?;
            <Vec3>::try_from(v.as_slice()).map_err(|_| {
                Error::InvalidParam(format!("field function returned {} components", v.len()))
            })
        })
        .map_err(py_err)?;
        Ok(Self { inner })
    }

    /// Interpolated vector at `x`.
    fn eval<'py>(&self, py: Python<'py>, x: Vec<f64>) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let v = self.inner.interpolate(&vec3(&x, "x")?).map_err(py_err)?;
        Ok(PyArray1::from_slice(py, &v))
    }

    #[getter]
    fn shape(&self) -> (usize, usize, usize) {
        let s = self.inner.shape();
        (s[0], s[1], s[2])
    }

    #[getter]
    fn spacing(&self) -> (f64, f64, f64) {
        let h = self.inner.spacing();
        (h[0], h[1], h[2])
    }

    /// Samples as an array of shape `shape + (3,)`.
    fn values<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyArray4<f64>>> {
        let s = self.inner.shape();
        let flat: Vec<f64> = self.inner.values().iter().flatten().copied().collect();
        let arr = Array4::from_shape_vec((s[0], s[1], s[2], DIM), flat)
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        Ok(arr.into_pyarray(py))
    }
}

/// [`Dynamics`] backed by a Python object.
struct PyDynamics<'py> {
    obj: Bound<'py, PyAny>,
}

impl Dynamics for PyDynamics<'_> {
    fn set_thermostat(&mut self, thermostat: Thermostat) -> Result<()> {
        let Thermostat::Langevin { kt, gamma } = thermostat;
        self.obj
            .call_method1("set_thermostat", (kt, gamma))
            .map_err(engine_err)?;
        Ok(())
    }

    fn set_force_cap(&mut self, cap: f64) -> Result<()> {
        self.obj
            .call_method1("set_force_cap", (cap,))
            .map_err(engine_err)?;
        Ok(())
    }

    fn run_integration(&mut self, steps: u64) -> Result<()> {
        self.obj
            .call_method1("run_integration", (steps,))
            .map_err(engine_err)?;
        Ok(())
    }

    fn min_particle_distance(&self) -> Result<f64> {
        self.obj
            .call_method0("min_particle_distance")
            .and_then(|v| v.extract::<f64>())
            .map_err(engine_err)
    }

    fn constraint_min_distance(&self, handle: ConstraintHandle) -> Result<f64> {
        self.obj
            .call_method1("constraint_min_distance", (handle.0,))
            .and_then(|v| v.extract::<f64>())
            .map_err(engine_err)
    }
}

/// Run the full warmup schedule against a Python engine object.
///
/// Returns a dict with `iterations`, `steps_run`, `cap_history`,
/// `temperature_history`, `min_dist` and `wall_min_dists`.
/// Raises RuntimeError if the distance target is not reached within
/// `max_iterations` blocks.
#[pyfunction]
#[pyo3(signature = (
    engine,
    walls,
    min_dist,
    kt,
    gamma,
    warm_steps,
    initial_force_cap=5.0,
    max_iterations=100,
    temperature_increment=0.1
))]
#[allow(clippy::too_many_arguments)]
fn warmup<'py>(
    py: Python<'py>,
    engine: Bound<'py, PyAny>,
    walls: Vec<u64>,
    min_dist: f64,
    kt: f64,
    gamma: f64,
    warm_steps: u64,
    initial_force_cap: f64,
    max_iterations: usize,
    temperature_increment: f64,
) -> PyResult<Bound<'py, PyDict>> {
    let config = WarmupConfig {
        min_dist,
        kt_target: kt,
        gamma,
        warm_steps,
        initial_force_cap,
        temperature_increment,
        max_iterations,
    };
    let walls = walls.into_iter().map(ConstraintHandle).collect();
    let mut controller = WarmupController::new(config, walls).map_err(py_err)?;
    let mut dynamics = PyDynamics { obj: engine };
    let report = controller.run(&mut dynamics).map_err(py_err)?;

    let out = PyDict::new(py);
    out.set_item("iterations", report.iterations)?;
    out.set_item("steps_run", report.steps_run)?;
    out.set_item("cap_history", report.cap_history)?;
    out.set_item("temperature_history", report.temperature_history)?;
    out.set_item("min_dist", report.final_distances.particles)?;
    out.set_item("wall_min_dists", report.final_distances.walls)?;
    Ok(out)
}

/// The mdfield Python module entry point.
#[pymodule]
fn mdfield(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyScalarField>()?;
    m.add_class::<PyVectorField>()?;
    m.add_function(wrap_pyfunction!(warmup, m)?)?;
    Ok(())
}

//! Regular 3-D grids sampled from continuous functions.
//!
//! A grid covers `[0, box_length]` along each axis plus one halo node on
//! either side, so that interpolation and central differences are defined on
//! the whole box. The node with integer index `i` (halo node is `-1`) sits at
//! exactly `spacing * i`.

use crate::core::vector::{Vec3, DIM};
use crate::error::{Error, Result};

/// Halo width in nodes on each side of the box.
pub const HALO: usize = 1;

/// Tolerance (in index units) when snapping `box / spacing` and query points to the grid.
const EPS_GRID: f64 = 1e-9;

/// Upper bound on node count; guards against runaway allocations from tiny spacings.
const MAX_NODES: usize = 1 << 27;

/// A field of `N`-component samples on a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedField<const N: usize> {
    shape: [usize; DIM],
    spacing: Vec3,
    data: Vec<[f64; N]>,
}

/// Scalar potential samples.
pub type ScalarField = TabulatedField<1>;
/// Vector (force or velocity) samples.
pub type VectorField = TabulatedField<3>;

impl<const N: usize> TabulatedField<N> {
    /// Sample `f` at every node of the grid covering `box_length` with `spacing`.
    ///
    /// Pure transform: `f` is called once per node, in C order, and nothing else
    /// is retained.
    pub fn field_from_fn<F>(box_length: Vec3, spacing: Vec3, f: F) -> Result<Self>
    where
        F: Fn(Vec3) -> [f64; N],
    {
        Self::try_field_from_fn(box_length, spacing, |x| Ok(f(x)))
    }

    /// [`field_from_fn`](Self::field_from_fn) for a fallible function; the first error aborts.
    pub fn try_field_from_fn<F>(box_length: Vec3, spacing: Vec3, mut f: F) -> Result<Self>
    where
        F: FnMut(Vec3) -> Result<[f64; N]>,
    {
        let shape = grid_shape(&box_length, &spacing)?;
        let mut data = Vec::with_capacity(shape.iter().product());
        for j in multi_indices(shape) {
            let x = node_position(&spacing, j);
            let v = f(x)?;
            if !v.iter().all(|c| c.is_finite()) {
                return Err(Error::InvalidParam(format!(
                    "field function returned a non-finite value at {x:?}"
                )));
            }
            data.push(v);
        }
        Ok(Self {
            shape,
            spacing,
            data,
        })
    }

    /// Wrap pre-computed samples (C order, halo included).
    pub fn from_values(shape: [usize; DIM], spacing: Vec3, data: Vec<[f64; N]>) -> Result<Self> {
        validate_spacing(&spacing)?;
        if shape.iter().any(|&n| n < 2 * HALO + 1) {
            return Err(Error::InvalidParam(format!(
                "grid shape {shape:?} must have at least {} nodes per axis",
                2 * HALO + 1
            )));
        }
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| Error::InvalidParam(format!("grid shape {shape:?} overflows")))?;
        if data.len() != expected {
            return Err(Error::InvalidParam(format!(
                "grid of shape {shape:?} needs {expected} samples, got {}",
                data.len()
            )));
        }
        if !data.iter().flatten().all(|c| c.is_finite()) {
            return Err(Error::InvalidParam("field samples must be finite".into()));
        }
        Ok(Self {
            shape,
            spacing,
            data,
        })
    }

    /// Nodes per axis, halo included.
    pub fn shape(&self) -> [usize; DIM] {
        self.shape
    }

    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    /// Samples in C order.
    pub fn values(&self) -> &[[f64; N]] {
        &self.data
    }

    /// Sample at storage index `j` (halo node is `j = 0`).
    pub fn node(&self, j: [usize; DIM]) -> Result<[f64; N]> {
        if j.iter().zip(self.shape.iter()).any(|(&a, &n)| a >= n) {
            return Err(Error::OutOfBounds(format!(
                "node {j:?} outside grid of shape {:?}",
                self.shape
            )));
        }
        Ok(self.data[self.flat(j)])
    }

    /// Coordinate of the node at storage index `j`.
    pub fn node_position(&self, j: [usize; DIM]) -> Vec3 {
        node_position(&self.spacing, j)
    }

    /// Multilinear interpolation of the samples at `x`.
    ///
    /// At a node coordinate this reproduces the stored sample.
    pub fn interpolate(&self, x: &Vec3) -> Result<[f64; N]> {
        let (base, t) = self.locate(x)?;
        let mut out = [0.0_f64; N];
        for corner in 0..(1usize << DIM) {
            let mut w = 1.0;
            let mut j = base;
            for k in 0..DIM {
                if (corner >> k) & 1 == 1 {
                    w *= t[k];
                    j[k] += 1;
                } else {
                    w *= 1.0 - t[k];
                }
            }
            if w == 0.0 {
                continue;
            }
            let v = &self.data[self.flat(j)];
            for (o, &c) in out.iter_mut().zip(v.iter()) {
                *o += w * c;
            }
        }
        Ok(out)
    }

    /// Lower cell corner and fractional offsets for `x`.
    fn locate(&self, x: &Vec3) -> Result<([usize; DIM], [f64; DIM])> {
        let mut base = [0usize; DIM];
        let mut frac = [0.0_f64; DIM];
        for k in 0..DIM {
            let s = x[k] / self.spacing[k] + HALO as f64;
            let max = (self.shape[k] - 1) as f64;
            if !s.is_finite() || s < -EPS_GRID || s > max + EPS_GRID {
                return Err(Error::OutOfBounds(format!(
                    "position {x:?} outside tabulated domain (axis {k})"
                )));
            }
            let s = s.clamp(0.0, max);
            let i0 = (s.floor() as usize).min(self.shape[k] - 2);
            base[k] = i0;
            frac[k] = s - i0 as f64;
        }
        Ok((base, frac))
    }

    #[inline]
    fn flat(&self, j: [usize; DIM]) -> usize {
        (j[0] * self.shape[1] + j[1]) * self.shape[2] + j[2]
    }
}

impl ScalarField {
    /// `field_from_fn` for a scalar function.
    pub fn scalar_from_fn<F>(box_length: Vec3, spacing: Vec3, f: F) -> Result<Self>
    where
        F: Fn(Vec3) -> f64,
    {
        Self::field_from_fn(box_length, spacing, |x| [f(x)])
    }

    /// Interpolated potential at `x`.
    pub fn value(&self, x: &Vec3) -> Result<f64> {
        Ok(self.interpolate(x)?[0])
    }

    /// Gradient of the interpolated potential by central differences with one
    /// grid spacing per axis. Exact for quadratic potentials; defined on `[0, box]`.
    pub fn gradient(&self, x: &Vec3) -> Result<Vec3> {
        let mut grad = [0.0_f64; DIM];
        for (k, g) in grad.iter_mut().enumerate() {
            let h = self.spacing[k];
            let mut xp = *x;
            let mut xm = *x;
            xp[k] += h;
            xm[k] -= h;
            *g = (self.value(&xp)? - self.value(&xm)?) / (2.0 * h);
        }
        Ok(grad)
    }
}

/// All multi-indices of a `counts[0] x counts[1] x counts[2]` block in C order.
pub fn multi_indices(counts: [usize; DIM]) -> impl Iterator<Item = [usize; DIM]> {
    (0..counts[0]).flat_map(move |i| {
        (0..counts[1]).flat_map(move |j| (0..counts[2]).map(move |k| [i, j, k]))
    })
}

#[inline]
fn node_position(spacing: &Vec3, j: [usize; DIM]) -> Vec3 {
    let mut x = [0.0_f64; DIM];
    for k in 0..DIM {
        let i = j[k] as f64 - HALO as f64;
        x[k] = spacing[k] * i;
    }
    x
}

fn validate_spacing(spacing: &Vec3) -> Result<()> {
    if !spacing.iter().all(|&h| h.is_finite() && h > 0.0) {
        return Err(Error::InvalidParam(
            "grid spacing components must be finite and > 0".into(),
        ));
    }
    Ok(())
}

/// Nodes per axis: `floor(L / h) + 1` covering the box, plus the halo on both sides.
fn grid_shape(box_length: &Vec3, spacing: &Vec3) -> Result<[usize; DIM]> {
    if !box_length.iter().all(|&l| l.is_finite() && l > 0.0) {
        return Err(Error::InvalidParam(
            "box_length components must be finite and > 0".into(),
        ));
    }
    validate_spacing(spacing)?;
    let mut shape = [0usize; DIM];
    for k in 0..DIM {
        let r = box_length[k] / spacing[k];
        if r >= MAX_NODES as f64 {
            return Err(Error::InvalidParam(format!(
                "box_length / spacing = {r:e} on axis {k} is too large to tabulate"
            )));
        }
        let cells = if (r - r.round()).abs() < EPS_GRID * r.max(1.0) {
            r.round()
        } else {
            r.floor()
        };
        shape[k] = cells as usize + 1 + 2 * HALO;
    }
    let total = shape
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .filter(|&n| n <= MAX_NODES)
        .ok_or_else(|| {
            Error::InvalidParam(format!("grid of shape {shape:?} is too large to tabulate"))
        })?;
    log::debug!("tabulating {total} nodes (shape {shape:?})");
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn potential(x: Vec3) -> f64 {
        0.1 * x.iter().map(|c| (c - 5.0).powi(2)).sum::<f64>()
    }

    #[test]
    fn shape_includes_halo() -> Result<()> {
        let f = ScalarField::scalar_from_fn([10.0; 3], [0.2; 3], potential)?;
        assert_eq!(f.shape(), [53, 53, 53]);
        assert_eq!(f.values().len(), 53 * 53 * 53);
        let g = ScalarField::scalar_from_fn([1.0, 2.0, 0.55], [0.5; 3], |_| 0.0)?;
        assert_eq!(g.shape(), [5, 7, 4]);
        Ok(())
    }

    #[test]
    fn nodes_hold_exact_function_values() -> Result<()> {
        let h = [0.2, 0.25, 0.5];
        let f = ScalarField::scalar_from_fn([2.0, 2.0, 2.0], h, potential)?;
        for j in multi_indices(f.shape()) {
            let x = f.node_position(j);
            assert_eq!(f.node(j)?[0], potential(x));
        }
        // halo node sits at -h
        assert_eq!(f.node_position([0, 0, 0]), [-0.2, -0.25, -0.5]);
        Ok(())
    }

    #[test]
    fn interpolation_reproduces_nodes() -> Result<()> {
        let h = [0.2; 3];
        let f = ScalarField::scalar_from_fn([10.0; 3], h, potential)?;
        for i in multi_indices([10, 10, 10]) {
            let x = [h[0] * i[0] as f64, h[1] * i[1] as f64, h[2] * i[2] as f64];
            assert_relative_eq!(f.value(&x)?, potential(x), max_relative = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn interpolation_is_exact_for_linear_functions() -> Result<()> {
        let lin = |x: Vec3| [1.0 + 2.0 * x[0] - x[1] + 0.5 * x[2], x[0], -x[2]];
        let f = VectorField::field_from_fn([3.0; 3], [0.3; 3], lin)?;
        let x = [1.234, 0.077, 2.9];
        let got = f.interpolate(&x)?;
        let want = lin(x);
        for k in 0..3 {
            assert_relative_eq!(got[k], want[k], epsilon = 1e-12);
        }
        Ok(())
    }

    #[test]
    fn gradient_exact_for_quadratic_potential() -> Result<()> {
        let f = ScalarField::scalar_from_fn([10.0; 3], [0.2; 3], potential)?;
        for x in [[0.0, 0.0, 0.0], [1.8, 0.4, 1.0], [0.37, 2.91, 9.99]] {
            let g = f.gradient(&x)?;
            for k in 0..3 {
                assert_relative_eq!(g[k], 0.2 * (x[k] - 5.0), max_relative = 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn queries_outside_domain_fail() -> Result<()> {
        let f = ScalarField::scalar_from_fn([1.0; 3], [0.5; 3], potential)?;
        // value domain is [-h, L + h]; gradient needs one more spacing
        assert!(f.value(&[-0.5, 0.0, 0.0]).is_ok());
        assert!(f.value(&[1.5, 1.5, 1.5]).is_ok());
        assert!(matches!(f.value(&[-0.6, 0.0, 0.0]), Err(Error::OutOfBounds(_))));
        assert!(matches!(f.gradient(&[1.2, 0.0, 0.0]), Err(Error::OutOfBounds(_))));
        assert!(f.value(&[f64::NAN, 0.0, 0.0]).is_err());
        Ok(())
    }

    #[test]
    fn invalid_grids_rejected() {
        assert!(ScalarField::scalar_from_fn([10.0; 3], [0.0, 0.2, 0.2], potential).is_err());
        assert!(ScalarField::scalar_from_fn([-1.0, 1.0, 1.0], [0.2; 3], potential).is_err());
        assert!(ScalarField::scalar_from_fn([1.0; 3], [0.5; 3], |_| f64::NAN).is_err());
        assert!(ScalarField::from_values([3, 3, 3], [1.0; 3], vec![[0.0]; 26]).is_err());
        assert!(ScalarField::from_values([3, 3, 2], [1.0; 3], vec![[0.0]; 18]).is_err());
        assert!(ScalarField::from_values([3, 3, 3], [1.0; 3], vec![[0.0]; 27]).is_ok());
    }

    #[test]
    fn tiny_spacing_is_rejected_not_overflowed() {
        let err = ScalarField::scalar_from_fn([1.0; 3], [1e-20; 3], |_| 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
        assert!(err.to_string().contains("too large"));
        // every axis fits on its own, the product does not
        let err = ScalarField::scalar_from_fn([1.0; 3], [1e-3; 3], |_| 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
        let huge = [usize::MAX, 3, 3];
        assert!(ScalarField::from_values(huge, [1.0; 3], vec![[0.0]; 27]).is_err());
    }

    #[test]
    fn multi_indices_c_order() {
        let idx: Vec<_> = multi_indices([2, 1, 2]).collect();
        assert_eq!(idx, vec![[0, 0, 0], [0, 0, 1], [1, 0, 0], [1, 0, 1]]);
    }
}

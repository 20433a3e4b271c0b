use crate::core::vector::{self, Vec3};
use crate::error::{Error, Result};

/// Smallest normal length accepted before normalization.
const EPS_NORMAL: f64 = 1e-12;

/// Planar wall `n·x = dist` with unit normal `n`.
///
/// The normal points into the allowed half-space, so a particle on the
/// permitted side has a positive signed distance. A ceiling at `z = L` is
/// `normal = [0, 0, -1]`, `dist = -L`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    normal: Vec3,
    dist: f64,
}

impl Wall {
    /// Build a wall, normalizing `normal`.
    ///
    /// Errors: `Error::InvalidParam` for a (near) zero or non-finite normal or a non-finite offset.
    pub fn new(normal: Vec3, dist: f64) -> Result<Self> {
        if !vector::is_finite(&normal) || !dist.is_finite() {
            return Err(Error::InvalidParam("wall normal and dist must be finite".into()));
        }
        let len = vector::norm(&normal);
        if len <= EPS_NORMAL {
            return Err(Error::InvalidParam("wall normal must be non-zero".into()));
        }
        Ok(Self {
            normal: vector::scale(1.0 / len, &normal),
            dist,
        })
    }

    /// Unit normal.
    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn dist(&self) -> f64 {
        self.dist
    }

    /// Signed distance of `x` from the wall surface.
    #[inline]
    pub fn signed_distance(&self, x: &Vec3) -> f64 {
        vector::dot(&self.normal, x) - self.dist
    }
}

/// A wall together with the policy deciding which particles it acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct WallConstraint {
    pub wall: Wall,
    /// Particles may cross the surface.
    pub penetrable: bool,
    /// Only the positive side of the wall interacts.
    pub only_positive: bool,
    /// Restrict the constraint to one particle type; `None` applies to all.
    pub particle_type: Option<u32>,
}

impl WallConstraint {
    /// Impenetrable two-sided wall acting on every particle.
    pub fn new(wall: Wall) -> Self {
        Self {
            wall,
            penetrable: false,
            only_positive: false,
            particle_type: None,
        }
    }

    pub fn for_type(mut self, particle_type: u32) -> Self {
        self.particle_type = Some(particle_type);
        self
    }

    pub fn penetrable(mut self, penetrable: bool) -> Self {
        self.penetrable = penetrable;
        self
    }

    pub fn only_positive(mut self, only_positive: bool) -> Self {
        self.only_positive = only_positive;
        self
    }

    /// Whether a particle of `particle_type` obeys this constraint.
    #[inline]
    pub fn applies_to(&self, particle_type: u32) -> bool {
        match self.particle_type {
            Some(t) => t == particle_type,
            None => true,
        }
    }

    /// Minimum signed distance over the positions of all applicable particles.
    ///
    /// Returns `f64::INFINITY` when no particle is applicable.
    pub fn min_distance<'a, I>(&self, particles: I) -> f64
    where
        I: IntoIterator<Item = (&'a Vec3, u32)>,
    {
        particles
            .into_iter()
            .filter(|(_, t)| self.applies_to(*t))
            .map(|(x, _)| self.wall.signed_distance(x))
            .fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_and_ceiling_distances() -> Result<()> {
        let floor = Wall::new([0.0, 0.0, 1.0], 0.1)?;
        let ceil = Wall::new([0.0, 0.0, -1.0], -49.9)?;
        let x = [3.0, 4.0, 10.0];
        assert!((floor.signed_distance(&x) - 9.9).abs() < 1e-12);
        assert!((ceil.signed_distance(&x) - 39.9).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn normal_is_normalized() -> Result<()> {
        let w = Wall::new([0.0, 3.0, 4.0], 1.0)?;
        assert!((vector::norm(&w.normal()) - 1.0).abs() < 1e-12);
        assert!((w.normal()[1] - 0.6).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn zero_normal_rejected() {
        let err = Wall::new([0.0; 3], 1.0).unwrap_err();
        assert!(err.to_string().contains("normal"));
    }

    #[test]
    fn type_filter_limits_min_distance() -> Result<()> {
        let c = WallConstraint::new(Wall::new([0.0, 0.0, 1.0], 0.0)?).for_type(0);
        let a = [0.0, 0.0, 5.0];
        let b = [0.0, 0.0, 0.5];
        // b is closer but has type 1
        let d = c.min_distance([(&a, 0), (&b, 1)]);
        assert!((d - 5.0).abs() < 1e-12);
        assert_eq!(c.min_distance(std::iter::empty()), f64::INFINITY);
        Ok(())
    }
}

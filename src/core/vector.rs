//! Minimal fixed-size vector arithmetic on `[f64; 3]`.

/// Fixed spatial dimension (3D).
pub const DIM: usize = 3;

/// A 3-vector stored as a plain array.
pub type Vec3 = [f64; DIM];

/// The zero vector.
pub const ZERO: Vec3 = [0.0; DIM];

#[inline]
pub fn dot(a: &Vec3, b: &Vec3) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn add(a: &Vec3, b: &Vec3) -> Vec3 {
    let mut out = ZERO;
    for ((o, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o = x + y;
    }
    out
}

#[inline]
pub fn sub(a: &Vec3, b: &Vec3) -> Vec3 {
    let mut out = ZERO;
    for ((o, &x), &y) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o = x - y;
    }
    out
}

#[inline]
pub fn scale(s: f64, a: &Vec3) -> Vec3 {
    a.map(|x| s * x)
}

#[inline]
pub fn norm(a: &Vec3) -> f64 {
    dot(a, a).sqrt()
}

/// True when every component is finite.
#[inline]
pub fn is_finite(a: &Vec3) -> bool {
    a.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, -5.0, 0.5];
        assert_eq!(dot(&a, &b), 4.0 - 10.0 + 1.5);
        assert_eq!(add(&a, &b), [5.0, -3.0, 3.5]);
        assert_eq!(sub(&a, &b), [-3.0, 7.0, 2.5]);
        assert_eq!(scale(2.0, &a), [2.0, 4.0, 6.0]);
        assert!((norm(&[3.0, 4.0, 0.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn finiteness() {
        assert!(is_finite(&[0.0, 1.0, -2.0]));
        assert!(!is_finite(&[0.0, f64::NAN, 0.0]));
        assert!(!is_finite(&[f64::INFINITY, 0.0, 0.0]));
    }
}

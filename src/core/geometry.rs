//! 2D vector helpers shared by the detector, the resolver and the reaction engine.

use nalgebra::{Point2, Vector2};

/// Small numeric tolerance for geometric checks.
pub const EPS: f64 = 1e-12;

/// Contact tolerance: spheres closer than `r1 + r2 + CONTACT_SLOP` count as touching.
pub const CONTACT_SLOP: f64 = 1e-9;

pub type Vec2 = Vector2<f64>;
pub type Pos2 = Point2<f64>;

/// Unit vector pointing from `from` to `to`, or `None` when the points coincide.
#[inline]
pub fn unit_between(from: &Pos2, to: &Pos2) -> Option<Vec2> {
    let d = to - from;
    let len = d.norm();
    if len <= EPS || !len.is_finite() {
        return None;
    }
    Some(d / len)
}

/// Squared distance between two points.
#[inline]
pub fn distance_sq(a: &Pos2, b: &Pos2) -> f64 {
    (b - a).norm_squared()
}

/// Split `v` into the component along unit `n` (as a scalar) and the remainder perpendicular to it.
#[inline]
pub fn decompose(v: &Vec2, n: &Vec2) -> (f64, Vec2) {
    let along = v.dot(n);
    (along, v - n * along)
}

/// Point on segment `[a, b]` closest to `p`.
pub fn closest_on_segment(p: &Pos2, a: &Pos2, b: &Pos2) -> Pos2 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= EPS {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Mass-weighted average of two velocities.
#[inline]
pub fn mass_weighted(v1: &Vec2, m1: f64, v2: &Vec2, m2: f64) -> Vec2 {
    (v1 * m1 + v2 * m2) / (m1 + m2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_between_normalizes() {
        let n = unit_between(&Pos2::new(1.0, 1.0), &Pos2::new(4.0, 5.0)).expect("distinct points");
        assert!((n.norm() - 1.0).abs() < 1e-12);
        assert!((n.x - 0.6).abs() < 1e-12);
        assert!((n.y - 0.8).abs() < 1e-12);
    }

    #[test]
    fn unit_between_rejects_coincident_points() {
        let p = Pos2::new(3.0, -2.0);
        assert!(unit_between(&p, &p).is_none());
    }

    #[test]
    fn decompose_recombines() {
        let v = Vec2::new(3.0, -7.0);
        let n = Vec2::new(0.0, 1.0);
        let (along, perp) = decompose(&v, &n);
        assert_eq!(along, -7.0);
        assert_eq!(perp, Vec2::new(3.0, 0.0));
        assert_eq!(perp + n * along, v);
    }

    #[test]
    fn closest_point_is_clamped_to_segment() {
        let a = Pos2::new(0.0, 0.0);
        let b = Pos2::new(10.0, 0.0);
        assert_eq!(closest_on_segment(&Pos2::new(4.0, 3.0), &a, &b), Pos2::new(4.0, 0.0));
        assert_eq!(closest_on_segment(&Pos2::new(-5.0, 1.0), &a, &b), a);
        assert_eq!(closest_on_segment(&Pos2::new(15.0, 1.0), &a, &b), b);
    }
}

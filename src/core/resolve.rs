//! Hard-body collision response.
//!
//! Velocities are split into a component along the line of centers and a perpendicular
//! remainder; only the component along the line changes.

use crate::core::geometry::{decompose, unit_between, Vec2, EPS};
use crate::core::molecule::{Body, Mass};

/// New speeds along the line of centers for a 1D elastic collision.
#[inline]
pub fn elastic_1d(m1: f64, u1: f64, m2: f64, u2: f64) -> (f64, f64) {
    let total = m1 + m2;
    let v1 = ((m1 - m2) * u1 + 2.0 * m2 * u2) / total;
    let v2 = ((m2 - m1) * u2 + 2.0 * m1 * u1) / total;
    (v1, v2)
}

/// Resolve an elastic collision between `a` and `b` along unit `n` (pointing from A to B).
///
/// Returns `false` and leaves both velocities untouched when the bodies are separating along
/// `n`, both are immovable, or `n` is degenerate.
pub fn resolve<A, B>(a: &mut A, b: &mut B, n: &Vec2) -> bool
where
    A: Body + ?Sized,
    B: Body + ?Sized,
{
    let len = n.norm();
    if !len.is_finite() || (len - 1.0).abs() > 1e-6 {
        return false;
    }
    let (va, vb) = (a.velocity(), b.velocity());
    let (ua, perp_a) = decompose(&va, n);
    let (ub, perp_b) = decompose(&vb, n);

    // Closing speed along n must be positive
    if ua - ub <= 0.0 {
        return false;
    }

    match (a.mass(), b.mass()) {
        (Mass::Finite(ma), Mass::Finite(mb)) => {
            let (ua2, ub2) = elastic_1d(ma, ua, mb, ub);
            a.set_velocity(perp_a + n * ua2);
            b.set_velocity(perp_b + n * ub2);
        }
        (Mass::Finite(_), Mass::Infinite) => {
            a.set_velocity(perp_a + n * (2.0 * ub - ua));
        }
        (Mass::Infinite, Mass::Finite(_)) => {
            b.set_velocity(perp_b + n * (2.0 * ua - ub));
        }
        (Mass::Infinite, Mass::Infinite) => return false,
    }
    true
}

/// Resolve along the line joining the two bodies' positions (used for reaction products).
pub fn resolve_by_centers<A, B>(a: &mut A, b: &mut B) -> bool
where
    A: Body + ?Sized,
    B: Body + ?Sized,
{
    match unit_between(&a.position(), &b.position()) {
        Some(n) => resolve(a, b, &n),
        None => false,
    }
}

/// Reflect a finite body off an immovable surface with unit normal `n` (pointing toward the
/// body) moving at `surface_v`: `v_n' = 2 * surface_v_n - v_n`.
pub fn reflect<A: Body + ?Sized>(body: &mut A, n: &Vec2, surface_v: &Vec2) -> bool {
    let v = body.velocity();
    let (vn, perp) = decompose(&v, n);
    let wn = surface_v.dot(n);
    // Only bodies moving into the surface (relative to it) are reflected
    if vn - wn >= -EPS {
        return false;
    }
    body.set_velocity(perp + n * (2.0 * wn - vn));
    true
}

use crate::core::container::WallSide;
use crate::core::geometry::{Pos2, Vec2};
use crate::core::molecule::{BodyId, Species};
use crate::error::{Error, Result};
use ordered_float::NotNan;
use std::cmp::Ordering;

/// Who touched whom.
///
/// Molecule contacts name both the top-level bodies and the atoms that actually touch
/// (for a free atom the two coincide).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Molecules {
        body_a: BodyId,
        body_b: BodyId,
        atom_a: BodyId,
        atom_b: BodyId,
        species_a: Species,
        species_b: Species,
    },
    Wall {
        body: BodyId,
        atom: BodyId,
        side: WallSide,
    },
}

impl ContactKind {
    #[inline]
    fn order_key(&self) -> (u8, u32, u32) {
        match *self {
            ContactKind::Molecules { body_a, body_b, .. } => (0, body_a.0, body_b.0),
            ContactKind::Wall { body, side, .. } => (1, body.0, side as u32),
        }
    }

    /// Top-level bodies involved.
    pub fn bodies(&self) -> (BodyId, Option<BodyId>) {
        match *self {
            ContactKind::Molecules { body_a, body_b, .. } => (body_a, Some(body_b)),
            ContactKind::Wall { body, .. } => (body, None),
        }
    }
}

/// One detected contact, valid for the tick it was detected in.
///
/// - `loa`: unit line of centers. For molecule contacts it points from atom A to atom B; for
///   wall contacts it is the wall normal (pointing into the box).
/// - `point`: contact point.
/// - `depth`: penetration depth (>= 0 up to tolerance; large for escaped bodies).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionSpec {
    pub kind: ContactKind,
    pub loa: Vec2,
    pub point: Pos2,
    depth: NotNan<f64>,
}

impl CollisionSpec {
    /// Create a contact, validating that the depth is a number.
    pub fn new(kind: ContactKind, loa: Vec2, point: Pos2, depth: f64) -> Result<Self> {
        let depth = NotNan::new(depth)
            .map_err(|_| Error::MathError("contact depth cannot be NaN".into()))?;
        Ok(Self {
            kind,
            loa,
            point,
            depth,
        })
    }

    #[inline]
    pub fn depth(&self) -> f64 {
        self.depth.into_inner()
    }

    pub fn involves(&self, id: BodyId) -> bool {
        match self.kind.bodies() {
            (a, Some(b)) => a == id || b == id,
            (a, None) => a == id,
        }
    }

    /// Deepest penetration first; ties fall back to contact kind then ids, so the order is total.
    pub fn deepest_first(&self, other: &Self) -> Ordering {
        match other.depth.cmp(&self.depth) {
            Ordering::Equal => self.kind.order_key().cmp(&other.kind.order_key()),
            o => o,
        }
    }
}

/// How contacts detected in one tick are sequenced before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOrder {
    /// Body registration order (the detector's natural output order).
    #[default]
    Registration,
    /// Deepest penetration first.
    DeepestFirst,
}

impl ResolutionOrder {
    pub fn apply(self, contacts: &mut [CollisionSpec]) {
        match self {
            ResolutionOrder::Registration => {}
            ResolutionOrder::DeepestFirst => contacts.sort_by(|a, b| a.deepest_first(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_contact(body: u32, depth: f64) -> Result<CollisionSpec> {
        CollisionSpec::new(
            ContactKind::Wall {
                body: BodyId(body),
                atom: BodyId(body),
                side: WallSide::Left,
            },
            Vec2::new(1.0, 0.0),
            Pos2::origin(),
            depth,
        )
    }

    fn pair_contact(a: u32, b: u32, depth: f64) -> Result<CollisionSpec> {
        CollisionSpec::new(
            ContactKind::Molecules {
                body_a: BodyId(a),
                body_b: BodyId(b),
                atom_a: BodyId(a),
                atom_b: BodyId(b),
                species_a: Species::A,
                species_b: Species::B,
            },
            Vec2::new(1.0, 0.0),
            Pos2::origin(),
            depth,
        )
    }

    #[test]
    fn new_contact_rejects_nan_depth() {
        let err = wall_contact(1, f64::NAN).unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn deepest_first_orders_by_depth() -> Result<()> {
        let mut v = vec![wall_contact(1, 0.1)?, pair_contact(2, 3, 0.5)?, wall_contact(4, 0.3)?];
        ResolutionOrder::DeepestFirst.apply(&mut v);
        let depths: Vec<f64> = v.iter().map(|c| c.depth()).collect();
        assert_eq!(depths, vec![0.5, 0.3, 0.1]);
        Ok(())
    }

    #[test]
    fn tie_breaker_prefers_molecule_contacts() -> Result<()> {
        let a = pair_contact(5, 6, 0.2)?;
        let b = wall_contact(1, 0.2)?;
        assert_eq!(a.deepest_first(&b), Ordering::Less);
        Ok(())
    }

    #[test]
    fn registration_order_is_untouched() -> Result<()> {
        let mut v = vec![wall_contact(1, 0.1)?, pair_contact(2, 3, 0.5)?];
        ResolutionOrder::Registration.apply(&mut v);
        assert_eq!(v[0].depth(), 0.1);
        Ok(())
    }

    #[test]
    fn involves_checks_both_bodies() -> Result<()> {
        let c = pair_contact(2, 3, 0.0)?;
        assert!(c.involves(BodyId(2)) && c.involves(BodyId(3)));
        assert!(!c.involves(BodyId(4)));
        Ok(())
    }
}

//! Exchange reactions `A + BC <-> AB + C`.
//!
//! A reaction is a pairing of an [`EnergyProfile`], a criteria policy and a rule for the
//! kinematics of the products. The free atom must strike the `B` atom of the composite with
//! enough energy along the line of centers; the composite then swaps partners and the displaced
//! atom leaves as a free molecule.

use crate::core::contact::{CollisionSpec, ContactKind};
use crate::core::geometry::{mass_weighted, Vec2};
use crate::core::molecule::{
    Body, BodyId, CompositeKind, CompositeMolecule, Molecule, SimpleMolecule, Species,
};
use crate::core::resolve::resolve_by_centers;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Three-level potential-energy landscape of a reaction plus the barrier width.
///
/// The left floor belongs to the `A + BC` side, the right floor to the `AB + C` side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyProfile {
    left: f64,
    peak: f64,
    right: f64,
    width: f64,
}

impl Default for EnergyProfile {
    fn default() -> Self {
        Self {
            left: 10.0,
            peak: 100.0,
            right: 60.0,
            width: 50.0,
        }
    }
}

impl EnergyProfile {
    /// Errors:
    /// - `Error::InvalidParam` if a level is non-finite, a floor lies above the peak, or the
    ///   width is not positive.
    pub fn new(left: f64, peak: f64, right: f64, width: f64) -> Result<Self> {
        if !Self::levels_valid(left, peak, right) {
            return Err(Error::InvalidParam(format!(
                "energy levels must be finite with floors <= peak (left {left}, peak {peak}, right {right})"
            )));
        }
        if !width.is_finite() || width <= 0.0 {
            return Err(Error::InvalidParam("barrier width must be finite and > 0".into()));
        }
        Ok(Self {
            left,
            peak,
            right,
            width,
        })
    }

    fn levels_valid(left: f64, peak: f64, right: f64) -> bool {
        left.is_finite() && peak.is_finite() && right.is_finite() && left <= peak && right <= peak
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn peak(&self) -> f64 {
        self.peak
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Replace all three levels at once. Rejected (returns `false`) if the result is invalid.
    pub fn set_levels(&mut self, left: f64, peak: f64, right: f64) -> bool {
        if !Self::levels_valid(left, peak, right) {
            return false;
        }
        self.left = left;
        self.peak = peak;
        self.right = right;
        true
    }

    pub fn set_left(&mut self, left: f64) -> bool {
        self.set_levels(left, self.peak, self.right)
    }

    pub fn set_peak(&mut self, peak: f64) -> bool {
        self.set_levels(self.left, peak, self.right)
    }

    pub fn set_right(&mut self, right: f64) -> bool {
        self.set_levels(self.left, self.peak, right)
    }

    pub fn set_width(&mut self, width: f64) -> bool {
        if !width.is_finite() || width <= 0.0 {
            return false;
        }
        self.width = width;
        true
    }

    /// Floor occupied by a composite of the given kind.
    pub fn floor(&self, kind: CompositeKind) -> f64 {
        match kind {
            CompositeKind::BC => self.left,
            CompositeKind::AB => self.right,
        }
    }

    /// Energy the reactants must bring to climb from their floor to the peak.
    pub fn threshold(&self, reactant: CompositeKind) -> f64 {
        self.peak - self.floor(reactant)
    }
}

/// Which energy a collision must exceed to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaPolicy {
    /// Relative KE along the line of centers above `peak - reactant floor`.
    #[default]
    RelativeAboveThreshold,
    /// Relative KE along the line of centers above the bare peak level.
    RelativeAbovePeak,
}

/// How the products are set moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKinematics {
    /// Hard-body collision between the new composite and the displaced atom.
    #[default]
    HardBody,
    /// Merge the bonding atoms' velocities to their mass-weighted average, then collide.
    MergeThenHardBody,
}

/// Predicate deciding whether a colliding pair reacts.
pub trait ReactionCriteria {
    /// Exactly one composite and one free atom that the composite can exchange with.
    fn molecules_are_proper_types(&self, a: &Molecule, b: &Molecule) -> bool;

    /// Proper types, the right atoms touching, and enough energy.
    fn criteria_met(
        &self,
        a: &Molecule,
        b: &Molecule,
        spec: &CollisionSpec,
        threshold: f64,
    ) -> bool;
}

/// Free atom that reacts with a composite of `kind`.
pub fn incoming_species(kind: CompositeKind) -> Species {
    match kind {
        CompositeKind::BC => Species::A,
        CompositeKind::AB => Species::C,
    }
}

/// Composite formed when `kind` reacts.
pub fn product_kind(kind: CompositeKind) -> CompositeKind {
    match kind {
        CompositeKind::BC => CompositeKind::AB,
        CompositeKind::AB => CompositeKind::BC,
    }
}

fn split<'a>(
    a: &'a Molecule,
    b: &'a Molecule,
) -> Option<(&'a CompositeMolecule, &'a SimpleMolecule)> {
    match (a, b) {
        (Molecule::Composite(c), Molecule::Simple(s))
        | (Molecule::Simple(s), Molecule::Composite(c)) => Some((c, s)),
        _ => None,
    }
}

/// Kinetic energy of the pair treated as one body of mass `m_a + m_b` moving at the closing
/// speed along the contact's line of centers.
///
/// Returns 0 if the contact does not name `a` and `b`.
pub fn relative_kinetic_energy(a: &Molecule, b: &Molecule, spec: &CollisionSpec) -> f64 {
    let ContactKind::Molecules { body_a, body_b, .. } = spec.kind else {
        return 0.0;
    };
    // loa points from the contact's first body to its second
    let n: Vec2 = if body_a == a.id() && body_b == b.id() {
        spec.loa
    } else if body_a == b.id() && body_b == a.id() {
        -spec.loa
    } else {
        return 0.0;
    };
    let closing = (a.velocity() - b.velocity()).dot(&n).max(0.0);
    let m = a.mass().value() + b.mass().value();
    0.5 * m * closing * closing
}

/// What a fired reaction did.
///
/// - `consumed`: the old composite
/// - `absorbed`: the free atom that is now bonded inside `composite`
/// - `composite`, `released`: the products, ready to register
#[derive(Debug, Clone)]
pub struct ReactionOutcome {
    pub consumed: BodyId,
    pub absorbed: BodyId,
    pub composite: Molecule,
    pub released: Molecule,
}

/// `A + BC <-> AB + C`, in both directions.
#[derive(Debug, Clone, Default)]
pub struct ExchangeReaction {
    pub profile: EnergyProfile,
    pub policy: CriteriaPolicy,
    pub kinematics: ProductKinematics,
}

impl ExchangeReaction {
    pub fn new(
        profile: EnergyProfile,
        policy: CriteriaPolicy,
        kinematics: ProductKinematics,
    ) -> Self {
        Self {
            profile,
            policy,
            kinematics,
        }
    }

    /// Threshold for a pair, keyed on which composite is on the reactant side.
    ///
    /// Errors:
    /// - `Error::Invariant` if the pair is not one composite and one free atom.
    pub fn threshold_energy(&self, a: &Molecule, b: &Molecule) -> Result<f64> {
        let (c, _) = split(a, b).ok_or_else(|| {
            Error::Invariant(format!(
                "threshold requested for non-reacting pair {} / {}",
                a.id(),
                b.id()
            ))
        })?;
        Ok(self.profile.threshold(c.kind))
    }

    /// Fire the reaction, consuming both molecules.
    ///
    /// The `B` atom of the old composite bonds with the incoming atom into a new composite with
    /// id `new_id`; the other atom is released. Products are then pushed apart with a hard-body
    /// collision, after first merging the bonding atoms' velocities if so configured.
    ///
    /// Errors:
    /// - `Error::Invariant` if the pair is not one this reaction was wired for.
    pub fn react(&self, a: Molecule, b: Molecule, new_id: BodyId) -> Result<ReactionOutcome> {
        let (composite, incoming) = match (a, b) {
            (Molecule::Composite(c), Molecule::Simple(s))
            | (Molecule::Simple(s), Molecule::Composite(c)) => (c, s),
            (x, y) => {
                return Err(Error::Invariant(format!(
                    "exchange reaction needs one composite and one free atom, got {} and {}",
                    x.id(),
                    y.id()
                )))
            }
        };
        if incoming.species != incoming_species(composite.kind) {
            return Err(Error::Invariant(format!(
                "{} cannot react with {}",
                incoming.species, composite.kind
            )));
        }
        let consumed = composite.id;
        let reactant = composite.kind;
        let absorbed = incoming.id;
        let bonding = composite.kind.bonding_species();

        let [first, second] = composite.into_components();
        let (mut b_atom, mut released) = if first.species == bonding {
            (first, second)
        } else if second.species == bonding {
            (second, first)
        } else {
            return Err(Error::Invariant(format!(
                "composite {consumed} has no {bonding} atom"
            )));
        };

        let mut incoming = incoming;
        if self.kinematics == ProductKinematics::MergeThenHardBody {
            let v = mass_weighted(
                &b_atom.velocity,
                b_atom.mass,
                &incoming.velocity,
                incoming.mass,
            );
            b_atom.velocity = v;
            incoming.velocity = v;
        }

        let mut product = CompositeMolecule::new(new_id, b_atom, incoming)?;
        debug_assert_eq!(product.kind, product_kind(reactant));
        // The new bond moves rigidly at its center-of-mass velocity
        let v = product.velocity();
        product.set_velocity(v);
        if !resolve_by_centers(&mut product, &mut released) {
            log::debug!("reaction products {new_id} and {} already separating", released.id);
        }

        Ok(ReactionOutcome {
            consumed,
            absorbed,
            composite: Molecule::Composite(product),
            released: Molecule::Simple(released),
        })
    }
}

impl ReactionCriteria for ExchangeReaction {
    fn molecules_are_proper_types(&self, a: &Molecule, b: &Molecule) -> bool {
        match split(a, b) {
            Some((c, s)) => s.species == incoming_species(c.kind) && !c.kind.contains(s.species),
            None => false,
        }
    }

    fn criteria_met(
        &self,
        a: &Molecule,
        b: &Molecule,
        spec: &CollisionSpec,
        threshold: f64,
    ) -> bool {
        let Some((c, s)) = split(a, b) else {
            return false;
        };
        if !self.molecules_are_proper_types(a, b) {
            return false;
        }
        // The free atom has to strike the bonding atom, not its partner
        let ContactKind::Molecules { atom_a, atom_b, .. } = spec.kind else {
            return false;
        };
        let Some(bonding) = c.atom(c.kind.bonding_species()) else {
            return false;
        };
        let struck_bonding = (atom_a == bonding.id && atom_b == s.id)
            || (atom_b == bonding.id && atom_a == s.id);
        if !struck_bonding {
            return false;
        }

        let rel_ke = relative_kinetic_energy(a, b, spec);
        match self.policy {
            CriteriaPolicy::RelativeAboveThreshold => rel_ke > threshold,
            CriteriaPolicy::RelativeAbovePeak => rel_ke > self.profile.peak(),
        }
    }
}

/// Registered reactions, tried in order.
#[derive(Debug, Clone, Default)]
pub struct ReactionTable {
    reactions: Vec<ExchangeReaction>,
}

impl ReactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reaction: ExchangeReaction) {
        self.reactions.push(reaction);
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ExchangeReaction> {
        self.reactions.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ExchangeReaction> {
        self.reactions.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExchangeReaction> {
        self.reactions.iter()
    }

    /// First reaction whose criteria the colliding pair meets.
    pub fn find(
        &self,
        a: &Molecule,
        b: &Molecule,
        spec: &CollisionSpec,
    ) -> Option<&ExchangeReaction> {
        self.reactions.iter().find(|r| {
            r.molecules_are_proper_types(a, b)
                && r
                    .threshold_energy(a, b)
                    .map(|t| r.criteria_met(a, b, spec, t))
                    .unwrap_or(false)
        })
    }

    /// Chemical potential energy of each composite kind, taken from the first reaction.
    pub fn chemical_energies(&self) -> BTreeMap<CompositeKind, f64> {
        let mut out = BTreeMap::new();
        if let Some(r) = self.reactions.first() {
            for kind in CompositeKind::ALL {
                out.insert(kind, r.profile.floor(kind));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Pos2;

    const M: f64 = 1.0;

    fn atom(id: u32, species: Species, x: f64, vx: f64) -> Result<SimpleMolecule> {
        SimpleMolecule::with_properties(
            BodyId(id),
            species,
            Pos2::new(x, 0.0),
            Vec2::new(vx, 0.0),
            M,
            1.0,
        )
    }

    /// BC at rest with B at x = 0 and C at x = 2; free A at x = -2 moving right at `va`.
    fn a_meets_bc(va: f64) -> Result<(Molecule, Molecule, CollisionSpec)> {
        let b = atom(1, Species::B, 0.0, 0.0)?;
        let c = atom(2, Species::C, 2.0, 0.0)?;
        let bc = Molecule::Composite(CompositeMolecule::new(BodyId(3), b, c)?);
        let a = Molecule::Simple(atom(4, Species::A, -2.0, va)?);
        let spec = CollisionSpec::new(
            ContactKind::Molecules {
                body_a: BodyId(4),
                body_b: BodyId(3),
                atom_a: BodyId(4),
                atom_b: BodyId(1),
                species_a: Species::A,
                species_b: Species::B,
            },
            Vec2::new(1.0, 0.0),
            Pos2::new(-1.0, 0.0),
            0.0,
        )?;
        Ok((a, bc, spec))
    }

    /// Closing speed giving the requested relative KE for the 1 + 2 mass pair above.
    fn speed_for(rel_ke: f64) -> f64 {
        (2.0 * rel_ke / (3.0 * M)).sqrt()
    }

    fn gated_reaction() -> Result<ExchangeReaction> {
        Ok(ExchangeReaction::new(
            EnergyProfile::new(20.0, 100.0, 10.0, 50.0)?,
            CriteriaPolicy::RelativeAboveThreshold,
            ProductKinematics::HardBody,
        ))
    }

    #[test]
    fn profile_rejects_floor_above_peak() -> Result<()> {
        assert!(EnergyProfile::new(120.0, 100.0, 10.0, 50.0).is_err());
        let mut p = EnergyProfile::new(20.0, 100.0, 10.0, 50.0)?;
        assert!(!p.set_peak(15.0));
        assert!(!p.set_width(0.0));
        assert!(p.set_right(30.0));
        assert_eq!(p.threshold(CompositeKind::AB), 70.0);
        assert_eq!(p.threshold(CompositeKind::BC), 80.0);
        Ok(())
    }

    #[test]
    fn relative_ke_is_measured_along_line_of_centers() -> Result<()> {
        let (a, bc, spec) = a_meets_bc(4.0)?;
        // 0.5 * (1 + 2) * 4^2
        assert!((relative_kinetic_energy(&a, &bc, &spec) - 24.0).abs() < 1e-12);
        // argument order does not matter
        assert!((relative_kinetic_energy(&bc, &a, &spec) - 24.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn threshold_gates_reaction() -> Result<()> {
        let rx = gated_reaction()?;
        let (a, bc, spec) = a_meets_bc(speed_for(50.0))?;
        let t = rx.threshold_energy(&a, &bc)?;
        assert_eq!(t, 80.0);
        assert!(!rx.criteria_met(&a, &bc, &spec, t));

        let (a, bc, spec) = a_meets_bc(speed_for(90.0))?;
        assert!(rx.criteria_met(&a, &bc, &spec, t));
        Ok(())
    }

    #[test]
    fn peak_policy_needs_more_energy() -> Result<()> {
        let mut rx = gated_reaction()?;
        rx.policy = CriteriaPolicy::RelativeAbovePeak;
        let (a, bc, spec) = a_meets_bc(speed_for(90.0))?;
        assert!(!rx.criteria_met(&a, &bc, &spec, 80.0));
        let (a, bc, spec) = a_meets_bc(speed_for(110.0))?;
        assert!(rx.criteria_met(&a, &bc, &spec, 80.0));
        Ok(())
    }

    #[test]
    fn free_atom_must_strike_bonding_atom() -> Result<()> {
        let rx = gated_reaction()?;
        let (a, bc, mut spec) = a_meets_bc(speed_for(500.0))?;
        // pretend A hit C instead
        spec.kind = ContactKind::Molecules {
            body_a: BodyId(4),
            body_b: BodyId(3),
            atom_a: BodyId(4),
            atom_b: BodyId(2),
            species_a: Species::A,
            species_b: Species::C,
        };
        assert!(!rx.criteria_met(&a, &bc, &spec, 80.0));
        Ok(())
    }

    #[test]
    fn wrong_types_never_react() -> Result<()> {
        let rx = gated_reaction()?;
        let a = Molecule::Simple(atom(1, Species::A, 0.0, 0.0)?);
        let c = Molecule::Simple(atom(2, Species::C, 2.0, 0.0)?);
        assert!(!rx.molecules_are_proper_types(&a, &c));
        // C does not react with BC
        let b = atom(3, Species::B, 10.0, 0.0)?;
        let c2 = atom(4, Species::C, 12.0, 0.0)?;
        let bc = Molecule::Composite(CompositeMolecule::new(BodyId(5), b, c2)?);
        assert!(!rx.molecules_are_proper_types(&c, &bc));
        assert!(matches!(rx.threshold_energy(&a, &c), Err(Error::Invariant(_))));
        Ok(())
    }

    #[test]
    fn react_rejects_unwired_pairs() -> Result<()> {
        let rx = gated_reaction()?;
        let a = Molecule::Simple(atom(1, Species::A, 0.0, 0.0)?);
        let c = Molecule::Simple(atom(2, Species::C, 2.0, 0.0)?);
        assert!(matches!(rx.react(a, c, BodyId(9)), Err(Error::Invariant(_))));
        Ok(())
    }

    #[test]
    fn reaction_conserves_species_and_momentum() -> Result<()> {
        for kinematics in [ProductKinematics::HardBody, ProductKinematics::MergeThenHardBody] {
            let rx = ExchangeReaction::new(
                EnergyProfile::new(20.0, 100.0, 10.0, 50.0)?,
                CriteriaPolicy::RelativeAboveThreshold,
                kinematics,
            );
            let (a, bc, _) = a_meets_bc(10.0)?;
            let p0 = a.momentum() + bc.momentum();
            let mut before: Vec<Species> =
                a.atoms().iter().chain(bc.atoms()).map(|x| x.species).collect();
            before.sort();

            let out = rx.react(a, bc, BodyId(10))?;
            assert_eq!(out.consumed, BodyId(3));
            assert_eq!(out.absorbed, BodyId(4));
            assert_eq!(out.composite.composite_kind(), Some(CompositeKind::AB));
            assert_eq!(out.released.species(), Some(Species::C));
            assert_eq!(out.released.id(), BodyId(2));
            assert!(out.released.atoms()[0].parent.is_none());

            let mut after: Vec<Species> = out
                .composite
                .atoms()
                .iter()
                .chain(out.released.atoms())
                .map(|x| x.species)
                .collect();
            after.sort();
            assert_eq!(before, after);

            let p1 = out.composite.momentum() + out.released.momentum();
            assert!((p1 - p0).norm() < 1e-9, "{kinematics:?}: {p0:?} -> {p1:?}");
        }
        Ok(())
    }

    #[test]
    fn oblique_strike_leaves_a_rigid_product() -> Result<()> {
        for kinematics in [ProductKinematics::HardBody, ProductKinematics::MergeThenHardBody] {
            let rx = ExchangeReaction::new(
                EnergyProfile::default(),
                CriteriaPolicy::default(),
                kinematics,
            );
            let b = atom(1, Species::B, 0.0, 0.0)?;
            let c = atom(2, Species::C, 2.0, 0.0)?;
            let bc = Molecule::Composite(CompositeMolecule::new(BodyId(3), b, c)?);
            // A touches B from above-left, moving down-right
            let a = Molecule::Simple(SimpleMolecule::with_properties(
                BodyId(4),
                Species::A,
                Pos2::new(-1.2, 1.6),
                Vec2::new(-30.0, 20.0),
                M,
                1.0,
            )?);
            let p0 = a.momentum() + bc.momentum();

            let out = rx.react(a, bc, BodyId(10))?;
            let [first, second] = match &out.composite {
                Molecule::Composite(c) => c.components().clone(),
                other => panic!("expected a composite, got {other:?}"),
            };
            assert!(
                (first.velocity - second.velocity).norm() < 1e-12,
                "{kinematics:?}: atoms move at {:?} and {:?}",
                first.velocity,
                second.velocity
            );
            assert!((out.composite.velocity() - first.velocity).norm() < 1e-12);
            let p1 = out.composite.momentum() + out.released.momentum();
            assert!((p1 - p0).norm() < 1e-9);
        }
        Ok(())
    }

    #[test]
    fn table_reports_chemical_energies() -> Result<()> {
        let mut table = ReactionTable::new();
        assert!(table.chemical_energies().is_empty());
        table.push(gated_reaction()?);
        let chem = table.chemical_energies();
        assert_eq!(chem.get(&CompositeKind::BC), Some(&20.0));
        assert_eq!(chem.get(&CompositeKind::AB), Some(&10.0));
        let (a, bc, spec) = a_meets_bc(speed_for(90.0))?;
        assert!(table.find(&a, &bc, &spec).is_some());
        Ok(())
    }
}

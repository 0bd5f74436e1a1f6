use crate::core::geometry::{Pos2, Vec2};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a body. Ids are never reused within one registry, so ordering by id
/// is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Inertial mass. Walls and other immovable bodies have `Infinite` mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mass {
    Finite(f64),
    Infinite,
}

impl Mass {
    #[inline]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Mass::Infinite)
    }

    /// Raw value; `f64::INFINITY` for immovable bodies.
    #[inline]
    pub fn value(&self) -> f64 {
        match *self {
            Mass::Finite(m) => m,
            Mass::Infinite => f64::INFINITY,
        }
    }
}

/// Capability set shared by everything that can take part in a collision.
pub trait Body {
    fn position(&self) -> Pos2;
    fn velocity(&self) -> Vec2;
    fn set_velocity(&mut self, v: Vec2);
    fn mass(&self) -> Mass;

    /// 1/2 m |v|^2, zero for immovable bodies.
    fn kinetic_energy(&self) -> f64 {
        match self.mass() {
            Mass::Finite(m) => 0.5 * m * self.velocity().norm_squared(),
            Mass::Infinite => 0.0,
        }
    }
}

/// Closed set of atom species.
///
/// `A`, `B` and `C` take part in exchange reactions; `Heavy` and `Light` are inert gas species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    A,
    B,
    C,
    Heavy,
    Light,
}

impl Species {
    pub const ALL: [Species; 5] = [
        Species::A,
        Species::B,
        Species::C,
        Species::Heavy,
        Species::Light,
    ];

    pub fn default_mass(self) -> f64 {
        match self {
            Species::A => 8.0,
            Species::B => 10.0,
            Species::C => 6.0,
            Species::Heavy => 27.0,
            Species::Light => 4.0,
        }
    }

    pub fn default_radius(self) -> f64 {
        match self {
            Species::A => 8.0,
            Species::B => 10.0,
            Species::C => 6.0,
            Species::Heavy => 5.0,
            Species::Light => 3.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::A => "A",
            Species::B => "B",
            Species::C => "C",
            Species::Heavy => "Heavy",
            Species::Light => "Light",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Species::ALL
            .iter()
            .copied()
            .find(|sp| sp.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidParam(format!("unknown species '{s}'")))
    }
}

/// The bonded pairs that exist in the model. `B` is the bonding atom of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompositeKind {
    AB,
    BC,
}

impl CompositeKind {
    pub const ALL: [CompositeKind; 2] = [CompositeKind::AB, CompositeKind::BC];

    pub fn species(self) -> [Species; 2] {
        match self {
            CompositeKind::AB => [Species::A, Species::B],
            CompositeKind::BC => [Species::B, Species::C],
        }
    }

    /// Atom shared by every composite; the one a free atom must strike to react.
    pub fn bonding_species(self) -> Species {
        Species::B
    }

    /// Kind formed by bonding `s1` and `s2`, in either order.
    pub fn from_pair(s1: Species, s2: Species) -> Option<Self> {
        match (s1, s2) {
            (Species::A, Species::B) | (Species::B, Species::A) => Some(CompositeKind::AB),
            (Species::B, Species::C) | (Species::C, Species::B) => Some(CompositeKind::BC),
            _ => None,
        }
    }

    pub fn contains(self, s: Species) -> bool {
        self.species().contains(&s)
    }

    pub fn name(self) -> &'static str {
        match self {
            CompositeKind::AB => "AB",
            CompositeKind::BC => "BC",
        }
    }
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompositeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CompositeKind::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidParam(format!("unknown composite '{s}'")))
    }
}

/// A single unsplittable atom.
///
/// Fields:
/// - `parent`: id of the composite currently holding this atom (lookup only; the composite owns it)
#[derive(Debug, Clone)]
pub struct SimpleMolecule {
    pub id: BodyId,
    pub species: Species,
    pub position: Pos2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub mass: f64,
    pub radius: f64,
    pub parent: Option<BodyId>,
}

impl SimpleMolecule {
    /// Atom with the species' default mass and radius.
    pub fn new(id: BodyId, species: Species, position: Pos2, velocity: Vec2) -> Result<Self> {
        Self::with_properties(
            id,
            species,
            position,
            velocity,
            species.default_mass(),
            species.default_radius(),
        )
    }

    /// Create an atom after validating invariants.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `radius` or `mass` is non-positive or any component is NaN/inf.
    pub fn with_properties(
        id: BodyId,
        species: Species,
        position: Pos2,
        velocity: Vec2,
        mass: f64,
        radius: f64,
    ) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidParam("radius must be finite and > 0".into()));
        }
        if !mass.is_finite() || mass <= 0.0 {
            return Err(Error::InvalidParam("mass must be finite and > 0".into()));
        }
        if !position.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("position must be finite".into()));
        }
        if !velocity.iter().all(|x| x.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        Ok(Self {
            id,
            species,
            position,
            velocity,
            acceleration: Vec2::zeros(),
            mass,
            radius,
            parent: None,
        })
    }

    #[inline]
    pub fn is_part_of_composite(&self) -> bool {
        self.parent.is_some()
    }

    #[inline]
    pub fn momentum(&self) -> Vec2 {
        self.velocity * self.mass
    }
}

impl Body for SimpleMolecule {
    fn position(&self) -> Pos2 {
        self.position
    }

    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_velocity(&mut self, v: Vec2) {
        self.velocity = v;
    }

    fn mass(&self) -> Mass {
        Mass::Finite(self.mass)
    }
}

/// Relation between the two atoms of a composite. Lives exactly as long as the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bond {
    pub a: BodyId,
    pub b: BodyId,
}

impl Bond {
    pub fn connects(&self, x: BodyId, y: BodyId) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }
}

/// Two bonded atoms moving as one rigid body.
///
/// Position and velocity are derived from the components: center of mass and total momentum.
/// Components may carry different velocities (nothing forces them to agree when a composite is
/// assembled), but the composite translates rigidly with its derived velocity.
#[derive(Debug, Clone)]
pub struct CompositeMolecule {
    pub id: BodyId,
    pub kind: CompositeKind,
    components: [SimpleMolecule; 2],
    bond: Bond,
}

impl CompositeMolecule {
    /// Bond two free atoms into a composite.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if the species pair forms no known composite or either atom is
    ///   already bonded elsewhere.
    pub fn new(id: BodyId, first: SimpleMolecule, second: SimpleMolecule) -> Result<Self> {
        let kind = CompositeKind::from_pair(first.species, second.species).ok_or_else(|| {
            Error::InvalidParam(format!(
                "{} and {} do not form a composite",
                first.species, second.species
            ))
        })?;
        if first.is_part_of_composite() || second.is_part_of_composite() {
            return Err(Error::InvalidParam(
                "atoms must be free before they can be bonded".into(),
            ));
        }
        let bond = Bond {
            a: first.id,
            b: second.id,
        };
        let mut components = [first, second];
        for c in &mut components {
            c.parent = Some(id);
        }
        Ok(Self {
            id,
            kind,
            components,
            bond,
        })
    }

    pub fn components(&self) -> &[SimpleMolecule; 2] {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut [SimpleMolecule; 2] {
        &mut self.components
    }

    pub fn bond(&self) -> Bond {
        self.bond
    }

    pub fn total_mass(&self) -> f64 {
        self.components.iter().map(|c| c.mass).sum()
    }

    pub fn momentum(&self) -> Vec2 {
        self.components.iter().map(|c| c.momentum()).sum()
    }

    /// Center of mass.
    pub fn center_of_mass(&self) -> Pos2 {
        let m = self.total_mass();
        let weighted: Vec2 = self
            .components
            .iter()
            .map(|c| c.position.coords * c.mass)
            .sum();
        Pos2::from(weighted / m)
    }

    /// Radius of the smallest circle about the center of mass enclosing both atoms.
    pub fn bounding_radius(&self) -> f64 {
        let cm = self.center_of_mass();
        self.components
            .iter()
            .map(|c| (c.position - cm).norm() + c.radius)
            .fold(0.0, f64::max)
    }

    /// The component of the given species, if present.
    pub fn atom(&self, species: Species) -> Option<&SimpleMolecule> {
        self.components.iter().find(|c| c.species == species)
    }

    /// Move every component by `dx`.
    pub fn translate(&mut self, dx: Vec2) {
        for c in &mut self.components {
            c.position += dx;
        }
    }

    /// Break the bond, releasing both atoms as free molecules.
    pub fn into_components(self) -> [SimpleMolecule; 2] {
        let mut comps = self.components;
        for c in &mut comps {
            c.parent = None;
        }
        comps
    }
}

impl Body for CompositeMolecule {
    fn position(&self) -> Pos2 {
        self.center_of_mass()
    }

    fn velocity(&self) -> Vec2 {
        self.momentum() / self.total_mass()
    }

    /// Rigid update: every component takes the same velocity.
    fn set_velocity(&mut self, v: Vec2) {
        for c in &mut self.components {
            c.velocity = v;
        }
    }

    fn mass(&self) -> Mass {
        Mass::Finite(self.total_mass())
    }
}

/// A top-level body in the registry.
#[derive(Debug, Clone)]
pub enum Molecule {
    Simple(SimpleMolecule),
    Composite(CompositeMolecule),
}

impl Molecule {
    pub fn id(&self) -> BodyId {
        match self {
            Molecule::Simple(s) => s.id,
            Molecule::Composite(c) => c.id,
        }
    }

    /// The atoms making up this body (one for a simple molecule, two for a composite).
    pub fn atoms(&self) -> &[SimpleMolecule] {
        match self {
            Molecule::Simple(s) => std::slice::from_ref(s),
            Molecule::Composite(c) => c.components(),
        }
    }

    pub fn atoms_mut(&mut self) -> &mut [SimpleMolecule] {
        match self {
            Molecule::Simple(s) => std::slice::from_mut(s),
            Molecule::Composite(c) => c.components_mut(),
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleMolecule> {
        match self {
            Molecule::Simple(s) => Some(s),
            Molecule::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeMolecule> {
        match self {
            Molecule::Composite(c) => Some(c),
            Molecule::Simple(_) => None,
        }
    }

    pub fn species(&self) -> Option<Species> {
        self.as_simple().map(|s| s.species)
    }

    pub fn composite_kind(&self) -> Option<CompositeKind> {
        self.as_composite().map(|c| c.kind)
    }

    pub fn momentum(&self) -> Vec2 {
        match self {
            Molecule::Simple(s) => s.momentum(),
            Molecule::Composite(c) => c.momentum(),
        }
    }

    /// Radius used for wall contact and bounds checks.
    pub fn extent(&self) -> f64 {
        match self {
            Molecule::Simple(s) => s.radius,
            Molecule::Composite(c) => c.bounding_radius(),
        }
    }

    pub fn set_acceleration(&mut self, a: Vec2) {
        for atom in self.atoms_mut() {
            atom.acceleration = a;
        }
    }

    /// Advance by one explicit Euler step. Composites translate rigidly with their derived velocity.
    pub fn advance(&mut self, dt: f64) {
        match self {
            Molecule::Simple(s) => {
                s.position += s.velocity * dt;
                s.velocity += s.acceleration * dt;
            }
            Molecule::Composite(c) => {
                let v = c.velocity();
                c.translate(v * dt);
                for atom in c.components_mut() {
                    atom.velocity += atom.acceleration * dt;
                }
            }
        }
    }

    pub fn translate(&mut self, dx: Vec2) {
        for atom in self.atoms_mut() {
            atom.position += dx;
        }
    }
}

impl Body for Molecule {
    fn position(&self) -> Pos2 {
        match self {
            Molecule::Simple(s) => s.position,
            Molecule::Composite(c) => c.center_of_mass(),
        }
    }

    fn velocity(&self) -> Vec2 {
        match self {
            Molecule::Simple(s) => s.velocity,
            Molecule::Composite(c) => c.velocity(),
        }
    }

    fn set_velocity(&mut self, v: Vec2) {
        match self {
            Molecule::Simple(s) => s.set_velocity(v),
            Molecule::Composite(c) => c.set_velocity(v),
        }
    }

    fn mass(&self) -> Mass {
        match self {
            Molecule::Simple(s) => s.mass(),
            Molecule::Composite(c) => c.mass(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(id: u32, species: Species, x: f64, vx: f64) -> SimpleMolecule {
        SimpleMolecule::new(BodyId(id), species, Pos2::new(x, 0.0), Vec2::new(vx, 0.0))
            .expect("valid atom")
    }

    #[test]
    fn new_atom_uses_species_defaults() -> Result<()> {
        let a = SimpleMolecule::new(BodyId(1), Species::B, Pos2::new(1.0, 2.0), Vec2::zeros())?;
        assert_eq!(a.mass, Species::B.default_mass());
        assert_eq!(a.radius, Species::B.default_radius());
        assert!(a.parent.is_none());
        Ok(())
    }

    #[test]
    fn invalid_radius_rejected() {
        let err = SimpleMolecule::with_properties(
            BodyId(0),
            Species::A,
            Pos2::origin(),
            Vec2::zeros(),
            1.0,
            0.0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn invalid_mass_rejected() {
        let err = SimpleMolecule::with_properties(
            BodyId(0),
            Species::A,
            Pos2::origin(),
            Vec2::zeros(),
            f64::NAN,
            1.0,
        )
        .unwrap_err();
        assert!(err.to_string().contains("mass"));
    }

    #[test]
    fn kinetic_energy_computed() -> Result<()> {
        // v = (3,4), |v|^2 = 25; KE = 0.5 * 2 * 25
        let a = SimpleMolecule::with_properties(
            BodyId(7),
            Species::A,
            Pos2::origin(),
            Vec2::new(3.0, 4.0),
            2.0,
            1.0,
        )?;
        assert!((a.kinetic_energy() - 25.0).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn composite_kind_from_pair_is_symmetric() {
        assert_eq!(
            CompositeKind::from_pair(Species::B, Species::A),
            Some(CompositeKind::AB)
        );
        assert_eq!(
            CompositeKind::from_pair(Species::C, Species::B),
            Some(CompositeKind::BC)
        );
        assert_eq!(CompositeKind::from_pair(Species::A, Species::C), None);
        assert_eq!(CompositeKind::from_pair(Species::Heavy, Species::B), None);
    }

    #[test]
    fn composite_derives_center_of_mass_and_momentum() -> Result<()> {
        let a = atom(1, Species::A, 0.0, 2.0); // m = 8
        let b = atom(2, Species::B, 9.0, -1.0); // m = 10
        let cm = CompositeMolecule::new(BodyId(3), a, b)?;
        assert_eq!(cm.kind, CompositeKind::AB);
        assert!(cm.components().iter().all(|c| c.parent == Some(BodyId(3))));
        assert!((cm.center_of_mass().x - 5.0).abs() < 1e-12);
        // p = 8*2 + 10*(-1) = 6, v = 6/18
        assert!((cm.velocity().x - 6.0 / 18.0).abs() < 1e-12);
        assert!(cm.bond().connects(BodyId(2), BodyId(1)));
        Ok(())
    }

    #[test]
    fn composite_rejects_unbondable_pair() {
        let a = atom(1, Species::A, 0.0, 0.0);
        let c = atom(2, Species::C, 5.0, 0.0);
        assert!(CompositeMolecule::new(BodyId(3), a, c).is_err());
    }

    #[test]
    fn releasing_components_clears_parent() -> Result<()> {
        let b = atom(1, Species::B, 0.0, 0.0);
        let c = atom(2, Species::C, 5.0, 0.0);
        let cm = CompositeMolecule::new(BodyId(3), b, c)?;
        let [x, y] = cm.into_components();
        assert!(!x.is_part_of_composite() && !y.is_part_of_composite());
        Ok(())
    }

    #[test]
    fn composite_translates_rigidly() -> Result<()> {
        let a = atom(1, Species::A, 0.0, 4.0);
        let b = atom(2, Species::B, 18.0, 0.0);
        let mut m = Molecule::Composite(CompositeMolecule::new(BodyId(3), a, b)?);
        let before: Vec<f64> = m.atoms().iter().map(|a| a.position.x).collect();
        let v = m.velocity();
        m.advance(2.0);
        for (atom, x0) in m.atoms().iter().zip(before) {
            assert!((atom.position.x - (x0 + 2.0 * v.x)).abs() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn species_parse_round_trip() -> Result<()> {
        assert_eq!("heavy".parse::<Species>()?, Species::Heavy);
        assert_eq!("BC".parse::<CompositeKind>()?, CompositeKind::BC);
        assert!("Q".parse::<Species>().is_err());
        Ok(())
    }
}

use crate::core::energy::{EnergyLedger, EnergyModel};
use crate::core::molecule::{Body, BodyId, CompositeKind, Molecule, SimpleMolecule, Species};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashSet};

/// Owner of every body in the model.
///
/// Top-level molecules are keyed by id; ids are allocated monotonically so iteration order is
/// registration order. Atoms inside composites carry ids from the same sequence.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    bodies: BTreeMap<BodyId, Molecule>,
    escaping: HashSet<BodyId>,
    next_id: u32,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh id.
    pub fn allocate_id(&mut self) -> BodyId {
        let id = BodyId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    /// Register a molecule without energy bookkeeping (model setup, between ticks).
    ///
    /// Errors:
    /// - `Error::InvalidParam` if its id, or the id of one of its atoms, is already registered.
    pub fn insert(&mut self, molecule: Molecule) -> Result<BodyId> {
        let id = molecule.id();
        if self.bodies.contains_key(&id) {
            return Err(Error::InvalidParam(format!("body {id} already registered")));
        }
        for atom in molecule.atoms() {
            if self.find_atom(atom.id).is_some() {
                return Err(Error::InvalidParam(format!(
                    "atom {} already registered",
                    atom.id
                )));
            }
        }
        let max_id = molecule
            .atoms()
            .iter()
            .map(|a| a.id.0)
            .chain(std::iter::once(id.0))
            .max()
            .unwrap_or(id.0);
        if max_id >= self.next_id {
            self.next_id = max_id.saturating_add(1);
        }
        self.bodies.insert(id, molecule);
        Ok(id)
    }

    /// Register a molecule mid-tick, recording its energy as deliberately added.
    pub fn insert_tracked(
        &mut self,
        molecule: Molecule,
        ledger: &mut EnergyLedger,
        model: &EnergyModel,
    ) -> Result<BodyId> {
        let kinetic = molecule.kinetic_energy();
        let potential = model.potential_energy(&molecule);
        let id = self.insert(molecule)?;
        ledger.add_kinetic(kinetic);
        ledger.add_potential(potential);
        Ok(id)
    }

    /// Remove a molecule without energy bookkeeping.
    pub fn remove(&mut self, id: BodyId) -> Option<Molecule> {
        self.escaping.remove(&id);
        self.bodies.remove(&id)
    }

    /// Remove a molecule mid-tick, recording its energy as deliberately removed.
    pub fn remove_tracked(
        &mut self,
        id: BodyId,
        ledger: &mut EnergyLedger,
        model: &EnergyModel,
    ) -> Option<Molecule> {
        let m = self.remove(id)?;
        ledger.add_kinetic(-m.kinetic_energy());
        ledger.add_potential(-model.potential_energy(&m));
        Some(m)
    }

    /// Take two molecules out for joint mutation. Both or neither are removed.
    pub fn take_pair(&mut self, a: BodyId, b: BodyId) -> Option<(Molecule, Molecule)> {
        if a == b || !self.bodies.contains_key(&a) || !self.bodies.contains_key(&b) {
            return None;
        }
        let ma = self.bodies.remove(&a)?;
        match self.bodies.remove(&b) {
            Some(mb) => Some((ma, mb)),
            None => {
                self.bodies.insert(a, ma);
                None
            }
        }
    }

    /// Put back a molecule previously taken out; keeps its escape flag.
    pub fn restore(&mut self, molecule: Molecule) {
        self.bodies.insert(molecule.id(), molecule);
    }

    pub fn get(&self, id: BodyId) -> Option<&Molecule> {
        self.bodies.get(&id)
    }

    pub fn get_mut(&mut self, id: BodyId) -> Option<&mut Molecule> {
        self.bodies.get_mut(&id)
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// Molecules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Molecule> {
        self.bodies.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Molecule> {
        self.bodies.values_mut()
    }

    pub fn ids(&self) -> Vec<BodyId> {
        self.bodies.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Atom with the given id, whether free or bonded.
    pub fn find_atom(&self, atom: BodyId) -> Option<&SimpleMolecule> {
        self.bodies
            .values()
            .flat_map(|m| m.atoms().iter())
            .find(|a| a.id == atom)
    }

    /// Composite holding `atom`, or `None` for a free (or unknown) atom.
    pub fn parent_of(&self, atom: BodyId) -> Option<BodyId> {
        self.find_atom(atom).and_then(|a| a.parent)
    }

    pub fn mark_escaping(&mut self, id: BodyId) {
        if self.bodies.contains_key(&id) {
            self.escaping.insert(id);
        }
    }

    pub fn is_escaping(&self, id: BodyId) -> bool {
        self.escaping.contains(&id)
    }

    /// Drop the escape flag of a body that came back into the box.
    pub fn clear_escaping(&mut self, id: BodyId) {
        self.escaping.remove(&id);
    }

    /// Ids currently flagged as escaping, in id order.
    pub fn escaping_ids(&self) -> Vec<BodyId> {
        let mut ids: Vec<BodyId> = self.escaping.iter().copied().collect();
        ids.sort();
        ids
    }

    /// Count of every species across free and bonded atoms.
    pub fn species_census(&self) -> BTreeMap<Species, usize> {
        let mut out = BTreeMap::new();
        for atom in self.bodies.values().flat_map(|m| m.atoms().iter()) {
            *out.entry(atom.species).or_insert(0) += 1;
        }
        out
    }

    /// Count of free atoms per species.
    pub fn free_census(&self) -> BTreeMap<Species, usize> {
        let mut out = BTreeMap::new();
        for s in self.bodies.values().filter_map(|m| m.species()) {
            *out.entry(s).or_insert(0) += 1;
        }
        out
    }

    /// Count of composites per kind.
    pub fn composite_census(&self) -> BTreeMap<CompositeKind, usize> {
        let mut out = BTreeMap::new();
        for k in self.bodies.values().filter_map(|m| m.composite_kind()) {
            *out.entry(k).or_insert(0) += 1;
        }
        out
    }
}

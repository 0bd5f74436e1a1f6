use crate::config::{PopulationKind, SimConfig, DEFAULT_ESCAPE_OFFSET};
use crate::core::contact::{CollisionSpec, ContactKind, ResolutionOrder};
use crate::core::container::{Container, WallSide};
use crate::core::detect::detect_contacts;
use crate::core::energy::{correct_energy, total_kinetic_energy, EnergyLedger, EnergyModel};
use crate::core::event::{BodySnapshot, Observers, Removal, TickReport};
use crate::core::geometry::{distance_sq, Pos2, Vec2};
use crate::core::molecule::{
    Body, BodyId, CompositeKind, CompositeMolecule, Molecule, SimpleMolecule, Species,
};
use crate::core::reaction::{ExchangeReaction, ReactionTable};
use crate::core::registry::Registry;
use crate::core::resolve::{reflect, resolve};
use crate::error::{Error, Result};
use crossbeam::channel::Receiver;
use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use std::f64::consts::TAU;

const MAX_PLACEMENT_ATTEMPTS: usize = 100_000;

/// One atom of a body about to be placed, relative to the body's center of mass.
#[derive(Debug, Clone, Copy)]
struct AtomLayout {
    species: Species,
    offset: Vec2,
    mass: f64,
    radius: f64,
}

fn layout_for(kind: PopulationKind, props: impl Fn(Species) -> (f64, f64)) -> Vec<AtomLayout> {
    match kind {
        PopulationKind::Atom(species) => {
            let (mass, radius) = props(species);
            vec![AtomLayout {
                species,
                offset: Vec2::zeros(),
                mass,
                radius,
            }]
        }
        PopulationKind::Composite(kind) => {
            // Two touching atoms side by side, centered on their center of mass
            let [s1, s2] = kind.species();
            let ((m1, r1), (m2, r2)) = (props(s1), props(s2));
            let d = r1 + r2;
            let total = m1 + m2;
            vec![
                AtomLayout {
                    species: s1,
                    offset: Vec2::new(-d * m2 / total, 0.0),
                    mass: m1,
                    radius: r1,
                },
                AtomLayout {
                    species: s2,
                    offset: Vec2::new(d * m1 / total, 0.0),
                    mass: m2,
                    radius: r2,
                },
            ]
        }
    }
}

fn layout_extent(layout: &[AtomLayout]) -> f64 {
    layout
        .iter()
        .map(|a| a.offset.norm() + a.radius)
        .fold(0.0, f64::max)
}

/// Fixed-timestep collision and reaction model.
///
/// Each [`tick`](Simulation::tick) integrates every body, detects contacts, resolves each one
/// either as a hard-body collision or as a reaction, removes escaped bodies, restores the
/// energy budget and publishes one [`TickReport`].
#[derive(Debug)]
pub struct Simulation {
    time_now: f64,
    tick_count: u64,
    paused: bool,
    container: Container,
    registry: Registry,
    reactions: ReactionTable,
    gravity: f64,
    heat_source: f64,
    escape_offset: f64,
    resolution_order: ResolutionOrder,
    observers: Observers,
}

impl Simulation {
    /// Empty model in `container`, with no reactions, no gravity and no heat.
    pub fn new(container: Container) -> Self {
        log::info!(
            "new simulation in box ({}, {})-({}, {})",
            container.min_x(),
            container.min_y(),
            container.max_x(),
            container.max_y()
        );
        Self {
            time_now: 0.0,
            tick_count: 0,
            paused: false,
            container,
            registry: Registry::new(),
            reactions: ReactionTable::new(),
            gravity: 0.0,
            heat_source: 0.0,
            escape_offset: DEFAULT_ESCAPE_OFFSET,
            resolution_order: ResolutionOrder::default(),
            observers: Observers::default(),
        }
    }

    /// Build a model from configuration.
    ///
    /// Populations are placed with rejection sampling so no two atoms overlap; directions are
    /// uniform and speeds are those configured.
    pub fn from_config(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let c = &config.container;
        let mut container = Container::with_limits(
            Pos2::new(c.min[0], c.min[1]),
            Pos2::new(c.max[0], c.max[1]),
            c.min_x_floor,
            c.min_width,
        )?;
        if let Some([lo, hi]) = c.opening {
            if !container.set_opening(Some((lo, hi))) {
                return Err(Error::InvalidParam(format!(
                    "opening [{lo}, {hi}] does not fit the top wall"
                )));
            }
        }

        let mut sim = Self::new(container);
        let s = &config.simulation;
        sim.gravity = s.gravity;
        sim.heat_source = s.heat_source;
        sim.escape_offset = s.escape_offset;
        sim.resolution_order = s.resolution_order;
        for r in &config.reaction {
            sim.reactions.push(r.to_reaction()?);
        }

        let mut rng: StdRng = match s.seed {
            Some(seed) => SeedableRng::seed_from_u64(seed),
            None => SeedableRng::seed_from_u64(rng().random()),
        };
        for pop in &config.population {
            let layout = layout_for(pop.kind()?, |sp| config.species_properties(sp));
            for _ in 0..pop.count {
                sim.place_random(&layout, pop.speed, &mut rng)?;
            }
        }
        log::info!(
            "configured {} bodies, {} reactions",
            sim.registry.len(),
            sim.reactions.len()
        );
        Ok(sim)
    }

    fn place_random(
        &mut self,
        layout: &[AtomLayout],
        speed: f64,
        rng: &mut StdRng,
    ) -> Result<BodyId> {
        let extent = layout_extent(layout);
        let (lo_x, hi_x) = (self.container.min_x() + extent, self.container.max_x() - extent);
        let (lo_y, hi_y) = (self.container.min_y() + extent, self.container.max_y() - extent);
        if lo_x > hi_x || lo_y > hi_y {
            return Err(Error::InvalidParam(format!(
                "a body of extent {extent} does not fit in the box"
            )));
        }

        let mut attempts = 0usize;
        let center = loop {
            if attempts >= MAX_PLACEMENT_ATTEMPTS {
                return Err(Error::InvalidParam(format!(
                    "failed to place body {} without overlap; try fewer molecules or a larger box",
                    self.registry.len()
                )));
            }
            attempts += 1;
            let p = Pos2::new(rng.random_range(lo_x..=hi_x), rng.random_range(lo_y..=hi_y));
            if !self.overlaps_existing(layout, &p) {
                break p;
            }
        };
        let angle = rng.random_range(0.0..TAU);
        let velocity = Vec2::new(angle.cos(), angle.sin()) * speed;
        self.spawn(layout, center, velocity)
    }

    fn overlaps_existing(&self, layout: &[AtomLayout], center: &Pos2) -> bool {
        let existing = self.registry.iter().flat_map(|m| m.atoms().iter());
        for atom in existing {
            for new in layout {
                let min = atom.radius + new.radius;
                if distance_sq(&atom.position, &(center + new.offset)) < min * min {
                    return true;
                }
            }
        }
        false
    }

    fn spawn(&mut self, layout: &[AtomLayout], center: Pos2, velocity: Vec2) -> Result<BodyId> {
        let mut atoms = Vec::with_capacity(layout.len());
        for a in layout {
            let id = self.registry.allocate_id();
            atoms.push(SimpleMolecule::with_properties(
                id,
                a.species,
                center + a.offset,
                velocity,
                a.mass,
                a.radius,
            )?);
        }
        let molecule = match <[SimpleMolecule; 2]>::try_from(atoms) {
            Ok([first, second]) => {
                let id = self.registry.allocate_id();
                Molecule::Composite(CompositeMolecule::new(id, first, second)?)
            }
            Err(mut single) => match single.pop() {
                Some(atom) if single.is_empty() => Molecule::Simple(atom),
                _ => {
                    return Err(Error::InvalidParam(
                        "a body has either one or two atoms".into(),
                    ))
                }
            },
        };
        self.registry.insert(molecule)
    }

    // ============ Model setup ============

    /// Register a molecule built by the caller.
    pub fn add_molecule(&mut self, molecule: Molecule) -> Result<BodyId> {
        self.registry.insert(molecule)
    }

    /// Free atom with its species' default mass and radius.
    pub fn add_atom(&mut self, species: Species, position: Pos2, velocity: Vec2) -> Result<BodyId> {
        let layout = layout_for(PopulationKind::Atom(species), |s| {
            (s.default_mass(), s.default_radius())
        });
        self.spawn(&layout, position, velocity)
    }

    /// Composite of two touching atoms centered (by mass) on `center`, moving rigidly.
    pub fn add_composite(
        &mut self,
        kind: CompositeKind,
        center: Pos2,
        velocity: Vec2,
    ) -> Result<BodyId> {
        let layout = layout_for(PopulationKind::Composite(kind), |s| {
            (s.default_mass(), s.default_radius())
        });
        self.spawn(&layout, center, velocity)
    }

    /// Remove a body between ticks.
    pub fn remove_molecule(&mut self, id: BodyId) -> Result<Molecule> {
        self.registry.remove(id).ok_or(Error::UnknownBody(id))
    }

    pub fn add_reaction(&mut self, reaction: ExchangeReaction) {
        self.reactions.push(reaction);
    }

    /// Overwrite the velocity of a body (rigidly for composites).
    pub fn set_body_velocity(&mut self, id: BodyId, velocity: Vec2) -> Result<()> {
        if !velocity.iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidParam("velocity must be finite".into()));
        }
        let m = self.registry.get_mut(id).ok_or(Error::UnknownBody(id))?;
        m.set_velocity(velocity);
        Ok(())
    }

    // ============ Stepping ============

    /// Stop the clock; ticks do nothing until [`resume`](Simulation::resume).
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Receiver for one [`TickReport`] per completed tick. Unbounded: drain it or drop it.
    pub fn subscribe(&mut self) -> Receiver<TickReport> {
        self.observers.subscribe()
    }

    /// Receiver that holds at most `capacity` undelivered reports; newer ones are dropped
    /// while it is full.
    pub fn subscribe_bounded(&mut self, capacity: usize) -> Receiver<TickReport> {
        self.observers.subscribe_bounded(capacity)
    }

    /// Advance the model by `dt`.
    ///
    /// Returns `Ok(None)` without touching anything while paused.
    ///
    /// Errors:
    /// - `Error::InvalidParam` if `dt` is negative or not finite.
    /// - `Error::Invariant` if reaction dispatch is handed a pair it was not wired for.
    pub fn tick(&mut self, dt: f64) -> Result<Option<TickReport>> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(Error::InvalidParam("dt must be finite and >= 0".into()));
        }
        if self.paused {
            return Ok(None);
        }

        let model = self.energy_model();
        let mut ledger = EnergyLedger::default();
        let energy_before = model.total_energy(&self.registry);

        let g = Vec2::new(0.0, self.gravity);
        for m in self.registry.iter_mut() {
            m.set_acceleration(g);
        }
        self.apply_heat(&mut ledger);

        self.container.advance(dt);
        for m in self.registry.iter_mut() {
            m.advance(dt);
        }

        let detection = detect_contacts(&self.registry, &self.container)?;
        self.clear_returned_escapees();
        for &id in &detection.entering_opening {
            if !self.registry.is_escaping(id) {
                log::debug!("{id} entered the opening");
                self.registry.mark_escaping(id);
            }
        }
        let mut contacts = detection.contacts;
        self.resolution_order.apply(&mut contacts);

        let mut report = TickReport::default();
        let mut consumed: HashSet<BodyId> = HashSet::new();
        for spec in &contacts {
            match spec.kind {
                ContactKind::Wall { body, side, .. } => {
                    if !consumed.contains(&body) {
                        self.resolve_wall(body, side, &mut ledger);
                    }
                }
                ContactKind::Molecules { body_a, body_b, .. } => {
                    if consumed.contains(&body_a) || consumed.contains(&body_b) {
                        continue;
                    }
                    if self.react_or_collide(spec, body_a, body_b, &mut report)? {
                        consumed.insert(body_a);
                        consumed.insert(body_b);
                    }
                }
            }
        }

        self.remove_escaped(&model, &mut ledger, &mut report);
        let correction = correct_energy(&mut self.registry, &model, energy_before, ledger.total());
        if correction.applied {
            log::trace!(
                "tick {}: drift {:.3e}, ratio {:.9}",
                self.tick_count + 1,
                correction.drift,
                correction.ratio
            );
        }

        self.time_now += dt;
        self.tick_count += 1;
        report.tick = self.tick_count;
        report.time = self.time_now;
        report.bodies = self.registry.iter().map(BodySnapshot::from).collect();
        report.total_energy = model.total_energy(&self.registry);
        self.observers.publish(&report);
        Ok(Some(report))
    }

    /// Scale every velocity by `1 + heat / 10000`, booking the change as deliberate.
    fn apply_heat(&mut self, ledger: &mut EnergyLedger) {
        if self.heat_source == 0.0 {
            return;
        }
        let factor = 1.0 + self.heat_source / 10_000.0;
        for m in self.registry.iter_mut() {
            let before = m.kinetic_energy();
            for atom in m.atoms_mut() {
                atom.velocity *= factor;
            }
            ledger.add_kinetic(m.kinetic_energy() - before);
        }
    }

    /// Reflect off a wall and push the body back inside. Bodies past the escape bounds are left
    /// for removal. Work done by a moving wall is booked as deliberate.
    fn resolve_wall(&mut self, body: BodyId, side: WallSide, ledger: &mut EnergyLedger) {
        let wall = self.container.wall(side).clone();
        let Some(m) = self.registry.get_mut(body) else {
            return;
        };
        if self.container.is_beyond(&m.position(), self.escape_offset) {
            return;
        }
        let before = m.kinetic_energy();
        if reflect(m, &wall.normal, &wall.velocity) && wall.velocity != Vec2::zeros() {
            ledger.add_kinetic(m.kinetic_energy() - before);
        }
        let penetration = m
            .atoms()
            .iter()
            .map(|a| a.radius - wall.signed_distance(&a.position))
            .fold(f64::NEG_INFINITY, f64::max);
        if penetration > 0.0 {
            m.translate(wall.normal * penetration);
        }
    }

    /// Try the reaction table first, fall back to a hard-body collision. Returns whether a
    /// reaction fired.
    fn react_or_collide(
        &mut self,
        spec: &CollisionSpec,
        a: BodyId,
        b: BodyId,
        report: &mut TickReport,
    ) -> Result<bool> {
        let Some((mut ma, mut mb)) = self.registry.take_pair(a, b) else {
            return Ok(false);
        };

        if let Some(reaction) = self.reactions.find(&ma, &mb, spec) {
            let new_id = self.registry.allocate_id();
            let outcome = reaction.react(ma, mb, new_id)?;
            log::debug!(
                "reaction: {} + {} -> {new_id} + {}",
                outcome.consumed,
                outcome.absorbed,
                outcome.released.id()
            );
            for id in [outcome.consumed, outcome.absorbed] {
                self.registry.clear_escaping(id);
                report.removed.push((id, Removal::Reacted));
            }
            let released = outcome.released.id();
            self.registry.insert(outcome.composite)?;
            self.registry.insert(outcome.released)?;
            report.added.push(new_id);
            report.added.push(released);
            report.reactions += 1;
            return Ok(true);
        }

        if !resolve(&mut ma, &mut mb, &spec.loa) {
            log::trace!("contact {a}-{b} needed no response");
        }
        self.registry.restore(ma);
        self.registry.restore(mb);
        Ok(false)
    }

    fn clear_returned_escapees(&mut self) {
        for id in self.registry.escaping_ids() {
            let back_inside = self
                .registry
                .get(id)
                .is_some_and(|m| !self.container.is_outside(&m.position(), m.extent()));
            if back_inside {
                self.registry.clear_escaping(id);
            }
        }
    }

    fn remove_escaped(
        &mut self,
        model: &EnergyModel,
        ledger: &mut EnergyLedger,
        report: &mut TickReport,
    ) {
        let gone: Vec<BodyId> = self
            .registry
            .iter()
            .filter(|m| self.container.is_beyond(&m.position(), self.escape_offset))
            .map(|m| m.id())
            .collect();
        for id in gone {
            if self.registry.remove_tracked(id, ledger, model).is_some() {
                log::debug!("{id} escaped");
                report.removed.push((id, Removal::Escaped));
            }
        }
    }

    // ============ Diagnostics ============

    /// Returns current simulation time.
    pub fn time(&self) -> f64 {
        self.time_now
    }

    /// Returns the number of completed ticks.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns the box, including wall velocities and the opening.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Returns the body registry (read-only).
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn reactions(&self) -> &ReactionTable {
        &self.reactions
    }

    /// Returns the number of top-level bodies (a composite counts once).
    pub fn num_bodies(&self) -> usize {
        self.registry.len()
    }

    /// Returns the top-level body `id`, or `Error::UnknownBody`.
    pub fn body(&self, id: BodyId) -> Result<&Molecule> {
        self.registry.get(id).ok_or(Error::UnknownBody(id))
    }

    /// Energy landscape as currently configured.
    pub fn energy_model(&self) -> EnergyModel {
        EnergyModel {
            gravity: self.gravity,
            ground_y: self.container.max_y(),
            chemical: self.reactions.chemical_energies(),
        }
    }

    /// Returns kinetic plus gravitational and chemical potential energy.
    pub fn total_energy(&self) -> f64 {
        self.energy_model().total_energy(&self.registry)
    }

    /// Returns the total kinetic energy.
    pub fn kinetic_energy(&self) -> f64 {
        total_kinetic_energy(&self.registry)
    }

    /// Returns gravitational plus chemical potential energy.
    pub fn potential_energy(&self) -> f64 {
        let model = self.energy_model();
        self.registry.iter().map(|m| model.potential_energy(m)).sum()
    }

    /// Returns the count of each species across free and bonded atoms.
    pub fn species_census(&self) -> BTreeMap<Species, usize> {
        self.registry.species_census()
    }

    /// Returns the count of composites per kind.
    pub fn composite_census(&self) -> BTreeMap<CompositeKind, usize> {
        self.registry.composite_census()
    }

    /// Mean speed of the bodies carrying atoms of `species` (bonded atoms count with their
    /// composite's speed), or `None` if there are none.
    pub fn average_speed(&self, species: Species) -> Option<f64> {
        let speeds: Vec<f64> = self
            .registry
            .iter()
            .flat_map(|m| {
                let speed = m.velocity().norm();
                m.atoms()
                    .iter()
                    .filter(move |a| a.species == species)
                    .map(move |_| speed)
            })
            .collect();
        if speeds.is_empty() {
            None
        } else {
            Some(speeds.iter().sum::<f64>() / speeds.len() as f64)
        }
    }

    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    pub fn heat_source(&self) -> f64 {
        self.heat_source
    }

    /// Returns how far beyond the box a body may travel before it is removed.
    pub fn escape_offset(&self) -> f64 {
        self.escape_offset
    }

    pub fn resolution_order(&self) -> ResolutionOrder {
        self.resolution_order
    }

    // ============ Runtime setters (return false on rejected input) ============

    /// Move the box; `min_x` is clamped. Returns `false` for non-finite or degenerate bounds.
    pub fn set_bounds(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        self.container.set_bounds(min_x, min_y, max_x, max_y)
    }

    /// Open the top wall over an x-interval, or close it with `None`.
    pub fn set_opening(&mut self, opening: Option<(f64, f64)>) -> bool {
        self.container.set_opening(opening)
    }

    /// Piston speed of the left wall. Its work on bodies is kept by the energy corrector.
    pub fn set_left_wall_velocity(&mut self, vx: f64) -> bool {
        self.container.set_left_wall_velocity(vx)
    }

    /// Downward acceleration; rejects negative or non-finite values.
    pub fn set_gravity(&mut self, g: f64) -> bool {
        if !g.is_finite() || g < 0.0 {
            return false;
        }
        self.gravity = g;
        true
    }

    /// Per-tick velocity gain in units of 1e-4; negative values cool.
    pub fn set_heat_source(&mut self, heat: f64) -> bool {
        if !heat.is_finite() {
            return false;
        }
        self.heat_source = heat;
        true
    }

    /// Rejects negative or non-finite offsets.
    pub fn set_escape_offset(&mut self, offset: f64) -> bool {
        if !offset.is_finite() || offset < 0.0 {
            return false;
        }
        self.escape_offset = offset;
        true
    }

    pub fn set_resolution_order(&mut self, order: ResolutionOrder) {
        self.resolution_order = order;
    }

    /// Set the floor and peak levels of reaction `index`.
    pub fn set_energy_levels(&mut self, index: usize, left: f64, peak: f64, right: f64) -> bool {
        self.reactions
            .get_mut(index)
            .is_some_and(|r| r.profile.set_levels(left, peak, right))
    }

    /// Set the peak width of reaction `index`. Returns `false` for an unknown index or bad width.
    pub fn set_barrier_width(&mut self, index: usize, width: f64) -> bool {
        self.reactions
            .get_mut(index)
            .is_some_and(|r| r.profile.set_width(width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed() -> Result<Simulation> {
        Ok(Simulation::new(Container::new(
            Pos2::new(0.0, 0.0),
            Pos2::new(100.0, 100.0),
        )?))
    }

    #[test]
    fn paused_tick_does_nothing() -> Result<()> {
        let mut sim = boxed()?;
        let id = sim.add_atom(Species::Light, Pos2::new(50.0, 50.0), Vec2::new(1.0, 0.0))?;
        let rx = sim.subscribe();
        sim.pause();
        assert!(sim.tick(1.0)?.is_none());
        assert_eq!(sim.body(id)?.position(), Pos2::new(50.0, 50.0));
        assert!(rx.try_recv().is_err());
        sim.resume();
        assert!(sim.tick(1.0)?.is_some());
        assert_eq!(sim.tick_count(), 1);
        assert!(rx.try_recv().is_ok());
        Ok(())
    }

    #[test]
    fn invalid_dt_rejected() -> Result<()> {
        let mut sim = boxed()?;
        assert!(sim.tick(f64::NAN).is_err());
        assert!(sim.tick(-1.0).is_err());
        Ok(())
    }

    #[test]
    fn composite_layout_is_centered_on_center_of_mass() -> Result<()> {
        let mut sim = boxed()?;
        let id = sim.add_composite(CompositeKind::BC, Pos2::new(50.0, 50.0), Vec2::new(1.0, 0.0))?;
        let m = sim.body(id)?;
        assert!((m.position() - Pos2::new(50.0, 50.0)).norm() < 1e-12);
        let atoms = m.atoms();
        let gap = (atoms[1].position - atoms[0].position).norm();
        assert!((gap - (atoms[0].radius + atoms[1].radius)).abs() < 1e-12);
        assert_eq!(m.velocity(), Vec2::new(1.0, 0.0));
        Ok(())
    }

    #[test]
    fn wall_hit_reflects_and_stays_inside() -> Result<()> {
        let mut sim = boxed()?;
        let id = sim.add_atom(Species::Light, Pos2::new(4.0, 50.0), Vec2::new(-5.0, 0.0))?;
        sim.tick(1.0)?;
        let m = sim.body(id)?;
        assert_eq!(m.velocity(), Vec2::new(5.0, 0.0));
        assert!(m.position().x >= Species::Light.default_radius() - 1e-12);
        Ok(())
    }

    #[test]
    fn heat_source_adds_energy_deliberately() -> Result<()> {
        let mut sim = boxed()?;
        sim.add_atom(Species::Light, Pos2::new(50.0, 50.0), Vec2::new(2.0, 0.0))?;
        assert!(sim.set_heat_source(100.0));
        let e0 = sim.total_energy();
        sim.tick(0.1)?;
        // v scaled by 1.01
        assert!((sim.total_energy() - e0 * 1.01 * 1.01).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn gravity_keeps_total_energy() -> Result<()> {
        let mut sim = boxed()?;
        assert!(sim.set_gravity(2.0));
        sim.add_atom(Species::Light, Pos2::new(50.0, 20.0), Vec2::new(3.0, 0.0))?;
        let e0 = sim.total_energy();
        for _ in 0..50 {
            sim.tick(0.1)?;
        }
        assert!((sim.total_energy() - e0).abs() < 1e-9 * e0.abs().max(1.0));
        Ok(())
    }

    #[test]
    fn setters_reject_bad_input() -> Result<()> {
        let mut sim = boxed()?;
        assert!(!sim.set_gravity(-1.0));
        assert!(!sim.set_heat_source(f64::INFINITY));
        assert!(!sim.set_escape_offset(-3.0));
        assert!(!sim.set_energy_levels(0, 10.0, 100.0, 20.0), "no reaction registered");
        sim.add_reaction(ExchangeReaction::default());
        assert!(sim.set_energy_levels(0, 10.0, 100.0, 20.0));
        assert!(!sim.set_energy_levels(0, 10.0, 5.0, 20.0));
        assert!(!sim.set_barrier_width(0, -1.0));
        assert!(sim.set_barrier_width(0, 30.0));
        assert!(!sim.set_bounds(0.0, 0.0, 0.0, 0.0));
        Ok(())
    }

    #[test]
    fn average_speed_counts_bonded_atoms() -> Result<()> {
        let mut sim = boxed()?;
        sim.add_atom(Species::B, Pos2::new(20.0, 20.0), Vec2::new(3.0, 0.0))?;
        sim.add_composite(CompositeKind::AB, Pos2::new(60.0, 60.0), Vec2::new(0.0, 1.0))?;
        let v = sim.average_speed(Species::B).expect("two B atoms");
        assert!((v - 2.0).abs() < 1e-12);
        assert_eq!(sim.average_speed(Species::C), None);
        Ok(())
    }

    #[test]
    fn from_config_places_non_overlapping_bodies() -> Result<()> {
        let cfg = SimConfig::from_toml_str(
            r#"
            [simulation]
            seed = 42

            [container]
            min = [0.0, 0.0]
            max = [400.0, 300.0]

            [[population]]
            species = "A"
            count = 6
            speed = 3.0

            [[population]]
            composite = "BC"
            count = 4
            speed = 1.5

            [[reaction]]
            "#,
        )?;
        let sim = Simulation::from_config(&cfg)?;
        assert_eq!(sim.num_bodies(), 10);
        assert_eq!(sim.reactions().len(), 1);
        let atoms: Vec<&SimpleMolecule> =
            sim.registry().iter().flat_map(|m| m.atoms().iter()).collect();
        for (i, a) in atoms.iter().enumerate() {
            assert!(!sim.container().is_outside(&a.position, a.radius));
            for b in &atoms[i + 1..] {
                let min = a.radius + b.radius;
                assert!(distance_sq(&a.position, &b.position) >= min * min - 1e-9);
            }
        }
        let census = sim.species_census();
        assert_eq!(census.get(&Species::A), Some(&6));
        assert_eq!(census.get(&Species::B), Some(&4));
        assert_eq!(sim.composite_census().get(&CompositeKind::BC), Some(&4));
        Ok(())
    }

    #[test]
    fn same_seed_same_model() -> Result<()> {
        let cfg = SimConfig::from_toml_str(
            "[simulation]\nseed = 3\n[[population]]\nspecies = \"Light\"\ncount = 5\nspeed = 1.0\n",
        )?;
        let a = Simulation::from_config(&cfg)?;
        let b = Simulation::from_config(&cfg)?;
        let pa: Vec<Pos2> = a.registry().iter().map(|m| m.position()).collect();
        let pb: Vec<Pos2> = b.registry().iter().map(|m| m.position()).collect();
        assert_eq!(pa, pb);
        Ok(())
    }

    #[test]
    fn unknown_body_reported() -> Result<()> {
        let mut sim = boxed()?;
        assert!(matches!(
            sim.remove_molecule(BodyId(77)),
            Err(Error::UnknownBody(BodyId(77)))
        ));
        Ok(())
    }
}

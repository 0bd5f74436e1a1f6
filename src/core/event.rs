//! Per-tick notifications for observers.
//!
//! The stepper publishes exactly one [`TickReport`] per completed tick to every subscriber.
//! Subscribers that dropped their receiver are pruned on the next publish.

use crate::core::geometry::{Pos2, Vec2};
use crate::core::molecule::{Body, BodyId, CompositeKind, Molecule, Species};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender, TrySendError};

/// What a body is, for observers that draw or count it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTag {
    Atom(Species),
    Composite(CompositeKind),
}

/// State of one top-level body after a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySnapshot {
    pub id: BodyId,
    pub tag: BodyTag,
    pub position: Pos2,
    pub velocity: Vec2,
}

impl From<&Molecule> for BodySnapshot {
    fn from(m: &Molecule) -> Self {
        let tag = match m {
            Molecule::Simple(s) => BodyTag::Atom(s.species),
            Molecule::Composite(c) => BodyTag::Composite(c.kind),
        };
        Self {
            id: m.id(),
            tag,
            position: m.position(),
            velocity: m.velocity(),
        }
    }
}

/// Why a body left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Consumed by a reaction (broken up, or bonded into a new composite).
    Reacted,
    /// Travelled too far outside the box.
    Escaped,
}

/// Everything that happened in one tick.
///
/// - `bodies`: every registered body after the tick, in registration order
/// - `added`: reaction products registered this tick
/// - `removed`: bodies that left the registry this tick
/// - `total_energy`: total energy after correction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub time: f64,
    pub bodies: Vec<BodySnapshot>,
    pub added: Vec<BodyId>,
    pub removed: Vec<(BodyId, Removal)>,
    pub reactions: usize,
    pub total_energy: f64,
}

impl TickReport {
    pub fn was_removed(&self, id: BodyId) -> bool {
        self.removed.iter().any(|(r, _)| *r == id)
    }

    pub fn snapshot(&self, id: BodyId) -> Option<&BodySnapshot> {
        self.bodies.iter().find(|b| b.id == id)
    }
}

/// Fan-out of tick reports to any number of subscribers.
#[derive(Debug, Default)]
pub struct Observers {
    senders: Vec<Sender<TickReport>>,
}

impl Observers {
    /// New subscriber; receives every report published from now on.
    ///
    /// The channel is unbounded: a receiver that is kept but never drained holds one full
    /// report per tick. Use [`subscribe_bounded`](Observers::subscribe_bounded) for consumers
    /// that only poll now and then.
    pub fn subscribe(&mut self) -> Receiver<TickReport> {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    /// Lossy subscriber holding at most `capacity` (at least 1) undelivered reports. Reports
    /// published while its queue is full are dropped for this subscriber only.
    pub fn subscribe_bounded(&mut self, capacity: usize) -> Receiver<TickReport> {
        let (tx, rx) = bounded(capacity.max(1));
        self.senders.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Send `report` to every subscriber, pruning those whose receiver is gone.
    pub fn publish(&mut self, report: &TickReport) {
        self.senders.retain(|tx| match tx.try_send(report.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

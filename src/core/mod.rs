#![allow(missing_docs)]

//! Collision and reaction kernel.
//!
//! Leaf to root: geometry, molecules, registry and container, contact detection, hard-body
//! resolution, reactions, energy correction, and the stepper that ties them together.

pub mod contact;
pub mod container;
pub mod detect;
pub mod energy;
pub mod event;
pub mod geometry;
pub mod molecule;
pub mod reaction;
pub mod registry;
pub mod resolve;
pub mod sim;

pub use contact::{CollisionSpec, ContactKind, ResolutionOrder};
pub use container::{Container, Wall, WallSide};
pub use event::{BodySnapshot, BodyTag, Removal, TickReport};
pub use molecule::{
    Body, BodyId, CompositeKind, CompositeMolecule, Mass, Molecule, SimpleMolecule, Species,
};
pub use reaction::{
    CriteriaPolicy, EnergyProfile, ExchangeReaction, ProductKinematics, ReactionCriteria,
    ReactionTable,
};
pub use registry::Registry;
pub use sim::Simulation;

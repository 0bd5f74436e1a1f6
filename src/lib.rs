//! Fixed-timestep collision and reaction kernel for hard-sphere molecules in a box.
//!
//! Bodies are free atoms or bonded pairs confined to a rectangular container. Every tick the
//! stepper detects contacts, resolves each one as an elastic hard-body collision or as an
//! exchange reaction (`A + BC <-> AB + C`), removes escaped bodies, and rescales velocities so
//! the total energy only changes by what was added or removed on purpose.

pub mod config;
pub mod core;
pub mod error;

#[cfg(feature = "python")]
mod python;

pub use crate::core::Simulation;

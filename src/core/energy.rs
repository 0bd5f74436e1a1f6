//! Energy measurement and the end-of-tick global correction.
//!
//! Total energy is kinetic energy of every top-level body plus gravitational potential energy
//! plus the chemical potential energy stored in composites. Fixed-timestep integration and
//! simultaneous contacts leak energy; the corrector rescales all velocities by one common
//! factor so that the total after a tick matches the total before it plus whatever was
//! deliberately added or removed during the tick.

use crate::core::molecule::{Body, CompositeKind, Molecule};
use crate::core::registry::Registry;
use std::collections::BTreeMap;

/// Energy deliberately added to (positive) or removed from (negative) the model during one tick.
///
/// Created fresh at the start of every tick and passed explicitly through the stepper.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct EnergyLedger {
    kinetic: f64,
    potential: f64,
}

impl EnergyLedger {
    pub fn add_kinetic(&mut self, de: f64) {
        if de.is_finite() {
            self.kinetic += de;
        }
    }

    pub fn add_potential(&mut self, de: f64) {
        if de.is_finite() {
            self.potential += de;
        }
    }

    pub fn kinetic(&self) -> f64 {
        self.kinetic
    }

    pub fn potential(&self) -> f64 {
        self.potential
    }

    pub fn total(&self) -> f64 {
        self.kinetic + self.potential
    }
}

/// Potential-energy landscape of the model.
///
/// - `gravity`: downward (+y) acceleration
/// - `ground_y`: height at which gravitational potential energy is zero (the box floor)
/// - `chemical`: potential energy stored in each composite kind
#[derive(Debug, Clone, Default)]
pub struct EnergyModel {
    pub gravity: f64,
    pub ground_y: f64,
    pub chemical: BTreeMap<CompositeKind, f64>,
}

impl EnergyModel {
    /// Gravitational plus chemical potential energy of one body.
    pub fn potential_energy(&self, m: &Molecule) -> f64 {
        let mut pe = 0.0;
        if self.gravity != 0.0 {
            let mass = m.mass().value();
            if mass.is_finite() {
                pe += (self.ground_y - m.position().y) * self.gravity * mass;
            }
        }
        if let Some(kind) = m.composite_kind() {
            pe += self.chemical.get(&kind).copied().unwrap_or(0.0);
        }
        pe
    }

    pub fn body_energy(&self, m: &Molecule) -> f64 {
        m.kinetic_energy() + self.potential_energy(m)
    }

    /// Total energy of everything in the registry.
    pub fn total_energy(&self, registry: &Registry) -> f64 {
        registry
            .iter()
            .map(|m| self.body_energy(m))
            .filter(|e| {
                if e.is_nan() {
                    log::warn!("body energy is NaN; excluded from total");
                    false
                } else {
                    true
                }
            })
            .sum()
    }
}

/// Total kinetic energy, skipping NaN contributions.
pub fn total_kinetic_energy(registry: &Registry) -> f64 {
    registry
        .iter()
        .map(|m| m.kinetic_energy())
        .filter(|ke| !ke.is_nan())
        .sum()
}

/// Outcome of one energy correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Energy drift that was measured (after - (before + deliberate)).
    pub drift: f64,
    /// Velocity scale factor; 1.0 when nothing was applied.
    pub ratio: f64,
    /// Whether any velocity was rescaled.
    pub applied: bool,
}

/// Rescale every moving body so the total energy matches `total_before + deliberate`.
///
/// `ratio = sqrt(max(1 - dE / KE_after, 0))`. Bodies with zero kinetic energy are skipped, and
/// nothing is touched when the ratio is not a finite number.
pub fn correct_energy(
    registry: &mut Registry,
    model: &EnergyModel,
    total_before: f64,
    deliberate: f64,
) -> Correction {
    let total_after = model.total_energy(registry);
    let ke_after = total_kinetic_energy(registry);
    let drift = total_after - (total_before + deliberate);

    let r0 = 1.0 - drift / ke_after;
    if r0 < 0.0 {
        log::warn!(
            "energy drift {drift:.6e} exceeds kinetic energy {ke_after:.6e}; clamping ratio to 0"
        );
    }
    let ratio = r0.max(0.0).sqrt();

    let mut out = Correction {
        drift,
        ratio: 1.0,
        applied: false,
    };
    if !ratio.is_finite() {
        log::warn!("energy correction ratio is not finite (KE after = {ke_after}); skipped");
        return out;
    }
    if ratio == 1.0 {
        return out;
    }

    for m in registry.iter_mut() {
        if m.kinetic_energy() > 0.0 {
            for atom in m.atoms_mut() {
                atom.velocity *= ratio;
            }
            out.applied = true;
        }
    }
    out.ratio = ratio;
    out
}

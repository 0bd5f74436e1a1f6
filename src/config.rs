//! Model setup loaded from TOML.
//!
//! ```toml
//! [simulation]
//! seed = 7
//! gravity = 0.0
//!
//! [container]
//! min = [0.0, 0.0]
//! max = [400.0, 300.0]
//!
//! [[population]]
//! composite = "BC"
//! count = 5
//! speed = 4.0
//!
//! [[reaction]]
//! left = 20.0
//! peak = 100.0
//! right = 10.0
//! ```

use crate::core::contact::ResolutionOrder;
use crate::core::container::{DEFAULT_MIN_WIDTH, DEFAULT_MIN_X_FLOOR};
use crate::core::molecule::{CompositeKind, Species};
use crate::core::reaction::{CriteriaPolicy, EnergyProfile, ExchangeReaction, ProductKinematics};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Distance beyond the box a body may travel before it is removed.
pub const DEFAULT_ESCAPE_OFFSET: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub simulation: SimulationConfig,
    pub container: ContainerConfig,
    /// Per-species overrides keyed by species name.
    pub species: BTreeMap<String, SpeciesConfig>,
    pub population: Vec<PopulationConfig>,
    pub reaction: Vec<ReactionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: Option<u64>,
    /// Downward (+y) acceleration.
    pub gravity: f64,
    /// Per-tick velocity gain, in units of 1e-4.
    pub heat_source: f64,
    pub escape_offset: f64,
    pub resolution_order: ResolutionOrder,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            gravity: 0.0,
            heat_source: 0.0,
            escape_offset: DEFAULT_ESCAPE_OFFSET,
            resolution_order: ResolutionOrder::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub min: [f64; 2],
    pub max: [f64; 2],
    /// x-interval of the opening in the top wall.
    pub opening: Option<[f64; 2]>,
    pub min_x_floor: f64,
    pub min_width: f64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            min: [0.0, 0.0],
            max: [400.0, 300.0],
            opening: None,
            min_x_floor: DEFAULT_MIN_X_FLOOR,
            min_width: DEFAULT_MIN_WIDTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesConfig {
    pub mass: Option<f64>,
    pub radius: Option<f64>,
}

/// One batch of randomly placed bodies: either free atoms of `species` or composites of
/// `composite`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub species: Option<Species>,
    pub composite: Option<CompositeKind>,
    pub count: usize,
    /// Initial speed; directions are random.
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionConfig {
    pub left: f64,
    pub peak: f64,
    pub right: f64,
    pub width: f64,
    pub kinematics: ProductKinematics,
    pub policy: CriteriaPolicy,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        let p = EnergyProfile::default();
        Self {
            left: p.left(),
            peak: p.peak(),
            right: p.right(),
            width: p.width(),
            kinematics: ProductKinematics::default(),
            policy: CriteriaPolicy::default(),
        }
    }
}

impl ReactionConfig {
    pub fn to_reaction(&self) -> Result<ExchangeReaction> {
        let profile = EnergyProfile::new(self.left, self.peak, self.right, self.width)?;
        Ok(ExchangeReaction::new(profile, self.policy, self.kinematics))
    }
}

/// What a population entry asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationKind {
    Atom(Species),
    Composite(CompositeKind),
}

impl PopulationConfig {
    pub fn kind(&self) -> Result<PopulationKind> {
        match (self.species, self.composite) {
            (Some(s), None) => Ok(PopulationKind::Atom(s)),
            (None, Some(k)) => Ok(PopulationKind::Composite(k)),
            _ => Err(Error::Config(
                "population needs exactly one of `species` or `composite`".into(),
            )),
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if !sim.gravity.is_finite() || sim.gravity < 0.0 {
            return Err(Error::Config("gravity must be finite and >= 0".into()));
        }
        if !sim.heat_source.is_finite() {
            return Err(Error::Config("heat_source must be finite".into()));
        }
        if !sim.escape_offset.is_finite() || sim.escape_offset < 0.0 {
            return Err(Error::Config("escape_offset must be finite and >= 0".into()));
        }
        for name in self.species.keys() {
            name.parse::<Species>()
                .map_err(|_| Error::Config(format!("unknown species '{name}'")))?;
        }
        for (name, o) in &self.species {
            let ok = |v: Option<f64>| v.map_or(true, |x| x.is_finite() && x > 0.0);
            if !ok(o.mass) || !ok(o.radius) {
                return Err(Error::Config(format!(
                    "species '{name}': mass and radius must be finite and > 0"
                )));
            }
        }
        for p in &self.population {
            p.kind()?;
            if !p.speed.is_finite() || p.speed < 0.0 {
                return Err(Error::Config("population speed must be finite and >= 0".into()));
            }
        }
        for r in &self.reaction {
            r.to_reaction()
                .map_err(|e| Error::Config(format!("reaction: {e}")))?;
        }
        Ok(())
    }

    /// Mass and radius of `species` after overrides.
    pub fn species_properties(&self, species: Species) -> (f64, f64) {
        let o = self
            .species
            .iter()
            .find(|(name, _)| name.parse::<Species>().ok() == Some(species))
            .map(|(_, o)| o.clone())
            .unwrap_or_default();
        (
            o.mass.unwrap_or(species.default_mass()),
            o.radius.unwrap_or(species.default_radius()),
        )
    }
}

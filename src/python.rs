use numpy::ndarray::Array2;
use numpy::{IntoPyArray, PyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::SimConfig;
use crate::core::event::{BodySnapshot, BodyTag};
use crate::core::geometry::Vec2;
use crate::core::molecule::{Body, BodyId};
use crate::core::Simulation;

fn py_err<E: ToString>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Python-facing wrapper around the reaction kernel.
///
/// API:
/// - __new__(config=None, path=None): TOML text or a TOML file; defaults otherwise
/// - tick(dt) -> bool (False while paused)
/// - get_positions() / get_velocities() -> np.ndarray, shape (N, 2), registration order
/// - get_ids(), get_labels()
#[pyclass]
pub struct ReactionSim {
    sim: Simulation,
}

#[pymethods]
impl ReactionSim {
    /// Build a model from TOML text (`config`) or a TOML file (`path`).
    ///
    /// Errors: raises ValueError on malformed configuration or if both arguments are given.
    #[new]
    #[pyo3(signature = (config=None, path=None))]
    fn new(config: Option<String>, path: Option<String>) -> PyResult<Self> {
        let cfg = match (config, path) {
            (Some(text), None) => SimConfig::from_toml_str(&text).map_err(py_err)?,
            (None, Some(p)) => SimConfig::load_from_file(p).map_err(py_err)?,
            (None, None) => SimConfig::default(),
            (Some(_), Some(_)) => return Err(py_err("pass either config or path, not both")),
        };
        let sim = Simulation::from_config(&cfg).map_err(py_err)?;
        Ok(Self { sim })
    }

    /// Advance by `dt` (releases the GIL). Returns False if the clock is paused.
    fn tick(&mut self, py: Python<'_>, dt: f64) -> PyResult<bool> {
        let report = py.detach(|| self.sim.tick(dt)).map_err(py_err)?;
        Ok(report.is_some())
    }

    fn pause(&mut self) {
        self.sim.pause();
    }

    fn resume(&mut self) {
        self.sim.resume();
    }

    fn is_paused(&self) -> bool {
        self.sim.is_paused()
    }

    fn time(&self) -> f64 {
        self.sim.time()
    }

    /// Centers of mass as a NumPy array of shape (N, 2), dtype=float64.
    fn get_positions<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let n = self.sim.num_bodies();
        let mut arr = Array2::<f64>::zeros((n, 2));
        for (i, m) in self.sim.registry().iter().enumerate() {
            let p = m.position();
            arr[[i, 0]] = p.x;
            arr[[i, 1]] = p.y;
        }
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    /// Velocities as a NumPy array of shape (N, 2), dtype=float64.
    fn get_velocities<'py>(&self, py: Python<'py>) -> PyResult<Py<PyArray2<f64>>> {
        let n = self.sim.num_bodies();
        let mut arr = Array2::<f64>::zeros((n, 2));
        for (i, m) in self.sim.registry().iter().enumerate() {
            let v = m.velocity();
            arr[[i, 0]] = v.x;
            arr[[i, 1]] = v.y;
        }
        Ok(arr.into_pyarray(py).to_owned().into())
    }

    fn get_ids(&self) -> Vec<u32> {
        self.sim.registry().ids().into_iter().map(|id| id.0).collect()
    }

    /// Species name for atoms, composite name ("AB", "BC") for composites.
    fn get_labels(&self) -> Vec<String> {
        self.sim
            .registry()
            .iter()
            .map(|m| match BodySnapshot::from(m).tag {
                BodyTag::Atom(s) => s.to_string(),
                BodyTag::Composite(k) => k.to_string(),
            })
            .collect()
    }

    /// Set one body's velocity. Errors: raises ValueError on unknown id or non-finite values.
    fn set_body_velocity(&mut self, id: u32, vx: f64, vy: f64) -> PyResult<()> {
        self.sim
            .set_body_velocity(BodyId(id), Vec2::new(vx, vy))
            .map_err(py_err)
    }

    /// (total, kinetic, potential)
    fn get_energies(&self) -> (f64, f64, f64) {
        (
            self.sim.total_energy(),
            self.sim.kinetic_energy(),
            self.sim.potential_energy(),
        )
    }

    /// Count of each species across free and bonded atoms, plus composites by kind.
    fn get_census<'py>(&self, py: Python<'py>) -> PyResult<Py<PyDict>> {
        let out = PyDict::new(py);
        for (s, n) in self.sim.species_census() {
            out.set_item(s.name(), n)?;
        }
        for (k, n) in self.sim.composite_census() {
            out.set_item(k.name(), n)?;
        }
        Ok(out.into())
    }

    fn set_gravity(&mut self, g: f64) -> bool {
        self.sim.set_gravity(g)
    }

    fn set_heat_source(&mut self, heat: f64) -> bool {
        self.sim.set_heat_source(heat)
    }

    fn set_left_wall_velocity(&mut self, vx: f64) -> bool {
        self.sim.set_left_wall_velocity(vx)
    }

    fn set_bounds(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> bool {
        self.sim.set_bounds(min_x, min_y, max_x, max_y)
    }

    /// Open the top wall over `[lo, hi]`, or close it with None.
    #[pyo3(signature = (opening=None))]
    fn set_opening(&mut self, opening: Option<(f64, f64)>) -> bool {
        self.sim.set_opening(opening)
    }

    #[pyo3(signature = (left, peak, right, index=0))]
    fn set_energy_levels(&mut self, left: f64, peak: f64, right: f64, index: usize) -> bool {
        self.sim.set_energy_levels(index, left, peak, right)
    }

    #[pyo3(signature = (width, index=0))]
    fn set_barrier_width(&mut self, width: f64, index: usize) -> bool {
        self.sim.set_barrier_width(index, width)
    }
}

/// The reactsim Python module entry point.
#[pymodule]
fn reactsim(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ReactionSim>()?;
    Ok(())
}

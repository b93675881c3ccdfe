use serde::Deserialize;

use crate::disc::linear_solver::{DIRECT_LU_MAX_CELLS, LinearSolverKind, LinearSolverSettings};
use crate::error::{FlowError, FlowResult};

pub mod convergence;
pub mod report;
pub mod simulation;

pub use convergence::{ConvergenceMonitor, ResidualRecord};
pub use report::{HistoryReporter, LogReporter, ReportSink};
pub use simulation::{SimulationLoop, SimulationReport, SimulationState};

fn default_relax_uv() -> f64 {
    0.7
}
fn default_relax_p() -> f64 {
    0.5
}
fn default_relax_t() -> f64 {
    0.9
}
fn default_extent() -> usize {
    100
}
fn default_inner_extent() -> usize {
    10
}
fn default_length() -> f64 {
    1.0
}
fn default_dt() -> f64 {
    0.01
}
fn default_max_iter() -> usize {
    100
}
fn default_tolerance() -> f64 {
    1e-6
}
fn default_max_retries() -> usize {
    2
}

/// Run parameters of one simulation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_relax_uv")]
    pub relax_uv: f64,
    #[serde(default = "default_relax_p")]
    pub relax_p: f64,
    #[serde(default = "default_relax_t")]
    pub relax_t: f64,
    #[serde(default = "default_extent")]
    pub nx: usize,
    #[serde(default = "default_extent")]
    pub ny: usize,
    /// Inlet block extents. Equal to `nx`/`ny` for a single block.
    #[serde(default = "default_inner_extent")]
    pub nx_in: usize,
    #[serde(default = "default_inner_extent")]
    pub ny_in: usize,
    #[serde(default = "default_length")]
    pub length_x: f64,
    #[serde(default = "default_length")]
    pub length_y: f64,
    /// Pseudo-time step of the inertia term.
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub solve_energy: bool,
    /// Attempts with halved relaxation after a sub-solve diverges.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "LinearSolverSettings::momentum_default")]
    pub momentum_solver: LinearSolverSettings,
    #[serde(default = "LinearSolverSettings::pressure_default")]
    pub pressure_solver: LinearSolverSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            relax_uv: default_relax_uv(),
            relax_p: default_relax_p(),
            relax_t: default_relax_t(),
            nx: default_extent(),
            ny: default_extent(),
            nx_in: default_inner_extent(),
            ny_in: default_inner_extent(),
            length_x: default_length(),
            length_y: default_length(),
            dt: default_dt(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
            solve_energy: false,
            max_retries: default_max_retries(),
            momentum_solver: LinearSolverSettings::momentum_default(),
            pressure_solver: LinearSolverSettings::pressure_default(),
        }
    }
}

fn check_fraction(field: &'static str, value: f64) -> FlowResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(FlowError::config(field, value, "must lie in (0, 1]"))
    }
}

fn check_positive(field: &'static str, value: f64) -> FlowResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FlowError::config(field, value, "must be positive and finite"))
    }
}

fn check_settings(field: &'static str, settings: &LinearSolverSettings) -> FlowResult<()> {
    if settings.max_sweeps == 0 {
        return Err(FlowError::config(field, settings.max_sweeps, "max_sweeps must be at least 1"));
    }
    if !(settings.reduction > 0.0 && settings.reduction < 1.0) {
        return Err(FlowError::config(field, settings.reduction, "reduction must lie in (0, 1)"));
    }
    Ok(())
}

impl SimulationConfig {
    pub fn is_single_block(&self) -> bool {
        self.nx_in == self.nx && self.ny_in == self.ny
    }
    /// Number of non-blanked cells the grid will have.
    pub fn active_cells(&self) -> usize {
        self.nx * self.ny - self.nx_in.min(self.nx) * self.ny.saturating_sub(self.ny_in)
    }
    pub fn validate(&self) -> FlowResult<()> {
        check_fraction("relax_uv", self.relax_uv)?;
        check_fraction("relax_p", self.relax_p)?;
        check_fraction("relax_t", self.relax_t)?;
        if self.nx < 3 {
            return Err(FlowError::config("nx", self.nx, "must be at least 3"));
        }
        if self.ny < 3 {
            return Err(FlowError::config("ny", self.ny, "must be at least 3"));
        }
        if !self.is_single_block() {
            if self.nx_in < 1 || self.nx_in >= self.nx {
                return Err(FlowError::config("nx_in", self.nx_in, "must satisfy 1 <= nx_in < nx"));
            }
            if self.ny_in < 1 || self.ny_in >= self.ny {
                return Err(FlowError::config("ny_in", self.ny_in, "must satisfy 1 <= ny_in < ny"));
            }
        }
        check_positive("length_x", self.length_x)?;
        check_positive("length_y", self.length_y)?;
        check_positive("dt", self.dt)?;
        check_positive("tolerance", self.tolerance)?;
        if self.max_iter < 1 {
            return Err(FlowError::config("max_iter", self.max_iter, "must be at least 1"));
        }
        check_settings("momentum_solver", &self.momentum_solver)?;
        check_settings("pressure_solver", &self.pressure_solver)?;
        for (field, settings) in [
            ("momentum_solver", &self.momentum_solver),
            ("pressure_solver", &self.pressure_solver),
        ] {
            if settings.kind == LinearSolverKind::DirectLu && self.active_cells() > DIRECT_LU_MAX_CELLS {
                return Err(FlowError::config(
                    field,
                    self.active_cells(),
                    "too many active cells for the dense direct solver",
                ));
            }
        }
        Ok(())
    }
}

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use serde::Serialize;

use super::SimulationConfig;
use super::convergence::{ConvergenceMonitor, ResidualRecord};
use super::report::ReportSink;
use crate::disc::boundary::BoundaryConditions;
use crate::disc::coefficients::DiscretizationEngine;
use crate::disc::correction::FieldCorrector;
use crate::disc::energy::EnergySolver;
use crate::disc::face_velocity::FaceVelocityInterpolator;
use crate::disc::field::{FlowField, InitialConditions};
use crate::disc::mesh::structured::StructuredGeometry;
use crate::disc::momentum::MomentumSolver;
use crate::disc::pressure_correction::PressureCorrectionSolver;
use crate::disc::properties::FluidProperties;
use crate::error::{FlowError, FlowResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SimulationState {
    Initialized,
    Iterating,
    Converged,
    IterationLimitReached,
    /// Halted between iterations by an external stop signal.
    Stopped,
}

#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub state: SimulationState,
    pub iterations: usize,
    /// Residual of the last iteration; NaN when none ran.
    pub residual: f64,
    pub history: Vec<ResidualRecord>,
}

/// Outer SIMPLE iteration over a borrowed geometry, property set and
/// boundary table. The flow field is owned here and mutated in place.
pub struct SimulationLoop<'a> {
    pub config: &'a SimulationConfig,
    pub geometry: &'a StructuredGeometry,
    pub properties: &'a FluidProperties,
    pub boundaries: &'a BoundaryConditions,
    pub field: FlowField,
    pub monitor: ConvergenceMonitor,
    state: SimulationState,
    iteration: usize,
    relax_uv: f64,
    relax_p: f64,
    relax_t: f64,
}

impl<'a> SimulationLoop<'a> {
    pub fn new(
        config: &'a SimulationConfig,
        geometry: &'a StructuredGeometry,
        properties: &'a FluidProperties,
        boundaries: &'a BoundaryConditions,
        initial: &InitialConditions,
    ) -> FlowResult<Self> {
        config.validate()?;
        if geometry.nx != config.nx || geometry.ny != config.ny {
            return Err(FlowError::GeometryMismatch {
                config_nx: config.nx,
                config_ny: config.ny,
                geometry_nx: geometry.nx,
                geometry_ny: geometry.ny,
            });
        }
        if geometry.nx_in != config.nx_in || geometry.ny_in != config.ny_in {
            return Err(FlowError::config(
                "nx_in/ny_in",
                format!("{}x{}", geometry.nx_in, geometry.ny_in),
                "inlet block of the geometry differs from the configuration",
            ));
        }
        if !properties.shape_matches(geometry) {
            return Err(FlowError::config(
                "properties",
                format!("{:?}", properties.density.shape()),
                "property arrays do not match the geometry",
            ));
        }
        boundaries.validate(geometry)?;
        let field = FlowField::new(geometry, boundaries, initial);
        Ok(Self {
            config,
            geometry,
            properties,
            boundaries,
            field,
            monitor: ConvergenceMonitor::new(config.tolerance, config.max_iter),
            state: SimulationState::Initialized,
            iteration: 0,
            relax_uv: config.relax_uv,
            relax_p: config.relax_p,
            relax_t: config.relax_t,
        })
    }
    pub fn state(&self) -> SimulationState {
        self.state
    }
    /// Completed outer iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
    /// Effective `(relax_uv, relax_p)`, lower than configured after retries.
    pub fn relaxation(&self) -> (f64, f64) {
        (self.relax_uv, self.relax_p)
    }
    /// One outer iteration. A diverging sub-solve rolls the field back and is
    /// retried with halved relaxation; the reduced factors are kept for the
    /// rest of the run.
    pub fn iterate(&mut self) -> FlowResult<ResidualRecord> {
        let iteration = self.iteration + 1;
        let snapshot = self.field.clone();
        let recorded = self.monitor.history().len();
        let mut attempt = 0;
        loop {
            match self.pipeline(iteration) {
                Ok(record) => {
                    self.iteration = iteration;
                    return Ok(record);
                }
                Err(err @ FlowError::LinearSystemDivergence { .. }) => {
                    self.field = snapshot.clone();
                    self.monitor.truncate(recorded);
                    if attempt >= self.config.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    self.relax_uv *= 0.5;
                    self.relax_p *= 0.5;
                    self.relax_t *= 0.5;
                    warn!(
                        "{}; retrying with relax_uv = {:.4}, relax_p = {:.4}",
                        err, self.relax_uv, self.relax_p
                    );
                }
                Err(err) => {
                    self.field = snapshot;
                    self.monitor.truncate(recorded);
                    return Err(err);
                }
            }
        }
    }
    /// The stages of one iteration, strictly in order.
    fn pipeline(&mut self, iteration: usize) -> FlowResult<ResidualRecord> {
        let config = self.config;
        let geometry = self.geometry;
        let boundaries = self.boundaries;
        let engine = DiscretizationEngine::new(geometry, self.properties, boundaries, config.dt);

        let momentum = MomentumSolver::new(geometry, boundaries, &config.momentum_solver)
            .solve(&engine, &mut self.field, self.relax_uv, iteration)?;

        FaceVelocityInterpolator::new(geometry, boundaries).interpolate(&mut self.field);

        let correction = PressureCorrectionSolver::new(
            geometry,
            self.properties,
            boundaries,
            &config.pressure_solver,
        )
        .solve(&mut self.field, iteration)?;

        FieldCorrector::new(geometry, boundaries).correct(&mut self.field, &correction, self.relax_p);

        let mut unconverged = momentum.unconverged + usize::from(!correction.converged);
        let energy = if config.solve_energy {
            let (residual, converged) = EnergySolver::new(geometry, &config.momentum_solver)
                .solve(&engine, &mut self.field, self.relax_t, iteration)?;
            unconverged += usize::from(!converged);
            Some(residual)
        } else {
            None
        };

        let mass_reference =
            ConvergenceMonitor::mass_reference(geometry, self.properties, boundaries, &self.field);
        let velocity_scale = self.field.max_speed(geometry);
        let record = self.monitor.evaluate(
            iteration,
            correction.mass_imbalance,
            mass_reference,
            &momentum,
            velocity_scale,
            energy,
            unconverged,
        );
        debug!("iteration {} residual {:.4e}", iteration, record.residual);
        Ok(record)
    }
    pub fn run(&mut self, sink: &mut dyn ReportSink) -> FlowResult<SimulationReport> {
        self.run_until(&AtomicBool::new(false), sink)
    }
    /// Iterate until converged, out of iterations, or `stop` is raised. The
    /// signal is only looked at between iterations.
    pub fn run_until(
        &mut self,
        stop: &AtomicBool,
        sink: &mut dyn ReportSink,
    ) -> FlowResult<SimulationReport> {
        self.state = SimulationState::Iterating;
        while self.state == SimulationState::Iterating {
            if stop.load(Ordering::Relaxed) {
                self.state = SimulationState::Stopped;
                break;
            }
            let record = self.iterate()?;
            sink.on_iteration(&record);
            if self.monitor.is_converged(&record) {
                self.state = SimulationState::Converged;
            } else if self.monitor.is_exhausted(self.iteration) {
                self.state = SimulationState::IterationLimitReached;
            }
        }
        let report = SimulationReport {
            state: self.state,
            iterations: self.iteration,
            residual: self.monitor.last().map_or(f64::NAN, |record| record.residual),
            history: self.monitor.history().to_vec(),
        };
        sink.on_finish(&report);
        Ok(report)
    }
}

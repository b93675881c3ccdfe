use log::debug;
use ndarray::Array1;

use super::boundary::{BoundaryConditions, Variable};
use super::coefficients::{CoefficientSet, DiscretizationEngine, TransportVariable};
use super::field::FlowField;
use super::linear_solver::{self, LinearSolverSettings};
use super::mesh::{Face, structured::StructuredGeometry};
use crate::error::FlowResult;

/// Unrelaxed momentum residuals of one outer iteration, together with the
/// `Σ a_o` each is normalised by.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MomentumResiduals {
    pub u: f64,
    pub v: f64,
    pub u_scale: f64,
    pub v_scale: f64,
    /// Components whose sub-solve ran out of sweeps.
    pub unconverged: usize,
}

pub struct MomentumSolver<'a> {
    pub geometry: &'a StructuredGeometry,
    pub boundaries: &'a BoundaryConditions,
    pub settings: &'a LinearSolverSettings,
}

impl<'a> MomentumSolver<'a> {
    pub fn new(
        geometry: &'a StructuredGeometry,
        boundaries: &'a BoundaryConditions,
        settings: &'a LinearSolverSettings,
    ) -> Self {
        Self {
            geometry,
            boundaries,
            settings,
        }
    }
    /// Links plus the explicit pressure force `-(p_+ - p_-) × face length`.
    pub fn assemble(
        &self,
        engine: &DiscretizationEngine,
        field: &FlowField,
        variable: TransportVariable,
        phi_old: &Array1<f64>,
    ) -> CoefficientSet {
        let mut coefficients = engine.compute_links(field, variable, phi_old);
        let (plus, minus) = match variable {
            TransportVariable::YVelocity => (Face::North, Face::South),
            _ => (Face::East, Face::West),
        };
        for k in 0..coefficients.len() {
            let p_plus = self.boundaries.face_value(self.geometry, &field.p, Variable::P, k, plus);
            let p_minus = self.boundaries.face_value(self.geometry, &field.p, Variable::P, k, minus);
            coefficients.source[k] -= (p_plus - p_minus) * self.geometry.face_length(k, plus);
        }
        coefficients
    }
    /// Solve x- then y-momentum for provisional cell velocities. The relaxed
    /// centre coefficients are left in `field.ap_u` / `field.ap_v`.
    pub fn solve(
        &self,
        engine: &DiscretizationEngine,
        field: &mut FlowField,
        relax_uv: f64,
        iteration: usize,
    ) -> FlowResult<MomentumResiduals> {
        let mut residuals = MomentumResiduals::default();
        for variable in [TransportVariable::XVelocity, TransportVariable::YVelocity] {
            let component = variable.variable();
            let mut phi = self.geometry.gather(field.cell_values(component));
            let mut coefficients = self.assemble(engine, field, variable, &phi);
            let residual = linear_solver::residual_norm(self.geometry, &coefficients, &phi);
            let scale = coefficients.a_o.sum();
            coefficients.relax(relax_uv, &phi);
            let stats = linear_solver::solve(self.geometry, &coefficients, &mut phi, self.settings)
                .check(component, iteration)?;
            debug!("{} momentum: {} sweeps", component, stats.sweeps);
            if !stats.converged {
                residuals.unconverged += 1;
            }
            match variable {
                TransportVariable::YVelocity => {
                    self.geometry.scatter(&phi, &mut field.v);
                    field.ap_v = coefficients.a_o;
                    residuals.v = residual;
                    residuals.v_scale = scale;
                }
                _ => {
                    self.geometry.scatter(&phi, &mut field.u);
                    field.ap_u = coefficients.a_o;
                    residuals.u = residual;
                    residuals.u_scale = scale;
                }
            }
        }
        Ok(residuals)
    }
}

use super::boundary::Variable;
use super::coefficients::{DiscretizationEngine, TransportVariable};
use super::field::FlowField;
use super::linear_solver::{self, LinearSolverSettings};
use super::mesh::structured::StructuredGeometry;
use crate::error::FlowResult;

/// Passive temperature transport on the corrected face velocities.
pub struct EnergySolver<'a> {
    pub geometry: &'a StructuredGeometry,
    pub settings: &'a LinearSolverSettings,
}

impl<'a> EnergySolver<'a> {
    pub fn new(geometry: &'a StructuredGeometry, settings: &'a LinearSolverSettings) -> Self {
        Self { geometry, settings }
    }
    /// Returns the unrelaxed residual normalised by `Σ a_o × max|T|`, and
    /// whether the sub-solve reached its reduction.
    pub fn solve(
        &self,
        engine: &DiscretizationEngine,
        field: &mut FlowField,
        relax_t: f64,
        iteration: usize,
    ) -> FlowResult<(f64, bool)> {
        let mut phi = self.geometry.gather(&field.t);
        let mut coefficients = engine.compute_links(field, TransportVariable::Scalar, &phi);
        let residual = linear_solver::residual_norm(self.geometry, &coefficients, &phi);
        let t_ref = phi.iter().fold(0.0_f64, |acc, t| acc.max(t.abs()));
        let scale = coefficients.a_o.sum() * if t_ref > 0.0 { t_ref } else { 1.0 };
        coefficients.relax(relax_t, &phi);
        let stats = linear_solver::solve(self.geometry, &coefficients, &mut phi, self.settings)
            .check(Variable::T, iteration)?;
        self.geometry.scatter(&phi, &mut field.t);
        let residual = if scale > 0.0 { residual / scale } else { residual };
        Ok((residual, stats.converged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::boundary::{BoundaryConditions, BoundaryPosition, Condition, PatchConditions};
    use crate::disc::field::InitialConditions;
    use crate::disc::properties::{FluidParameters, FluidProperties};
    use ndarray::Array1;

    #[test]
    fn test_heated_wall_warms_fluid() {
        let x = Array1::linspace(0.0, 1.0, 5);
        let y = Array1::linspace(0.0, 1.0, 5);
        let geometry = StructuredGeometry::from_grid_lines(x, y, 4, 4).unwrap();
        let properties = FluidProperties::uniform(&geometry, &FluidParameters::default());
        let boundaries = BoundaryConditions::all_walls().with(
            BoundaryPosition::Lower,
            PatchConditions::wall().with_temperature(Condition::Dirichlet(1.0)),
        );
        let mut field = FlowField::new(&geometry, &boundaries, &InitialConditions::default());
        let engine = DiscretizationEngine::new(&geometry, &properties, &boundaries, 0.01);
        let settings = LinearSolverSettings::momentum_default();
        let solver = EnergySolver::new(&geometry, &settings);
        let (first, _) = solver.solve(&engine, &mut field, 0.9, 1).unwrap();
        assert!(first > 0.0);
        let bottom = field.t[[1, 0]];
        let top = field.t[[1, 3]];
        assert!(bottom > 0.0);
        assert!(bottom > top);
        assert!(field.t.iter().all(|&t| t <= 1.0));
    }
}

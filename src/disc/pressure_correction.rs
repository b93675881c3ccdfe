use log::debug;
use ndarray::{Array1, Array2};

use super::boundary::{BoundaryConditions, Condition, Variable};
use super::coefficients::CoefficientSet;
use super::field::FlowField;
use super::linear_solver::{self, LinearSolverSettings};
use super::mesh::{Face, Neighbor, structured::StructuredGeometry};
use super::properties::FluidProperties;
use crate::error::FlowResult;

/// Velocity response `d_f` of `face` of cell `k` to a unit pressure
/// correction difference across it. Zero on faces where the pressure
/// correction is zero-gradient.
pub fn face_coefficient(
    geometry: &StructuredGeometry,
    boundaries: &BoundaryConditions,
    field: &FlowField,
    k: usize,
    face: Face,
) -> f64 {
    let ap = if face.is_x_face() {
        &field.ap_u
    } else {
        &field.ap_v
    };
    let distance = geometry.face_distance(k, face);
    match geometry.cells[k].neighbor(face) {
        Neighbor::Cell(m) => {
            0.5 * (geometry.cell_area(k) / ap[k] + geometry.cell_area(m) / ap[m]) / distance
        }
        Neighbor::Boundary(position) => match boundaries.condition(position, Variable::P) {
            Condition::Dirichlet(_) => geometry.cell_area(k) / ap[k] / distance,
            Condition::ZeroGradient => 0.0,
        },
    }
}

/// Outcome of one pressure-correction solve.
#[derive(Clone, Debug)]
pub struct PressureCorrection {
    /// `p'` over the active cells.
    pub pp: Array1<f64>,
    /// `d_f` per `(active cell, face)`.
    pub d: Array2<f64>,
    /// `Σ |net mass outflow|` before the correction.
    pub mass_imbalance: f64,
    /// The sub-solve reached its reduction within the sweep budget.
    pub converged: bool,
}

pub struct PressureCorrectionSolver<'a> {
    pub geometry: &'a StructuredGeometry,
    pub properties: &'a FluidProperties,
    pub boundaries: &'a BoundaryConditions,
    pub settings: &'a LinearSolverSettings,
}

impl<'a> PressureCorrectionSolver<'a> {
    pub fn new(
        geometry: &'a StructuredGeometry,
        properties: &'a FluidProperties,
        boundaries: &'a BoundaryConditions,
        settings: &'a LinearSolverSettings,
    ) -> Self {
        Self {
            geometry,
            properties,
            boundaries,
            settings,
        }
    }
    /// Links `ρ_f A_f d_f` with the negative net outflow of each cell as
    /// source. Without a pressure reference anywhere, the first active cell
    /// is pinned to zero.
    pub fn assemble(&self, field: &FlowField) -> (CoefficientSet, Array2<f64>) {
        let geometry = self.geometry;
        let n = geometry.active_count();
        let mut coefficients = CoefficientSet::zeros(n);
        let mut d = Array2::zeros((n, 4));
        for (k, cell) in geometry.cells.iter().enumerate() {
            for face in Face::ALL {
                let d_f = face_coefficient(geometry, self.boundaries, field, k, face);
                d[[k, face.index()]] = d_f;
                let link = self.properties.face_density(k, face) * geometry.face_length(k, face) * d_f;
                coefficients.a_o[k] += link;
                if let Neighbor::Cell(_) = cell.neighbor(face) {
                    *coefficients.link_mut(k, face) = link;
                }
            }
            coefficients.source[k] = -field.net_mass_outflow(geometry, self.properties, k);
        }
        if n > 0 && !self.boundaries.has_pressure_reference(geometry) {
            coefficients.a_o[0] = 1.0;
            for face in Face::ALL {
                *coefficients.link_mut(0, face) = 0.0;
            }
            coefficients.source[0] = 0.0;
        }
        (coefficients, d)
    }
    /// Solve for `p'` from a zero start; also stored in `field.pp`. Outflow
    /// faces the correction cannot reach are balanced first.
    pub fn solve(&self, field: &mut FlowField, iteration: usize) -> FlowResult<PressureCorrection> {
        field.balance_outflow(self.geometry, self.properties, self.boundaries);
        let (coefficients, d) = self.assemble(field);
        let mass_imbalance = coefficients.source.iter().map(|b| b.abs()).sum();
        let mut pp = Array1::zeros(self.geometry.active_count());
        let stats = linear_solver::solve(self.geometry, &coefficients, &mut pp, self.settings)
            .check(Variable::P, iteration)?;
        debug!(
            "pressure correction: {} sweeps, imbalance {:.3e}",
            stats.sweeps, mass_imbalance
        );
        self.geometry.scatter(&pp, &mut field.pp);
        Ok(PressureCorrection {
            pp,
            d,
            mass_imbalance,
            converged: stats.converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::boundary::{BoundaryPosition, PatchConditions};
    use crate::disc::field::InitialConditions;
    use crate::disc::properties::FluidParameters;
    use approx::assert_relative_eq;

    fn channel() -> (StructuredGeometry, FluidProperties, BoundaryConditions) {
        let x = Array1::linspace(0.0, 1.0, 5);
        let y = Array1::linspace(0.0, 1.0, 5);
        let geometry = StructuredGeometry::from_grid_lines(x, y, 4, 4).unwrap();
        let properties = FluidProperties::uniform(&geometry, &FluidParameters::default());
        let boundaries = BoundaryConditions::new()
            .with(BoundaryPosition::Left, PatchConditions::velocity_inlet(1.0, 0.0))
            .with(BoundaryPosition::Right, PatchConditions::pressure_outlet(0.0))
            .with(BoundaryPosition::Upper, PatchConditions::slip_wall())
            .with(BoundaryPosition::Lower, PatchConditions::slip_wall());
        (geometry, properties, boundaries)
    }

    #[test]
    fn test_face_coefficients() {
        let (geometry, _, boundaries) = channel();
        let mut field = FlowField::new(&geometry, &boundaries, &InitialConditions::default());
        field.ap_u.fill(2.0);
        // interior: 0.5 (A/a + A/a) / dx
        assert_relative_eq!(
            face_coefficient(&geometry, &boundaries, &field, 0, Face::East),
            0.0625 / 2.0 / 0.25
        );
        // inlet carries no pressure reference
        assert_eq!(face_coefficient(&geometry, &boundaries, &field, 0, Face::West), 0.0);
        // outlet: half-cell distance
        assert_relative_eq!(
            face_coefficient(&geometry, &boundaries, &field, 3, Face::East),
            0.0625 / 2.0 / 0.125
        );
    }

    #[test]
    fn test_balanced_field_needs_no_correction() {
        let (geometry, properties, boundaries) = channel();
        let initial = InitialConditions {
            u: 1.0,
            ..InitialConditions::default()
        };
        let mut field = FlowField::new(&geometry, &boundaries, &initial);
        let settings = LinearSolverSettings::pressure_default();
        let solver = PressureCorrectionSolver::new(&geometry, &properties, &boundaries, &settings);
        let correction = solver.solve(&mut field, 1).unwrap();
        assert_relative_eq!(correction.mass_imbalance, 0.0);
        assert!(correction.pp.iter().all(|&pp| pp == 0.0));
    }

    #[test]
    fn test_pinned_without_pressure_reference() {
        let (geometry, properties, _) = channel();
        let boundaries = BoundaryConditions::all_walls();
        let field = FlowField::new(&geometry, &boundaries, &InitialConditions::default());
        let settings = LinearSolverSettings::pressure_default();
        let solver = PressureCorrectionSolver::new(&geometry, &properties, &boundaries, &settings);
        let (coefficients, _) = solver.assemble(&field);
        assert_eq!(coefficients.a_o[0], 1.0);
        assert_eq!(coefficients.neighbor_sum(0), 0.0);
        assert!(coefficients.a_o[1] > 0.0);
    }
}

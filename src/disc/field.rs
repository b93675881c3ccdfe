use ndarray::{Array1, Array2};
use serde::Deserialize;

use super::boundary::{BoundaryConditions, Condition, Variable};
use super::mesh::{Face, Neighbor, structured::StructuredGeometry};
use super::properties::FluidProperties;

/// Fluxes below this are treated as absent.
const TINY: f64 = 1e-30;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct InitialConditions {
    pub u: f64,
    pub v: f64,
    pub p: f64,
    pub t: f64,
}

/// Solution state owned by the running simulation.
///
/// Cell fields are `(nx, ny)` arrays in which only active entries are ever
/// read or written. Face velocities are stored once per face: `u_face[[i, j]]`
/// is the west face of cell `(i, j)`, `v_face[[i, j]]` its south face.
#[derive(Clone, Debug)]
pub struct FlowField {
    pub u: Array2<f64>,
    pub v: Array2<f64>,
    pub p: Array2<f64>,
    pub pp: Array2<f64>,
    pub t: Array2<f64>,
    pub u_face: Array2<f64>,
    pub v_face: Array2<f64>,
    /// Relaxed momentum centre coefficients of the latest iteration, one per
    /// active cell.
    pub ap_u: Array1<f64>,
    pub ap_v: Array1<f64>,
}

impl FlowField {
    pub fn new(
        geometry: &StructuredGeometry,
        boundaries: &BoundaryConditions,
        initial: &InitialConditions,
    ) -> Self {
        let (nx, ny) = (geometry.nx, geometry.ny);
        let n = geometry.active_count();
        let mut field = Self {
            u: Array2::zeros((nx, ny)),
            v: Array2::zeros((nx, ny)),
            p: Array2::zeros((nx, ny)),
            pp: Array2::zeros((nx, ny)),
            t: Array2::zeros((nx, ny)),
            u_face: Array2::zeros((nx + 1, ny)),
            v_face: Array2::zeros((nx, ny + 1)),
            ap_u: Array1::ones(n),
            ap_v: Array1::ones(n),
        };
        for cell in geometry.cells.iter() {
            field.u[[cell.i, cell.j]] = initial.u;
            field.v[[cell.i, cell.j]] = initial.v;
            field.p[[cell.i, cell.j]] = initial.p;
            field.t[[cell.i, cell.j]] = initial.t;
        }
        for (k, cell) in geometry.cells.iter().enumerate() {
            for face in [Face::East, Face::North] {
                if let Neighbor::Cell(_) = cell.neighbor(face) {
                    let velocity = if face.is_x_face() { initial.u } else { initial.v };
                    *field.face_velocity_mut(geometry, k, face) = velocity;
                }
            }
        }
        field.apply_boundary_face_velocities(geometry, boundaries);
        field
    }
    pub fn cell_values(&self, variable: Variable) -> &Array2<f64> {
        match variable {
            Variable::U => &self.u,
            Variable::V => &self.v,
            Variable::P => &self.p,
            Variable::T => &self.t,
        }
    }
    pub fn face_velocity(&self, geometry: &StructuredGeometry, k: usize, face: Face) -> f64 {
        let cell = &geometry.cells[k];
        match face {
            Face::East => self.u_face[[cell.i + 1, cell.j]],
            Face::West => self.u_face[[cell.i, cell.j]],
            Face::North => self.v_face[[cell.i, cell.j + 1]],
            Face::South => self.v_face[[cell.i, cell.j]],
        }
    }
    pub fn face_velocity_mut(
        &mut self,
        geometry: &StructuredGeometry,
        k: usize,
        face: Face,
    ) -> &mut f64 {
        let cell = &geometry.cells[k];
        match face {
            Face::East => &mut self.u_face[[cell.i + 1, cell.j]],
            Face::West => &mut self.u_face[[cell.i, cell.j]],
            Face::North => &mut self.v_face[[cell.i, cell.j + 1]],
            Face::South => &mut self.v_face[[cell.i, cell.j]],
        }
    }
    /// Mass flux leaving cell `k` through `face`.
    pub fn mass_outflow(
        &self,
        geometry: &StructuredGeometry,
        properties: &FluidProperties,
        k: usize,
        face: Face,
    ) -> f64 {
        face.sign()
            * properties.face_density(k, face)
            * self.face_velocity(geometry, k, face)
            * geometry.face_length(k, face)
    }
    pub fn net_mass_outflow(
        &self,
        geometry: &StructuredGeometry,
        properties: &FluidProperties,
        k: usize,
    ) -> f64 {
        Face::ALL
            .iter()
            .map(|&face| self.mass_outflow(geometry, properties, k, face))
            .sum()
    }
    /// Boundary faces carry the Dirichlet value of the face-normal velocity
    /// component, or the owner cell's value where that component is
    /// zero-gradient.
    pub fn apply_boundary_face_velocities(
        &mut self,
        geometry: &StructuredGeometry,
        boundaries: &BoundaryConditions,
    ) {
        for (k, face, position) in geometry.boundary_faces() {
            let variable = normal_component(face);
            let cell = &geometry.cells[k];
            let value = match boundaries.condition(position, variable) {
                Condition::Dirichlet(value) => value,
                Condition::ZeroGradient => self.cell_values(variable)[[cell.i, cell.j]],
            };
            *self.face_velocity_mut(geometry, k, face) = value;
        }
    }
    /// Faces where both the normal velocity and the pressure are
    /// zero-gradient cannot be reached by the pressure correction. When no
    /// patch fixes the pressure, rescale them so that their outflow equals
    /// the net inflow through faces with a prescribed normal velocity; with
    /// no outflow to scale, the inflow is spread uniformly over them.
    pub fn balance_outflow(
        &mut self,
        geometry: &StructuredGeometry,
        properties: &FluidProperties,
        boundaries: &BoundaryConditions,
    ) {
        if boundaries.has_pressure_reference(geometry) {
            return;
        }
        let mut outlets = Vec::new();
        let mut inflow = 0.0;
        for (k, face, position) in geometry.boundary_faces() {
            match boundaries.condition(position, normal_component(face)) {
                Condition::Dirichlet(_) => {
                    inflow -= self.mass_outflow(geometry, properties, k, face);
                }
                Condition::ZeroGradient => {
                    if !boundaries.condition(position, Variable::P).is_dirichlet() {
                        outlets.push((k, face));
                    }
                }
            }
        }
        if outlets.is_empty() {
            return;
        }
        let outflow: f64 = outlets
            .iter()
            .map(|&(k, face)| self.mass_outflow(geometry, properties, k, face))
            .sum();
        if outflow.abs() > TINY {
            let factor = inflow / outflow;
            for &(k, face) in outlets.iter() {
                *self.face_velocity_mut(geometry, k, face) *= factor;
            }
        } else if inflow.abs() > TINY {
            let capacity: f64 = outlets
                .iter()
                .map(|&(k, face)| properties.face_density(k, face) * geometry.face_length(k, face))
                .sum();
            for &(k, face) in outlets.iter() {
                *self.face_velocity_mut(geometry, k, face) = face.sign() * inflow / capacity;
            }
        }
    }
    /// Largest cell-centre speed over the active cells.
    pub fn max_speed(&self, geometry: &StructuredGeometry) -> f64 {
        geometry
            .cells
            .iter()
            .map(|cell| self.u[[cell.i, cell.j]].hypot(self.v[[cell.i, cell.j]]))
            .fold(0.0, f64::max)
    }
}

/// Velocity component normal to `face`.
pub fn normal_component(face: Face) -> Variable {
    if face.is_x_face() { Variable::U } else { Variable::V }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::boundary::{BoundaryPosition, PatchConditions};
    use crate::disc::properties::FluidParameters;
    use approx::assert_relative_eq;

    fn channel() -> (StructuredGeometry, BoundaryConditions) {
        let x = Array1::linspace(0.0, 1.0, 5);
        let y = Array1::linspace(0.0, 1.0, 5);
        let geometry = StructuredGeometry::from_grid_lines(x, y, 4, 4).unwrap();
        let boundaries = BoundaryConditions::new()
            .with(BoundaryPosition::Left, PatchConditions::velocity_inlet(2.0, 0.0))
            .with(BoundaryPosition::Right, PatchConditions::pressure_outlet(0.0))
            .with(BoundaryPosition::Upper, PatchConditions::slip_wall())
            .with(BoundaryPosition::Lower, PatchConditions::slip_wall());
        (geometry, boundaries)
    }

    #[test]
    fn test_initial_face_velocities() {
        let (geometry, boundaries) = channel();
        let initial = InitialConditions {
            u: 0.5,
            ..InitialConditions::default()
        };
        let field = FlowField::new(&geometry, &boundaries, &initial);
        assert_relative_eq!(field.u_face[[0, 1]], 2.0);
        assert_relative_eq!(field.u_face[[2, 1]], 0.5);
        assert_relative_eq!(field.u_face[[4, 1]], 0.5);
        assert_relative_eq!(field.v_face[[1, 0]], 0.0);
    }

    fn open_channel() -> (StructuredGeometry, BoundaryConditions, FluidProperties) {
        let (geometry, boundaries) = channel();
        let boundaries = boundaries.with(BoundaryPosition::Right, PatchConditions::outflow());
        let properties = FluidProperties::uniform(&geometry, &FluidParameters::default());
        (geometry, boundaries, properties)
    }

    #[test]
    fn test_outflow_rescaled_to_inflow() {
        let (geometry, boundaries, properties) = open_channel();
        let initial = InitialConditions {
            u: 0.5,
            ..InitialConditions::default()
        };
        let mut field = FlowField::new(&geometry, &boundaries, &initial);
        assert_relative_eq!(field.u_face[[4, 2]], 0.5);
        field.balance_outflow(&geometry, &properties, &boundaries);
        for j in 0..4 {
            assert_relative_eq!(field.u_face[[4, j]], 2.0, epsilon = 1e-12);
        }
        // the inlet is untouched
        assert_relative_eq!(field.u_face[[0, 1]], 2.0);
    }

    #[test]
    fn test_inflow_spread_over_still_outlet() {
        let (geometry, boundaries, properties) = open_channel();
        let mut field = FlowField::new(&geometry, &boundaries, &InitialConditions::default());
        assert_eq!(field.u_face[[4, 0]], 0.0);
        field.balance_outflow(&geometry, &properties, &boundaries);
        for j in 0..4 {
            assert_relative_eq!(field.u_face[[4, j]], 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_pressure_outlet_is_left_alone() {
        let (geometry, boundaries) = channel();
        let properties = FluidProperties::uniform(&geometry, &FluidParameters::default());
        let initial = InitialConditions {
            u: 0.5,
            ..InitialConditions::default()
        };
        let mut field = FlowField::new(&geometry, &boundaries, &initial);
        field.balance_outflow(&geometry, &properties, &boundaries);
        assert_relative_eq!(field.u_face[[4, 2]], 0.5);
    }

    #[test]
    fn test_net_mass_outflow() {
        let (geometry, boundaries) = channel();
        let field = FlowField::new(&geometry, &boundaries, &InitialConditions::default());
        let properties = FluidProperties::uniform(&geometry, &FluidParameters::default());
        // inflow of 2 * 0.25 through the west face of the first cell
        assert_relative_eq!(field.net_mass_outflow(&geometry, &properties, 0), -0.5);
        assert_relative_eq!(field.net_mass_outflow(&geometry, &properties, 5), 0.0);
    }
}

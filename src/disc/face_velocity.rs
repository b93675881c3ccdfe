use super::boundary::{BoundaryConditions, Variable};
use super::field::FlowField;
use super::mesh::{Face, Neighbor, structured::StructuredGeometry};

/// Momentum-weighted (Rhie–Chow) face velocities.
pub struct FaceVelocityInterpolator<'a> {
    pub geometry: &'a StructuredGeometry,
    pub boundaries: &'a BoundaryConditions,
}

impl<'a> FaceVelocityInterpolator<'a> {
    pub fn new(geometry: &'a StructuredGeometry, boundaries: &'a BoundaryConditions) -> Self {
        Self {
            geometry,
            boundaries,
        }
    }
    /// Recompute every face velocity from the current cell velocities,
    /// pressure and relaxed momentum diagonals.
    pub fn interpolate(&self, field: &mut FlowField) {
        let geometry = self.geometry;
        for (k, cell) in geometry.cells.iter().enumerate() {
            for face in [Face::East, Face::North] {
                if let Neighbor::Cell(m) = cell.neighbor(face) {
                    let velocity = self.interior_face_velocity(field, k, m, face);
                    *field.face_velocity_mut(geometry, k, face) = velocity;
                }
            }
        }
        field.apply_boundary_face_velocities(geometry, self.boundaries);
    }
    /// Average of the two cell velocities, corrected by the difference
    /// between the averaged cell pressure gradient and the compact face
    /// gradient.
    pub fn interior_face_velocity(&self, field: &FlowField, k: usize, m: usize, face: Face) -> f64 {
        let geometry = self.geometry;
        let x_axis = face.is_x_face();
        let (velocity, ap) = if x_axis {
            (&field.u, &field.ap_u)
        } else {
            (&field.v, &field.ap_v)
        };
        let (own, other) = (&geometry.cells[k], &geometry.cells[m]);
        let average = 0.5 * (velocity[[own.i, own.j]] + velocity[[other.i, other.j]]);
        let weight = 0.5 * (geometry.cell_area(k) / ap[k] + geometry.cell_area(m) / ap[m]);
        let gradient_average = 0.5
            * (self.boundaries.cell_gradient(geometry, &field.p, Variable::P, k, x_axis)
                + self.boundaries.cell_gradient(geometry, &field.p, Variable::P, m, x_axis));
        let gradient_face = face.sign() * (field.p[[other.i, other.j]] - field.p[[own.i, own.j]])
            / geometry.face_distance(k, face);
        average + weight * (gradient_average - gradient_face)
    }
}

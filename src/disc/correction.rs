use super::boundary::{BoundaryConditions, Condition, Variable};
use super::field::FlowField;
use super::mesh::{Face, Neighbor, structured::StructuredGeometry};
use super::pressure_correction::PressureCorrection;

pub struct FieldCorrector<'a> {
    pub geometry: &'a StructuredGeometry,
    pub boundaries: &'a BoundaryConditions,
}

impl<'a> FieldCorrector<'a> {
    pub fn new(geometry: &'a StructuredGeometry, boundaries: &'a BoundaryConditions) -> Self {
        Self {
            geometry,
            boundaries,
        }
    }
    /// Apply `p'` to cell velocities, face velocities and pressure. The
    /// velocity update uses the relaxed momentum diagonals; pressure is
    /// under-relaxed by `relax_p`.
    pub fn correct(&self, field: &mut FlowField, correction: &PressureCorrection, relax_p: f64) {
        let geometry = self.geometry;
        let pp = &correction.pp;
        for (k, cell) in geometry.cells.iter().enumerate() {
            let face_pp = |face| {
                self.boundaries
                    .correction_face_value(geometry, &field.pp, Variable::P, k, face)
            };
            let du = geometry.cell_area(k) / field.ap_u[k] * (face_pp(Face::East) - face_pp(Face::West))
                / geometry.width(cell.i);
            let dv = geometry.cell_area(k) / field.ap_v[k] * (face_pp(Face::North) - face_pp(Face::South))
                / geometry.height(cell.j);
            field.u[[cell.i, cell.j]] -= du;
            field.v[[cell.i, cell.j]] -= dv;
        }

        for (k, cell) in geometry.cells.iter().enumerate() {
            for face in Face::ALL {
                let d = correction.d[[k, face.index()]];
                match cell.neighbor(face) {
                    // interior faces are visited once, from the west/south side
                    Neighbor::Cell(m) if matches!(face, Face::East | Face::North) => {
                        *field.face_velocity_mut(geometry, k, face) += d * (pp[k] - pp[m]);
                    }
                    Neighbor::Cell(_) => {}
                    Neighbor::Boundary(position) => {
                        if let Condition::Dirichlet(_) = self.boundaries.condition(position, Variable::P) {
                            *field.face_velocity_mut(geometry, k, face) += face.sign() * d * pp[k];
                        }
                    }
                }
            }
        }

        for (k, cell) in geometry.cells.iter().enumerate() {
            field.p[[cell.i, cell.j]] += relax_p * pp[k];
        }
    }
}

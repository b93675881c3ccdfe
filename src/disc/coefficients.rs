use ndarray::Array1;

use super::boundary::{BoundaryConditions, Condition, Variable};
use super::field::FlowField;
use super::mesh::{Face, Neighbor, structured::StructuredGeometry};
use super::properties::{FluidProperties, face_average};

/// Selects the diffusivity, the convective scaling and the boundary
/// conditions used when building links.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportVariable {
    XVelocity,
    YVelocity,
    /// Energy-like scalar: conductivity as diffusivity, flux scaled by the
    /// specific heat.
    Scalar,
}

impl TransportVariable {
    pub fn variable(self) -> Variable {
        match self {
            TransportVariable::XVelocity => Variable::U,
            TransportVariable::YVelocity => Variable::V,
            TransportVariable::Scalar => Variable::T,
        }
    }
}

/// Discretised equations over the active cells:
/// `a_o φ_P = a_e φ_E + a_w φ_W + a_n φ_N + a_s φ_S + source`, every link
/// non-negative and zero where the face is a boundary.
#[derive(Clone, Debug)]
pub struct CoefficientSet {
    pub a_o: Array1<f64>,
    pub a_e: Array1<f64>,
    pub a_w: Array1<f64>,
    pub a_n: Array1<f64>,
    pub a_s: Array1<f64>,
    pub source: Array1<f64>,
}

impl CoefficientSet {
    pub fn zeros(n: usize) -> Self {
        Self {
            a_o: Array1::zeros(n),
            a_e: Array1::zeros(n),
            a_w: Array1::zeros(n),
            a_n: Array1::zeros(n),
            a_s: Array1::zeros(n),
            source: Array1::zeros(n),
        }
    }
    pub fn len(&self) -> usize {
        self.a_o.len()
    }
    pub fn is_empty(&self) -> bool {
        self.a_o.is_empty()
    }
    pub fn link(&self, k: usize, face: Face) -> f64 {
        match face {
            Face::East => self.a_e[k],
            Face::West => self.a_w[k],
            Face::North => self.a_n[k],
            Face::South => self.a_s[k],
        }
    }
    pub fn link_mut(&mut self, k: usize, face: Face) -> &mut f64 {
        match face {
            Face::East => &mut self.a_e[k],
            Face::West => &mut self.a_w[k],
            Face::North => &mut self.a_n[k],
            Face::South => &mut self.a_s[k],
        }
    }
    pub fn neighbor_sum(&self, k: usize) -> f64 {
        self.a_e[k] + self.a_w[k] + self.a_n[k] + self.a_s[k]
    }
    /// Implicit under-relaxation: `a_o ← a_o / alpha` with the difference
    /// moved to the source against the previous iterate.
    pub fn relax(&mut self, alpha: f64, phi_old: &Array1<f64>) {
        for k in 0..self.len() {
            let relaxed = self.a_o[k] / alpha;
            self.source[k] += (relaxed - self.a_o[k]) * phi_old[k];
            self.a_o[k] = relaxed;
        }
    }
}

/// Donor-cell weighting of one face: returns the neighbour link and the
/// face's contribution to the centre coefficient for an outward flux
/// `outflow` and conductance `conductance`.
pub fn donor_cell(outflow: f64, conductance: f64) -> (f64, f64) {
    let incoming = 0.5 * (outflow.abs() - outflow);
    let outgoing = 0.5 * (outflow.abs() + outflow);
    (conductance + incoming, conductance + outgoing)
}

pub struct DiscretizationEngine<'a> {
    pub geometry: &'a StructuredGeometry,
    pub properties: &'a FluidProperties,
    pub boundaries: &'a BoundaryConditions,
    pub dt: f64,
}

impl<'a> DiscretizationEngine<'a> {
    pub fn new(
        geometry: &'a StructuredGeometry,
        properties: &'a FluidProperties,
        boundaries: &'a BoundaryConditions,
        dt: f64,
    ) -> Self {
        Self {
            geometry,
            properties,
            boundaries,
            dt,
        }
    }
    /// Convective outflow and diffusive conductance through `face` of cell `k`.
    pub fn face_terms(
        &self,
        field: &FlowField,
        variable: TransportVariable,
        k: usize,
        face: Face,
    ) -> (f64, f64) {
        let area = self.geometry.face_length(k, face);
        let distance = self.geometry.face_distance(k, face);
        let mut outflow = field.mass_outflow(self.geometry, self.properties, k, face);
        let diffusivity = match variable {
            TransportVariable::XVelocity | TransportVariable::YVelocity => {
                face_average(self.geometry, &self.properties.viscosity, k, face)
            }
            TransportVariable::Scalar => {
                outflow *= face_average(self.geometry, &self.properties.specific_heat, k, face);
                face_average(self.geometry, &self.properties.conductivity, k, face)
            }
        };
        (outflow, diffusivity * area / distance)
    }
    /// Links for every active cell from the current face velocities.
    ///
    /// Besides the face terms, `a_o` carries the pseudo-transient inertia
    /// and `max(-ΣF, 0)`, both balanced against `phi_old` in the source.
    /// Since `Σ max(F,0) + max(-ΣF,0) = Σ max(-F,0) + max(ΣF,0)`, the centre
    /// coefficient never falls below the sum of the links.
    pub fn compute_links(
        &self,
        field: &FlowField,
        variable: TransportVariable,
        phi_old: &Array1<f64>,
    ) -> CoefficientSet {
        let geometry = self.geometry;
        let mut coefficients = CoefficientSet::zeros(geometry.active_count());
        for (k, cell) in geometry.cells.iter().enumerate() {
            let mut net_outflow = 0.0;
            let mut a_o = 0.0;
            for face in Face::ALL {
                let (outflow, conductance) = self.face_terms(field, variable, k, face);
                let (a_nb, centre) = donor_cell(outflow, conductance);
                net_outflow += outflow;
                a_o += centre;
                *coefficients.link_mut(k, face) = a_nb;
            }
            let capacity = match variable {
                TransportVariable::Scalar => self.properties.specific_heat[[cell.i, cell.j]],
                _ => 1.0,
            };
            let inertia = self.properties.density[[cell.i, cell.j]] * capacity
                * geometry.area[[cell.i, cell.j]]
                / self.dt;
            let deferred = (-net_outflow).max(0.0) + inertia;
            a_o += deferred;
            coefficients.source[k] += deferred * phi_old[k];

            for face in Face::ALL {
                if let Neighbor::Boundary(position) = cell.neighbor(face) {
                    let a_b = coefficients.link(k, face);
                    match self.boundaries.condition(position, variable.variable()) {
                        Condition::Dirichlet(value) => coefficients.source[k] += a_b * value,
                        Condition::ZeroGradient => a_o -= a_b,
                    }
                    *coefficients.link_mut(k, face) = 0.0;
                }
            }
            coefficients.a_o[k] = a_o;
        }
        coefficients
    }
}

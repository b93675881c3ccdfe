use std::fmt;

use hashbrown::HashMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::disc::mesh::{Face, Neighbor, structured::StructuredGeometry};
use crate::error::{FlowError, FlowResult};

/// Patch identity of a boundary face. The four domain sides plus the two
/// faces of the step where the inlet block meets the outlet block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPosition {
    Lower,
    Right,
    Upper,
    Left,
    /// Vertical step face, seen by the first outlet-block column.
    StepRiser,
    /// Horizontal step face, seen by the bottom row of the inlet block.
    StepTread,
}

impl BoundaryPosition {
    pub const ALL: [BoundaryPosition; 6] = [
        BoundaryPosition::Lower,
        BoundaryPosition::Right,
        BoundaryPosition::Upper,
        BoundaryPosition::Left,
        BoundaryPosition::StepRiser,
        BoundaryPosition::StepTread,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    U,
    V,
    P,
    T,
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variable::U => "u-velocity",
            Variable::V => "v-velocity",
            Variable::P => "pressure-correction",
            Variable::T => "temperature",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Condition {
    Dirichlet(f64),
    ZeroGradient,
}

impl Condition {
    pub fn is_dirichlet(&self) -> bool {
        matches!(self, Condition::Dirichlet(_))
    }
}

fn adiabatic() -> Condition {
    Condition::ZeroGradient
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchConditions {
    pub u: Condition,
    pub v: Condition,
    pub p: Condition,
    #[serde(default = "adiabatic")]
    pub t: Condition,
}

impl PatchConditions {
    /// No-slip, impermeable, adiabatic.
    pub const fn wall() -> Self {
        Self {
            u: Condition::Dirichlet(0.0),
            v: Condition::Dirichlet(0.0),
            p: Condition::ZeroGradient,
            t: Condition::ZeroGradient,
        }
    }
    /// Impermeable wall without shear. Only meaningful on `Upper`/`Lower`,
    /// where `v` is the wall-normal component.
    pub const fn slip_wall() -> Self {
        Self {
            u: Condition::ZeroGradient,
            v: Condition::Dirichlet(0.0),
            p: Condition::ZeroGradient,
            t: Condition::ZeroGradient,
        }
    }
    pub const fn velocity_inlet(u: f64, v: f64) -> Self {
        Self {
            u: Condition::Dirichlet(u),
            v: Condition::Dirichlet(v),
            p: Condition::ZeroGradient,
            t: Condition::ZeroGradient,
        }
    }
    pub const fn pressure_outlet(p: f64) -> Self {
        Self {
            u: Condition::ZeroGradient,
            v: Condition::ZeroGradient,
            p: Condition::Dirichlet(p),
            t: Condition::ZeroGradient,
        }
    }
    /// Zero-gradient for every variable. Without a pressure reference the
    /// outflow through such a patch is rescaled to the prescribed inflow.
    pub const fn outflow() -> Self {
        Self {
            u: Condition::ZeroGradient,
            v: Condition::ZeroGradient,
            p: Condition::ZeroGradient,
            t: Condition::ZeroGradient,
        }
    }
    pub const fn with_temperature(mut self, t: Condition) -> Self {
        self.t = t;
        self
    }
    pub fn get(&self, variable: Variable) -> Condition {
        match variable {
            Variable::U => self.u,
            Variable::V => self.v,
            Variable::P => self.p,
            Variable::T => self.t,
        }
    }
}

const WALL: PatchConditions = PatchConditions::wall();

/// Mapping from patch identity to the condition of every variable on it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryConditions {
    patches: HashMap<BoundaryPosition, PatchConditions>,
}

impl BoundaryConditions {
    pub fn new() -> Self {
        Self::default()
    }
    /// Velocity inlet on the left, pressure outlet on the right, no-slip
    /// walls everywhere else including both step faces.
    pub fn backward_step(inlet_velocity: f64) -> Self {
        Self::new()
            .with(
                BoundaryPosition::Left,
                PatchConditions::velocity_inlet(inlet_velocity, 0.0),
            )
            .with(BoundaryPosition::Right, PatchConditions::pressure_outlet(0.0))
            .with(BoundaryPosition::Upper, PatchConditions::wall())
            .with(BoundaryPosition::Lower, PatchConditions::wall())
            .with(BoundaryPosition::StepRiser, PatchConditions::wall())
            .with(BoundaryPosition::StepTread, PatchConditions::wall())
    }
    pub fn all_walls() -> Self {
        BoundaryPosition::ALL
            .iter()
            .fold(Self::new(), |bcs, &position| {
                bcs.with(position, PatchConditions::wall())
            })
    }
    pub fn with(mut self, position: BoundaryPosition, conditions: PatchConditions) -> Self {
        self.patches.insert(position, conditions);
        self
    }
    pub fn set(&mut self, position: BoundaryPosition, conditions: PatchConditions) {
        self.patches.insert(position, conditions);
    }
    pub fn patch(&self, position: BoundaryPosition) -> &PatchConditions {
        self.patches.get(&position).unwrap_or(&WALL)
    }
    pub fn condition(&self, position: BoundaryPosition, variable: Variable) -> Condition {
        self.patch(position).get(variable)
    }
    /// Every patch that actually occurs on `geometry` must have an entry.
    pub fn validate(&self, geometry: &StructuredGeometry) -> FlowResult<()> {
        for position in geometry.boundary_positions() {
            if !self.patches.contains_key(&position) {
                return Err(FlowError::config(
                    "boundaries",
                    format!("{:?}", position),
                    "no boundary condition supplied for this patch",
                ));
            }
        }
        Ok(())
    }
    /// True when some patch of `geometry` fixes the pressure level.
    pub fn has_pressure_reference(&self, geometry: &StructuredGeometry) -> bool {
        geometry
            .boundary_positions()
            .iter()
            .any(|&position| self.condition(position, Variable::P).is_dirichlet())
    }
    /// Value of `phi` on `face` of active cell `k`: linear interpolation
    /// between active cells, the boundary value on Dirichlet faces and the
    /// cell value on zero-gradient faces.
    pub fn face_value(
        &self,
        geometry: &StructuredGeometry,
        phi: &Array2<f64>,
        variable: Variable,
        k: usize,
        face: Face,
    ) -> f64 {
        let cell = &geometry.cells[k];
        match cell.neighbors[face.index()] {
            Neighbor::Cell(m) => {
                let other = &geometry.cells[m];
                0.5 * (phi[[cell.i, cell.j]] + phi[[other.i, other.j]])
            }
            Neighbor::Boundary(position) => match self.condition(position, variable) {
                Condition::Dirichlet(value) => value,
                Condition::ZeroGradient => phi[[cell.i, cell.j]],
            },
        }
    }
    /// Same as [`Self::face_value`] for a correction field: a Dirichlet
    /// face carries a zero correction.
    pub fn correction_face_value(
        &self,
        geometry: &StructuredGeometry,
        phi: &Array2<f64>,
        variable: Variable,
        k: usize,
        face: Face,
    ) -> f64 {
        let cell = &geometry.cells[k];
        match cell.neighbors[face.index()] {
            Neighbor::Cell(m) => {
                let other = &geometry.cells[m];
                0.5 * (phi[[cell.i, cell.j]] + phi[[other.i, other.j]])
            }
            Neighbor::Boundary(position) => match self.condition(position, variable) {
                Condition::Dirichlet(_) => 0.0,
                Condition::ZeroGradient => phi[[cell.i, cell.j]],
            },
        }
    }
    /// Cell-centred gradient of `phi` along the axis of `face`, built from
    /// face values.
    pub fn cell_gradient(
        &self,
        geometry: &StructuredGeometry,
        phi: &Array2<f64>,
        variable: Variable,
        k: usize,
        x_axis: bool,
    ) -> f64 {
        let cell = &geometry.cells[k];
        if x_axis {
            (self.face_value(geometry, phi, variable, k, Face::East)
                - self.face_value(geometry, phi, variable, k, Face::West))
                / geometry.width(cell.i)
        } else {
            (self.face_value(geometry, phi, variable, k, Face::North)
                - self.face_value(geometry, phi, variable, k, Face::South))
                / geometry.height(cell.j)
        }
    }
}

use ndarray::{Array1, Array2};

use super::{ActiveCell, CellStatus, Face, Neighbor};
use crate::disc::boundary::BoundaryPosition;
use crate::error::{FlowError, FlowResult};
use crate::solver::SimulationConfig;

/// Two-block structured grid. The inlet block occupies the upper left
/// `nx_in × ny_in` cells, the outlet block every column from `nx_in` on;
/// the lower left corner is blanked.
#[derive(Clone, Debug)]
pub struct StructuredGeometry {
    pub nx: usize,
    pub ny: usize,
    pub nx_in: usize,
    pub ny_in: usize,
    /// Grid lines, `nx + 1` and `ny + 1` of them.
    pub x_faces: Array1<f64>,
    pub y_faces: Array1<f64>,
    /// Cell centres.
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    /// Distance to the previous cell centre; the first entry is the
    /// distance from the domain edge.
    pub dx: Array1<f64>,
    pub dy: Array1<f64>,
    pub area: Array2<f64>,
    pub status: Array2<CellStatus>,
    /// Active cells, row by row from the bottom.
    pub cells: Vec<ActiveCell>,
}

impl StructuredGeometry {
    pub fn uniform(config: &SimulationConfig) -> FlowResult<Self> {
        let x_faces = Array1::linspace(0.0, config.length_x, config.nx + 1);
        let y_faces = Array1::linspace(0.0, config.length_y, config.ny + 1);
        Self::from_grid_lines(x_faces, y_faces, config.nx_in, config.ny_in)
    }
    pub fn from_grid_lines(
        x_faces: Array1<f64>,
        y_faces: Array1<f64>,
        nx_in: usize,
        ny_in: usize,
    ) -> FlowResult<Self> {
        if x_faces.len() < 2 || y_faces.len() < 2 {
            return Err(FlowError::config(
                "grid_lines",
                format!("{}x{}", x_faces.len(), y_faces.len()),
                "at least two grid lines are needed per direction",
            ));
        }
        if x_faces.windows(2).into_iter().any(|w| w[1] <= w[0])
            || y_faces.windows(2).into_iter().any(|w| w[1] <= w[0])
        {
            return Err(FlowError::config(
                "grid_lines",
                "non-increasing",
                "grid lines must be strictly increasing",
            ));
        }
        let nx = x_faces.len() - 1;
        let ny = y_faces.len() - 1;
        if nx_in > nx || ny_in > ny {
            return Err(FlowError::config(
                "nx_in/ny_in",
                format!("{}x{}", nx_in, ny_in),
                "inlet block larger than the grid",
            ));
        }

        let x = Array1::from_shape_fn(nx, |i| 0.5 * (x_faces[i] + x_faces[i + 1]));
        let y = Array1::from_shape_fn(ny, |j| 0.5 * (y_faces[j] + y_faces[j + 1]));
        let dx = Array1::from_shape_fn(nx, |i| if i == 0 { x[0] - x_faces[0] } else { x[i] - x[i - 1] });
        let dy = Array1::from_shape_fn(ny, |j| if j == 0 { y[0] - y_faces[0] } else { y[j] - y[j - 1] });
        let area = Array2::from_shape_fn((nx, ny), |(i, j)| {
            (x_faces[i + 1] - x_faces[i]) * (y_faces[j + 1] - y_faces[j])
        });

        let blanked = |i: usize, j: usize| i < nx_in && j + ny_in < ny;
        let mut status = Array2::from_elem((nx, ny), CellStatus::Blanked);
        let mut count = 0;
        for j in 0..ny {
            for i in 0..nx {
                if !blanked(i, j) {
                    status[[i, j]] = CellStatus::Active(count);
                    count += 1;
                }
            }
        }

        let mut cells = Vec::with_capacity(count);
        for j in 0..ny {
            for i in 0..nx {
                if blanked(i, j) {
                    continue;
                }
                let neighbors = Face::ALL.map(|face| {
                    let (di, dj) = face.offset();
                    let ni = i as isize + di;
                    let nj = j as isize + dj;
                    if ni < 0 || nj < 0 || ni >= nx as isize || nj >= ny as isize {
                        return Neighbor::Boundary(match face {
                            Face::East => BoundaryPosition::Right,
                            Face::West => BoundaryPosition::Left,
                            Face::North => BoundaryPosition::Upper,
                            Face::South => BoundaryPosition::Lower,
                        });
                    }
                    match status[[ni as usize, nj as usize]] {
                        CellStatus::Active(m) => Neighbor::Cell(m),
                        CellStatus::Blanked if face.is_x_face() => {
                            Neighbor::Boundary(BoundaryPosition::StepRiser)
                        }
                        CellStatus::Blanked => Neighbor::Boundary(BoundaryPosition::StepTread),
                    }
                });
                cells.push(ActiveCell { i, j, neighbors });
            }
        }

        Ok(Self {
            nx,
            ny,
            nx_in,
            ny_in,
            x_faces,
            y_faces,
            x,
            y,
            dx,
            dy,
            area,
            status,
            cells,
        })
    }
    pub fn active_count(&self) -> usize {
        self.cells.len()
    }
    pub fn is_active(&self, i: usize, j: usize) -> bool {
        matches!(self.status[[i, j]], CellStatus::Active(_))
    }
    pub fn width(&self, i: usize) -> f64 {
        self.x_faces[i + 1] - self.x_faces[i]
    }
    pub fn height(&self, j: usize) -> f64 {
        self.y_faces[j + 1] - self.y_faces[j]
    }
    pub fn cell_area(&self, k: usize) -> f64 {
        let cell = &self.cells[k];
        self.area[[cell.i, cell.j]]
    }
    pub fn face_length(&self, k: usize, face: Face) -> f64 {
        let cell = &self.cells[k];
        if face.is_x_face() {
            self.height(cell.j)
        } else {
            self.width(cell.i)
        }
    }
    /// Centre-to-centre distance across `face`, or the half-width of the
    /// cell when the face is a boundary.
    pub fn face_distance(&self, k: usize, face: Face) -> f64 {
        let cell = &self.cells[k];
        match (cell.neighbor(face), face.is_x_face()) {
            (Neighbor::Cell(m), true) => (self.x[self.cells[m].i] - self.x[cell.i]).abs(),
            (Neighbor::Cell(m), false) => (self.y[self.cells[m].j] - self.y[cell.j]).abs(),
            (Neighbor::Boundary(_), true) => 0.5 * self.width(cell.i),
            (Neighbor::Boundary(_), false) => 0.5 * self.height(cell.j),
        }
    }
    /// Patches that at least one active cell touches, in declaration order.
    pub fn boundary_positions(&self) -> Vec<BoundaryPosition> {
        BoundaryPosition::ALL
            .into_iter()
            .filter(|position| {
                self.boundary_faces()
                    .any(|(_, _, candidate)| candidate == *position)
            })
            .collect()
    }
    pub fn boundary_faces(&self) -> impl Iterator<Item = (usize, Face, BoundaryPosition)> + '_ {
        self.cells.iter().enumerate().flat_map(|(k, cell)| {
            Face::ALL.into_iter().filter_map(move |face| match cell.neighbor(face) {
                Neighbor::Boundary(position) => Some((k, face, position)),
                Neighbor::Cell(_) => None,
            })
        })
    }
    /// Contiguous runs of active cells along x, used by the line solver.
    pub fn x_lines(&self) -> Vec<std::ops::Range<usize>> {
        let mut lines = Vec::new();
        let mut start = 0;
        for (k, cell) in self.cells.iter().enumerate() {
            if cell.neighbor(Face::East) != Neighbor::Cell(k + 1) {
                lines.push(start..k + 1);
                start = k + 1;
            }
        }
        lines
    }
    /// Copy the active entries of a cell field into a vector over active cells.
    pub fn gather(&self, field: &Array2<f64>) -> Array1<f64> {
        self.cells.iter().map(|cell| field[[cell.i, cell.j]]).collect()
    }
    /// Inverse of [`Self::gather`]. Blanked entries of `field` are untouched.
    pub fn scatter(&self, values: &Array1<f64>, field: &mut Array2<f64>) {
        for (cell, value) in self.cells.iter().zip(values.iter()) {
            field[[cell.i, cell.j]] = *value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn step_geometry() -> StructuredGeometry {
        let config = SimulationConfig {
            nx: 6,
            ny: 5,
            nx_in: 2,
            ny_in: 3,
            length_x: 3.0,
            length_y: 1.0,
            ..SimulationConfig::default()
        };
        StructuredGeometry::uniform(&config).unwrap()
    }

    #[test]
    fn test_blanked_corner() {
        let geometry = step_geometry();
        assert_eq!(geometry.active_count(), 6 * 5 - 2 * 2);
        assert!(!geometry.is_active(0, 0));
        assert!(!geometry.is_active(1, 1));
        assert!(geometry.is_active(0, 2));
        assert!(geometry.is_active(2, 0));
    }

    #[test]
    fn test_step_neighbors() {
        let geometry = step_geometry();
        let CellStatus::Active(k) = geometry.status[[2, 0]] else {
            panic!("cell (2, 0) should be active");
        };
        assert_eq!(
            geometry.cells[k].neighbor(Face::West),
            Neighbor::Boundary(BoundaryPosition::StepRiser)
        );
        assert_eq!(
            geometry.cells[k].neighbor(Face::South),
            Neighbor::Boundary(BoundaryPosition::Lower)
        );
        let CellStatus::Active(k) = geometry.status[[1, 2]] else {
            panic!("cell (1, 2) should be active");
        };
        assert_eq!(
            geometry.cells[k].neighbor(Face::South),
            Neighbor::Boundary(BoundaryPosition::StepTread)
        );
        assert_eq!(
            geometry.cells[k].neighbor(Face::West),
            Neighbor::Cell(k - 1)
        );
    }

    #[test]
    fn test_single_block_has_no_step() {
        let config = SimulationConfig {
            nx: 4,
            ny: 4,
            nx_in: 4,
            ny_in: 4,
            ..SimulationConfig::default()
        };
        let geometry = StructuredGeometry::uniform(&config).unwrap();
        assert_eq!(geometry.active_count(), 16);
        let positions = geometry.boundary_positions();
        assert!(!positions.contains(&BoundaryPosition::StepRiser));
        assert!(!positions.contains(&BoundaryPosition::StepTread));
        assert_eq!(positions.len(), 4);
    }

    #[test]
    fn test_inlet_block_height_is_ny_in() {
        let config = SimulationConfig {
            nx: 4,
            ny: 5,
            nx_in: 2,
            ny_in: 2,
            ..SimulationConfig::default()
        };
        let geometry = StructuredGeometry::uniform(&config).unwrap();
        assert_eq!(geometry.active_count(), 14);
        assert_eq!(geometry.active_count(), config.active_cells());
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(geometry.status[[i, j]], CellStatus::Blanked);
            }
            for j in 3..5 {
                assert!(matches!(geometry.status[[i, j]], CellStatus::Active(_)));
            }
        }
    }

    #[test]
    fn test_spacing_and_distances() {
        let geometry = step_geometry();
        assert_relative_eq!(geometry.width(3), 0.5);
        assert_relative_eq!(geometry.height(1), 0.2);
        assert_relative_eq!(geometry.dx[0], 0.25);
        assert_relative_eq!(geometry.dx[4], 0.5);
        assert_relative_eq!(geometry.area[[2, 2]], 0.1);
        let CellStatus::Active(k) = geometry.status[[2, 0]] else {
            panic!("cell (2, 0) should be active");
        };
        assert_relative_eq!(geometry.face_distance(k, Face::East), 0.5);
        assert_relative_eq!(geometry.face_distance(k, Face::West), 0.25);
        assert_relative_eq!(geometry.face_length(k, Face::North), 0.5);
    }

    #[test]
    fn test_x_lines_cover_active_cells() {
        let geometry = step_geometry();
        let lines = geometry.x_lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], 0..4);
        assert_eq!(lines[4].len(), 6);
        assert_eq!(lines.iter().map(|l| l.len()).sum::<usize>(), geometry.active_count());
    }

    #[test]
    fn test_rejects_non_monotonic_lines() {
        let x = Array1::from(vec![0.0, 0.5, 0.4, 1.0]);
        let y = Array1::from(vec![0.0, 1.0]);
        assert!(StructuredGeometry::from_grid_lines(x, y, 1, 1).is_err());
    }
}

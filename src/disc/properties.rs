use ndarray::Array2;
use serde::Deserialize;

use super::mesh::{Face, Neighbor, structured::StructuredGeometry};
use crate::error::{FlowError, FlowResult};

fn default_density() -> f64 {
    1.0
}
fn default_viscosity() -> f64 {
    0.01
}
fn default_specific_heat() -> f64 {
    1.0
}
fn default_conductivity() -> f64 {
    0.01
}

#[derive(Clone, Debug, Deserialize)]
pub struct FluidParameters {
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default = "default_viscosity")]
    pub viscosity: f64,
    #[serde(default = "default_specific_heat")]
    pub specific_heat: f64,
    #[serde(default = "default_conductivity")]
    pub conductivity: f64,
}

impl Default for FluidParameters {
    fn default() -> Self {
        Self {
            density: default_density(),
            viscosity: default_viscosity(),
            specific_heat: default_specific_heat(),
            conductivity: default_conductivity(),
        }
    }
}

/// Per-cell material properties plus the density interpolated to every face
/// of every active cell.
#[derive(Clone, Debug)]
pub struct FluidProperties {
    pub density: Array2<f64>,
    pub viscosity: Array2<f64>,
    pub specific_heat: Array2<f64>,
    pub conductivity: Array2<f64>,
    /// `(active cell, face)`; boundary faces take the owner's density.
    pub face_density: Array2<f64>,
}

impl FluidProperties {
    pub fn uniform(geometry: &StructuredGeometry, params: &FluidParameters) -> Self {
        let shape = (geometry.nx, geometry.ny);
        Self::assemble(
            geometry,
            Array2::from_elem(shape, params.density),
            Array2::from_elem(shape, params.viscosity),
            Array2::from_elem(shape, params.specific_heat),
            Array2::from_elem(shape, params.conductivity),
        )
    }
    /// Every array must be `(nx, ny)`; blanked entries are never read.
    pub fn new(
        geometry: &StructuredGeometry,
        density: Array2<f64>,
        viscosity: Array2<f64>,
        specific_heat: Array2<f64>,
        conductivity: Array2<f64>,
    ) -> FlowResult<Self> {
        let shape = [geometry.nx, geometry.ny];
        for (field, values) in [
            ("density", &density),
            ("viscosity", &viscosity),
            ("specific_heat", &specific_heat),
            ("conductivity", &conductivity),
        ] {
            if values.shape() != shape {
                return Err(FlowError::config(
                    field,
                    format!("{:?}", values.shape()),
                    "property array does not match the grid extents",
                ));
            }
        }
        Ok(Self::assemble(
            geometry,
            density,
            viscosity,
            specific_heat,
            conductivity,
        ))
    }
    fn assemble(
        geometry: &StructuredGeometry,
        density: Array2<f64>,
        viscosity: Array2<f64>,
        specific_heat: Array2<f64>,
        conductivity: Array2<f64>,
    ) -> Self {
        let face_density = interpolate_to_faces(geometry, &density);
        Self {
            density,
            viscosity,
            specific_heat,
            conductivity,
            face_density,
        }
    }
    pub fn face_density(&self, k: usize, face: Face) -> f64 {
        self.face_density[[k, face.index()]]
    }
    pub fn shape_matches(&self, geometry: &StructuredGeometry) -> bool {
        let shape = [geometry.nx, geometry.ny];
        self.density.shape() == shape
            && self.viscosity.shape() == shape
            && self.specific_heat.shape() == shape
            && self.conductivity.shape() == shape
            && self.face_density.shape() == [geometry.active_count(), 4]
    }
}

fn interpolate_to_faces(geometry: &StructuredGeometry, values: &Array2<f64>) -> Array2<f64> {
    Array2::from_shape_fn((geometry.active_count(), 4), |(k, f)| {
        face_average(geometry, values, k, Face::ALL[f])
    })
}

/// Arithmetic mean of `values` across `face`; boundary faces use the owner
/// value.
pub fn face_average(
    geometry: &StructuredGeometry,
    values: &Array2<f64>,
    k: usize,
    face: Face,
) -> f64 {
    let cell = &geometry.cells[k];
    let own = values[[cell.i, cell.j]];
    match cell.neighbor(face) {
        Neighbor::Cell(m) => {
            let other = &geometry.cells[m];
            0.5 * (own + values[[other.i, other.j]])
        }
        Neighbor::Boundary(_) => own,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn grid() -> StructuredGeometry {
        let x = Array1::linspace(0.0, 1.0, 5);
        let y = Array1::linspace(0.0, 1.0, 5);
        StructuredGeometry::from_grid_lines(x, y, 4, 4).unwrap()
    }

    #[test]
    fn test_face_density_is_averaged() {
        let geometry = grid();
        let density = Array2::from_shape_fn((4, 4), |(i, _)| 1.0 + i as f64);
        let ones = Array2::ones((4, 4));
        let properties =
            FluidProperties::new(&geometry, density, ones.clone(), ones.clone(), ones).unwrap();
        assert_relative_eq!(properties.face_density(0, Face::East), 1.5);
        // boundary faces take the owner value
        assert_relative_eq!(properties.face_density(0, Face::West), 1.0);
        assert!(properties.shape_matches(&geometry));
    }

    #[test]
    fn test_mismatched_arrays_are_rejected() {
        let geometry = grid();
        let small = Array2::ones((2, 2));
        let ones = Array2::ones((4, 4));
        match FluidProperties::new(&geometry, ones.clone(), ones.clone(), small, ones) {
            Err(FlowError::Configuration { field, .. }) => assert_eq!(field, "specific_heat"),
            other => panic!("expected a configuration error, got {other:?}"),
        }
    }
}

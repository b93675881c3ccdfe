use std::path::PathBuf;

use thiserror::Error;

use crate::disc::boundary::Variable;

pub type FlowResult<T> = Result<T, FlowError>;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Run parameters outside their admissible range. Raised before any
    /// field is allocated.
    #[error("invalid configuration: {field} = {value} ({reason})")]
    Configuration {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error(
        "geometry extents {geometry_nx}x{geometry_ny} do not match configuration {config_nx}x{config_ny}"
    )]
    GeometryMismatch {
        config_nx: usize,
        config_ny: usize,
        geometry_nx: usize,
        geometry_ny: usize,
    },

    /// A momentum, pressure-correction or scalar sub-solve failed to reduce
    /// its residual within the allotted sweeps.
    #[error(
        "{variable} sub-solve did not reduce its residual at outer iteration {iteration} \
         ({sweeps} sweeps, {initial_residual:.3e} -> {final_residual:.3e})"
    )]
    LinearSystemDivergence {
        variable: Variable,
        iteration: usize,
        sweeps: usize,
        initial_residual: f64,
        final_residual: f64,
    },

    #[error("mesh import failed for {}: {message}", path.display())]
    MeshImport { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("failed to write VTK output: {0}")]
    Vtk(String),
}

impl FlowError {
    pub fn config(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        FlowError::Configuration {
            field,
            value: value.to_string(),
            reason,
        }
    }
    pub fn mesh(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FlowError::MeshImport {
            path: path.into(),
            message: message.into(),
        }
    }
}

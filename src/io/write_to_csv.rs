use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::disc::{field::FlowField, mesh::structured::StructuredGeometry};
use crate::error::FlowResult;
use crate::solver::ResidualRecord;

#[derive(Serialize)]
struct CellData {
    i: usize,
    j: usize,
    x: f64,
    y: f64,
    u: f64,
    v: f64,
    p: f64,
    pp: f64,
    t: f64,
}

/// One row per active cell.
pub fn write_fields(
    path: impl AsRef<Path>,
    geometry: &StructuredGeometry,
    field: &FlowField,
) -> FlowResult<()> {
    let mut writer = Writer::from_path(path)?;
    for cell in geometry.cells.iter() {
        let (i, j) = (cell.i, cell.j);
        writer.serialize(CellData {
            i,
            j,
            x: geometry.x[i],
            y: geometry.y[j],
            u: field.u[[i, j]],
            v: field.v[[i, j]],
            p: field.p[[i, j]],
            pp: field.pp[[i, j]],
            t: field.t[[i, j]],
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_residual_history(path: impl AsRef<Path>, history: &[ResidualRecord]) -> FlowResult<()> {
    let mut writer = Writer::from_path(path)?;
    for record in history {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::boundary::BoundaryConditions;
    use crate::disc::field::InitialConditions;
    use ndarray::Array1;
    use std::fs;

    #[test]
    fn test_fields_skip_blanked_cells() {
        let x = Array1::linspace(0.0, 1.0, 5);
        let y = Array1::linspace(0.0, 1.0, 4);
        let geometry = StructuredGeometry::from_grid_lines(x, y, 2, 2).unwrap();
        let boundaries = BoundaryConditions::backward_step(1.0);
        let field = FlowField::new(&geometry, &boundaries, &InitialConditions::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.csv");
        write_fields(&path, &geometry, &field).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("i,j,x,y,u,v,p,pp,t"));
        assert_eq!(lines.count(), geometry.active_count());
    }

    #[test]
    fn test_residual_history() {
        let history = vec![
            ResidualRecord {
                iteration: 1,
                residual: 0.5,
                mass: 0.5,
                u_momentum: 0.1,
                v_momentum: 0.2,
                energy: None,
                unconverged_subsolves: 0,
            },
            ResidualRecord {
                iteration: 2,
                residual: 0.25,
                mass: 0.25,
                u_momentum: 0.1,
                v_momentum: 0.2,
                energy: Some(0.01),
                unconverged_subsolves: 2,
            },
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("residuals.csv");
        write_residual_history(&path, &history).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "iteration,residual,mass,u_momentum,v_momentum,energy,unconverged_subsolves");
        assert_eq!(lines[1], "1,0.5,0.5,0.1,0.2,,0");
        assert_eq!(lines[2], "2,0.25,0.25,0.1,0.2,0.01,2");
    }
}

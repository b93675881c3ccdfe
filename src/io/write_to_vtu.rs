use std::path::Path;

use ndarray::Array2;
use vtkio::{
    Vtk,
    model::{
        Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType,
        IOBuffer, UnstructuredGridPiece, Version, VertexNumbers,
    },
};

use crate::disc::{field::FlowField, mesh::structured::StructuredGeometry};
use crate::error::{FlowError, FlowResult};

fn scalar(name: &str, data: Vec<f64>) -> Attribute {
    Attribute::DataArray(DataArray {
        name: name.to_string(),
        elem: ElementType::Scalars {
            num_comp: 1,
            lookup_table: None,
        },
        data: IOBuffer::F64(data),
    })
}

/// Active cells as quads with cell-centred solution arrays. Grid nodes that
/// only touch blanked cells are left out.
pub fn write_fields(
    path: impl AsRef<Path>,
    geometry: &StructuredGeometry,
    field: &FlowField,
) -> FlowResult<()> {
    let (nx, ny) = (geometry.nx, geometry.ny);
    let mut node_map = Array2::<Option<u64>>::from_elem((nx + 1, ny + 1), None);
    let mut vtk_points = Vec::new();
    let mut new_node_idx = 0;
    for cell in geometry.cells.iter() {
        for (a, b) in [(0, 0), (1, 0), (1, 1), (0, 1)] {
            let (i, j) = (cell.i + a, cell.j + b);
            if node_map[[i, j]].is_none() {
                vtk_points.extend([geometry.x_faces[i], geometry.y_faces[j], 0.0]);
                node_map[[i, j]] = Some(new_node_idx);
                new_node_idx += 1;
            }
        }
    }

    let num_cells = geometry.active_count();
    let mut connectivity = Vec::with_capacity(num_cells * 4);
    for cell in geometry.cells.iter() {
        for (a, b) in [(0, 0), (1, 0), (1, 1), (0, 1)] {
            connectivity.extend(node_map[[cell.i + a, cell.j + b]]);
        }
    }

    let gather = |values: &Array2<f64>| geometry.gather(values).to_vec();
    let velocity: Vec<f64> = geometry
        .cells
        .iter()
        .flat_map(|cell| [field.u[[cell.i, cell.j]], field.v[[cell.i, cell.j]], 0.0])
        .collect();

    let vtk_file = Vtk {
        version: Version::XML { major: 1, minor: 0 },
        title: "SIMPLE flow fields".into(),
        byte_order: ByteOrder::native(),
        data: DataSet::inline(UnstructuredGridPiece {
            points: IOBuffer::F64(vtk_points),
            cells: Cells {
                cell_verts: VertexNumbers::XML {
                    connectivity,
                    offsets: (0..num_cells).map(|i| ((i + 1) * 4) as u64).collect(),
                },
                types: vec![CellType::Quad; num_cells],
            },
            data: Attributes {
                point: vec![],
                cell: vec![
                    Attribute::DataArray(DataArray {
                        name: "velocity".to_string(),
                        elem: ElementType::Vectors,
                        data: IOBuffer::F64(velocity),
                    }),
                    scalar("u", gather(&field.u)),
                    scalar("v", gather(&field.v)),
                    scalar("p", gather(&field.p)),
                    scalar("pp", gather(&field.pp)),
                    scalar("t", gather(&field.t)),
                ],
            },
        }),
        file_path: None,
    };

    vtk_file
        .export(path.as_ref())
        .map_err(|err| FlowError::Vtk(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::boundary::BoundaryConditions;
    use crate::disc::field::InitialConditions;
    use ndarray::Array1;
    use vtkio::model::Piece;

    #[test]
    fn test_export_step_grid() {
        let x = Array1::linspace(0.0, 2.0, 5);
        let y = Array1::linspace(0.0, 1.0, 4);
        let geometry = StructuredGeometry::from_grid_lines(x, y, 2, 2).unwrap();
        let boundaries = BoundaryConditions::backward_step(1.0);
        let field = FlowField::new(&geometry, &boundaries, &InitialConditions::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.vtu");
        write_fields(&path, &geometry, &field).unwrap();
        let vtk = Vtk::import(&path).unwrap();
        let DataSet::UnstructuredGrid { pieces, .. } = vtk.data else {
            panic!("expected an unstructured grid");
        };
        let Piece::Inline(piece) = &pieces[0] else {
            panic!("expected an inline piece");
        };
        // 4x3 grid with the 2x1 lower-left corner blanked
        assert_eq!(piece.num_points(), 18);
        assert_eq!(piece.cells.cell_verts.num_cells(), geometry.active_count());
        assert_eq!(piece.data.cell.len(), 6);
    }
}

//! Reader for unstructured meshes in Gmsh ASCII (`.msh`) and OpenFOAM
//! `polyMesh` form. Standalone: the structured solver never consumes it.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{FlowError, FlowResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshNode {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A Gmsh element or an OpenFOAM face, as zero-based node indices.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshElement {
    /// Gmsh element type; `None` for OpenFOAM faces.
    pub element_type: Option<u32>,
    pub nodes: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryPatch {
    pub name: String,
    pub patch_type: String,
    pub n_faces: usize,
    pub start_face: usize,
    pub face_ids: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct ImportedMesh {
    pub nodes: Vec<MeshNode>,
    pub elements: Vec<MeshElement>,
    pub boundary_patches: Vec<BoundaryPatch>,
    pub owners: Vec<usize>,
    pub neighbours: Vec<usize>,
}

impl ImportedMesh {
    /// Dispatch on the path: a `.msh` file or a `polyMesh` directory.
    pub fn load(path: impl AsRef<Path>) -> FlowResult<Self> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext == "msh") {
            parse_msh(path)
        } else if path.is_dir() {
            parse_foam(path)
        } else {
            Err(FlowError::mesh(path, "unsupported file format or directory"))
        }
    }
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Number of nodes: {}", self.nodes.len()),
            format!("Number of elements: {}", self.elements.len()),
            format!("Number of boundary patches: {}", self.boundary_patches.len()),
            format!("Number of neighbours: {}", self.neighbours.len()),
            format!("Number of owners: {}", self.owners.len()),
            "Sample nodes:".to_string(),
        ];
        lines.extend(
            self.nodes
                .iter()
                .take(5)
                .map(|node| format!("({}, {}, {})", node.x, node.y, node.z)),
        );
        lines.join("\n")
    }
}

fn read(path: &Path) -> FlowResult<String> {
    fs::read_to_string(path).map_err(|err| FlowError::mesh(path, err.to_string()))
}

fn parse_msh(path: &Path) -> FlowResult<ImportedMesh> {
    let content = read(path)?;
    let mut mesh = ImportedMesh::default();
    let mut section = "";
    for line in content.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix('$') {
            section = if name.starts_with("End") { "" } else { name };
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        match section {
            // the count line has a single field
            "Nodes" if fields.len() >= 4 => {
                let coord = |s: &str| {
                    s.parse::<f64>()
                        .map_err(|_| FlowError::mesh(path, format!("bad node line `{line}`")))
                };
                mesh.nodes.push(MeshNode {
                    x: coord(fields[1])?,
                    y: coord(fields[2])?,
                    z: coord(fields[3])?,
                });
            }
            "Elements" if fields.len() >= 3 => {
                let ints: Vec<usize> = fields
                    .iter()
                    .map(|s| s.parse::<usize>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| FlowError::mesh(path, format!("bad element line `{line}`")))?;
                let first_node = ints[2]
                    .checked_add(3)
                    .filter(|&first| first <= ints.len())
                    .ok_or_else(|| FlowError::mesh(path, format!("truncated element line `{line}`")))?;
                let element_type = u32::try_from(ints[1])
                    .map_err(|_| FlowError::mesh(path, format!("bad element type `{line}`")))?;
                let nodes = ints[first_node..]
                    .iter()
                    .map(|&id| {
                        id.checked_sub(1)
                            .ok_or_else(|| FlowError::mesh(path, "node ids start at 1"))
                    })
                    .collect::<FlowResult<Vec<_>>>()?;
                mesh.elements.push(MeshElement {
                    element_type: Some(element_type),
                    nodes,
                });
            }
            _ => {}
        }
    }
    debug!(
        "{}: {} nodes, {} elements",
        path.display(),
        mesh.nodes.len(),
        mesh.elements.len()
    );
    Ok(mesh)
}

/// Tokens of an OpenFOAM file with the `FoamFile` header and comments removed.
fn foam_tokens(content: &str) -> Vec<String> {
    let mut text = String::with_capacity(content.len());
    let mut rest = content;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |end| &after[end..]);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                if "(){};".contains(c) {
                    text.push(' ');
                    text.push(c);
                    text.push(' ');
                } else {
                    text.push(c);
                }
            }
            rest = chars.as_str();
        }
    }
    let mut tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    if tokens.first().is_some_and(|t| t == "FoamFile") {
        if let Some(end) = tokens.iter().position(|t| t == "}") {
            tokens.drain(..=end);
        }
    }
    tokens
}

struct FoamParser {
    path: PathBuf,
    tokens: Vec<String>,
    pos: usize,
}

impl FoamParser {
    fn open(dir: &Path, name: &str) -> FlowResult<Self> {
        let path = dir.join(name);
        let tokens = foam_tokens(&read(&path)?);
        Ok(Self {
            path,
            tokens,
            pos: 0,
        })
    }
    fn error(&self, message: impl Into<String>) -> FlowError {
        FlowError::mesh(&self.path, message)
    }
    fn next(&mut self) -> FlowResult<&str> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| FlowError::mesh(&self.path, "unexpected end of file"))?;
        self.pos += 1;
        Ok(token.as_str())
    }
    fn expect(&mut self, expected: &str) -> FlowResult<()> {
        let token = self.next()?.to_string();
        if token == expected {
            Ok(())
        } else {
            Err(self.error(format!("expected `{expected}`, found `{token}`")))
        }
    }
    fn number<T: std::str::FromStr>(&mut self) -> FlowResult<T> {
        let token = self.next()?.to_string();
        token
            .parse()
            .map_err(|_| self.error(format!("expected a number, found `{token}`")))
    }
    /// `N ( item item ... )`
    fn list<T>(&mut self, mut item: impl FnMut(&mut Self) -> FlowResult<T>) -> FlowResult<Vec<T>> {
        let count: usize = self.number()?;
        self.expect("(")?;
        let items = (0..count).map(|_| item(self)).collect::<FlowResult<Vec<T>>>()?;
        self.expect(")")?;
        Ok(items)
    }
}

fn parse_foam(dir: &Path) -> FlowResult<ImportedMesh> {
    let mut parser = FoamParser::open(dir, "points")?;
    let nodes = parser.list(|p| {
        p.expect("(")?;
        let node = MeshNode {
            x: p.number()?,
            y: p.number()?,
            z: p.number()?,
        };
        p.expect(")")?;
        Ok(node)
    })?;

    let mut parser = FoamParser::open(dir, "faces")?;
    let elements = parser.list(|p| {
        Ok(MeshElement {
            element_type: None,
            nodes: p.list(|p| p.number())?,
        })
    })?;

    let mut parser = FoamParser::open(dir, "boundary")?;
    let boundary_patches = parser.list(|p| {
        let name = p.next()?.to_string();
        p.expect("{")?;
        let mut patch_type = String::new();
        let mut n_faces = None;
        let mut start_face = None;
        loop {
            let key = p.next()?.to_string();
            if key == "}" {
                break;
            }
            match key.as_str() {
                "type" => patch_type = p.next()?.to_string(),
                "nFaces" => n_faces = Some(p.number::<usize>()?),
                "startFace" => start_face = Some(p.number::<usize>()?),
                // other entries, possibly lists such as inGroups
                _ => {
                    while p.next()? != ";" {}
                    continue;
                }
            }
            p.expect(";")?;
        }
        let (Some(n_faces), Some(start_face)) = (n_faces, start_face) else {
            return Err(p.error(format!("patch `{name}` lacks nFaces or startFace")));
        };
        let end_face = start_face
            .checked_add(n_faces)
            .ok_or_else(|| p.error(format!("patch `{name}` face range overflows")))?;
        Ok(BoundaryPatch {
            name,
            patch_type,
            n_faces,
            start_face,
            face_ids: (start_face..end_face).collect(),
        })
    })?;

    let owners = FoamParser::open(dir, "owner")?.list(|p| p.number())?;
    let neighbours = FoamParser::open(dir, "neighbour")?.list(|p| p.number())?;

    debug!(
        "{}: {} points, {} faces, {} patches",
        dir.display(),
        nodes.len(),
        elements.len(),
        boundary_patches.len()
    );
    Ok(ImportedMesh {
        nodes,
        elements,
        boundary_patches,
        owners,
        neighbours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSH: &str = "$MeshFormat
2.2 0 8
$EndMeshFormat
$Nodes
4
1 0 0 0
2 1 0 0
3 1 1 0
4 0 1 0
$EndNodes
$Elements
2
1 1 2 99 1 1 2
2 3 2 1 1 1 2 3 4
$EndElements
";

    const HEADER: &str = "/*--------------------------------*- C++ -*----------------------------------*\\
  =========                 |
\\*---------------------------------------------------------------------------*/
FoamFile
{
    version     2.0;
    format      ascii;
    class       vectorField;
    object      points;
}
// * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * * //
";

    fn write_foam(dir: &Path) {
        let files = [
            ("points", "4\n(\n(0 0 0)\n(1 0 0)\n(1 1 0)\n(0 1 0)\n)\n"),
            ("faces", "2\n(\n4(0 1 2 3)\n3(0 1 2)\n)\n"),
            (
                "boundary",
                "2\n(\n    inlet\n    {\n        type            patch;\n        nFaces          1;\n        startFace       1;\n    }\n    walls\n    {\n        type            wall;\n        inGroups        List<word> 1(wall);\n        nFaces          3;\n        startFace       2;\n    }\n)\n",
            ),
            ("owner", "3\n(\n0\n0\n1\n)\n"),
            ("neighbour", "1\n(\n1\n)\n"),
        ];
        for (name, body) in files {
            fs::write(dir.join(name), format!("{HEADER}\n{body}")).unwrap();
        }
    }

    #[test]
    fn test_gmsh_nodes_and_elements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("square.msh");
        fs::write(&path, MSH).unwrap();
        let mesh = ImportedMesh::load(&path).unwrap();
        assert_eq!(mesh.nodes.len(), 4);
        assert_eq!(mesh.nodes[2], MeshNode { x: 1.0, y: 1.0, z: 0.0 });
        assert_eq!(mesh.elements.len(), 2);
        assert_eq!(mesh.elements[0].nodes, vec![0, 1]);
        assert_eq!(mesh.elements[1].element_type, Some(3));
        assert_eq!(mesh.elements[1].nodes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_foam_poly_mesh() {
        let dir = tempfile::tempdir().unwrap();
        write_foam(dir.path());
        let mesh = ImportedMesh::load(dir.path()).unwrap();
        assert_eq!(mesh.nodes.len(), 4);
        assert_eq!(mesh.nodes[3], MeshNode { x: 0.0, y: 1.0, z: 0.0 });
        assert_eq!(mesh.elements[1].nodes, vec![0, 1, 2]);
        assert_eq!(mesh.boundary_patches.len(), 2);
        assert_eq!(mesh.boundary_patches[1].name, "walls");
        assert_eq!(mesh.boundary_patches[1].patch_type, "wall");
        assert_eq!(mesh.boundary_patches[1].face_ids, vec![2, 3, 4]);
        assert_eq!(mesh.owners, vec![0, 0, 1]);
        assert_eq!(mesh.neighbours, vec![1]);
        assert!(mesh.summary().contains("Number of boundary patches: 2"));
    }

    #[test]
    fn test_oversized_element_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("square.msh");
        fs::write(&path, MSH.replace("2 3 2 1 1", "2 4294967296 2 1 1")).unwrap();
        match ImportedMesh::load(&path) {
            Err(FlowError::MeshImport { message, .. }) => {
                assert!(message.contains("bad element type"))
            }
            other => panic!("expected a mesh import error, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_tag_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("square.msh");
        let line = format!("2 3 {} 1 1", usize::MAX);
        fs::write(&path, MSH.replace("2 3 2 1 1", &line)).unwrap();
        assert!(matches!(
            ImportedMesh::load(&path),
            Err(FlowError::MeshImport { .. })
        ));
    }

    #[test]
    fn test_overflowing_face_range_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_foam(dir.path());
        let boundary = format!(
            "{HEADER}\n1\n(\n    inlet\n    {{\n        type            patch;\n        nFaces          2;\n        startFace       {};\n    }}\n)\n",
            usize::MAX
        );
        fs::write(dir.path().join("boundary"), boundary).unwrap();
        match ImportedMesh::load(dir.path()) {
            Err(FlowError::MeshImport { path, message }) => {
                assert!(path.ends_with("boundary"));
                assert!(message.contains("overflows"));
            }
            other => panic!("expected a mesh import error, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.cgns");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            ImportedMesh::load(&path),
            Err(FlowError::MeshImport { .. })
        ));
    }

    #[test]
    fn test_missing_foam_file() {
        let dir = tempfile::tempdir().unwrap();
        write_foam(dir.path());
        fs::remove_file(dir.path().join("owner")).unwrap();
        match ImportedMesh::load(dir.path()) {
            Err(FlowError::MeshImport { path, .. }) => assert!(path.ends_with("owner")),
            other => panic!("expected a mesh import error, got {other:?}"),
        }
    }
}

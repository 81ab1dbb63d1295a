use crate::Error;
use crate::ident::make_valid_identifier;
use glam::{Vec2, Vec3};
use serde::Serialize;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

/// Name given to faces that appear before the first `g` statement.
pub const DEFAULT_SUB_MESH: &str = "default";

/// A polygon mesh: one global vertex array shared by every sub-mesh.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub sub_meshes: Vec<SubMesh>,
}

/// A named face group. Faces are stored flat, USD style: one count per face and
/// the concatenated vertex (and UV) indices.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SubMesh {
    pub name: String,
    pub face_vertex_counts: Vec<usize>,
    pub face_vertex_indices: Vec<usize>,
    pub face_uv_indices: Vec<usize>,
}

impl SubMesh {
    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }

    /// Iterates faces as slices of vertex indices.
    pub fn faces(&self) -> impl Iterator<Item = &[usize]> + '_ {
        let mut start = 0usize;
        self.face_vertex_counts.iter().map(move |&count| {
            let face = &self.face_vertex_indices[start..start + count];
            start += count;
            face
        })
    }

    /// `[min, max]` of the vertex indices referenced by this sub-mesh.
    pub fn index_range(&self) -> Option<RangeInclusive<usize>> {
        let min = self.face_vertex_indices.iter().copied().min()?;
        let max = self.face_vertex_indices.iter().copied().max()?;
        Some(min..=max)
    }

    /// Sorted, deduplicated vertex indices referenced by this sub-mesh.
    pub fn vertex_indices(&self) -> Vec<usize> {
        let mut out = self.face_vertex_indices.clone();
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl Mesh {
    pub fn parse_obj(input: &str) -> Result<Self, Error> {
        parse_obj(input, None)
    }

    /// Parses an OBJ keeping only the first `max_face_vertices` vertices of every face.
    pub fn parse_obj_with_face_limit(input: &str, max_face_vertices: usize) -> Result<Self, Error> {
        parse_obj(input, Some(max_face_vertices))
    }

    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse_obj(&input)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn sub_mesh(&self, name: &str) -> Option<&SubMesh> {
        self.sub_meshes.iter().find(|m| m.name == name)
    }
}

impl FromStr for Mesh {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_obj(s, None)
    }
}

fn parse_obj(input: &str, max_face_vertices: Option<usize>) -> Result<Mesh, Error> {
    let mut mesh = Mesh::default();
    let mut current: Option<SubMesh> = None;

    for (line_index, raw_line) in input.lines().enumerate() {
        let line_number = line_index + 1;
        let line = match raw_line.split_once('#') {
            Some((before, _)) => before,
            None => raw_line,
        };
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let [x, y, z] = parse_floats::<3>(&mut tokens, line_number, "vertex")?;
                mesh.vertices.push(Vec3::new(x, y, z));
            }
            "vt" => {
                let [u, v] = parse_floats::<2>(&mut tokens, line_number, "uv")?;
                mesh.uvs.push(Vec2::new(u, v));
            }
            "f" => {
                let mut corners: Vec<&str> = tokens.collect();
                if let Some(limit) = max_face_vertices {
                    if corners.len() < limit {
                        return Err(Error::ObjParse {
                            line: line_number,
                            message: format!(
                                "face has {} vertices, fewer than {limit}",
                                corners.len()
                            ),
                        });
                    }
                    corners.truncate(limit);
                }
                if corners.len() < 3 {
                    return Err(Error::ObjParse {
                        line: line_number,
                        message: "face needs at least 3 vertices".to_string(),
                    });
                }

                let sub_mesh = current.get_or_insert_with(|| SubMesh {
                    name: DEFAULT_SUB_MESH.to_string(),
                    ..SubMesh::default()
                });
                let mut vertices = Vec::with_capacity(corners.len());
                let mut uvs = Vec::with_capacity(corners.len());
                for corner in &corners {
                    let mut refs = corner.split('/');
                    let vertex = refs.next().unwrap_or_default();
                    vertices.push(resolve_index(
                        vertex,
                        mesh.vertices.len(),
                        line_number,
                        "vertex",
                    )?);
                    if let Some(uv) = refs.next().filter(|s| !s.is_empty()) {
                        uvs.push(resolve_index(uv, mesh.uvs.len(), line_number, "uv")?);
                    }
                }
                // UV indices stay parallel to vertex indices.
                if !uvs.is_empty() && uvs.len() != vertices.len() {
                    return Err(Error::ObjParse {
                        line: line_number,
                        message: "face mixes corners with and without uv indices".to_string(),
                    });
                }
                sub_mesh.face_vertex_indices.extend(vertices);
                sub_mesh.face_uv_indices.extend(uvs);
                sub_mesh.face_vertex_counts.push(corners.len());
            }
            "g" => {
                if let Some(done) = current.take() {
                    push_sub_mesh(&mut mesh, done);
                }
                let name = tokens.next().unwrap_or(DEFAULT_SUB_MESH);
                current = Some(SubMesh {
                    name: make_valid_identifier(name),
                    ..SubMesh::default()
                });
            }
            // Normals, materials, smoothing groups and object names carry nothing we use.
            _ => {}
        }
    }

    if let Some(done) = current.take() {
        push_sub_mesh(&mut mesh, done);
    }

    Ok(mesh)
}

fn push_sub_mesh(mesh: &mut Mesh, sub_mesh: SubMesh) {
    if sub_mesh.face_vertex_counts.is_empty() {
        log::debug!("dropping empty OBJ group '{}'", sub_mesh.name);
        return;
    }
    log::debug!(
        "OBJ group '{}' with {} faces",
        sub_mesh.name,
        sub_mesh.face_count()
    );
    mesh.sub_meshes.push(sub_mesh);
}

fn parse_floats<'a, const N: usize>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
    what: &str,
) -> Result<[f32; N], Error> {
    let mut out = [0.0f32; N];
    for value in out.iter_mut() {
        let token = tokens.next().ok_or_else(|| Error::ObjParse {
            line,
            message: format!("{what} needs {N} components"),
        })?;
        *value = token.parse().map_err(|_| Error::ObjParse {
            line,
            message: format!("invalid {what} component '{token}'"),
        })?;
    }
    Ok(out)
}

/// OBJ indices are 1-based; negative ones count back from the last element defined so far.
/// Either way the index must name an element that is already defined.
fn resolve_index(token: &str, defined: usize, line: usize, what: &str) -> Result<usize, Error> {
    let raw: i64 = token.parse().map_err(|_| Error::ObjParse {
        line,
        message: format!("invalid {what} index '{token}'"),
    })?;
    let resolved = match raw {
        0 => None,
        r if r > 0 && r as usize <= defined => Some(r as usize - 1),
        r if r > 0 => None,
        r => (defined as i64 + r).try_into().ok(),
    };
    resolved.ok_or_else(|| Error::ObjParse {
        line,
        message: format!("{what} index {raw} out of range"),
    })
}

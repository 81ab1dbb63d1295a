use crate::ident::make_valid_identifier;
use crate::{BlendShape, Error, Mesh, SkelTarget};
use glam::Vec3;
use indexmap::IndexMap;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::path::Path;

/// Group used for target files that sit directly in the targets root.
pub const UNGROUPED: &str = "ungrouped";

pub const TARGET_EXTENSION: &str = "target";

/// Registered blend shapes, their sub-mesh bindings and attached skeltarget records.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BlendShapeLibrary {
    /// Shapes in registration order, keyed by name.
    pub shapes: IndexMap<String, BlendShape>,
    /// Sub-mesh name -> names of the shapes bound to it.
    pub mesh_bindings: IndexMap<String, Vec<String>>,
    /// Blend-shape name -> skeltarget record produced by separation.
    pub skel_targets: IndexMap<String, SkelTarget>,
}

impl BlendShapeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&BlendShape> {
        self.shapes.get(name)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn bound_to(&self, mesh: &str) -> &[String] {
        self.mesh_bindings
            .get(mesh)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn skel_target(&self, name: &str) -> Option<&SkelTarget> {
        self.skel_targets.get(name)
    }
}

/// Outcome of registering one blend shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    Bound(Vec<String>),
    /// A shape with the same name and the same affected indices already exists.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<String>,
    /// Recovered problems, each already logged: unparsable files, unbound targets, conflicts.
    pub diagnostics: Vec<Error>,
}

impl ImportReport {
    fn skip(&mut self, error: Error) {
        log::warn!("{error}");
        self.diagnostics.push(error);
    }
}

/// Parses a target delta file: `index dx dy dz` per line, `#` comments.
pub fn parse_target(input: &str) -> Result<Vec<(usize, Vec3)>, String> {
    let mut out = Vec::new();
    for (line_index, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        // Columns after the third offset are ignored.
        if tokens.len() < 4 {
            return Err(format!(
                "line {}: expected at least 4 columns, found {}",
                line_index + 1,
                tokens.len()
            ));
        }
        let index: usize = tokens[0]
            .parse()
            .map_err(|_| format!("line {}: invalid vertex index '{}'", line_index + 1, tokens[0]))?;
        let mut offset = [0.0f32; 3];
        for (value, token) in offset.iter_mut().zip(&tokens[1..]) {
            *value = token
                .parse()
                .map_err(|_| format!("line {}: invalid offset '{token}'", line_index + 1))?;
        }
        out.push((index, Vec3::from_array(offset)));
    }
    if out.is_empty() {
        return Err("no target records".to_string());
    }
    Ok(out)
}

/// Derives `(group, name)` for a target file below `root`.
///
/// The first directory below the root is the group; deeper directories and the file stem
/// form the name.
pub fn target_names(root: &Path, path: &Path) -> (String, String) {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut dirs: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let group = if dirs.is_empty() {
        UNGROUPED.to_string()
    } else {
        make_valid_identifier(&dirs.remove(0))
    };
    let name = if dirs.is_empty() {
        stem
    } else {
        format!("{}_{stem}", dirs.join("_"))
    };
    (group, make_valid_identifier(&name))
}

/// Imports morph targets and binds them to the sub-meshes whose index range they touch.
#[derive(Clone, Debug)]
pub struct TargetImporter {
    ranges: Vec<(String, RangeInclusive<usize>)>,
}

impl TargetImporter {
    pub fn new(mesh: &Mesh) -> Self {
        let ranges = mesh
            .sub_meshes
            .iter()
            .filter_map(|m| m.index_range().map(|r| (m.name.clone(), r)))
            .collect();
        Self { ranges }
    }

    /// Sub-meshes whose `[min, max]` index range contains any of `indices`.
    pub fn affected_meshes(&self, indices: &[usize]) -> Vec<String> {
        self.ranges
            .iter()
            .filter(|(_, range)| indices.iter().any(|i| range.contains(i)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Imports every `*.target` file below `root`, in file-name order.
    ///
    /// Only a missing root is fatal; per-file problems end up in the report.
    pub fn import_dir(
        &self,
        library: &mut BlendShapeLibrary,
        root: impl AsRef<Path>,
    ) -> Result<ImportReport, Error> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "targets directory not found"),
            ));
        }

        let mut report = ImportReport::default();
        for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    report.skip(Error::io(path, e.into()));
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(TARGET_EXTENSION)
            {
                continue;
            }

            let input = match std::fs::read_to_string(path) {
                Ok(input) => input,
                Err(e) => {
                    report.skip(Error::io(path, e));
                    continue;
                }
            };
            let (group, name) = target_names(root, path);
            log::debug!("importing target {}", path.display());
            self.import_str(library, &mut report, path, &group, &name, &input);
        }
        Ok(report)
    }

    /// Imports one target from its text. Problems are recorded in `report`.
    pub fn import_str(
        &self,
        library: &mut BlendShapeLibrary,
        report: &mut ImportReport,
        path: &Path,
        group: &str,
        name: &str,
        input: &str,
    ) {
        let records = match parse_target(input) {
            Ok(records) => records,
            Err(message) => {
                report.skip(Error::EmptyOrUnparsableTarget {
                    path: path.to_path_buf(),
                    message,
                });
                return;
            }
        };

        let shape = BlendShape::new(make_valid_identifier(name), group).with_offsets(records);
        let shape_name = shape.name.clone();
        match self.register(library, shape) {
            Ok(Registration::Bound(meshes)) => {
                log::info!("{shape_name} targets {}", meshes.join(", "));
                report.imported.push(shape_name);
            }
            Ok(Registration::Duplicate) => {
                log::info!("blend shape {shape_name} already registered");
            }
            Err(e) => report.skip(e),
        }
    }

    /// Registers `shape` under every sub-mesh it affects.
    ///
    /// A name that is already registered keeps its first registration; differing affected
    /// indices are reported as a conflict.
    pub fn register(
        &self,
        library: &mut BlendShapeLibrary,
        mut shape: BlendShape,
    ) -> Result<Registration, Error> {
        let meshes = self.affected_meshes(&shape.indices);
        if meshes.is_empty() {
            return Err(Error::UnboundTarget { name: shape.name });
        }

        if let Some(existing) = library.shapes.get(&shape.name) {
            let existing_set = existing.index_set();
            let incoming_set = shape.index_set();
            if existing_set != incoming_set {
                return Err(Error::DuplicateBlendShapeConflict {
                    mesh: existing
                        .bound_meshes
                        .first()
                        .cloned()
                        .unwrap_or_else(|| meshes[0].clone()),
                    name: shape.name,
                    existing: existing_set,
                    incoming: incoming_set,
                });
            }
            return Ok(Registration::Duplicate);
        }

        for mesh in &meshes {
            library
                .mesh_bindings
                .entry(mesh.clone())
                .or_default()
                .push(shape.name.clone());
        }
        shape.bound_meshes = meshes.clone();
        library.shapes.insert(shape.name.clone(), shape);
        Ok(Registration::Bound(meshes))
    }
}

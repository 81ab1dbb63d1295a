use crate::{
    BoneData, Error, JointTransform, MacroData, MacroPart, MacroVariable, ModifierDefinition,
    ModifierGroupDefinition, Rig, RigDescription, SkelTarget, WeightsTable,
};
use glam::{Quat, Vec3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RigRoot {
    bones: IndexMap<String, BoneDef>,
    #[serde(default)]
    joints: IndexMap<String, Vec<usize>>,
    #[serde(default)]
    weights_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoneDef {
    #[serde(default)]
    parent: Option<String>,
    head: String,
    tail: String,
}

#[derive(Debug, Deserialize)]
struct WeightsRoot {
    weights: IndexMap<String, Vec<(usize, f32)>>,
}

#[derive(Debug, Deserialize)]
struct ModifierGroupDef {
    group: String,
    #[serde(default)]
    modifiers: Vec<ModifierDef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModifierDef {
    Target {
        target: String,
        #[serde(default)]
        min: Option<String>,
        #[serde(default)]
        max: Option<String>,
    },
    Macro {
        macrovar: String,
        #[serde(default, rename = "modifierType")]
        modifier_type: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct MacroRoot {
    macrotargets: IndexMap<String, MacroVariableDef>,
    #[serde(default)]
    combinations: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct MacroVariableDef {
    #[serde(default)]
    label: Option<String>,
    parts: Vec<MacroPartDef>,
}

#[derive(Debug, Deserialize)]
struct MacroPartDef {
    lowest: f32,
    highest: f32,
    low: String,
    high: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct SkelTargetDef {
    blendshape: String,
    skeleton: IndexMap<String, JointTransformDef>,
}

#[derive(Debug, Deserialize, Serialize)]
struct JointTransformDef {
    translation: Vec3,
    rotation: AxisAngleDef,
    #[serde(default = "default_scale")]
    scale: Vec3,
}

#[derive(Debug, Deserialize, Serialize)]
struct AxisAngleDef {
    axis: Vec3,
    /// Degrees.
    angle: f32,
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

fn parse<'a, T: Deserialize<'a>>(input: &'a str, context: &str) -> Result<T, Error> {
    serde_json::from_str(input).map_err(|e| Error::JsonParse {
        context: context.to_string(),
        message: e.to_string(),
    })
}

fn read(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

impl RigDescription {
    /// Parses a rig file: `{"bones": {name: {parent, head, tail}}, "joints": {group: [..]},
    /// "weights_file": ..}`. Bone order is kept as written.
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let root: RigRoot = parse(input, "rig description")?;
        let bones = root
            .bones
            .into_iter()
            .map(|(name, def)| BoneData {
                name,
                parent: def.parent,
                head: def.head,
                tail: def.tail,
            })
            .collect();
        Ok(Self {
            bones,
            groups: root.joints,
            weights_file: root.weights_file,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_json_str(&read(path.as_ref())?)
    }

    /// Loads the rig file and the weights file it references (resolved next to the rig file).
    /// A rig without a weights reference yields an empty table.
    pub fn load_with_weights(path: impl AsRef<Path>) -> Result<(Self, WeightsTable), Error> {
        let path = path.as_ref();
        let description = Self::load(path)?;
        let weights = match description.weights_file.as_deref() {
            Some(file) => {
                let dir = path.parent().unwrap_or_else(|| Path::new(""));
                WeightsTable::load(dir.join(file))?
            }
            None => {
                log::warn!("rig {} references no weights file", path.display());
                WeightsTable::default()
            }
        };
        Ok((description, weights))
    }
}

impl WeightsTable {
    /// Parses `{"weights": {joint: [[vertex, weight], ..]}}`.
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let root: WeightsRoot = parse(input, "skin weights")?;
        Ok(Self {
            weights: root.weights,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_json_str(&read(path.as_ref())?)
    }
}

impl ModifierGroupDefinition {
    /// Parses a modifier file: a list of `{"group", "modifiers": [..]}` where each modifier is
    /// `{"target", "min"?, "max"?}` or `{"macrovar", "modifierType"?}`.
    pub fn list_from_json_str(input: &str) -> Result<Vec<Self>, Error> {
        let groups: Vec<ModifierGroupDef> = parse(input, "modifier definitions")?;
        Ok(groups
            .into_iter()
            .map(|g| Self {
                group: g.group,
                modifiers: g
                    .modifiers
                    .into_iter()
                    .map(|m| match m {
                        ModifierDef::Target { target, min, max } => {
                            ModifierDefinition::Target { target, min, max }
                        }
                        ModifierDef::Macro {
                            macrovar,
                            modifier_type,
                        } => ModifierDefinition::Macro {
                            macrovar,
                            modifier_type,
                        },
                    })
                    .collect(),
            })
            .collect())
    }

    pub fn load_list(path: impl AsRef<Path>) -> Result<Vec<Self>, Error> {
        Self::list_from_json_str(&read(path.as_ref())?)
    }
}

impl MacroData {
    /// Parses `{"macrotargets": {var: {"label", "parts": [..]}}, "combinations": {..}}`.
    /// Variable names are lowercased.
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        let root: MacroRoot = parse(input, "macro data")?;
        let variables = root
            .macrotargets
            .into_iter()
            .map(|(name, def)| {
                let variable = MacroVariable {
                    label: def.label.unwrap_or_else(|| name.clone()),
                    parts: def
                        .parts
                        .into_iter()
                        .map(|p| MacroPart {
                            lowest: p.lowest,
                            highest: p.highest,
                            low: p.low,
                            high: p.high,
                        })
                        .collect(),
                };
                (name.to_lowercase(), variable)
            })
            .collect();
        Ok(Self {
            variables,
            combinations: root.combinations,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::from_json_str(&read(path.as_ref())?)
    }
}

impl SkelTarget {
    /// Writes the `.skeltarget` record: joints keyed by path, rotation as axis and degrees.
    pub fn to_json_string(&self, rig: &Rig) -> Result<String, Error> {
        self.check_joint_count(rig)?;
        let skeleton = rig
            .joints
            .iter()
            .zip(&self.joints)
            .map(|(joint, xform)| {
                let (axis, angle) = xform.rotation.to_axis_angle();
                (
                    joint.path.clone(),
                    JointTransformDef {
                        translation: xform.translation,
                        rotation: AxisAngleDef {
                            axis,
                            angle: angle.to_degrees(),
                        },
                        scale: xform.scale,
                    },
                )
            })
            .collect();
        let def = SkelTargetDef {
            blendshape: self.blend_shape.clone(),
            skeleton,
        };
        serde_json::to_string_pretty(&def).map_err(|e| Error::InvalidValue {
            message: format!("failed to write skeltarget '{}': {e}", self.blend_shape),
        })
    }

    /// Reads a `.skeltarget` record against `rig`. Joints missing from the record keep their
    /// rest transform.
    pub fn from_json_str(input: &str, rig: &Rig) -> Result<Self, Error> {
        let def: SkelTargetDef = parse(input, "skeltarget")?;
        let mut joints: Vec<JointTransform> = rig
            .rest_translations()
            .into_iter()
            .map(JointTransform::from_translation)
            .collect();
        for (path, xform) in def.skeleton {
            let index = rig
                .joint_index_by_path(&path)
                .ok_or_else(|| Error::UnknownJoint {
                    context: format!("skeltarget '{}'", def.blendshape),
                    joint: path.clone(),
                })?;
            let rotation = if xform.rotation.angle == 0.0 {
                Quat::IDENTITY
            } else {
                Quat::from_axis_angle(
                    xform.rotation.axis.normalize_or(Vec3::X),
                    xform.rotation.angle.to_radians(),
                )
            };
            joints[index] = JointTransform {
                translation: xform.translation,
                rotation,
                scale: xform.scale,
            };
        }
        Ok(Self {
            blend_shape: def.blendshape,
            joints,
        })
    }
}

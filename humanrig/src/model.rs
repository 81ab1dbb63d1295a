use glam::{Mat4, Quat, Vec3};
use indexmap::IndexMap;
use serde::Serialize;

/// One bone of a rig description, as read from the rig file.
#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<String>,
    /// Vertex group whose centroid places the joint.
    pub head: String,
    pub tail: String,
}

/// The bone-tree input to the rig builder. Bone order is the file order.
#[derive(Clone, Debug, Default)]
pub struct RigDescription {
    pub bones: Vec<BoneData>,
    /// Named vertex index groups referenced by `BoneData::head` / `BoneData::tail`.
    pub groups: IndexMap<String, Vec<usize>>,
    /// Companion weights file, relative to the rig file.
    pub weights_file: Option<String>,
}

impl RigDescription {
    pub fn bone(&self, name: &str) -> Option<&BoneData> {
        self.bones.iter().find(|b| b.name == name)
    }
}

/// Sparse skin weights: joint name -> (vertex, weight) entries, in file order.
#[derive(Clone, Debug, Default)]
pub struct WeightsTable {
    pub weights: IndexMap<String, Vec<(usize, f32)>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct JointTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for JointTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl JointTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_mat4(m: &Mat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation,
            scale,
        }
    }
}

/// A named sparse morph: offsets for the listed vertex indices only.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlendShape {
    pub name: String,
    pub group: String,
    pub indices: Vec<usize>,
    pub offsets: Vec<Vec3>,
    /// Sub-meshes this shape is bound to.
    pub bound_meshes: Vec<String>,
}

impl BlendShape {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            indices: Vec::new(),
            offsets: Vec::new(),
            bound_meshes: Vec::new(),
        }
    }

    pub fn with_offsets(mut self, entries: impl IntoIterator<Item = (usize, Vec3)>) -> Self {
        for (index, offset) in entries {
            self.indices.push(index);
            self.offsets.push(offset);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, Vec3)> + '_ {
        self.indices.iter().copied().zip(self.offsets.iter().copied())
    }

    /// Returns `points` deformed by this shape at `weight`. Indices outside `points` are ignored.
    pub fn apply(&self, points: &[Vec3], weight: f32) -> Vec<Vec3> {
        let mut out = points.to_vec();
        self.apply_in_place(&mut out, weight);
        out
    }

    pub(crate) fn apply_in_place(&self, points: &mut [Vec3], weight: f32) {
        if weight == 0.0 {
            return;
        }
        for (index, offset) in self.entries() {
            if let Some(p) = points.get_mut(index) {
                *p += offset * weight;
            }
        }
    }

    /// Sorted, deduplicated affected vertex indices.
    pub fn index_set(&self) -> Vec<usize> {
        let mut out = self.indices.clone();
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Per-joint local transforms a blend shape implies through the skeleton helper vertices.
///
/// Indexed by the rig's joint order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SkelTarget {
    pub blend_shape: String,
    pub joints: Vec<JointTransform>,
}

impl SkelTarget {
    pub fn local_matrices(&self) -> Vec<Mat4> {
        self.joints.iter().map(JointTransform::to_mat4).collect()
    }
}

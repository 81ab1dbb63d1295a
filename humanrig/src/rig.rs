use crate::ident::make_valid_identifier;
use crate::{Error, RigDescription};
use glam::{Mat4, Vec3};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Breadth-first joint order fixed when the rig is built.
///
/// Every per-joint array (transforms, skin weight columns, skeltarget records) is
/// indexed by this order. It is cheap to clone and never changes after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JointOrder {
    names: Arc<[String]>,
    index: Arc<HashMap<String, usize>>,
}

impl JointOrder {
    pub(crate) fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names: names.into(),
            index: Arc::new(index),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}

impl Serialize for JointOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.names.serialize(serializer)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Joint {
    pub name: String,
    /// Slash-separated path from the root, components normalized to identifiers.
    pub path: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub head_vertices: Vec<usize>,
    pub tail_vertices: Vec<usize>,
}

/// A joint hierarchy with rest (parent-local) and bind (world) transforms.
#[derive(Clone, Debug, Serialize)]
pub struct Rig {
    pub order: JointOrder,
    pub joints: Vec<Joint>,
    pub rest_transforms: Vec<Mat4>,
    pub bind_transforms: Vec<Mat4>,
}

impl Rig {
    /// Builds the joint tree from `description`, placing each joint at the centroid of its
    /// head vertex group in `points`.
    pub fn build(description: &RigDescription, points: &[Vec3]) -> Result<Self, Error> {
        let bone_index = validate_bones(description, points.len())?;

        let roots: Vec<usize> = description
            .bones
            .iter()
            .enumerate()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(i, _)| i)
            .collect();
        let root = *roots.last().ok_or(Error::NoRootJoint)?;
        if roots.len() > 1 {
            log::warn!(
                "rig has {} root joints; using the last one, '{}'",
                roots.len(),
                description.bones[root].name
            );
        }

        let mut bone_children = vec![Vec::<usize>::new(); description.bones.len()];
        for (i, bone) in description.bones.iter().enumerate() {
            if let Some(parent) = bone.parent.as_deref() {
                bone_children[bone_index[parent]].push(i);
            }
        }

        // Breadth-first walk; `bfs` holds (bone index, parent joint index).
        let mut bfs: Vec<(usize, Option<usize>)> = Vec::with_capacity(description.bones.len());
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([(root, None)]);
        visited.insert(root);
        while let Some((bone, parent_joint)) = queue.pop_front() {
            let joint = bfs.len();
            bfs.push((bone, parent_joint));
            for &child in &bone_children[bone] {
                if visited.insert(child) {
                    queue.push_back((child, Some(joint)));
                }
            }
        }

        if bfs.len() < description.bones.len() {
            for (i, bone) in description.bones.iter().enumerate() {
                if !visited.contains(&i) {
                    log::warn!(
                        "joint '{}' is not reachable from root '{}' and is left out of the rig",
                        bone.name,
                        description.bones[root].name
                    );
                }
            }
        }

        let mut joints: Vec<Joint> = Vec::with_capacity(bfs.len());
        for &(bone, parent) in &bfs {
            let data = &description.bones[bone];
            let path = match parent {
                None => make_valid_identifier(&data.name),
                Some(p) => format!("{}/{}", joints[p].path, make_valid_identifier(&data.name)),
            };
            let joint = joints.len();
            if let Some(p) = parent {
                joints[p].children.push(joint);
            }
            joints.push(Joint {
                name: data.name.clone(),
                path,
                parent,
                children: Vec::new(),
                head_vertices: description.groups[&data.head].clone(),
                tail_vertices: description
                    .groups
                    .get(&data.tail)
                    .cloned()
                    .unwrap_or_default(),
            });
        }

        let order = JointOrder::new(joints.iter().map(|j| j.name.clone()).collect());
        let mut rig = Self {
            order,
            joints,
            rest_transforms: Vec::new(),
            bind_transforms: Vec::new(),
        };
        rig.resize(points)?;
        Ok(rig)
    }

    /// Recomputes rest and bind transforms from a new point set. Joint order is kept.
    pub fn resize(&mut self, points: &[Vec3]) -> Result<(), Error> {
        let heads = self.head_positions(points)?;
        self.bind_transforms = heads.iter().copied().map(Mat4::from_translation).collect();
        self.rest_transforms = self
            .local_translations(&heads)
            .into_iter()
            .map(Mat4::from_translation)
            .collect();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.order.index_of(name)
    }

    pub fn joint_index_by_path(&self, path: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.path == path)
    }

    pub fn root(&self) -> Option<&Joint> {
        self.joints.first()
    }

    /// Centroid of every joint's head vertices in `points`, in joint order.
    pub fn head_positions(&self, points: &[Vec3]) -> Result<Vec<Vec3>, Error> {
        self.joints
            .iter()
            .map(|joint| centroid(&joint.name, &joint.head_vertices, points))
            .collect()
    }

    /// Converts world positions into parent-relative offsets (the root keeps its world position).
    pub fn local_translations(&self, world: &[Vec3]) -> Vec<Vec3> {
        self.joints
            .iter()
            .zip(world)
            .map(|(joint, &position)| match joint.parent {
                Some(p) => position - world[p],
                None => position,
            })
            .collect()
    }

    /// Composes `local` transforms down the parent chain.
    pub fn world_transforms(&self, local: &[Mat4]) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = Vec::with_capacity(self.joints.len());
        for (joint, m) in self.joints.iter().zip(local) {
            // Breadth-first order guarantees the parent is already composed.
            let w = match joint.parent {
                Some(p) => world[p] * *m,
                None => *m,
            };
            world.push(w);
        }
        world
    }

    pub fn rest_world_transforms(&self) -> Vec<Mat4> {
        self.world_transforms(&self.rest_transforms)
    }

    /// Per-joint skinning matrices for a pose given in local space: `world * bind^-1`.
    pub fn skinning_transforms(&self, local: &[Mat4]) -> Vec<Mat4> {
        self.world_transforms(local)
            .into_iter()
            .zip(&self.bind_transforms)
            .map(|(world, bind)| world * bind.inverse())
            .collect()
    }

    pub fn rest_translations(&self) -> Vec<Vec3> {
        self.rest_transforms
            .iter()
            .map(|m| m.w_axis.truncate())
            .collect()
    }
}

fn validate_bones<'a>(
    description: &'a RigDescription,
    vertex_count: usize,
) -> Result<HashMap<&'a str, usize>, Error> {
    let mut bone_index = HashMap::with_capacity(description.bones.len());
    for (i, bone) in description.bones.iter().enumerate() {
        if bone_index.insert(bone.name.as_str(), i).is_some() {
            return Err(Error::InvalidValue {
                message: format!("duplicate joint name '{}'", bone.name),
            });
        }
    }

    for bone in &description.bones {
        if let Some(parent) = bone.parent.as_deref() {
            if !bone_index.contains_key(parent) {
                return Err(Error::UnknownJointParent {
                    joint: bone.name.clone(),
                    parent: parent.to_string(),
                });
            }
        }

        let head = description
            .groups
            .get(&bone.head)
            .ok_or_else(|| Error::UnknownJointGroup {
                joint: bone.name.clone(),
                group: bone.head.clone(),
            })?;
        if head.is_empty() {
            return Err(Error::EmptyHeadVertices {
                joint: bone.name.clone(),
            });
        }
        if let Some(&index) = head.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::HeadVertexOutOfRange {
                joint: bone.name.clone(),
                index,
                vertex_count,
            });
        }
        if !description.groups.contains_key(&bone.tail) {
            log::debug!(
                "joint '{}' references missing tail group '{}'",
                bone.name,
                bone.tail
            );
        }
    }

    Ok(bone_index)
}

fn centroid(joint: &str, indices: &[usize], points: &[Vec3]) -> Result<Vec3, Error> {
    if indices.is_empty() {
        return Err(Error::EmptyHeadVertices {
            joint: joint.to_string(),
        });
    }
    let mut sum = Vec3::ZERO;
    for &index in indices {
        let p = points.get(index).ok_or_else(|| Error::HeadVertexOutOfRange {
            joint: joint.to_string(),
            index,
            vertex_count: points.len(),
        })?;
        sum += *p;
    }
    Ok(sum / indices.len() as f32)
}

use crate::{Error, JointOrder, WeightsTable};
use glam::{Mat4, Vec3};
use serde::Serialize;

/// Vertices per work unit when skinning a full point set.
pub const DEFAULT_SKINNING_CHUNK_SIZE: usize = 4096;

/// Dense per-vertex skin influences: `influences` (joint index, weight) pairs per vertex.
///
/// Joint indices refer to the rig's [`JointOrder`]. Vertices with fewer influences than the
/// widest one are padded with `(0, 0.0)`.
#[derive(Clone, Debug, Serialize)]
pub struct SkinBinding {
    pub order: JointOrder,
    pub vertex_count: usize,
    pub influences: usize,
    pub joint_indices: Vec<usize>,
    pub weights: Vec<f32>,
}

impl SkinBinding {
    /// Maps a sparse weights table onto the joint order.
    ///
    /// Joints missing from `order` are skipped, each vertex's weights are normalized to sum to
    /// 1, and vertices with no weight at all are left as all-zero.
    pub fn resolve(order: &JointOrder, table: &WeightsTable, vertex_count: usize) -> Self {
        let mut lists = vec![Vec::<(usize, f32)>::new(); vertex_count];
        for (joint, name) in order.names().iter().enumerate() {
            let Some(entries) = table.weights.get(name) else {
                continue;
            };
            for &(vertex, weight) in entries {
                let Some(list) = lists.get_mut(vertex) else {
                    log::warn!(
                        "weight for joint '{name}' references vertex {vertex}, mesh has {vertex_count}"
                    );
                    continue;
                };
                list.push((joint, weight));
            }
        }

        let skipped = table
            .weights
            .keys()
            .filter(|name| order.index_of(name).is_none())
            .count();
        if skipped > 0 {
            log::debug!("skipped weights for {skipped} joints not present in the rig");
        }

        let influences = lists.iter().map(Vec::len).max().unwrap_or(0);
        let mut joint_indices = Vec::with_capacity(vertex_count * influences);
        let mut weights = Vec::with_capacity(vertex_count * influences);
        let mut unweighted = 0usize;
        for list in &lists {
            let total: f32 = list.iter().map(|(_, w)| *w).sum();
            if total == 0.0 {
                unweighted += 1;
            }
            for slot in 0..influences {
                let (joint, weight) = list.get(slot).copied().unwrap_or((0, 0.0));
                joint_indices.push(joint);
                weights.push(if total == 0.0 { weight } else { weight / total });
            }
        }
        if unweighted > 0 {
            log::debug!("{unweighted} of {vertex_count} vertices have no skin weights");
        }

        Self {
            order: order.clone(),
            vertex_count,
            influences,
            joint_indices,
            weights,
        }
    }

    pub fn vertex_joint_indices(&self, vertex: usize) -> &[usize] {
        let start = vertex * self.influences;
        &self.joint_indices[start..start + self.influences]
    }

    pub fn vertex_weights(&self, vertex: usize) -> &[f32] {
        let start = vertex * self.influences;
        &self.weights[start..start + self.influences]
    }

    pub fn weight_sum(&self, vertex: usize) -> f32 {
        self.vertex_weights(vertex).iter().sum()
    }

    /// Orders every vertex's influences by descending weight. Padding stays at the end.
    pub fn sort_influences(&mut self) {
        if self.influences < 2 {
            return;
        }
        let n = self.influences;
        let mut scratch: Vec<(usize, f32)> = Vec::with_capacity(n);
        for (joints, weights) in self
            .joint_indices
            .chunks_exact_mut(n)
            .zip(self.weights.chunks_exact_mut(n))
        {
            scratch.clear();
            scratch.extend(joints.iter().copied().zip(weights.iter().copied()));
            scratch.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (slot, (joint, weight)) in scratch.iter().enumerate() {
                joints[slot] = *joint;
                weights[slot] = *weight;
            }
        }
    }

    /// Linear-blend skins every point. `xforms` are per-joint skinning matrices
    /// (`world * bind^-1`) in joint order.
    pub fn skin_points(&self, xforms: &[Mat4], points: &[Vec3]) -> Result<Vec<Vec3>, Error> {
        self.skin_points_chunked(xforms, points, DEFAULT_SKINNING_CHUNK_SIZE)
    }

    /// Like [`Self::skin_points`], splitting the work into contiguous vertex ranges of
    /// `chunk_size`. With the `parallel` feature the ranges run on the rayon pool.
    pub fn skin_points_chunked(
        &self,
        xforms: &[Mat4],
        points: &[Vec3],
        chunk_size: usize,
    ) -> Result<Vec<Vec3>, Error> {
        if points.len() != self.vertex_count {
            return Err(Error::SkinningFailure {
                vertex: points.len().min(self.vertex_count),
                message: format!(
                    "binding covers {} vertices, got {} points",
                    self.vertex_count,
                    points.len()
                ),
            });
        }

        let chunk_size = chunk_size.max(1);
        let mut out = vec![Vec3::ZERO; points.len()];
        let skin_chunk = |(chunk, slots): (usize, &mut [Vec3])| -> Result<(), Error> {
            let first = chunk * chunk_size;
            for (offset, slot) in slots.iter_mut().enumerate() {
                let vertex = first + offset;
                *slot = self.skin_vertex(vertex, points[vertex], xforms)?;
            }
            Ok(())
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            out.par_chunks_mut(chunk_size)
                .enumerate()
                .try_for_each(skin_chunk)?;
        }
        #[cfg(not(feature = "parallel"))]
        {
            out.chunks_mut(chunk_size)
                .enumerate()
                .try_for_each(skin_chunk)?;
        }

        Ok(out)
    }

    /// Skins only `indices`, returning positions parallel to `indices`.
    pub fn skin_indices(
        &self,
        xforms: &[Mat4],
        points: &[Vec3],
        indices: &[usize],
    ) -> Result<Vec<Vec3>, Error> {
        indices
            .iter()
            .map(|&vertex| {
                let p = points.get(vertex).ok_or_else(|| Error::SkinningFailure {
                    vertex,
                    message: format!("vertex out of range for {} points", points.len()),
                })?;
                self.skin_vertex(vertex, *p, xforms)
            })
            .collect()
    }

    fn skin_vertex(&self, vertex: usize, point: Vec3, xforms: &[Mat4]) -> Result<Vec3, Error> {
        if vertex >= self.vertex_count {
            return Err(Error::SkinningFailure {
                vertex,
                message: format!("binding covers only {} vertices", self.vertex_count),
            });
        }

        let mut total = 0.0f32;
        let mut skinned = Vec3::ZERO;
        for (&joint, &weight) in self
            .vertex_joint_indices(vertex)
            .iter()
            .zip(self.vertex_weights(vertex))
        {
            if weight == 0.0 {
                continue;
            }
            let m = xforms.get(joint).ok_or_else(|| Error::SkinningFailure {
                vertex,
                message: format!("joint {joint} has no transform ({} given)", xforms.len()),
            })?;
            skinned += m.transform_point3(point) * weight;
            total += weight;
        }

        if total == 0.0 {
            return Err(Error::SkinningFailure {
                vertex,
                message: "vertex has no skin weights".to_string(),
            });
        }
        Ok(skinned)
    }
}

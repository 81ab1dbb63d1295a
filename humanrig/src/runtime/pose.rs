use crate::{Error, JointTransform, Rig, SkelTarget, SkinBinding};
use glam::Vec3;

/// Places every joint at the centroid of its head vertices in `points` and records the
/// resulting parent-relative transforms. Rotation and scale stay identity.
pub fn skel_target_from_points(
    rig: &Rig,
    blend_shape: &str,
    points: &[Vec3],
) -> Result<SkelTarget, Error> {
    let heads = rig.head_positions(points)?;
    let joints = rig
        .local_translations(&heads)
        .into_iter()
        .map(JointTransform::from_translation)
        .collect();
    Ok(SkelTarget {
        blend_shape: blend_shape.to_string(),
        joints,
    })
}

/// Poses `points` with `skel_target` through linear-blend skinning.
pub fn pose_points(
    rig: &Rig,
    binding: &SkinBinding,
    skel_target: &SkelTarget,
    points: &[Vec3],
) -> Result<Vec<Vec3>, Error> {
    skel_target.check_joint_count(rig)?;
    let xforms = rig.skinning_transforms(&skel_target.local_matrices());
    binding.skin_points(&xforms, points)
}

impl SkelTarget {
    pub(crate) fn check_joint_count(&self, rig: &Rig) -> Result<(), Error> {
        if self.joints.len() != rig.len() {
            return Err(Error::InvalidValue {
                message: format!(
                    "skeltarget '{}' has {} joints, rig has {}",
                    self.blend_shape,
                    self.joints.len(),
                    rig.len()
                ),
            });
        }
        Ok(())
    }

    /// Change of every joint's local translation relative to the rig's rest pose.
    pub fn joint_offsets(&self, rig: &Rig) -> Vec<Vec3> {
        self.joints
            .iter()
            .zip(rig.rest_translations())
            .map(|(joint, rest)| joint.translation - rest)
            .collect()
    }

    /// Largest joint displacement from the rest pose.
    pub fn max_joint_offset(&self, rig: &Rig) -> f32 {
        self.joint_offsets(rig)
            .iter()
            .map(|v| v.length())
            .fold(0.0, f32::max)
    }
}

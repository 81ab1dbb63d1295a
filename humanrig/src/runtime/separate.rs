use super::pose::skel_target_from_points;
use crate::{BlendShape, BlendShapeLibrary, Error, Rig, SkelTarget, SkinBinding};
use glam::Vec3;

/// A blend shape with the skeleton-induced displacement removed, and the skeleton
/// displacement itself.
#[derive(Clone, Debug, PartialEq)]
pub struct Separation {
    pub shape: BlendShape,
    pub skel_target: SkelTarget,
}

#[derive(Debug, Default)]
pub struct SeparationReport {
    pub separated: Vec<String>,
    /// Shapes left untouched, with the reason.
    pub failures: Vec<(String, Error)>,
}

/// Splits blend shapes into a skeletal part (joint motion implied by the helper vertices)
/// and a pure shape part.
///
/// Borrows the base points, rig and binding; every call returns new values.
#[derive(Clone, Copy, Debug)]
pub struct SkeltargetSeparator<'a> {
    base: &'a [Vec3],
    rig: &'a Rig,
    binding: &'a SkinBinding,
}

impl<'a> SkeltargetSeparator<'a> {
    pub fn new(base: &'a [Vec3], rig: &'a Rig, binding: &'a SkinBinding) -> Result<Self, Error> {
        if binding.order != rig.order {
            return Err(Error::InvalidValue {
                message: "skin binding was resolved against a different joint order".to_string(),
            });
        }
        if binding.vertex_count != base.len() {
            return Err(Error::InvalidValue {
                message: format!(
                    "skin binding covers {} vertices, base mesh has {}",
                    binding.vertex_count,
                    base.len()
                ),
            });
        }
        Ok(Self { base, rig, binding })
    }

    /// The joint transforms `shape` implies at full weight.
    pub fn skel_target(&self, shape: &BlendShape) -> Result<SkelTarget, Error> {
        let deformed = shape.apply(self.base, 1.0);
        skel_target_from_points(self.rig, &shape.name, &deformed)
    }

    /// Displacement the skeleton alone causes at `indices` when posed with `skel_target`.
    pub fn skeletal_offsets(
        &self,
        skel_target: &SkelTarget,
        indices: &[usize],
    ) -> Result<Vec<Vec3>, Error> {
        skel_target.check_joint_count(self.rig)?;
        let xforms = self.rig.skinning_transforms(&skel_target.local_matrices());
        let skinned = self.binding.skin_indices(&xforms, self.base, indices)?;
        Ok(indices
            .iter()
            .zip(skinned)
            .map(|(&i, p)| p - self.base[i])
            .collect())
    }

    /// Separates one shape. Only the shape's own indices are touched; on error nothing is
    /// returned and the caller keeps the original.
    pub fn separate(&self, shape: &BlendShape) -> Result<Separation, Error> {
        let skel_target = self.skel_target(shape)?;
        let skeletal = self.skeletal_offsets(&skel_target, &shape.indices)?;

        let mut corrected = shape.clone();
        for (offset, skeletal) in corrected.offsets.iter_mut().zip(skeletal) {
            *offset -= skeletal;
        }
        Ok(Separation {
            shape: corrected,
            skel_target,
        })
    }

    /// Separates every shape in `library`, committing each result as a whole.
    ///
    /// Failed shapes keep their original offsets and are listed in the report.
    pub fn separate_all(&self, library: &mut BlendShapeLibrary) -> SeparationReport {
        let mut report = SeparationReport::default();
        let names: Vec<String> = library.shapes.keys().cloned().collect();
        for name in names {
            let result = match library.shapes.get(&name) {
                Some(shape) => self.separate(shape),
                None => continue,
            };
            match result {
                Ok(separation) => {
                    log::debug!(
                        "separated {name}: max joint offset {}",
                        separation.skel_target.max_joint_offset(self.rig)
                    );
                    library
                        .skel_targets
                        .insert(name.clone(), separation.skel_target);
                    library.shapes.insert(name.clone(), separation.shape);
                    report.separated.push(name);
                }
                Err(e) => {
                    log::warn!("keeping blend shape {name} unseparated: {e}");
                    report.failures.push((name, e));
                }
            }
        }
        report
    }
}

//! Joint hierarchy and skin bindings

use glam::{Affine3A, Mat4, Quat, Vec3};

/// Hard cap on joints per skeleton
pub const MAX_SKELETON_JOINTS: usize = 1024;

/// One node of the joint hierarchy with its parent-relative rest transform
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    /// Parent joint index (always lower than this joint's index), -1 for roots
    pub parent: i32,
    pub name: String,
    pub position: Vec3,
    /// Normalized rotation
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            parent: -1,
            name: String::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Joint {
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    pub fn parent_index(&self) -> Option<usize> {
        usize::try_from(self.parent).ok()
    }
}

/// Joint hierarchy, parents always precede their children
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skeleton {
    pub joints: Vec<Joint>,
}

impl Skeleton {
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn clear(&mut self) {
        self.joints.clear();
    }

    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// Rest-pose model-space matrices, one per joint
    pub fn rest_pose_matrices(&self) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = Vec::with_capacity(self.joints.len());
        for joint in &self.joints {
            let local = joint.local_matrix();
            let m = match joint.parent_index() {
                Some(parent) if parent < world.len() => world[parent] * local,
                _ => local,
            };
            world.push(m);
        }
        world
    }

    /// Check parent ordering and the joint cap
    pub fn validate(&self) -> Result<(), String> {
        if self.joints.len() > MAX_SKELETON_JOINTS {
            return Err(format!(
                "{} joints exceed the maximum of {}",
                self.joints.len(),
                MAX_SKELETON_JOINTS
            ));
        }
        for (i, joint) in self.joints.iter().enumerate() {
            if joint.parent < -1 || joint.parent >= i as i32 {
                return Err(format!(
                    "joint {i} '{}' has invalid parent {}",
                    joint.name, joint.parent
                ));
            }
        }
        Ok(())
    }
}

/// Joint binding shared by one or more surfaces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skin {
    /// Skin slot -> skeleton joint index
    pub joint_remaps: Vec<usize>,
    /// Inverse bind pose per skin slot
    pub inverse_bind_poses: Vec<Affine3A>,
}

impl Skin {
    pub fn joint_count(&self) -> usize {
        self.joint_remaps.len()
    }

    /// Structural equality with a tolerance on the matrices
    pub fn matches(&self, other: &Skin, max_abs_diff: f32) -> bool {
        self.joint_remaps == other.joint_remaps
            && self.inverse_bind_poses.len() == other.inverse_bind_poses.len()
            && self
                .inverse_bind_poses
                .iter()
                .zip(&other.inverse_bind_poses)
                .all(|(a, b)| a.abs_diff_eq(*b, max_abs_diff))
    }

    /// Inverse bind poses as 12 floats each (3x4, column-major)
    pub fn inverse_bind_pose_floats(&self) -> Vec<[f32; 12]> {
        self.inverse_bind_poses
            .iter()
            .map(|m| m.to_cols_array())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Skeleton {
        Skeleton {
            joints: (0..n)
                .map(|i| Joint {
                    parent: i as i32 - 1,
                    name: format!("j{i}"),
                    position: Vec3::Y,
                    ..Default::default()
                })
                .collect(),
        }
    }

    #[test]
    fn rest_pose_accumulates_parents() {
        let world = chain(3).rest_pose_matrices();
        assert!(world[2]
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(0.0, 3.0, 0.0), 1e-6));
    }

    #[test]
    fn validate_parent_order() {
        let mut skeleton = chain(3);
        assert!(skeleton.validate().is_ok());
        skeleton.joints[1].parent = 2;
        assert!(skeleton.validate().is_err());
    }

    #[test]
    fn skin_match_tolerance() {
        let a = Skin {
            joint_remaps: vec![0, 1],
            inverse_bind_poses: vec![Affine3A::IDENTITY; 2],
        };
        let mut b = a.clone();
        b.inverse_bind_poses[1] = Affine3A::from_translation(Vec3::new(1e-7, 0.0, 0.0));
        assert!(a.matches(&b, 1e-5));
        b.joint_remaps[1] = 2;
        assert!(!a.matches(&b, 1e-5));
    }
}

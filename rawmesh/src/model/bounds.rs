//! Axis-aligned bounding box

use glam::{Affine3A, Vec3};

/// Axis-aligned bounds; empty when `mins > maxs`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Aabb {
    /// Bounds containing nothing; adding a point makes it that point
    pub const EMPTY: Self = Self {
        mins: Vec3::splat(f32::MAX),
        maxs: Vec3::splat(f32::MIN),
    };

    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Self::EMPTY;
        for &p in points {
            aabb.add_point(p);
        }
        aabb
    }

    /// Bounds of `points` after transforming them, without touching the points
    pub fn from_transformed_points(points: &[Vec3], transform: &Affine3A) -> Self {
        let mut aabb = Self::EMPTY;
        for &p in points {
            aabb.add_point(transform.transform_point3(p));
        }
        aabb
    }

    pub fn add_point(&mut self, p: Vec3) {
        self.mins = self.mins.min(p);
        self.maxs = self.maxs.max(p);
    }

    pub fn add_aabb(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.mins = self.mins.min(other.mins);
        self.maxs = self.maxs.max(other.maxs);
    }

    pub fn is_empty(&self) -> bool {
        self.mins.cmpgt(self.maxs).any()
    }

    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.maxs - self.mins
        }
    }

    /// Bounds of the eight transformed corners
    pub fn transformed(&self, transform: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut aabb = Self::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.mins.x } else { self.maxs.x },
                if i & 2 == 0 { self.mins.y } else { self.maxs.y },
                if i & 4 == 0 { self.mins.z } else { self.maxs.z },
            );
            aabb.add_point(transform.transform_point3(corner));
        }
        aabb
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_until_first_point() {
        let mut aabb = Aabb::EMPTY;
        assert!(aabb.is_empty());
        aabb.add_point(Vec3::new(1.0, -2.0, 3.0));
        assert!(!aabb.is_empty());
        assert_eq!(aabb.mins, aabb.maxs);
        assert_eq!(aabb.size(), Vec3::ZERO);
    }

    #[test]
    fn transformed_corners() {
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let moved = aabb.transformed(&Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(moved.mins, Vec3::new(9.0, -1.0, -1.0));
        assert_eq!(moved.maxs, Vec3::new(11.0, 1.0, 1.0));
    }
}

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::types::Transformer;
use crate::utils::math::EPSILON;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut iter = points.iter();
        let first = iter.next().copied().unwrap_or(Vec3::ZERO);
        let mut result = Self::from_point(first);
        for &p in iter {
            result.add(p);
        }
        result
    }

    pub fn add(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn combined(lhs: &Aabb, rhs: &Aabb) -> Aabb {
        Aabb {
            min: lhs.min.min(rhs.min),
            max: lhs.max.max(rhs.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn surface_area(&self) -> f32 {
        let d = self.diagonal();
        d.x * d.y + d.x * d.z + d.y * d.z
    }

    pub fn volume(&self) -> f32 {
        let d = self.diagonal();
        d.x * d.y * d.z
    }

    /// Diagonal inertia of a solid box with this extent and unit density.
    pub fn inertia(&self) -> Vec3 {
        let d = self.diagonal();
        let m12 = (d.x * d.y * d.z) / 12.0;
        let height_sq = d.y * d.y;
        let width_sq = d.z * d.z;
        let length_sq = d.x * d.x;
        Vec3::new(
            m12 * (height_sq + width_sq),
            m12 * (length_sq + width_sq),
            m12 * (height_sq + length_sq),
        )
    }

    pub fn overlapping(&self, other: &Aabb) -> bool {
        for i in 0..3 {
            let my_half = (self.max[i] - self.min[i]) * 0.5;
            let my_center = self.min[i] + my_half;
            let other_half = (other.max[i] - other.min[i]) * 0.5;
            let other_center = other.min[i] + other_half;
            if (my_center - other_center).abs() > my_half + other_half {
                return false;
            }
        }
        true
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Inflate by a fraction of the current extent on every side.
    pub fn pad(&mut self, fraction: f32) {
        let pad = self.diagonal() * fraction;
        self.min -= pad;
        self.max += pad;
    }

    pub fn translate(&mut self, amount: Vec3) {
        self.min += amount;
        self.max += amount;
    }

    /// Bounds of this box under an affine transform (Arvo's method).
    pub fn transform(&self, transformer: &Transformer) -> Aabb {
        let mut result = Aabb::default();
        for i in 0..3 {
            result.min[i] = transformer.pos[i];
            result.max[i] = transformer.pos[i];
            for j in 0..3 {
                let term = transformer.scale_rot.col(j)[i];
                let mut low = term * self.min[j];
                let mut high = term * self.max[j];
                if low > high {
                    std::mem::swap(&mut low, &mut high);
                }
                result.min[i] += low;
                result.max[i] += high;
            }
        }
        result
    }

    /// Slab test against the segment from `start` to `end`. On hit, returns
    /// the entry parameter in [0, 1] and the index/sign of the face normal.
    pub fn line_intersect(&self, start: Vec3, end: Vec3) -> Option<(f32, usize, f32)> {
        let dir = end - start;
        let mut t_min = 0.0f32;
        let mut t_max = f32::MAX;
        // Arbitrary axis and sign for when the segment starts inside
        let mut normal_index = 1;
        let mut normal_sign = 1.0;

        for i in 0..3 {
            if dir[i].abs() > EPSILON {
                let inv = 1.0 / dir[i];
                let mut cur_min = (self.min[i] - start[i]) * inv;
                let mut cur_max = (self.max[i] - start[i]) * inv;
                let mut swapped = false;
                if cur_min > cur_max {
                    std::mem::swap(&mut cur_min, &mut cur_max);
                    swapped = true;
                }
                if cur_min > t_min {
                    t_min = cur_min;
                    normal_index = i;
                    normal_sign = if swapped { 1.0 } else { -1.0 };
                }
                t_max = t_max.min(cur_max);
            } else if start[i] < self.min[i] || start[i] > self.max[i] {
                // Parallel to this slab and outside of it
                return None;
            }
        }

        if t_max < 0.0 || t_min > t_max || t_min > 1.0 {
            return None;
        }
        Some((t_min.max(0.0), normal_index, normal_sign))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn overlap_is_symmetric_and_touch_counts() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(Vec3::splat(1.5), Vec3::splat(2.0));
        assert!(a.overlapping(&b) && b.overlapping(&a));
        assert!(!a.overlapping(&c));
    }

    #[test]
    fn pad_grows_by_fraction_of_extent() {
        let mut bb = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0));
        bb.pad(0.5);
        assert_relative_eq!(bb.min.y, -2.0);
        assert_relative_eq!(bb.max.y, 6.0);
    }

    #[test]
    fn segment_hits_report_entry_time_and_face() {
        let bb = Aabb::new(-Vec3::ONE, Vec3::ONE);
        let (t, axis, sign) = bb
            .line_intersect(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0))
            .expect("segment crosses the box");
        assert_relative_eq!(t, 1.0 / 3.0, epsilon = 1e-5);
        assert_eq!(axis, 0);
        assert_relative_eq!(sign, -1.0);

        // Whole box behind the segment
        assert!(bb
            .line_intersect(Vec3::new(3.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0))
            .is_none());
        // Segment ends before reaching the box
        assert!(bb
            .line_intersect(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(-3.0, 0.0, 0.0))
            .is_none());
    }

    #[test]
    fn segment_starting_inside_reports_time_zero() {
        let bb = Aabb::new(-Vec3::ONE, Vec3::ONE);
        let (t, _, _) = bb
            .line_intersect(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0))
            .expect("start point is inside");
        assert_relative_eq!(t, 0.0);
    }
}

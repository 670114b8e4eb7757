use glam::{Quat, Vec3};

use crate::utils::math::{self, EPSILON, EPSILON_SQ};

/// A point on the Minkowski difference along with the witness points on both
/// shapes it was built from.
#[derive(Debug, Clone, Copy, Default)]
pub struct SupportPoint {
    pub support: Vec3,
    pub point_a: Vec3,
    pub point_b: Vec3,
}

impl SupportPoint {
    pub fn new(point_a: Vec3, point_b: Vec3) -> Self {
        Self {
            support: point_a - point_b,
            point_a,
            point_b,
        }
    }
}

/// Vertex slots by age: A is the oldest surviving vertex, the highest live
/// slot is the most recently added support.
pub mod support_id {
    pub const A: usize = 0;
    pub const B: usize = 1;
    pub const C: usize = 2;
    pub const D: usize = 3;
}

fn point_line_distance_sq(point: Vec3, a: Vec3, b: Vec3) -> f32 {
    let dir = (b - a).normalize_or_zero();
    let rel = point - a;
    (rel - dir * rel.dot(dir)).length_squared()
}

/// Working simplex for GJK: up to four supports plus the termination flags
/// the outer loop reads after every solve.
#[derive(Debug, Clone, Default)]
pub struct Simplex {
    supports: [SupportPoint; 4],
    size: usize,
    contains_origin: bool,
    degenerate: bool,
}

impl Simplex {
    pub fn initialize(&mut self) {
        self.size = 0;
        self.contains_origin = false;
        self.degenerate = false;
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains_origin(&self) -> bool {
        self.contains_origin
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    pub fn get_support(&self, id: usize) -> &SupportPoint {
        &self.supports[id]
    }

    /// Mutable view of the live supports, used by raycasting to translate
    /// the simplex as its lower bound advances.
    pub fn supports_mut(&mut self) -> &mut [SupportPoint] {
        &mut self.supports[..self.size]
    }

    fn get(&self, id: usize) -> Vec3 {
        self.supports[id].support
    }

    pub fn add(&mut self, to_add: SupportPoint, check_for_duplicates: bool) -> bool {
        if check_for_duplicates {
            for i in 0..self.size {
                if self.supports[i].support == to_add.support {
                    return false;
                }
            }
        }
        self.supports[self.size] = to_add;
        self.size += 1;
        true
    }

    /// Reduce to the feature closest to the origin and return the next
    /// search direction. Sets the origin-containment and degeneracy flags.
    pub fn solve(&mut self) -> Vec3 {
        self.contains_origin = false;
        match self.size {
            1 => -self.supports[0].support,
            2 => self.solve_line(),
            3 => self.solve_triangle(),
            4 => self.solve_tetrahedron(),
            _ => {
                debug_assert!(false, "nonsense simplex size {}", self.size);
                Vec3::ZERO
            }
        }
    }

    fn discard(&mut self, id: usize) {
        self.size -= 1;
        for i in id..self.size {
            self.supports[i] = self.supports[i + 1];
        }
    }

    fn solve_line(&mut self) -> Vec3 {
        let a = self.get(support_id::A);
        let b = self.get(support_id::B);
        let b_to_a = a - b;
        let b_to_o = -b;
        let len_sq = b_to_a.length_squared();
        if len_sq.abs() < EPSILON {
            self.degenerate = true;
            return Vec3::ZERO;
        }

        let mut t = b_to_o.dot(b_to_a) / len_sq;
        if t <= 0.0 {
            t = 0.0;
            self.discard(support_id::A);
        } else if t >= 1.0 {
            t = 1.0;
            self.discard(support_id::B);
        }

        let to_origin = b_to_o - t * b_to_a;
        if to_origin == Vec3::ZERO {
            self.contains_origin = true;
            return Vec3::ZERO;
        }
        to_origin
    }

    fn solve_triangle(&mut self) -> Vec3 {
        // The search came through edge ab, so that side needs no re-test
        let a = self.get(support_id::A);
        let b = self.get(support_id::B);
        let c = self.get(support_id::C);

        let a_to_b = b - a;
        let a_to_c = c - a;
        let a_to_o = -a;
        let bary = math::point_to_barycentric_edges(a_to_b, a_to_c, a_to_o);
        if bary == Vec3::ZERO {
            self.degenerate = true;
            return Vec3::ZERO;
        }

        if bary.x <= 0.0 {
            self.discard(support_id::A);
            return self.solve_line();
        }
        if bary.y <= 0.0 {
            self.discard(support_id::B);
            return self.solve_line();
        }
        if bary.z <= 0.0 {
            self.discard(support_id::C);
            return self.solve_line();
        }

        let closest_to_origin = math::barycentric_to_point(a, b, c, bary);
        if closest_to_origin.length_squared() < EPSILON_SQ {
            self.contains_origin = true;
            return Vec3::ZERO;
        }

        // Interior: orient the triangle so its normal faces the origin
        let normal = a_to_b.cross(a_to_c);
        if a_to_o.dot(normal) > 0.0 {
            self.supports.swap(support_id::A, support_id::B);
        }
        -closest_to_origin
    }

    // Tetrahedron arrived through face abc, so only the three faces that
    // share the newest vertex d can see the origin.
    fn solve_tetrahedron(&mut self) -> Vec3 {
        const TRIS: [[usize; 4]; 3] = [
            // Each triangle ends with d; the fourth entry is the vertex not
            // on that face
            [support_id::B, support_id::A, support_id::D, support_id::C],
            [support_id::C, support_id::B, support_id::D, support_id::A],
            [support_id::A, support_id::C, support_id::D, support_id::B],
        ];

        let mut in_front_discard = None;
        for tri in TRIS {
            let a = self.get(tri[0]);
            let b = self.get(tri[1]);
            let c = self.get(tri[2]);

            let c_to_a = a - c;
            let c_to_b = b - c;
            let c_to_o = -c;
            let tri_normal = c_to_a.cross(c_to_b);

            if tri_normal == Vec3::ZERO {
                self.degenerate = true;
                return Vec3::ZERO;
            }

            if tri_normal.dot(c_to_o) > 0.0 {
                in_front_discard = Some(tri[3]);

                // Only safe to discard when this face's projection contains
                // the origin, otherwise the containing face might be dropped
                let bary = math::point_to_barycentric_edges(c_to_a, c_to_b, c_to_o);
                if bary.x >= 0.0 && bary.y >= 0.0 && bary.z >= 0.0 {
                    self.discard(tri[3]);
                    return self.solve_triangle();
                }
            }
        }

        // The origin was in front of a face but contained by none of them;
        // fall back to the last face that saw it
        if let Some(discard) = in_front_discard {
            self.discard(discard);
            return self.solve_triangle();
        }

        self.contains_origin = true;
        Vec3::ZERO
    }

    /// Expand a sub-tetrahedral simplex to four usable points so EPA can
    /// start from a closed polytope, then fix the winding.
    pub fn grow_to_four_points(&mut self, mut support: impl FnMut(Vec3) -> SupportPoint) {
        const SEARCH_DIRS: [Vec3; 6] = [
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
            Vec3::NEG_X,
            Vec3::NEG_Y,
            Vec3::NEG_Z,
        ];

        if self.size == 4 {
            return;
        }
        if self.size == 0 {
            self.add(support(Vec3::Y), false);
        }
        if self.size == 1 {
            for dir in SEARCH_DIRS {
                let point = support(dir);
                if point.support.distance_squared(self.supports[0].support) > EPSILON {
                    self.add(point, false);
                    break;
                }
            }
        }
        if self.size == 2 {
            // Search around the segment, rotating whenever the support lands
            // back on the line
            let line = (self.supports[1].support - self.supports[0].support).normalize_or_zero();
            let least = math::least_significant_axis(line);
            let mut search_dir = line.cross(SEARCH_DIRS[least]);
            let rot = Quat::from_axis_angle(line, std::f32::consts::PI / 3.0);

            let mut new_point = support(search_dir);
            for _ in 0..6 {
                let cur = support(search_dir);
                if point_line_distance_sq(
                    cur.support,
                    self.supports[0].support,
                    self.supports[1].support,
                ) > EPSILON
                {
                    new_point = cur;
                    break;
                }
                search_dir = rot * search_dir;
            }
            self.add(new_point, false);
        }
        if self.size == 3 {
            let search_dir = math::triangle_normal(
                self.supports[2].support,
                self.supports[1].support,
                self.supports[0].support,
            );
            let mut new_point = support(search_dir);
            for i in 0..3 {
                if self.supports[i].support == new_point.support {
                    // Flat shapes can still duplicate here; nothing better
                    // can be done locally
                    new_point = support(-search_dir);
                    break;
                }
            }
            self.add(new_point, false);
        }

        let v30 = self.supports[0].support - self.supports[3].support;
        let v31 = self.supports[1].support - self.supports[3].support;
        let v32 = self.supports[2].support - self.supports[3].support;
        if v30.dot(v31.cross(v32)) <= 0.0 {
            self.supports.swap(0, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_pair_support(center_a: Vec3, center_b: Vec3) -> impl FnMut(Vec3) -> SupportPoint {
        move |dir: Vec3| {
            let n = dir.normalize_or_zero();
            SupportPoint::new(center_a + n, center_b - n)
        }
    }

    #[test]
    fn line_reduction_points_back_toward_origin() {
        let mut simplex = Simplex::default();
        simplex.initialize();
        simplex.add(
            SupportPoint {
                support: Vec3::new(2.0, 1.0, 0.0),
                ..Default::default()
            },
            false,
        );
        simplex.add(
            SupportPoint {
                support: Vec3::new(2.0, -1.0, 0.0),
                ..Default::default()
            },
            false,
        );
        let dir = simplex.solve();
        assert!(dir.x < 0.0, "search direction was {dir:?}");
        assert!(!simplex.contains_origin());
    }

    #[test]
    fn coincident_line_is_degenerate() {
        let mut simplex = Simplex::default();
        simplex.initialize();
        let p = SupportPoint {
            support: Vec3::new(1.0, 1.0, 1.0),
            ..Default::default()
        };
        simplex.add(p, false);
        simplex.add(p, false);
        simplex.solve();
        assert!(simplex.is_degenerate());
    }

    #[test]
    fn tetrahedron_containing_origin_reports_hit() {
        let mut simplex = Simplex::default();
        simplex.initialize();
        for support in [
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(-2.0, -1.0, 2.0),
            Vec3::new(2.0, -1.0, 2.0),
            Vec3::new(0.0, -1.0, -2.0),
        ] {
            simplex.add(
                SupportPoint {
                    support,
                    ..Default::default()
                },
                false,
            );
        }
        // Ensure slot ages match the solver's expectations: newest last
        simplex.solve();
        assert!(simplex.contains_origin());
    }

    #[test]
    fn grow_to_four_points_produces_positive_volume() {
        let mut simplex = Simplex::default();
        simplex.initialize();
        let mut support = sphere_pair_support(Vec3::ZERO, Vec3::new(0.5, 0.0, 0.0));
        simplex.add(support(Vec3::Y), false);
        simplex.grow_to_four_points(&mut support);
        assert_eq!(simplex.size(), 4);

        let s: Vec<Vec3> = (0..4).map(|i| simplex.get_support(i).support).collect();
        let det = (s[0] - s[3]).dot((s[1] - s[3]).cross(s[2] - s[3]));
        assert!(det > 0.0, "winding determinant was {det}");
    }
}

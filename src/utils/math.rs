use glam::{Mat3, Vec2, Vec3};

pub const EPSILON: f32 = 1.0e-5;
pub const EPSILON_SQ: f32 = EPSILON * EPSILON;

/// Division that collapses to zero instead of exploding near a zero divisor.
pub fn safe_divide(numerator: f32, denominator: f32, epsilon: f32) -> f32 {
    if denominator.abs() < epsilon {
        0.0
    } else {
        numerator / denominator
    }
}

pub fn safe_divide_vec(numerator: Vec3, denominator: f32, epsilon: f32) -> Vec3 {
    if denominator.abs() < epsilon {
        Vec3::ZERO
    } else {
        numerator / denominator
    }
}

pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a)
}

/// Index of the component with the smallest magnitude.
pub fn least_significant_axis(v: Vec3) -> usize {
    let abs = v.abs();
    if abs.x < abs.y {
        if abs.x < abs.z {
            0
        } else {
            2
        }
    } else if abs.y < abs.z {
        1
    } else {
        2
    }
}

/// Cross product with the cardinal axis indicated by index, 0=x,1=y,2=z.
pub fn cross_cardinal(v: Vec3, axis: usize) -> Vec3 {
    match axis {
        0 => Vec3::new(0.0, v.z, -v.y),
        1 => Vec3::new(-v.z, 0.0, v.x),
        _ => Vec3::new(v.y, -v.x, 0.0),
    }
}

pub fn barycentric_to_point(a: Vec3, b: Vec3, c: Vec3, bary: Vec3) -> Vec3 {
    a * bary.x + b * bary.y + c * bary.z
}

/// Barycentric coordinates of P expressed through the edge vectors of the
/// triangle. Returns zero when the triangle is degenerate.
pub fn point_to_barycentric_edges(a_to_b: Vec3, a_to_c: Vec3, a_to_p: Vec3) -> Vec3 {
    let d00 = a_to_b.dot(a_to_b);
    let d01 = a_to_b.dot(a_to_c);
    let d11 = a_to_c.dot(a_to_c);
    let d20 = a_to_p.dot(a_to_b);
    let d21 = a_to_p.dot(a_to_c);
    let denom = d00 * d11 - d01 * d01;
    if denom < EPSILON_SQ {
        return Vec3::ZERO;
    }
    let inv_denom = 1.0 / denom;
    let v = (d11 * d20 - d01 * d21) * inv_denom;
    let w = (d00 * d21 - d01 * d20) * inv_denom;
    Vec3::new(1.0 - v - w, v, w)
}

pub fn point_to_barycentric(a: Vec3, b: Vec3, c: Vec3, point: Vec3) -> Vec3 {
    point_to_barycentric_edges(b - a, c - a, point - a)
}

pub fn valid_barycentric(bary: Vec3) -> bool {
    let mut sum = 0.0;
    for i in 0..3 {
        // Greater than one is also invalid, but then some component is
        // negative, so that case is caught here too
        if bary[i] < 0.0 {
            return false;
        }
        sum += bary[i];
    }
    (1.0 - sum).abs() < EPSILON
}

/// Outward plane equations `(normal, d)` for the three edges of triangle abc,
/// lying in the triangle's plane.
pub fn outward_tri_planes(a: Vec3, b: Vec3, c: Vec3) -> [(Vec3, f32); 3] {
    let a_to_b = b - a;
    let a_to_c = c - a;
    let b_to_c = c - b;
    let normal = a_to_b.cross(a_to_c);

    let plane_a = a_to_b.cross(normal).normalize_or_zero();
    let plane_b = b_to_c.cross(normal).normalize_or_zero();
    let plane_c = (-a_to_c.cross(normal)).normalize_or_zero();
    [
        (plane_a, -plane_a.dot(a)),
        (plane_b, -plane_b.dot(b)),
        (plane_c, -plane_c.dot(c)),
    ]
}

/// Segment/triangle intersection parameter in [0, 1], or `None` on miss.
pub fn triangle_line_intersect(a: Vec3, b: Vec3, c: Vec3, start: Vec3, end: Vec3) -> Option<f32> {
    let dir = end - start;
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    // Near-zero determinant means the segment is parallel to the plane
    let det = e1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let t_vec = start - a;
    let u = t_vec.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = t_vec.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = e2.dot(q) * inv_det;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    Some(t)
}

/// Parallel axis theorem: move a tensor computed at the center of mass out to
/// `to_point`.
pub fn tensor_translate(tensor: Mat3, to_point: Vec3, mass: f32) -> Mat3 {
    let xx = to_point.x * to_point.x;
    let yy = to_point.y * to_point.y;
    let zz = to_point.z * to_point.z;
    let xy = -mass * to_point.x * to_point.y;
    let xz = -mass * to_point.x * to_point.z;
    let yz = -mass * to_point.y * to_point.z;
    tensor
        + Mat3::from_cols(
            Vec3::new(mass * (yy + zz), xy, xz),
            Vec3::new(xy, mass * (xx + zz), yz),
            Vec3::new(xz, yz, mass * (xx + yy)),
        )
}

/// Rotate an inertia tensor into another frame: R * I * R^T.
pub fn tensor_rotate(tensor: Mat3, rotation: Mat3) -> Mat3 {
    rotation * tensor * rotation.transpose()
}

/// Diagonal of a symmetric tensor after Jacobi rotations have driven the
/// off-diagonal terms to zero. Used to reduce mesh inertia to its principal
/// moments.
pub fn diagonalize_symmetric(tensor: Mat3) -> Vec3 {
    let mut m = tensor;
    for _ in 0..16 {
        // Largest off-diagonal element decides the rotation plane
        let off = [
            (m.y_axis.x.abs(), 0usize, 1usize),
            (m.z_axis.x.abs(), 0, 2),
            (m.z_axis.y.abs(), 1, 2),
        ];
        let &(magnitude, p, q) = off
            .iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .unwrap_or(&off[0]);
        if magnitude < 1.0e-9 {
            break;
        }

        let mpq = m.col(q)[p];
        let theta = 0.5 * (m.col(q)[q] - m.col(p)[p]) / mpq;
        let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
        let c = 1.0 / (t * t + 1.0).sqrt();
        let s = t * c;

        let mut rot = Mat3::IDENTITY;
        rot.col_mut(p)[p] = c;
        rot.col_mut(q)[q] = c;
        rot.col_mut(q)[p] = -s;
        rot.col_mut(p)[q] = s;
        m = rot.transpose() * m * rot;
    }
    Vec3::new(m.x_axis.x, m.y_axis.y, m.z_axis.z)
}

/// Given a point on the line p = t*dir and an ellipse x^2/a^2 + y^2/b^2 = 1,
/// solve for t.
pub fn ellipse_line_intersect(dir: Vec2, ellipse_scale: Vec2) -> f32 {
    safe_divide(
        ellipse_scale.x * ellipse_scale.y,
        (ellipse_scale.x * ellipse_scale.x * dir.y * dir.y
            + ellipse_scale.y * ellipse_scale.y * dir.x * dir.x)
            .sqrt(),
        EPSILON,
    )
}

/// Same, but for a line p = start + t*dir.
pub fn ellipse_line_intersect_from(start: Vec2, dir: Vec2, ellipse_scale: Vec2) -> f32 {
    let a2 = ellipse_scale.x * ellipse_scale.x;
    let b2 = ellipse_scale.y * ellipse_scale.y;
    let (r, s) = (dir.x, dir.y);
    let (p, q) = (start.x, start.y);
    let root =
        (a2 * b2 * (s * s * (a2 - p * p) + b2 * r * r + 2.0 * p * q * r * s - q * q * r * r))
            .sqrt();
    -safe_divide(root + a2 * q * s + b2 * p * r, a2 * s * s + b2 * r * r, EPSILON)
}

/// Normal of the ellipse at `point` (not normalized).
pub fn ellipse_point_to_normal(point: Vec2, ellipse_scale: Vec2) -> Vec2 {
    if point.y.abs() <= EPSILON {
        return point;
    }
    let mut slope = point.x / point.y;
    slope *= ellipse_scale.y / ellipse_scale.x;
    let abs_x = (slope * point.y).abs();
    Vec2::new(if point.x > 0.0 { abs_x } else { -abs_x }, point.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn barycentric_round_trips_interior_point() {
        let (a, b, c) = (
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
        );
        let point = Vec3::new(0.5, 0.5, 0.0);
        let bary = point_to_barycentric(a, b, c, point);
        assert!(valid_barycentric(bary), "bary was {bary:?}");
        let back = barycentric_to_point(a, b, c, bary);
        assert_relative_eq!(back.x, point.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, point.y, epsilon = 1e-5);
    }

    #[test]
    fn barycentric_flags_exterior_point() {
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        let bary = point_to_barycentric(a, b, c, Vec3::new(2.0, 2.0, 0.0));
        assert!(!valid_barycentric(bary));
    }

    #[test]
    fn safe_divide_clamps_near_zero_denominator() {
        assert_eq!(safe_divide(1.0, 0.0, EPSILON), 0.0);
        assert_relative_eq!(safe_divide(1.0, 2.0, EPSILON), 0.5);
    }

    #[test]
    fn segment_triangle_intersection_respects_segment_bounds() {
        let (a, b, c) = (
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
        );
        let t = triangle_line_intersect(a, b, c, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0))
            .expect("segment crosses the triangle");
        assert_relative_eq!(t, 0.5, epsilon = 1e-5);

        // Stops short of the plane
        assert!(
            triangle_line_intersect(a, b, c, Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, 1.0, 0.0))
                .is_none()
        );
    }

    #[test]
    fn jacobi_diagonal_recovers_eigenvalues_of_rotated_tensor() {
        let diagonal = Vec3::new(1.0, 2.0, 3.0);
        let rot = Mat3::from_rotation_z(0.7) * Mat3::from_rotation_x(0.3);
        let tensor = tensor_rotate(Mat3::from_diagonal(diagonal), rot);
        let mut recovered = diagonalize_symmetric(tensor).to_array();
        recovered.sort_by(f32::total_cmp);
        for (got, want) in recovered.iter().zip([1.0f32, 2.0, 3.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-3);
        }
    }

    #[test]
    fn ellipse_intersection_matches_circle_case() {
        let t = ellipse_line_intersect(Vec2::new(1.0, 0.0), Vec2::new(2.0, 2.0));
        assert_relative_eq!(t, 2.0, epsilon = 1e-5);
    }
}

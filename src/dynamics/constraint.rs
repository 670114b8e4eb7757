use glam::{Mat3, Quat, Vec3};

use crate::core::body::BodyHandle;
use crate::utils::math;

/// Stable identity of a constraint across its lifetime.
pub type ConstraintHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Contact,
    Distance,
    Spherical,
    Revolute,
    Weld,
}

/// Data every constraint kind shares: the ordered endpoint pair, its stable
/// handle, and bookkeeping flags.
#[derive(Debug, Clone)]
pub struct ConstraintPair {
    pub handle: ConstraintHandle,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// True when this constraint suppresses collision between its bodies.
    pub blacklist_collision: bool,
    pub should_remove: bool,
}

impl ConstraintPair {
    pub fn new(handle: ConstraintHandle, body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self {
            handle,
            body_a,
            body_b,
            blacklist_collision: false,
            should_remove: false,
        }
    }
}

/// Island-local copy of a body's state, packed for cache-coherent solving.
#[derive(Debug, Clone, Copy)]
pub struct LocalBody {
    pub handle: BodyHandle,
    pub pos: Vec3,
    pub rot: Quat,
    pub scale: Vec3,
    pub lin_vel: Vec3,
    pub ang_vel: Vec3,
    /// World-space inverse inertia.
    pub inertia: Mat3,
    pub inv_mass: f32,
}

impl LocalBody {
    pub fn from_body(handle: BodyHandle, body: &crate::core::body::Body) -> Self {
        let (lin_vel, ang_vel, inertia, inv_mass) = match &body.rigidbody {
            Some(rb) => (rb.lin_vel, rb.ang_vel, rb.inv_inertia, rb.inv_mass),
            None => (Vec3::ZERO, Vec3::ZERO, Mat3::ZERO, 0.0),
        };
        Self {
            handle,
            pos: body.transform.position,
            rot: body.transform.rotation,
            scale: body.transform.scale,
            lin_vel,
            ang_vel,
            inertia,
            inv_mass,
        }
    }

    pub fn model_to_world_point(&self, p: Vec3) -> Vec3 {
        self.rot * (self.scale * p) + self.pos
    }

    pub fn world_to_model_point(&self, p: Vec3) -> Vec3 {
        (self.rot.inverse() * (p - self.pos)) * self.scale.recip()
    }
}

/// Pose and velocity scratch the row solvers read and write each iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyBlock {
    pub pos: Vec3,
    pub rot: Quat,
    pub lin_vel: Vec3,
    pub ang_vel: Vec3,
}

impl BodyBlock {
    pub fn set(&mut self, body: &LocalBody) {
        self.pos = body.pos;
        self.rot = body.rot;
        self.load_velocity(body);
    }

    pub fn load_velocity(&mut self, body: &LocalBody) {
        self.lin_vel = body.lin_vel;
        self.ang_vel = body.ang_vel;
    }

    pub fn store_velocity(&self, body: &mut LocalBody) {
        body.lin_vel = self.lin_vel;
        body.ang_vel = self.ang_vel;
    }
}

/// Full jacobian row, usually stored premultiplied by the inverse masses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jacobian {
    pub linear_a: Vec3,
    pub linear_b: Vec3,
    pub angular_a: Vec3,
    pub angular_b: Vec3,
}

/// Which side of an inequality row is enforced this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnforceState {
    #[default]
    NoEnforce,
    EnforceBoth,
    EnforcePos,
    EnforceNeg,
}

/// Per-step terms shared by every constraint's bias computation.
#[derive(Debug, Clone, Copy)]
pub struct SolverEnv {
    pub dt: f32,
    pub baumgarte_term: f32,
    pub max_correction: f32,
    /// Seconds of inactivity after which a contact retires itself.
    pub time_to_remove: f32,
}

pub const MAX_VEL_CORRECTION: f32 = 10.0;

// Bias solves toward the middle of the slop region with half slop; solving
// toward the boundary itself oscillates on it.

pub fn compute_bias_pos(error: f32, half_slop: f32, baumgarte: f32, max_correction: f32) -> f32 {
    if error < half_slop {
        0.0
    } else {
        max_correction.min((error - half_slop) * baumgarte)
    }
}

pub fn compute_bias_neg(error: f32, half_slop: f32, baumgarte: f32, max_correction: f32) -> f32 {
    if error > -half_slop {
        0.0
    } else {
        (-max_correction).max((error + half_slop) * baumgarte)
    }
}

pub fn compute_bias(error: f32, half_slop: f32, baumgarte: f32, max_correction: f32) -> f32 {
    if error > 0.0 {
        compute_bias_pos(error, half_slop, baumgarte, max_correction)
    } else {
        compute_bias_neg(error, half_slop, baumgarte, max_correction)
    }
}

pub fn compute_jv(
    jal: Vec3,
    jaa: Vec3,
    jbl: Vec3,
    jba: Vec3,
    a: &BodyBlock,
    b: &BodyBlock,
) -> f32 {
    jal.dot(a.lin_vel) + jaa.dot(a.ang_vel) + jbl.dot(b.lin_vel) + jba.dot(b.ang_vel)
}

/// One-row lambda.
pub fn compute_lambda(jv: f32, bias: f32, constraint_mass: f32) -> f32 {
    -(jv + bias) * constraint_mass
}

pub fn compute_lambda_no_bias(jv: f32, constraint_mass: f32) -> f32 {
    -jv * constraint_mass
}

/// Three-row lambda with a full 3x3 inverse mass.
pub fn compute_lambda3(jv: Vec3, bias: Vec3, constraint_mass: &Mat3) -> Vec3 {
    *constraint_mass * -(jv + bias)
}

/// Clamp the running sum from below and turn `lambda` into the applied delta.
pub fn clamp_lambda_min(lambda: &mut f32, lambda_sum: &mut f32, min_bound: f32) {
    let old_sum = *lambda_sum;
    *lambda_sum = (old_sum + *lambda).max(min_bound);
    *lambda = *lambda_sum - old_sum;
}

pub fn clamp_lambda_max(lambda: &mut f32, lambda_sum: &mut f32, max_bound: f32) {
    let old_sum = *lambda_sum;
    *lambda_sum = (old_sum + *lambda).min(max_bound);
    *lambda = *lambda_sum - old_sum;
}

pub fn clamp_lambda(lambda: &mut f32, lambda_sum: &mut f32, min_bound: f32, max_bound: f32) {
    let old_sum = *lambda_sum;
    *lambda_sum = (old_sum + *lambda).clamp(min_bound, max_bound);
    *lambda = *lambda_sum - old_sum;
}

pub fn compute_lambda_bounds(max_sum: f32, state: EnforceState) -> (f32, f32) {
    match state {
        EnforceState::EnforcePos => (0.0, f32::MAX),
        EnforceState::EnforceNeg => (f32::MIN, 0.0),
        _ => (-max_sum, max_sum),
    }
}

/// Accumulated rotation about `normal`, carried across steps so limits keep
/// working past half a turn.
pub fn compute_cumulative_angle_error(
    last_error: f32,
    ref_a: Vec3,
    ref_b: Vec3,
    normal: Vec3,
) -> f32 {
    let accum_ref_a = Quat::from_axis_angle(normal, last_error) * ref_a;
    let mut error = last_error + accum_ref_a.cross(ref_b).dot(normal).clamp(-1.0, 1.0).asin();
    // Within a quarter turn either way, reset to the absolute measurement so
    // rounding error stops accumulating
    if error > -std::f32::consts::FRAC_PI_2 && error < std::f32::consts::FRAC_PI_2 {
        error = ref_a.cross(ref_b).dot(normal).clamp(-1.0, 1.0).asin();
    }
    error
}

/// Classify an angular error against its limits, rewriting `error` relative
/// to the violated bound.
pub fn compute_angular_limit_error(
    min_error: f32,
    max_error: f32,
    enforce_in_bounds: bool,
    error: &mut f32,
) -> EnforceState {
    if *error < min_error {
        *error -= min_error;
        EnforceState::EnforceNeg
    } else if *error > max_error {
        *error -= max_error;
        EnforceState::EnforcePos
    } else if enforce_in_bounds {
        // No error, but resistance still applies inside the bounds
        EnforceState::EnforceBoth
    } else {
        EnforceState::NoEnforce
    }
}

/// Apply a premultiplied impulse row to both velocity blocks.
pub fn apply_impulse(
    lambda: f32,
    jalm: Vec3,
    jaam: Vec3,
    jblm: Vec3,
    jbam: Vec3,
    a: &mut BodyBlock,
    b: &mut BodyBlock,
) {
    a.lin_vel += lambda * jalm;
    a.ang_vel += lambda * jaam;
    b.lin_vel += lambda * jblm;
    b.ang_vel += lambda * jbam;
}

pub fn apply_angular_impulse(
    lambda: f32,
    jaam: Vec3,
    jbam: Vec3,
    a: &mut BodyBlock,
    b: &mut BodyBlock,
) {
    a.ang_vel += lambda * jaam;
    b.ang_vel += lambda * jbam;
}

/// Point-to-point 3x3 block shared by the spherical, revolute, and weld
/// constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearBlock {
    pub angular_a: [Vec3; 3],
    pub angular_b: [Vec3; 3],
    pub angular_ma: [Vec3; 3],
    pub angular_mb: [Vec3; 3],
    pub bias: Vec3,
    pub constraint_mass: Mat3,
    pub mass_a: f32,
    pub mass_b: f32,
    pub lambda_sum: Vec3,
}

impl LinearBlock {
    pub const SLOP: f32 = 0.05;

    #[allow(clippy::too_many_arguments)]
    pub fn setup(
        &mut self,
        pos_a: Vec3,
        pos_b: Vec3,
        anchor_a: Vec3,
        anchor_b: Vec3,
        mass_a: f32,
        mass_b: f32,
        inertia_a: &Mat3,
        inertia_b: &Mat3,
        env: &SolverEnv,
    ) {
        let ra = anchor_a - pos_a;
        let rb = anchor_b - pos_b;
        let error = anchor_a - anchor_b;
        let half_slop = Self::SLOP * 0.5;

        for i in 0..3 {
            self.angular_a[i] = math::cross_cardinal(ra, i);
            self.angular_b[i] = -math::cross_cardinal(rb, i);
            self.angular_ma[i] = *inertia_a * self.angular_a[i];
            self.angular_mb[i] = *inertia_b * self.angular_b[i];
            self.bias[i] = compute_bias(error[i], half_slop, env.baumgarte_term, env.max_correction);
        }

        self.mass_a = mass_a;
        self.mass_b = mass_b;
        self.lambda_sum = Vec3::ZERO;

        // J*M^-1*J^T with the zero terms dropped because the linear rows are
        // the cardinal axes. Looks symmetric, but is not in general
        let (rax, ray, raz) = (self.angular_a[0], self.angular_a[1], self.angular_a[2]);
        let (rbx, rby, rbz) = (self.angular_b[0], self.angular_b[1], self.angular_b[2]);
        let (rmax, rmay, rmaz) = (self.angular_ma[0], self.angular_ma[1], self.angular_ma[2]);
        let (rmbx, rmby, rmbz) = (self.angular_mb[0], self.angular_mb[1], self.angular_mb[2]);
        let mab = mass_a + mass_b;
        let mass = Mat3::from_cols(
            Vec3::new(
                mab + rmax.dot(rax) + rmbx.dot(rbx),
                rmay.dot(rax) + rmby.dot(rbx),
                rmaz.dot(rax) + rmbz.dot(rbx),
            ),
            Vec3::new(
                rmax.dot(ray) + rmbx.dot(rby),
                mab + rmay.dot(ray) + rmby.dot(rby),
                rmaz.dot(ray) + rmbz.dot(rby),
            ),
            Vec3::new(
                rmax.dot(raz) + rmbx.dot(rbz),
                rmay.dot(raz) + rmby.dot(rbz),
                mab + rmaz.dot(raz) + rmbz.dot(rbz),
            ),
        );
        self.constraint_mass = mass.inverse();
    }

    pub fn apply_impulse(&mut self, lambda: Vec3, a: &mut BodyBlock, b: &mut BodyBlock) {
        for i in 0..3 {
            let mut linear_a = Vec3::ZERO;
            let mut linear_b = Vec3::ZERO;
            linear_a[i] = self.mass_a;
            linear_b[i] = -self.mass_b;
            apply_impulse(
                lambda[i],
                linear_a,
                self.angular_ma[i],
                linear_b,
                self.angular_mb[i],
                a,
                b,
            );
        }
        self.lambda_sum += lambda;
    }

    pub fn solve(&mut self, a: &mut BodyBlock, b: &mut BodyBlock) -> f32 {
        let mut jv = Vec3::ZERO;
        for i in 0..3 {
            // The linear rows are cardinal axes, so their dot products reduce
            // to component differences
            jv[i] = a.lin_vel[i] - b.lin_vel[i]
                + a.ang_vel.dot(self.angular_a[i])
                + b.ang_vel.dot(self.angular_b[i]);
        }
        let lambda = compute_lambda3(jv, self.bias, &self.constraint_mass);
        self.apply_impulse(lambda, a, b);
        lambda.x.abs() + lambda.y.abs() + lambda.z.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lambda_clamping_reports_the_applied_delta() {
        let mut sum = 0.5;
        let mut lambda = -2.0;
        clamp_lambda_min(&mut lambda, &mut sum, 0.0);
        assert_relative_eq!(sum, 0.0);
        assert_relative_eq!(lambda, -0.5);

        let mut sum = 0.9;
        let mut lambda = 0.5;
        clamp_lambda(&mut lambda, &mut sum, -1.0, 1.0);
        assert_relative_eq!(sum, 1.0);
        assert_relative_eq!(lambda, 0.1);
    }

    #[test]
    fn bias_is_zero_inside_half_slop() {
        assert_eq!(compute_bias(0.004, 0.005, 6.0, 10.0), 0.0);
        assert_eq!(compute_bias(-0.004, 0.005, 6.0, 10.0), 0.0);
        assert!(compute_bias(0.1, 0.005, 6.0, 10.0) > 0.0);
        assert!(compute_bias(-0.1, 0.005, 6.0, 10.0) < 0.0);
        // Correction saturates
        assert_relative_eq!(compute_bias(100.0, 0.005, 6.0, 10.0), 10.0);
    }

    #[test]
    fn angular_limit_classification_rewrites_error() {
        let mut error = 0.5;
        assert_eq!(
            compute_angular_limit_error(-0.2, 0.3, false, &mut error),
            EnforceState::EnforcePos
        );
        assert_relative_eq!(error, 0.2);

        let mut error = 0.0;
        assert_eq!(
            compute_angular_limit_error(-0.2, 0.3, true, &mut error),
            EnforceState::EnforceBoth
        );
        assert_eq!(
            compute_angular_limit_error(-0.2, 0.3, false, &mut error),
            EnforceState::NoEnforce
        );
    }

    #[test]
    fn cumulative_angle_tracks_past_quarter_turn() {
        let normal = Vec3::Y;
        let ref_a = Vec3::X;
        let mut last = 0.0;
        // Sweep 170 degrees in ten-degree increments
        for step in 1..=17 {
            let angle = (step as f32) * 10.0f32.to_radians();
            let ref_b = Quat::from_axis_angle(normal, angle) * ref_a;
            last = compute_cumulative_angle_error(last, ref_a, ref_b, normal);
        }
        assert_relative_eq!(last, 170.0f32.to_radians(), epsilon = 1e-2);
    }
}

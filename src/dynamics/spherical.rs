use glam::{Quat, Vec2, Vec3};

use crate::dynamics::constraint::{
    self, BodyBlock, ConstraintHandle, ConstraintPair, EnforceState, LinearBlock, LocalBody,
    SolverEnv,
};
use crate::utils::math;

pub const ANGULAR_SLOP: f32 = 0.05;

/// Ball-and-socket joint with an elliptical swing cone, a twist interval,
/// and optional angular friction.
pub struct SphericalConstraint {
    pub pair: ConstraintPair,
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
    /// Swing reference frame in each body's model space. The swing axis is
    /// the frame's forward (+Z) direction.
    pub ref_a: Quat,
    pub ref_b: Quat,
    /// Elliptical half-angles; a negative value disables the swing limit.
    pub max_swing_x: f32,
    pub max_swing_y: f32,
    /// A negative-width interval disables the twist limit.
    pub min_twist: f32,
    pub max_twist: f32,
    /// Coulomb-like resistance on all three angular axes; zero disables.
    pub max_angular_impulse: f32,
    pub linear_warm_start: Vec3,
    pub angular_warm_start: [f32; 3],
}

impl SphericalConstraint {
    /// Stores the swing frame on A and mirrors it into B's model space so
    /// zero error is the configuration at call time.
    pub fn set_swing_frame(&mut self, a_frame: Quat, rot_a: Quat, rot_b: Quat) {
        self.ref_a = a_frame;
        self.ref_b = rot_b.inverse() * rot_a * self.ref_a;
    }
}

/// Swing and twist rows plus the friction row orthogonal to both.
#[derive(Debug, Clone, Copy, Default)]
struct SwingTwistBlock {
    angular: [Vec3; 3],
    angular_ma: [Vec3; 3],
    angular_mb: [Vec3; 3],
    constraint_mass: [f32; 3],
    bias: [f32; 2],
    lambda_sum: [f32; 3],
    max_sum: [f32; 3],
    enforce_dir: [EnforceState; 2],
}

impl SwingTwistBlock {
    #[allow(clippy::too_many_arguments)]
    fn setup(
        &mut self,
        ref_a: Quat,
        ref_b: Quat,
        rot_a: Quat,
        rot_b: Quat,
        inertia_a: &glam::Mat3,
        inertia_b: &glam::Mat3,
        max_swing_x: f32,
        max_swing_y: f32,
        min_twist: f32,
        max_twist: f32,
        max_angular_impulse: f32,
        env: &SolverEnv,
    ) {
        let limit_swing = max_swing_x >= 0.0 || max_swing_y >= 0.0;
        let limit_twist = min_twist <= max_twist;
        let apply_friction = max_angular_impulse > 0.0;

        for i in 0..2 {
            self.enforce_dir[i] = EnforceState::NoEnforce;
            self.lambda_sum[i] = 0.0;
            self.bias[i] = 0.0;
            self.max_sum[i] = f32::MAX;
        }
        self.lambda_sum[2] = 0.0;
        self.max_sum[2] = 0.0;

        if !limit_swing && !limit_twist && !apply_friction {
            return;
        }

        // Work in B's reference frame like the error is usually measured;
        // it behaves more consistently than world space
        let rot_ref_a = rot_a * ref_a;
        let rot_ref_b = rot_b * ref_b;
        let local_swing = Vec3::Z;
        let a_to_b = rot_ref_b.inverse() * rot_ref_a;
        let swing_in_b = a_to_b * local_swing;
        let b_swing_frame = Quat::from_rotation_arc(local_swing, swing_in_b).normalize();

        let half_slop = ANGULAR_SLOP * 0.5;
        let (swing_error, swing_axis_b, swing_angle) =
            compute_swing_error(b_swing_frame, max_swing_x, max_swing_y);

        let mut fill_swing_jac = apply_friction;
        if swing_angle > ANGULAR_SLOP {
            // Enforce as soon as there is any error; bias only applies past
            // half slop
            if swing_error > 0.0 {
                // Positive direction only, to stop further error
                self.enforce_dir[0] = EnforceState::EnforcePos;
                self.bias[0] = -constraint::compute_bias_pos(
                    swing_error,
                    half_slop,
                    env.baumgarte_term,
                    env.max_correction,
                );
                fill_swing_jac = true;
            }
        } else {
            fill_swing_jac = false;
        }

        if fill_swing_jac {
            if self.enforce_dir[0] == EnforceState::NoEnforce {
                self.enforce_dir[0] = EnforceState::EnforceBoth;
            }
            let swing = rot_ref_b * -swing_axis_b;
            let swing_b = -swing;
            self.angular[0] = swing;
            self.angular_ma[0] = *inertia_a * swing;
            self.angular_mb[0] = *inertia_b * swing_b;
            self.constraint_mass[0] = math::safe_divide(
                1.0,
                swing.dot(self.angular_ma[0]) + swing_b.dot(self.angular_mb[0]),
                math::EPSILON,
            );
        }

        if limit_twist || apply_friction {
            let b_twist_frame = (b_swing_frame.inverse() * a_to_b).normalize();
            let (mut twist_error, twist_axis_b) = compute_twist_error(b_twist_frame);

            self.angular[1] = rot_ref_b * -twist_axis_b;
            self.enforce_dir[1] = if limit_twist {
                constraint::compute_angular_limit_error(
                    min_twist,
                    max_twist,
                    apply_friction,
                    &mut twist_error,
                )
            } else {
                EnforceState::EnforceBoth
            };

            if self.enforce_dir[1] != EnforceState::NoEnforce {
                if limit_twist {
                    self.bias[1] = -constraint::compute_bias(
                        twist_error,
                        half_slop,
                        env.baumgarte_term,
                        env.max_correction,
                    );
                }
                self.angular_ma[1] = *inertia_a * self.angular[1];
                self.angular_mb[1] = *inertia_b * -self.angular[1];
                self.constraint_mass[1] = math::safe_divide(
                    1.0,
                    self.angular[1].dot(self.angular_ma[1])
                        - self.angular[1].dot(self.angular_mb[1]),
                    math::EPSILON,
                );
            }
        }

        if apply_friction {
            self.angular[2] = self.angular[0].cross(self.angular[1]);
            self.angular_ma[2] = *inertia_a * self.angular[2];
            self.angular_mb[2] = *inertia_b * -self.angular[2];
            self.constraint_mass[2] = math::safe_divide(
                1.0,
                self.angular[2].dot(self.angular_ma[2]) - self.angular[2].dot(self.angular_mb[2]),
                math::EPSILON,
            );
            for i in 0..3 {
                self.max_sum[i] = max_angular_impulse * self.constraint_mass[i];
            }
        }
    }

    fn apply_impulse(&mut self, index: usize, lambda: f32, a: &mut BodyBlock, b: &mut BodyBlock) {
        constraint::apply_angular_impulse(
            lambda,
            self.angular_ma[index],
            self.angular_mb[index],
            a,
            b,
        );
    }

    fn solve(&mut self, a: &mut BodyBlock, b: &mut BodyBlock) -> f32 {
        let mut result = 0.0;
        for i in 0..2 {
            if self.enforce_dir[i] != EnforceState::NoEnforce {
                let jv = self.angular[i].dot(a.ang_vel - b.ang_vel);
                let mut lambda =
                    constraint::compute_lambda(jv, self.bias[i], self.constraint_mass[i]);
                let (min_sum, max_sum) =
                    constraint::compute_lambda_bounds(self.max_sum[i], self.enforce_dir[i]);
                constraint::clamp_lambda(&mut lambda, &mut self.lambda_sum[i], min_sum, max_sum);
                self.apply_impulse(i, lambda, a, b);
                result += lambda.abs();
            }
        }
        // The third friction axis enforces both directions, so a nonzero max
        // impulse is what turns it on
        if self.max_sum[2] != 0.0 {
            let jv = self.angular[2].dot(a.ang_vel - b.ang_vel);
            let mut lambda = constraint::compute_lambda_no_bias(jv, self.constraint_mass[2]);
            constraint::clamp_lambda(
                &mut lambda,
                &mut self.lambda_sum[2],
                -self.max_sum[2],
                self.max_sum[2],
            );
            self.apply_impulse(2, lambda, a, b);
            result += lambda.abs();
        }
        result
    }
}

/// Swing error against the elliptical cone. When the swing axis leaves the
/// ellipse, the error is measured along the ellipse normal, which is also
/// the direction the correction acts in.
fn compute_swing_error(swing_frame: Quat, max_swing_x: f32, max_swing_y: f32) -> (f32, Vec3, f32) {
    let (axis, swing_angle) = swing_frame.to_axis_angle();
    if swing_angle == 0.0 {
        return (0.0, Vec3::ZERO, 0.0);
    }
    let swing_axis = axis.normalize_or_zero();
    if max_swing_x <= 0.0 || max_swing_y <= 0.0 {
        return (0.0, swing_axis, swing_angle);
    }

    // Rotate the axis 90 degrees about the local swing to land on the
    // ellipse plane, then intersect in that direction to find the limit
    let ellipse_dir = Vec2::new(-swing_axis.y, swing_axis.x);
    let ellipse_scale = Vec2::new(max_swing_x, max_swing_y);
    let t = math::ellipse_line_intersect(ellipse_dir, ellipse_scale);
    let intersect = ellipse_dir * t;
    let swing_limit = intersect.length();

    let normal = math::ellipse_point_to_normal(ellipse_dir, ellipse_scale);

    let mut swing_error = swing_angle - swing_limit;
    if swing_error > math::EPSILON {
        // Outside the ellipse: measure along the normal, since that is the
        // direction the solve resolves in
        let ellipse_point = intersect * (swing_angle / swing_limit);
        let t = math::ellipse_line_intersect_from(ellipse_point, -normal, ellipse_scale);
        swing_error = (normal * t).length();
    }
    (swing_error, swing_axis, swing_angle)
}

/// Twist angle and axis from the residual rotation, using the shorter arc.
fn compute_twist_error(twist_frame: Quat) -> (f32, Vec3) {
    let mut min_twist = twist_frame;
    let (_, mut angle) = twist_frame.to_axis_angle();
    if angle > std::f32::consts::PI {
        min_twist = -min_twist;
        let (_, flipped) = min_twist.to_axis_angle();
        angle = flipped;
    }
    let (axis, _) = min_twist.to_axis_angle();
    (angle, axis.normalize_or_zero())
}

pub struct LocalSphericalConstraint {
    pub owner: ConstraintHandle,
    pub index_a: usize,
    pub index_b: usize,
    anchor_a: Vec3,
    anchor_b: Vec3,
    ref_a: Quat,
    ref_b: Quat,
    max_swing_x: f32,
    max_swing_y: f32,
    min_twist: f32,
    max_twist: f32,
    max_angular_impulse: f32,
    linear_warm_start: Vec3,
    angular_warm_start: [f32; 3],
    block_obj_a: BodyBlock,
    block_obj_b: BodyBlock,
    linear_block: LinearBlock,
    angular_block: SwingTwistBlock,
}

impl LocalSphericalConstraint {
    pub fn new(owner: &SphericalConstraint, index_a: usize, index_b: usize) -> Self {
        Self {
            owner: owner.pair.handle,
            index_a,
            index_b,
            anchor_a: owner.anchor_a,
            anchor_b: owner.anchor_b,
            ref_a: owner.ref_a,
            ref_b: owner.ref_b,
            max_swing_x: owner.max_swing_x,
            max_swing_y: owner.max_swing_y,
            min_twist: owner.min_twist,
            max_twist: owner.max_twist,
            max_angular_impulse: owner.max_angular_impulse,
            linear_warm_start: owner.linear_warm_start,
            angular_warm_start: owner.angular_warm_start,
            block_obj_a: BodyBlock::default(),
            block_obj_b: BodyBlock::default(),
            linear_block: LinearBlock::default(),
            angular_block: SwingTwistBlock::default(),
        }
    }

    pub fn first_iteration(&mut self, objects: &mut [LocalBody], env: &SolverEnv) {
        let obj_a = objects[self.index_a];
        let obj_b = objects[self.index_b];
        self.block_obj_a.set(&obj_a);
        self.block_obj_b.set(&obj_b);

        let world_anchor_a = obj_a.model_to_world_point(self.anchor_a);
        let world_anchor_b = obj_b.model_to_world_point(self.anchor_b);
        self.linear_block.setup(
            self.block_obj_a.pos,
            self.block_obj_b.pos,
            world_anchor_a,
            world_anchor_b,
            obj_a.inv_mass,
            obj_b.inv_mass,
            &obj_a.inertia,
            &obj_b.inertia,
            env,
        );

        self.angular_block.setup(
            self.ref_a,
            self.ref_b,
            obj_a.rot,
            obj_b.rot,
            &obj_a.inertia,
            &obj_b.inertia,
            self.max_swing_x,
            self.max_swing_y,
            self.min_twist,
            self.max_twist,
            self.max_angular_impulse,
            env,
        );

        for i in 0..2 {
            if self.angular_block.enforce_dir[i] != EnforceState::NoEnforce {
                let warm = self.angular_warm_start[i];
                self.angular_block.apply_impulse(
                    i,
                    warm,
                    &mut self.block_obj_a,
                    &mut self.block_obj_b,
                );
                self.angular_block.lambda_sum[i] = warm;
            }
        }
        if self.angular_block.max_sum[2] != 0.0 {
            let warm = self.angular_warm_start[2];
            self.angular_block
                .apply_impulse(2, warm, &mut self.block_obj_a, &mut self.block_obj_b);
            self.angular_block.lambda_sum[2] = warm;
        }

        self.linear_block.apply_impulse(
            self.linear_warm_start,
            &mut self.block_obj_a,
            &mut self.block_obj_b,
        );
        self.block_obj_a.store_velocity(&mut objects[self.index_a]);
        self.block_obj_b.store_velocity(&mut objects[self.index_b]);
    }

    pub fn solve(&mut self, objects: &mut [LocalBody]) -> f32 {
        self.block_obj_a.load_velocity(&objects[self.index_a]);
        self.block_obj_b.load_velocity(&objects[self.index_b]);

        let mut result = self
            .angular_block
            .solve(&mut self.block_obj_a, &mut self.block_obj_b);
        result += self
            .linear_block
            .solve(&mut self.block_obj_a, &mut self.block_obj_b);

        self.block_obj_a.store_velocity(&mut objects[self.index_a]);
        self.block_obj_b.store_velocity(&mut objects[self.index_b]);
        result
    }

    pub fn last_iteration(&mut self) {
        self.linear_warm_start = self.linear_block.lambda_sum;
        self.angular_warm_start = self.angular_block.lambda_sum;
    }

    pub fn store(&self, owner: &mut SphericalConstraint) {
        owner.linear_warm_start = self.linear_warm_start;
        owner.angular_warm_start = self.angular_warm_start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn swing_error_is_zero_inside_the_cone() {
        // Tilt 0.1 rad about x; limits allow 0.5 rad
        let frame = Quat::from_rotation_x(0.1);
        let (error, _, angle) = compute_swing_error(frame, 0.5, 0.5);
        assert_relative_eq!(angle, 0.1, epsilon = 1e-4);
        assert!(error <= 0.0, "error was {error}");
    }

    #[test]
    fn swing_error_grows_past_a_circular_limit() {
        let frame = Quat::from_rotation_x(0.8);
        let (error, _, _) = compute_swing_error(frame, 0.5, 0.5);
        assert!(error > 0.25, "error was {error}");
    }

    #[test]
    fn twist_error_uses_the_shorter_arc() {
        let (angle, axis) = compute_twist_error(Quat::from_rotation_z(0.4));
        assert_relative_eq!(angle, 0.4, epsilon = 1e-4);
        assert_relative_eq!(axis.z.abs(), 1.0, epsilon = 1e-4);
    }
}

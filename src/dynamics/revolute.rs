use glam::{Mat2, Mat3, Quat, Vec2, Vec3};

use crate::dynamics::constraint::{
    self, BodyBlock, ConstraintHandle, ConstraintPair, EnforceState, LinearBlock, LocalBody,
    SolverEnv,
};
use crate::utils::math;

pub const SLOP: f32 = 0.01;

/// Hinge joint: point-to-point plus two angular rows pinning the plane
/// orthogonal to the free axis, with optional limits and friction on the
/// free rotation tracked as a cumulative angle.
pub struct RevoluteConstraint {
    pub pair: ConstraintPair,
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
    /// Basis perpendicular to the free axis in A's model space, and its
    /// image in B's model space captured at creation.
    pub basis_a: [Vec3; 2],
    pub basis_b: [Vec3; 2],
    /// Free-axis limits; `min >= max` disables them.
    pub min_rads: f32,
    pub max_rads: f32,
    /// Friction cap on the free axis; zero disables.
    pub max_free_impulse: f32,
    /// Unwrap state for the cumulative free angle.
    pub last_free_error: f32,
    pub linear_warm_start: Vec3,
    pub angular_warm_start: Vec3,
}

impl RevoluteConstraint {
    /// Chooses the hinge axis in A's model space and mirrors the orthogonal
    /// basis into B so the current relative angle reads as zero.
    pub fn set_local_free_axis(&mut self, axis: Vec3, rot_a: Quat, rot_b: Quat) {
        let free_axis = axis.normalize_or_zero();
        let (x, y) = free_axis.any_orthonormal_pair();
        self.basis_a = [x, y];

        let to_b = Mat3::from_quat(rot_b.inverse()) * Mat3::from_quat(rot_a);
        for i in 0..2 {
            self.basis_b[i] = to_b * self.basis_a[i];
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RevoluteBlock {
    angular: [Vec3; 2],
    angular_ma: [Vec3; 2],
    angular_mb: [Vec3; 2],
    /// Fixed-row biases in x/y, free-row bias in z.
    bias: Vec3,
    constraint_mass: Mat2,
    lambda_sum: Vec3,
    free_angular: Vec3,
    free_angular_ma: Vec3,
    free_angular_mb: Vec3,
    free_mass: f32,
    free_max_sum: f32,
    free_enforce_dir: EnforceState,
}

impl RevoluteBlock {
    fn fixed_errors(&self, world_basis_b: &[Vec3; 2]) -> [f32; 2] {
        // Align the bases without twisting about the free axis: the axis
        // orthogonal to both free axes carries exactly that error
        let free_a = self.angular[0].cross(self.angular[1]);
        let free_b = world_basis_b[0].cross(world_basis_b[1]);
        let error_axis = free_a.cross(free_b);
        [
            -error_axis.dot(self.angular[0]),
            -error_axis.dot(self.angular[1]),
        ]
    }

    fn free_error(&self, last_error: f32, reference_b: Vec3) -> f32 {
        constraint::compute_cumulative_angle_error(
            last_error,
            self.angular[0],
            reference_b,
            self.free_angular,
        )
    }
}

pub struct LocalRevoluteConstraint {
    pub owner: ConstraintHandle,
    pub index_a: usize,
    pub index_b: usize,
    anchor_a: Vec3,
    anchor_b: Vec3,
    basis_a: [Vec3; 2],
    basis_b: [Vec3; 2],
    min_rads: f32,
    max_rads: f32,
    max_free_impulse: f32,
    last_free_error: f32,
    linear_warm_start: Vec3,
    angular_warm_start: Vec3,
    block_obj_a: BodyBlock,
    block_obj_b: BodyBlock,
    linear_block: LinearBlock,
    angular_block: RevoluteBlock,
}

impl LocalRevoluteConstraint {
    pub fn new(owner: &RevoluteConstraint, index_a: usize, index_b: usize) -> Self {
        Self {
            owner: owner.pair.handle,
            index_a,
            index_b,
            anchor_a: owner.anchor_a,
            anchor_b: owner.anchor_b,
            basis_a: owner.basis_a,
            basis_b: owner.basis_b,
            min_rads: owner.min_rads,
            max_rads: owner.max_rads,
            max_free_impulse: owner.max_free_impulse,
            last_free_error: owner.last_free_error,
            linear_warm_start: owner.linear_warm_start,
            angular_warm_start: owner.angular_warm_start,
            block_obj_a: BodyBlock::default(),
            block_obj_b: BodyBlock::default(),
            linear_block: LinearBlock::default(),
            angular_block: RevoluteBlock::default(),
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

        let block = &mut self.angular_block;
        let mut world_basis_b = [Vec3::ZERO; 2];
        for i in 0..2 {
            let axis = self.block_obj_a.rot * self.basis_a[i];
            block.angular[i] = axis;
            block.angular_ma[i] = obj_a.inertia * axis;
            block.angular_mb[i] = -(obj_b.inertia * axis);
            world_basis_b[i] = self.block_obj_b.rot * self.basis_b[i];
        }

        let errors = block.fixed_errors(&world_basis_b);
        let half_slop = SLOP * 0.5;
        for i in 0..2 {
            block.bias[i] = constraint::compute_bias(
                errors[i],
                half_slop,
                env.baumgarte_term,
                env.max_correction,
            );
        }

        let (x, y) = (block.angular[0], block.angular[1]);
        let xia = obj_a.inertia * x;
        let xib = obj_b.inertia * x;
        let yia = obj_a.inertia * y;
        let yib = obj_b.inertia * y;
        block.constraint_mass = Mat2::from_cols(
            Vec2::new(xia.dot(x) + xib.dot(x), yia.dot(x) + yib.dot(x)),
            Vec2::new(xia.dot(y) + xib.dot(y), yia.dot(y) + yib.dot(y)),
        )
        .inverse();

        self.linear_block.lambda_sum = Vec3::ZERO;
        self.linear_block.apply_impulse(
            self.linear_warm_start,
            &mut self.block_obj_a,
            &mut self.block_obj_b,
        );

        block.lambda_sum = self.angular_warm_start;
        for i in 0..2 {
            constraint::apply_angular_impulse(
                block.lambda_sum[i],
                block.angular_ma[i],
                block.angular_mb[i],
                &mut self.block_obj_a,
                &mut self.block_obj_b,
            );
        }

        let enforce_free = self.max_free_impulse > 0.0;
        let enforce_free_limits = self.max_rads > self.min_rads;
        if enforce_free || enforce_free_limits {
            block.free_angular = block.angular[0].cross(block.angular[1]);
            block.free_enforce_dir = EnforceState::EnforceBoth;

            block.bias[2] = 0.0;
            if enforce_free_limits {
                let mut free_error = block.free_error(self.last_free_error, world_basis_b[0]);
                self.last_free_error = free_error;
                block.free_enforce_dir = constraint::compute_angular_limit_error(
                    self.min_rads,
                    self.max_rads,
                    enforce_free,
                    &mut free_error,
                );

                if matches!(
                    block.free_enforce_dir,
                    EnforceState::EnforcePos | EnforceState::EnforceNeg
                ) {
                    block.bias[2] = -constraint::compute_bias(
                        free_error,
                        half_slop,
                        env.baumgarte_term,
                        env.max_correction,
                    );
                }
            }

            if block.free_enforce_dir != EnforceState::NoEnforce {
                // No cap configured means no cap at all
                block.free_max_sum = if self.max_free_impulse <= 0.0 {
                    f32::MAX
                } else {
                    self.max_free_impulse
                };

                block.free_angular_ma = obj_a.inertia * block.free_angular;
                let free_angular_b = -block.free_angular;
                block.free_angular_mb = obj_b.inertia * free_angular_b;

                block.free_mass = math::safe_divide(
                    1.0,
                    block.free_angular_ma.dot(block.free_angular)
                        + block.free_angular_mb.dot(free_angular_b),
                    math::EPSILON,
                );
                // Lambda carries the constraint mass, so the cap gets the
                // same scaling to stay comparable
                block.free_max_sum *= block.free_mass;

                constraint::apply_angular_impulse(
                    block.lambda_sum[2],
                    block.free_angular_ma,
                    block.free_angular_mb,
                    &mut self.block_obj_a,
                    &mut self.block_obj_b,
                );
            }
        } else {
            block.free_enforce_dir = EnforceState::NoEnforce;
        }

        self.block_obj_a.store_velocity(&mut objects[self.index_a]);
        self.block_obj_b.store_velocity(&mut objects[self.index_b]);
    }

    pub fn solve(&mut self, objects: &mut [LocalBody]) -> f32 {
        self.block_obj_a.load_velocity(&objects[self.index_a]);
        self.block_obj_b.load_velocity(&objects[self.index_b]);

        let mut result = self
            .linear_block
            .solve(&mut self.block_obj_a, &mut self.block_obj_b);

        let block = &mut self.angular_block;
        let ang_vel_diff = self.block_obj_a.ang_vel - self.block_obj_b.ang_vel;
        let jv = Vec2::new(block.angular[0].dot(ang_vel_diff), block.angular[1].dot(ang_vel_diff));
        let bias = Vec2::new(block.bias.x, block.bias.y) * 2.0;
        let lambda = block.constraint_mass * -(jv + bias);

        for i in 0..2 {
            let l = lambda[i];
            result += l.abs();
            block.lambda_sum[i] += l;
            constraint::apply_angular_impulse(
                l,
                block.angular_ma[i],
                block.angular_mb[i],
                &mut self.block_obj_a,
                &mut self.block_obj_b,
            );
        }

        if block.free_enforce_dir != EnforceState::NoEnforce {
            let free_jv = block
                .free_angular
                .dot(self.block_obj_a.ang_vel - self.block_obj_b.ang_vel);
            let mut free_lambda = constraint::compute_lambda(free_jv, block.bias.z, block.free_mass);
            result += free_lambda.abs();

            let (min_sum, max_sum) =
                constraint::compute_lambda_bounds(block.free_max_sum, block.free_enforce_dir);
            constraint::clamp_lambda(&mut free_lambda, &mut block.lambda_sum[2], min_sum, max_sum);
            constraint::apply_angular_impulse(
                free_lambda,
                block.free_angular_ma,
                block.free_angular_mb,
                &mut self.block_obj_a,
                &mut self.block_obj_b,
            );
        }

        self.block_obj_a.store_velocity(&mut objects[self.index_a]);
        self.block_obj_b.store_velocity(&mut objects[self.index_b]);
        result
    }

    pub fn last_iteration(&mut self) {
        self.linear_warm_start = self.linear_block.lambda_sum;
        self.angular_warm_start = self.angular_block.lambda_sum;
    }

    pub fn store(&self, owner: &mut RevoluteConstraint) {
        owner.linear_warm_start = self.linear_warm_start;
        owner.angular_warm_start = self.angular_warm_start;
        owner.last_free_error = self.last_free_error;
    }
}

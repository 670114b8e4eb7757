use glam::{Mat3, Vec3};

use crate::dynamics::constraint::{
    self, BodyBlock, ConstraintHandle, ConstraintPair, LinearBlock, LocalBody, SolverEnv,
};

/// Locks the relative pose of two bodies to whatever it was when
/// `lock_relative_transform` ran.
pub struct WeldConstraint {
    pub pair: ConstraintPair,
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
    /// Two model-space reference axes per body; aligning both pairs pins all
    /// three rotational degrees of freedom.
    pub basis_a: [Vec3; 2],
    pub basis_b: [Vec3; 2],
    pub linear_warm_start: Vec3,
    pub angular_warm_start: Vec3,
}

impl WeldConstraint {
    /// Capture the current relative transform as the target. The shared
    /// pivot sits at the pair's center of mass, which behaves most like a
    /// single composite body.
    pub fn lock_relative_transform(&mut self, a: &LocalBody, b: &LocalBody) {
        let com = if a.inv_mass == 0.0 {
            a.pos
        } else if b.inv_mass == 0.0 {
            b.pos
        } else {
            let mass_a = 1.0 / a.inv_mass;
            let mass_b = 1.0 / b.inv_mass;
            (a.pos * mass_a + b.pos * mass_b) / (mass_a + mass_b)
        };
        self.anchor_a = a.world_to_model_point(com);
        self.anchor_b = b.world_to_model_point(com);

        let rot_a = Mat3::from_quat(a.rot.inverse());
        let rot_b = Mat3::from_quat(b.rot.inverse());
        // Model-space cardinal X and Y; any two orthogonal axes would do
        for i in 0..2 {
            self.basis_a[i] = rot_a.col(i);
            self.basis_b[i] = rot_b.col(i);
        }
    }
}

/// Three angular rows over the cardinal axes holding relative orientation.
#[derive(Debug, Clone, Copy, Default)]
struct FixedAngleBlock {
    angular_ma: [Vec3; 3],
    angular_mb: [Vec3; 3],
    bias: Vec3,
    constraint_mass: Mat3,
    lambda_sum: Vec3,
}

impl FixedAngleBlock {
    const SLOP: f32 = 0.01;

    fn setup(
        &mut self,
        a: &BodyBlock,
        b: &BodyBlock,
        basis_a: &[Vec3; 2],
        basis_b: &[Vec3; 2],
        inertia_a: &Mat3,
        inertia_b: &Mat3,
        env: &SolverEnv,
    ) {
        for i in 0..3 {
            self.angular_ma[i] = inertia_a.col(i);
            self.angular_mb[i] = -inertia_b.col(i);
        }
        // Cardinal-axis jacobian reduces the constraint mass to the summed
        // inverse inertias
        self.constraint_mass = (*inertia_a + *inertia_b).inverse();

        let rot_a = Mat3::from_quat(a.rot);
        let rot_b = Mat3::from_quat(b.rot);
        let mut angular_error = Vec3::ZERO;
        for i in 0..2 {
            let world_ref_a = rot_a * basis_a[i];
            let world_ref_b = rot_b * basis_b[i];
            angular_error -= world_ref_a.cross(world_ref_b);
        }

        let half_slop = Self::SLOP * 0.5;
        for i in 0..3 {
            self.bias[i] = constraint::compute_bias(
                angular_error[i],
                half_slop,
                env.baumgarte_term,
                env.max_correction,
            );
        }
        self.lambda_sum = Vec3::ZERO;
    }

    fn apply_impulse(&mut self, lambda: Vec3, a: &mut BodyBlock, b: &mut BodyBlock) {
        for i in 0..3 {
            constraint::apply_angular_impulse(
                lambda[i],
                self.angular_ma[i],
                self.angular_mb[i],
                a,
                b,
            );
        }
        self.lambda_sum += lambda;
    }

    fn solve(&mut self, a: &mut BodyBlock, b: &mut BodyBlock) -> f32 {
        // Cardinal x,y,z angular rows collapse J*v to the velocity difference
        let jv = a.ang_vel - b.ang_vel;
        let lambda = constraint::compute_lambda3(jv, self.bias, &self.constraint_mass);
        self.apply_impulse(lambda, a, b);
        lambda.x.abs() + lambda.y.abs() + lambda.z.abs()
    }
}

pub struct LocalWeldConstraint {
    pub owner: ConstraintHandle,
    pub index_a: usize,
    pub index_b: usize,
    anchor_a: Vec3,
    anchor_b: Vec3,
    basis_a: [Vec3; 2],
    basis_b: [Vec3; 2],
    linear_warm_start: Vec3,
    angular_warm_start: Vec3,
    block_obj_a: BodyBlock,
    block_obj_b: BodyBlock,
    linear_block: LinearBlock,
    angular_block: FixedAngleBlock,
}

impl LocalWeldConstraint {
    pub fn new(owner: &WeldConstraint, index_a: usize, index_b: usize) -> Self {
        Self {
            owner: owner.pair.handle,
            index_a,
            index_b,
            anchor_a: owner.anchor_a,
            anchor_b: owner.anchor_b,
            basis_a: owner.basis_a,
            basis_b: owner.basis_b,
            linear_warm_start: owner.linear_warm_start,
            angular_warm_start: owner.angular_warm_start,
            block_obj_a: BodyBlock::default(),
            block_obj_b: BodyBlock::default(),
            linear_block: LinearBlock::default(),
            angular_block: FixedAngleBlock::default(),
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
            &self.block_obj_a,
            &self.block_obj_b,
            &self.basis_a,
            &self.basis_b,
            &obj_a.inertia,
            &obj_b.inertia,
            env,
        );

        self.linear_block.apply_impulse(
            self.linear_warm_start,
            &mut self.block_obj_a,
            &mut self.block_obj_b,
        );
        self.angular_block.apply_impulse(
            self.angular_warm_start,
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
            .linear_block
            .solve(&mut self.block_obj_a, &mut self.block_obj_b);
        result += self
            .angular_block
            .solve(&mut self.block_obj_a, &mut self.block_obj_b);

        self.block_obj_a.store_velocity(&mut objects[self.index_a]);
        self.block_obj_b.store_velocity(&mut objects[self.index_b]);
        result
    }

    pub fn last_iteration(&mut self) {
        self.linear_warm_start = self.linear_block.lambda_sum;
        self.angular_warm_start = self.angular_block.lambda_sum;
    }

    pub fn store(&self, owner: &mut WeldConstraint) {
        owner.linear_warm_start = self.linear_warm_start;
        owner.angular_warm_start = self.angular_warm_start;
    }
}

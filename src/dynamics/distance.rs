use glam::Vec3;

use crate::dynamics::constraint::{
    self, BodyBlock, ConstraintHandle, ConstraintPair, Jacobian, LocalBody, SolverEnv,
};
use crate::utils::math;

pub const SLOP: f32 = 0.05;

/// Keeps two local anchor points a fixed distance apart.
pub struct DistanceConstraint {
    pub pair: ConstraintPair,
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
    pub distance: f32,
    pub warm_start: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct DistanceBlock {
    obj_a: BodyBlock,
    obj_b: BodyBlock,
    /// Constraint axis plus angular rows; linear B is the negated axis.
    linear: Vec3,
    angular_a: Vec3,
    angular_b: Vec3,
    /// Premultiplied by the inverse masses.
    jm: Jacobian,
    bias: f32,
    constraint_mass: f32,
    lambda_sum: f32,
}

pub struct LocalDistanceConstraint {
    pub owner: ConstraintHandle,
    pub index_a: usize,
    pub index_b: usize,
    anchor_a: Vec3,
    anchor_b: Vec3,
    distance: f32,
    warm_start: f32,
    block: DistanceBlock,
}

impl LocalDistanceConstraint {
    pub fn new(owner: &DistanceConstraint, index_a: usize, index_b: usize) -> Self {
        Self {
            owner: owner.pair.handle,
            index_a,
            index_b,
            anchor_a: owner.anchor_a,
            anchor_b: owner.anchor_b,
            distance: owner.distance,
            warm_start: owner.warm_start,
            block: DistanceBlock::default(),
        }
    }

    pub fn first_iteration(&mut self, objects: &mut [LocalBody], env: &SolverEnv) {
        let obj_a = objects[self.index_a];
        let obj_b = objects[self.index_b];
        self.block.obj_a.set(&obj_a);
        self.block.obj_b.set(&obj_b);

        let world_a = obj_a.model_to_world_point(self.anchor_a);
        let world_b = obj_b.model_to_world_point(self.anchor_b);
        let ra = world_a - obj_a.pos;
        let rb = world_b - obj_b.pos;

        self.block.linear = world_a - world_b;
        let length = self.block.linear.length();
        if length < math::EPSILON {
            // Coincident anchors leave no direction to resolve along
            self.block.linear = Vec3::Y;
        } else {
            self.block.linear *= 1.0 / length;
        }

        self.block.bias = constraint::compute_bias(
            length - self.distance,
            SLOP * 0.5,
            env.baumgarte_term,
            env.max_correction,
        );

        let linear_b = -self.block.linear;
        self.block.angular_a = ra.cross(self.block.linear);
        self.block.angular_b = rb.cross(linear_b);

        self.block.jm.linear_a = obj_a.inv_mass * self.block.linear;
        self.block.jm.linear_b = -obj_b.inv_mass * self.block.linear;
        self.block.jm.angular_a = obj_a.inertia * self.block.angular_a;
        self.block.jm.angular_b = obj_b.inertia * self.block.angular_b;
        self.block.constraint_mass = math::safe_divide(
            1.0,
            obj_a.inv_mass
                + obj_b.inv_mass
                + self.block.angular_a.dot(self.block.jm.angular_a)
                + self.block.angular_b.dot(self.block.jm.angular_b),
            math::EPSILON,
        );

        self.block.lambda_sum = self.warm_start;
        constraint::apply_impulse(
            self.block.lambda_sum,
            self.block.jm.linear_a,
            self.block.jm.angular_a,
            self.block.jm.linear_b,
            self.block.jm.angular_b,
            &mut self.block.obj_a,
            &mut self.block.obj_b,
        );
        self.block.obj_a.store_velocity(&mut objects[self.index_a]);
        self.block.obj_b.store_velocity(&mut objects[self.index_b]);
    }

    pub fn solve(&mut self, objects: &mut [LocalBody]) -> f32 {
        self.block.obj_a.load_velocity(&objects[self.index_a]);
        self.block.obj_b.load_velocity(&objects[self.index_b]);

        let jv = constraint::compute_jv(
            self.block.linear,
            self.block.angular_a,
            -self.block.linear,
            self.block.angular_b,
            &self.block.obj_a,
            &self.block.obj_b,
        );
        let lambda = constraint::compute_lambda(jv, self.block.bias, self.block.constraint_mass);
        self.block.lambda_sum += lambda;
        constraint::apply_impulse(
            lambda,
            self.block.jm.linear_a,
            self.block.jm.angular_a,
            self.block.jm.linear_b,
            self.block.jm.angular_b,
            &mut self.block.obj_a,
            &mut self.block.obj_b,
        );

        self.block.obj_a.store_velocity(&mut objects[self.index_a]);
        self.block.obj_b.store_velocity(&mut objects[self.index_b]);
        lambda.abs()
    }

    pub fn last_iteration(&mut self) {
        self.warm_start = self.block.lambda_sum;
    }

    pub fn store(&self, owner: &mut DistanceConstraint) {
        owner.warm_start = self.warm_start;
    }
}

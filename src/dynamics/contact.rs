use glam::Vec3;

use crate::collision::manifold::{ContactPoint, Manifold, MAX_CONTACTS};
use crate::dynamics::constraint::{
    self, BodyBlock, ConstraintPair, LocalBody, SolverEnv,
};
use crate::utils::math;

pub const POSITION_SLOP: f32 = 0.01;

/// Contact constraint owning the persistent manifold for one collider pair.
pub struct ContactConstraint {
    pub pair: ConstraintPair,
    pub manifold: Manifold,
    /// Seconds since the manifold last had an overlapping point.
    pub inactive_time: f32,
    /// Combined friction coefficient of the two collider materials.
    pub friction: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct ContactBlock {
    normal: Vec3,
    /// Normal premultiplied by each body's inverse mass, B negated.
    normal_tmass: [Vec3; 2],
    r_cross_na: [Vec3; MAX_CONTACTS],
    r_cross_nb: [Vec3; MAX_CONTACTS],
    r_cross_na_tinertia: [Vec3; MAX_CONTACTS],
    r_cross_nb_tinertia: [Vec3; MAX_CONTACTS],
    contact_mass: [f32; MAX_CONTACTS],
    penetration_bias: [f32; MAX_CONTACTS],
    lambda_sum: [f32; MAX_CONTACTS],
    enforce: [bool; MAX_CONTACTS],
}

#[derive(Debug, Clone, Copy, Default)]
struct FrictionAxisBlock {
    axis: Vec3,
    linear_a: Vec3,
    linear_b: Vec3,
    r_cross_axis_a: [Vec3; MAX_CONTACTS],
    r_cross_axis_b: [Vec3; MAX_CONTACTS],
    angular_a: [Vec3; MAX_CONTACTS],
    angular_b: [Vec3; MAX_CONTACTS],
    constraint_mass: [f32; MAX_CONTACTS],
    lambda_sum: [f32; MAX_CONTACTS],
}

#[derive(Debug, Clone, Copy, Default)]
struct FrictionBlock {
    axes: [FrictionAxisBlock; 2],
    /// Normal sums the friction bounds derive from, refreshed each sweep.
    contact_lambda_sum: [f32; MAX_CONTACTS],
    enforce: [bool; MAX_CONTACTS],
}

/// Island-local contact solve state: a snapshot of the manifold plus
/// premultiplied jacobian blocks.
pub struct LocalContactConstraint {
    pub owner: super::constraint::ConstraintHandle,
    pub index_a: usize,
    pub index_b: usize,
    block_obj_a: BodyBlock,
    block_obj_b: BodyBlock,
    contact_block: ContactBlock,
    friction_block: FrictionBlock,
    contacts: [ContactPoint; MAX_CONTACTS],
    size: usize,
    normal: Vec3,
    tangent_a: Vec3,
    tangent_b: Vec3,
    friction: f32,
    pub inactive_time: f32,
    pub should_remove: bool,
}

impl LocalContactConstraint {
    pub fn new(owner: &ContactConstraint, index_a: usize, index_b: usize) -> Self {
        let mut contacts = [ContactPoint::default(); MAX_CONTACTS];
        contacts[..owner.manifold.size].copy_from_slice(owner.manifold.points());
        Self {
            owner: owner.pair.handle,
            index_a,
            index_b,
            block_obj_a: BodyBlock::default(),
            block_obj_b: BodyBlock::default(),
            contact_block: ContactBlock::default(),
            friction_block: FrictionBlock::default(),
            contacts,
            size: owner.manifold.size,
            normal: owner.manifold.normal,
            tangent_a: owner.manifold.tangent_a,
            tangent_b: owner.manifold.tangent_b,
            friction: owner.friction,
            inactive_time: owner.inactive_time,
            should_remove: owner.pair.should_remove,
        }
    }

    pub fn first_iteration(&mut self, objects: &mut [LocalBody], env: &SolverEnv) {
        let obj_a = objects[self.index_a];
        let obj_b = objects[self.index_b];
        self.block_obj_a.set(&obj_a);
        self.block_obj_b.set(&obj_b);

        self.setup_contact_jacobian(&obj_a, &obj_b, env);
        self.setup_friction_jacobian(&obj_a, &obj_b);

        self.block_obj_a.store_velocity(&mut objects[self.index_a]);
        self.block_obj_b.store_velocity(&mut objects[self.index_b]);
    }

    fn setup_contact_jacobian(&mut self, obj_a: &LocalBody, obj_b: &LocalBody, env: &SolverEnv) {
        // The row math expects a normal pointing away from A; the manifold
        // stores the opposite
        let normal_b = -self.normal;
        let normal_a = self.normal;
        self.contact_block.normal = normal_a;
        self.contact_block.normal_tmass[0] = normal_a * obj_a.inv_mass;
        self.contact_block.normal_tmass[1] = normal_b * obj_b.inv_mass;

        // The linear mass is shared by every point because they share the
        // normal
        let linear_mass = obj_a.inv_mass + obj_b.inv_mass;
        let block = &mut self.contact_block;

        for i in 0..self.size {
            block.lambda_sum[i] = 0.0;
            let c = &self.contacts[i];
            block.r_cross_na[i] = -((c.obj_a.current_world - self.block_obj_a.pos).cross(normal_b));
            block.r_cross_nb[i] = (c.obj_b.current_world - self.block_obj_b.pos).cross(normal_b);
            block.r_cross_na_tinertia[i] = obj_a.inertia * block.r_cross_na[i];
            block.r_cross_nb_tinertia[i] = obj_b.inertia * block.r_cross_nb[i];

            let angular_mass = block.r_cross_na_tinertia[i].dot(block.r_cross_na[i])
                + block.r_cross_nb_tinertia[i].dot(block.r_cross_nb[i]);
            block.contact_mass[i] =
                math::safe_divide(1.0, linear_mass + angular_mass, math::EPSILON);

            block.enforce[i] = c.penetration > 0.0;
            // Position error is always negative here
            let pos_error = -c.penetration.max(0.0);
            block.penetration_bias[i] = constraint::compute_bias_neg(
                pos_error,
                POSITION_SLOP * 0.5,
                env.baumgarte_term,
                env.max_correction,
            );

            if block.enforce[i] {
                self.inactive_time = 0.0;
                if c.warm_contact != 0.0 {
                    constraint::apply_impulse(
                        c.warm_contact,
                        block.normal_tmass[0],
                        block.r_cross_na_tinertia[i],
                        block.normal_tmass[1],
                        block.r_cross_nb_tinertia[i],
                        &mut self.block_obj_a,
                        &mut self.block_obj_b,
                    );
                    block.lambda_sum[i] = c.warm_contact;
                }
            }
        }
        for i in self.size..MAX_CONTACTS {
            block.enforce[i] = false;
        }

        self.inactive_time += env.dt;
        if self.inactive_time > env.time_to_remove {
            self.should_remove = true;
        }
    }

    fn setup_friction_jacobian(&mut self, obj_a: &LocalBody, obj_b: &LocalBody) {
        for axis in 0..2 {
            let dir = if axis == 0 { self.tangent_a } else { self.tangent_b };
            let block = &mut self.friction_block.axes[axis];

            let axis_a = -dir;
            let axis_b = dir;
            block.axis = axis_a;
            block.linear_a = axis_a * obj_a.inv_mass;
            block.linear_b = axis_b * obj_b.inv_mass;

            let linear_mass = axis_a.dot(block.linear_a) + axis_b.dot(block.linear_b);

            for i in 0..self.size {
                let c = &self.contacts[i];
                block.r_cross_axis_a[i] =
                    -((c.obj_a.current_world - self.block_obj_a.pos).cross(dir));
                block.r_cross_axis_b[i] =
                    (c.obj_b.current_world - self.block_obj_b.pos).cross(dir);
                block.angular_a[i] = obj_a.inertia * block.r_cross_axis_a[i];
                block.angular_b[i] = obj_b.inertia * block.r_cross_axis_b[i];

                let angular_mass = block.r_cross_axis_a[i].dot(block.angular_a[i])
                    + block.r_cross_axis_b[i].dot(block.angular_b[i]);
                block.constraint_mass[i] =
                    math::safe_divide(1.0, linear_mass + angular_mass, math::EPSILON);

                block.lambda_sum[i] = 0.0;
                let warm_start = c.warm_friction[axis];
                if warm_start != 0.0 && self.contact_block.enforce[i] {
                    constraint::apply_impulse(
                        warm_start,
                        block.linear_a,
                        block.angular_a[i],
                        block.linear_b,
                        block.angular_b[i],
                        &mut self.block_obj_a,
                        &mut self.block_obj_b,
                    );
                    block.lambda_sum[i] = warm_start;
                }
            }
        }

        for i in 0..MAX_CONTACTS {
            self.friction_block.enforce[i] = self.contact_block.enforce[i];
            self.friction_block.contact_lambda_sum[i] = self.contact_block.lambda_sum[i];
        }
    }

    pub fn solve(&mut self, objects: &mut [LocalBody]) -> f32 {
        self.friction_block.contact_lambda_sum = self.contact_block.lambda_sum;
        self.block_obj_a.load_velocity(&objects[self.index_a]);
        self.block_obj_b.load_velocity(&objects[self.index_b]);

        let mut result = 0.0;
        // Friction first: it matters less, and the last solved row wins
        for i in 0..MAX_CONTACTS {
            if self.friction_block.enforce[i] {
                result += self.solve_friction(i);
            }
        }
        for i in 0..MAX_CONTACTS {
            if self.contact_block.enforce[i] {
                result += self.solve_contact(i);
            }
        }

        self.block_obj_a.store_velocity(&mut objects[self.index_a]);
        self.block_obj_b.store_velocity(&mut objects[self.index_b]);
        result
    }

    fn solve_contact(&mut self, i: usize) -> f32 {
        let block = &mut self.contact_block;
        let jv = constraint::compute_jv(
            block.normal,
            block.r_cross_na[i],
            -block.normal,
            block.r_cross_nb[i],
            &self.block_obj_a,
            &self.block_obj_b,
        );
        let mut lambda =
            constraint::compute_lambda(jv, block.penetration_bias[i], block.contact_mass[i]);
        // Contacts push apart, never pull together
        constraint::clamp_lambda_min(&mut lambda, &mut block.lambda_sum[i], 0.0);
        constraint::apply_impulse(
            lambda,
            block.normal_tmass[0],
            block.r_cross_na_tinertia[i],
            block.normal_tmass[1],
            block.r_cross_nb_tinertia[i],
            &mut self.block_obj_a,
            &mut self.block_obj_b,
        );
        lambda.abs()
    }

    fn solve_friction(&mut self, i: usize) -> f32 {
        let lambda_limit = self.friction_block.contact_lambda_sum[i] * self.friction;
        let mut lower_bound = -lambda_limit;
        let mut upper_bound = lambda_limit;
        if upper_bound < 0.0 {
            std::mem::swap(&mut lower_bound, &mut upper_bound);
        }

        let mut result = 0.0;
        for axis in 0..2 {
            let block = &mut self.friction_block.axes[axis];
            let jv = constraint::compute_jv(
                block.axis,
                block.r_cross_axis_a[i],
                -block.axis,
                block.r_cross_axis_b[i],
                &self.block_obj_a,
                &self.block_obj_b,
            );
            // No bias term on friction
            let mut lambda = constraint::compute_lambda_no_bias(jv, block.constraint_mass[i]);
            // Friction cannot work harder than the normal force
            constraint::clamp_lambda(&mut lambda, &mut block.lambda_sum[i], lower_bound, upper_bound);
            constraint::apply_impulse(
                lambda,
                block.linear_a,
                block.angular_a[i],
                block.linear_b,
                block.angular_b[i],
                &mut self.block_obj_a,
                &mut self.block_obj_b,
            );
            result += lambda.abs();
        }
        result
    }

    /// Store the accumulated impulses back for next step's warm start.
    pub fn last_iteration(&mut self) {
        for i in 0..MAX_CONTACTS {
            let c = &mut self.contacts[i];
            if !self.contact_block.enforce[i] {
                c.warm_contact = 0.0;
                c.warm_friction = [0.0; 2];
            } else {
                c.warm_contact = self.contact_block.lambda_sum[i];
                c.warm_friction[0] = self.friction_block.axes[0].lambda_sum[i];
                c.warm_friction[1] = self.friction_block.axes[1].lambda_sum[i];
            }
        }
    }

    /// Write warm starts and the inactivity timer back to the owner.
    pub fn store(&self, owner: &mut ContactConstraint) {
        owner.inactive_time = self.inactive_time;
        owner.pair.should_remove = self.should_remove;
        for (stored, local) in owner
            .manifold
            .contacts
            .iter_mut()
            .zip(self.contacts.iter())
            .take(self.size.min(owner.manifold.size))
        {
            stored.warm_contact = local.warm_contact;
            stored.warm_friction = local.warm_friction;
        }
    }
}

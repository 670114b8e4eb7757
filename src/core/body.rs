use std::collections::HashSet;

use glam::{Mat3, Quat, Vec3};

use crate::core::collider::Collider;
use crate::core::shape::ShapeRegistry;
use crate::core::types::Transform;
use crate::dynamics::constraint::ConstraintHandle;
use crate::utils::allocator::EntityId;
use crate::utils::math;

pub type BodyHandle = EntityId;

/// Dynamic state of a body. Absent on static bodies.
#[derive(Debug, Clone)]
pub struct Rigidbody {
    pub lin_vel: Vec3,
    pub ang_vel: Vec3,
    pub inv_mass: f32,
    /// Inverse principal moments in model space.
    pub local_inertia: Vec3,
    /// World-space inverse inertia, refreshed whenever orientation changes.
    pub inv_inertia: Mat3,
    pub kinematic: bool,
    /// Per-axis angular locks; a locked axis never picks up angular velocity.
    pub angular_locks: [bool; 3],
}

impl Default for Rigidbody {
    fn default() -> Self {
        Self {
            lin_vel: Vec3::ZERO,
            ang_vel: Vec3::ZERO,
            inv_mass: 1.0,
            local_inertia: Vec3::ONE,
            inv_inertia: Mat3::IDENTITY,
            kinematic: false,
            angular_locks: [false; 3],
        }
    }
}

/// A simulated object: pose plus optional dynamics and optional collision
/// geometry. A body without a rigidbody is static and never integrates.
pub struct Body {
    pub transform: Transform,
    pub rigidbody: Option<Rigidbody>,
    pub collider: Option<Collider>,
    asleep: bool,
    enabled: bool,
    constraints: HashSet<ConstraintHandle>,
}

impl Body {
    pub fn new(has_rigidbody: bool, collider: Option<Collider>) -> Self {
        Self {
            transform: Transform::default(),
            rigidbody: has_rigidbody.then(Rigidbody::default),
            collider,
            asleep: false,
            enabled: true,
            constraints: HashSet::new(),
        }
    }

    pub fn is_static(&self) -> bool {
        self.rigidbody.is_none()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn asleep(&self) -> bool {
        self.asleep
    }

    pub fn set_asleep(&mut self, asleep: bool) {
        self.asleep = asleep;
    }

    pub fn should_integrate(&self) -> bool {
        self.enabled && !self.asleep && self.rigidbody.is_some()
    }

    /// Below the energy thresholds once the gravity just added by velocity
    /// integration is factored back out.
    pub fn is_inactive(&self, gravity_step: Vec3) -> bool {
        const LINEAR_THRESHOLD_SQ: f32 = 0.001;
        const ANGULAR_THRESHOLD_SQ: f32 = 0.00001;
        match &self.rigidbody {
            None => true,
            Some(rb) => {
                (rb.lin_vel - gravity_step).length_squared() < LINEAR_THRESHOLD_SQ
                    && rb.ang_vel.length_squared() < ANGULAR_THRESHOLD_SQ
            }
        }
    }

    pub fn constraints(&self) -> &HashSet<ConstraintHandle> {
        &self.constraints
    }

    pub fn add_constraint(&mut self, handle: ConstraintHandle) {
        self.constraints.insert(handle);
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) {
        self.constraints.remove(&handle);
    }

    /// Mass and inertia from the collider's shape at the body's scale,
    /// scaled by material density. Bodies without colliders keep identity
    /// values so they can still move under velocity.
    pub fn calculate_mass(&mut self, shapes: &ShapeRegistry) {
        let Some(rb) = self.rigidbody.as_mut() else {
            return;
        };
        let Some(collider) = self.collider.as_ref() else {
            rb.inv_mass = 1.0;
            rb.local_inertia = Vec3::ONE;
            rb.update_inertia(self.transform.rotation);
            return;
        };

        let mut info = shapes.compute_mass(collider.shape, self.transform.scale);
        let density = collider.material.density;
        info.mass *= density;
        info.inertia *= density;

        // No epsilon here: tiny masses are still valid, only zero is not
        rb.inv_mass = math::safe_divide(1.0, info.mass, 0.0);
        rb.local_inertia = Vec3::new(
            math::safe_divide(1.0, info.inertia.x, 0.0),
            math::safe_divide(1.0, info.inertia.y, 0.0),
            math::safe_divide(1.0, info.inertia.z, 0.0),
        );
        if rb.kinematic {
            rb.inv_mass = 0.0;
            rb.local_inertia = Vec3::ZERO;
        }
        rb.update_inertia(self.transform.rotation);
    }

    pub fn integrate_velocity(&mut self, gravity: Vec3, dt: f32) {
        let Some(rb) = self.rigidbody.as_mut() else {
            return;
        };
        if rb.inv_mass < math::EPSILON {
            return;
        }
        // Other acceleration sources would accumulate here; gravity is the
        // only one
        rb.lin_vel += gravity * dt;
    }

    pub fn integrate_position(&mut self, dt: f32) {
        let rotation = self.transform.rotation;
        let Some(rb) = self.rigidbody.as_mut() else {
            return;
        };
        self.transform.position += rb.lin_vel * dt;

        let spin = (Quat::from_xyzw(rb.ang_vel.x, rb.ang_vel.y, rb.ang_vel.z, 0.0) * rotation) * 0.5;
        self.transform.rotation = (rotation + spin * dt).normalize();

        rb.update_inertia(self.transform.rotation);
    }
}

impl Rigidbody {
    /// Rotate the model-space inverse inertia into world space. Locked axes
    /// contribute nothing.
    pub fn update_inertia(&mut self, rotation: Quat) {
        let mut diagonal = self.local_inertia;
        for i in 0..3 {
            if self.angular_locks[i] {
                diagonal[i] = 0.0;
            }
        }
        let rot = Mat3::from_quat(rotation);
        self.inv_inertia = rot * Mat3::from_diagonal(diagonal) * rot.transpose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn static_bodies_never_integrate() {
        let mut body = Body::new(false, None);
        body.transform.position = Vec3::new(0.0, 5.0, 0.0);
        body.integrate_velocity(Vec3::new(0.0, -10.0, 0.0), 1.0 / 60.0);
        body.integrate_position(1.0 / 60.0);
        assert_eq!(body.transform.position.y, 5.0);
        assert!(body.is_inactive(Vec3::ZERO));
    }

    #[test]
    fn velocity_integration_adds_gravity_only() {
        let mut body = Body::new(true, None);
        body.integrate_velocity(Vec3::new(0.0, -10.0, 0.0), 0.1);
        let rb = body.rigidbody.as_ref().expect("dynamic body");
        assert_relative_eq!(rb.lin_vel.y, -1.0);
        assert_eq!(rb.ang_vel, Vec3::ZERO);
    }

    #[test]
    fn inactivity_subtracts_the_integrated_gravity_delta() {
        let gravity_step = Vec3::new(0.0, -10.0 / 60.0, 0.0);
        let mut body = Body::new(true, None);
        body.rigidbody.as_mut().expect("dynamic body").lin_vel = gravity_step;
        assert!(body.is_inactive(gravity_step));
        body.rigidbody.as_mut().expect("dynamic body").lin_vel = Vec3::new(1.0, 0.0, 0.0);
        assert!(!body.is_inactive(gravity_step));
    }

    #[test]
    fn angular_lock_zeroes_world_inertia_axis() {
        let mut rb = Rigidbody {
            angular_locks: [false, true, false],
            ..Rigidbody::default()
        };
        rb.update_inertia(Quat::IDENTITY);
        assert_eq!(rb.inv_inertia.y_axis.y, 0.0);
        assert_relative_eq!(rb.inv_inertia.x_axis.x, 1.0);
    }

    #[test]
    fn position_integration_keeps_rotation_normalized() {
        let mut body = Body::new(true, None);
        body.rigidbody.as_mut().expect("dynamic body").ang_vel = Vec3::new(3.0, 1.0, -2.0);
        for _ in 0..10 {
            body.integrate_position(1.0 / 60.0);
        }
        assert_relative_eq!(body.transform.rotation.length(), 1.0, epsilon = 1e-5);
    }
}

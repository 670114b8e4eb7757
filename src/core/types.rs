use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::utils::math;

/// Position, orientation, and non-uniform scale of an entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    pub fn model_to_world(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }

    pub fn world_to_model(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.position)) * self.scale.recip()
    }

    /// Precomposed model-to-world transformer.
    pub fn to_world(&self) -> Transformer {
        Transformer {
            scale_rot: Mat3::from_quat(self.rotation) * Mat3::from_diagonal(self.scale),
            pos: self.position,
        }
    }

    /// Precomposed world-to-model transformer.
    pub fn to_model(&self) -> Transformer {
        let inv_rot = Mat3::from_quat(self.rotation.inverse());
        let inv_scale = Mat3::from_diagonal(self.scale.recip());
        Transformer {
            scale_rot: inv_scale * inv_rot,
            pos: inv_scale * (inv_rot * -self.position),
        }
    }
}

/// Flattened affine transform: a scale-rotation matrix plus a translation.
/// Composite and environment traversal pass these by value so nested shapes
/// never pay for repeated quaternion decomposition.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    pub scale_rot: Mat3,
    pub pos: Vec3,
}

impl Default for Transformer {
    fn default() -> Self {
        Self {
            scale_rot: Mat3::IDENTITY,
            pos: Vec3::ZERO,
        }
    }
}

impl Transformer {
    pub fn new(scale_rot: Mat3, pos: Vec3) -> Self {
        Self { scale_rot, pos }
    }

    /// Applies `first`, then `second`.
    pub fn combined(first: &Transformer, second: &Transformer) -> Transformer {
        Transformer {
            scale_rot: second.scale_rot * first.scale_rot,
            pos: second.scale_rot * first.pos + second.pos,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.scale_rot * point + self.pos
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.scale_rot * vector
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// Mass, center of mass, and diagonal inertia produced by shape integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MassInfo {
    pub mass: f32,
    pub center_of_mass: Vec3,
    /// Principal moments in model space.
    pub inertia: Vec3,
}

/// Surface and density coefficients shared between colliders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub density: f32,
    pub restitution: f32,
    pub friction: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            restitution: 0.0,
            friction: 0.9,
        }
    }
}

impl Material {
    pub fn with_density(density: f32) -> Self {
        Self {
            density: density.max(0.0),
            ..Self::default()
        }
    }
}

/// Orthonormal basis around `normal`, used for friction tangents.
pub fn basis_from_normal(normal: Vec3) -> (Vec3, Vec3) {
    let least = math::least_significant_axis(normal);
    let mut cardinal = Vec3::ZERO;
    cardinal[least] = 1.0;
    let tangent_a = normal.cross(cardinal).normalize_or_zero();
    let tangent_b = normal.cross(tangent_a);
    (tangent_a, tangent_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn world_to_model_inverts_model_to_world() {
        let transform = Transform {
            position: Vec3::new(1.0, -2.0, 3.0),
            rotation: Quat::from_rotation_y(0.8) * Quat::from_rotation_x(-0.3),
            scale: Vec3::new(2.0, 0.5, 1.5),
        };
        let point = Vec3::new(0.3, 0.7, -0.2);
        let round_trip = transform.world_to_model(transform.model_to_world(point));
        assert_relative_eq!(round_trip.x, point.x, epsilon = 1e-5);
        assert_relative_eq!(round_trip.y, point.y, epsilon = 1e-5);
        assert_relative_eq!(round_trip.z, point.z, epsilon = 1e-5);
    }

    #[test]
    fn transformer_composition_matches_nested_transforms() {
        let parent = Transform {
            position: Vec3::new(0.0, 1.0, 0.0),
            rotation: Quat::from_rotation_z(0.4),
            scale: Vec3::splat(2.0),
        };
        let child = Transform {
            position: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::from_rotation_y(-0.6),
            scale: Vec3::ONE,
        };

        let combined = Transformer::combined(&child.to_world(), &parent.to_world());
        let point = Vec3::new(0.2, -0.1, 0.5);
        let expected = parent.model_to_world(child.model_to_world(point));
        let got = combined.transform_point(point);
        assert_relative_eq!(got.x, expected.x, epsilon = 1e-4);
        assert_relative_eq!(got.y, expected.y, epsilon = 1e-4);
        assert_relative_eq!(got.z, expected.z, epsilon = 1e-4);
    }

    #[test]
    fn friction_basis_is_orthonormal() {
        for normal in [Vec3::Y, Vec3::new(0.6, 0.8, 0.0), Vec3::new(-0.3, 0.1, 0.9).normalize()] {
            let (ta, tb) = basis_from_normal(normal);
            assert_relative_eq!(ta.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(tb.length(), 1.0, epsilon = 1e-5);
            assert!(ta.dot(normal).abs() < 1e-5);
            assert!(tb.dot(normal).abs() < 1e-5);
            assert!(ta.dot(tb).abs() < 1e-5);
        }
    }
}

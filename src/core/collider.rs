use crate::collision::aabb::Aabb;
use crate::collision::broadphase::{NodeHandle, NULL_NODE};
use crate::core::material::MaterialHandle;
use crate::core::shape::{InstanceHandle, ShapeHandle};
use crate::core::types::Material;

/// Collision geometry attached to a body: a shape reference, a local copy of
/// the material values, and the cached world bounds plus broadphase entry.
#[derive(Debug, Clone)]
pub struct Collider {
    pub shape: ShapeHandle,
    /// Snapshot of the material values; safe to read even after the source
    /// material was scheduled for deletion.
    pub material: Material,
    pub material_handle: MaterialHandle,
    /// Identity used to key manifolds for this collider's root shape.
    pub instance: InstanceHandle,
    pub world_aabb: Aabb,
    pub broad_handle: NodeHandle,
    pub enabled: bool,
}

impl Collider {
    pub fn new(shape: ShapeHandle, instance: InstanceHandle) -> Self {
        Self {
            shape,
            material: Material::default(),
            material_handle: MaterialHandle::default(),
            instance,
            world_aabb: Aabb::default(),
            broad_handle: NULL_NODE,
            enabled: true,
        }
    }

    pub fn in_broadphase(&self) -> bool {
        self.broad_handle != NULL_NODE
    }
}

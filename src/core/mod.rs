//! Core data model: transforms, bodies, colliders, shapes, materials.

pub mod body;
pub mod collider;
pub mod material;
pub mod shape;
pub mod types;

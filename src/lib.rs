//! Kinetica – a 3D rigid-body physics engine for Rust.
//!
//! The crate advances a world of rigid bodies through fixed timesteps:
//! a dynamic AABB tree broadphase feeds GJK/EPA-based narrowphase contact
//! generation into persistent four-point manifolds, the constraint graph is
//! partitioned into islands with sleep tracking, and each island is solved
//! with warm-started sequential impulses.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod utils;
pub mod world;

pub use glam::{Mat3, Quat, Vec3};

pub use collision::{
    aabb::Aabb,
    broadphase::{AabbTree, NodeHandle, TreeContext, NULL_NODE},
    manifold::{ContactPoint, Manifold},
    narrowphase::NarrowPhase,
    queries::CastResult,
};
pub use config::{ManifoldConfig, WorldConfig};
pub use core::{
    body::{Body, BodyHandle, Rigidbody},
    collider::Collider,
    material::MaterialHandle,
    shape::{CompositeParam, InstanceHandle, ShapeHandle, ShapeParam},
    types::{Material, Transform, Velocity},
};
pub use dynamics::{
    constraint::ConstraintHandle,
    constraint_set::{ConstraintOps, DistanceOps, RevoluteOps, SphericalOps, WeldOps},
    island::SleepState,
};
pub use utils::allocator::EntityId;
pub use world::{PhysicsWorld, UpdateEvent};

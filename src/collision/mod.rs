//! Collision detection: bounds, broadphase tree, GJK/EPA narrowphase,
//! persistent manifolds, and segment casting.

pub mod aabb;
pub mod broadphase;
pub mod manifold;
pub mod narrowphase;
pub mod queries;
pub mod simplex;

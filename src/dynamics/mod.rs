//! Constraint solving: per-kind constraints, the island graph, and the
//! sequential-impulse island solver.

pub mod constraint;
pub mod constraint_set;
pub mod contact;
pub mod distance;
pub mod island;
pub mod revolute;
pub mod solver;
pub mod spherical;
pub mod weld;

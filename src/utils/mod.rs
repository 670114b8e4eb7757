//! Shared utilities: handle allocation, math helpers, logging, profiling.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;

//! World configuration, copied into the subsystems at construction time.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Default integration timestep (in seconds).
pub const DEFAULT_SIM_RATE: f32 = 1.0 / 60.0;

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -10.0, 0.0];

/// Cap on fixed substeps consumed per external update call.
pub const MAX_SUBSTEPS: u32 = 5;

/// Gauss-Seidel sweeps per island.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 10;

/// Below this per-iteration impulse magnitude the island solve exits early.
pub const DEFAULT_EARLY_OUT_THRESHOLD: f32 = 1.0e-5;

/// Seconds of inactivity before an island goes to sleep.
pub const DEFAULT_TIME_TO_SLEEP: f32 = 0.5;

/// Seconds of inactivity before a contact constraint is retired.
pub const DEFAULT_TIME_TO_REMOVE: f32 = 2.0;

/// Fractional AABB inflation applied by the broadphase on insert.
pub const DEFAULT_BROADPHASE_PADDING: f32 = 0.05;

/// Drift tolerances for persistent contact points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifoldConfig {
    /// Allowed drift along the contact normal before a point is culled.
    pub normal_tolerance: f32,
    /// Allowed drift along either friction tangent before a point is culled.
    pub tangent_tolerance: f32,
    /// Squared world distance under which an incoming contact replaces a
    /// stored one.
    pub match_tolerance: f32,
    /// `1 - dot` threshold past which an incoming normal replaces the
    /// stored normal and friction basis.
    pub normal_match_tolerance: f32,
}

impl Default for ManifoldConfig {
    fn default() -> Self {
        Self {
            normal_tolerance: 0.03,
            tangent_tolerance: 0.05,
            match_tolerance: 0.01,
            normal_match_tolerance: 0.01,
        }
    }
}

/// Immutable world tuning, threaded through the step by the orchestrator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub sim_rate: f32,
    pub gravity: Vec3,
    pub solver_iterations: u32,
    pub early_out_threshold: f32,
    pub time_to_sleep: f32,
    pub time_to_remove: f32,
    pub broadphase_padding: f32,
    pub manifold: ManifoldConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            sim_rate: DEFAULT_SIM_RATE,
            gravity: Vec3::from_slice(&DEFAULT_GRAVITY),
            solver_iterations: DEFAULT_SOLVER_ITERATIONS,
            early_out_threshold: DEFAULT_EARLY_OUT_THRESHOLD,
            time_to_sleep: DEFAULT_TIME_TO_SLEEP,
            time_to_remove: DEFAULT_TIME_TO_REMOVE,
            broadphase_padding: DEFAULT_BROADPHASE_PADDING,
            manifold: ManifoldConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Velocity-level Baumgarte factor derived from the substep length.
    pub fn baumgarte_term(&self) -> f32 {
        0.1 / self.sim_rate
    }
}

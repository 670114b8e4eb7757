use std::time::Duration;

/// Per-step timing and counts, reset at the start of every substep.
#[derive(Debug, Default, Clone)]
pub struct PhysicsProfiler {
    pub broad_phase_time: Duration,
    pub narrow_phase_time: Duration,
    pub solver_time: Duration,
    pub integrator_time: Duration,
    pub total_frame_time: Duration,
    pub body_count: usize,
    pub pair_count: usize,
    pub island_count: usize,
}

impl PhysicsProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn report(&self) {
        log::debug!(
            "step: broad={:?} narrow={:?} solve={:?} integrate={:?} total={:?} bodies={} pairs={} islands={}",
            self.broad_phase_time,
            self.narrow_phase_time,
            self.solver_time,
            self.integrator_time,
            self.total_frame_time,
            self.body_count,
            self.pair_count,
            self.island_count
        );
    }
}

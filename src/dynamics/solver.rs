use std::collections::HashMap;

use glam::Vec3;

use crate::core::body::{Body, BodyHandle};
use crate::dynamics::constraint::{ConstraintHandle, ConstraintKind, LocalBody, SolverEnv};
use crate::dynamics::constraint_set::ConstraintSet;
use crate::dynamics::contact::LocalContactConstraint;
use crate::dynamics::distance::LocalDistanceConstraint;
use crate::dynamics::island::{IslandContents, SleepState};
use crate::dynamics::revolute::LocalRevoluteConstraint;
use crate::dynamics::spherical::LocalSphericalConstraint;
use crate::dynamics::weld::LocalWeldConstraint;
use crate::utils::allocator::Arena;

/// Per-step solver totals, reported at debug level when enabled.
#[derive(Debug, Default, Clone)]
pub struct SolverStepMetrics {
    pub islands_solved: usize,
    pub contacts_solved: usize,
    pub joints_solved: usize,
}

impl SolverStepMetrics {
    pub fn record_island(&mut self, contacts: usize, joints: usize) {
        self.islands_solved += 1;
        self.contacts_solved += contacts;
        self.joints_solved += joints;
    }
}

/// Solves one island at a time against local copies of its bodies and
/// constraints, then writes velocities and warm starts back.
pub struct IslandSolver {
    objects: Vec<LocalBody>,
    object_index: HashMap<BodyHandle, usize>,
    contacts: Vec<LocalContactConstraint>,
    distances: Vec<LocalDistanceConstraint>,
    sphericals: Vec<LocalSphericalConstraint>,
    revolutes: Vec<LocalRevoluteConstraint>,
    welds: Vec<LocalWeldConstraint>,
    to_remove: Vec<ConstraintHandle>,
    island_key: u32,
    cur_state: SleepState,
    new_state: SleepState,
}

impl Default for IslandSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IslandSolver {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            object_index: HashMap::new(),
            contacts: Vec::new(),
            distances: Vec::new(),
            sphericals: Vec::new(),
            revolutes: Vec::new(),
            welds: Vec::new(),
            to_remove: Vec::new(),
            island_key: 0,
            cur_state: SleepState::Awake,
            new_state: SleepState::Inactive,
        }
    }

    pub fn island_key(&self) -> u32 {
        self.island_key
    }

    pub fn new_island_state(&self) -> SleepState {
        self.new_state
    }

    pub fn to_remove(&self) -> &[ConstraintHandle] {
        &self.to_remove
    }

    pub fn constraint_count(&self) -> (usize, usize) {
        let joints = self.distances.len()
            + self.sphericals.len()
            + self.revolutes.len()
            + self.welds.len();
        (self.contacts.len(), joints)
    }

    /// Build the island-local mirror: copy bodies touched by the island's
    /// constraints and instantiate the per-kind local constraint blocks.
    pub fn set(
        &mut self,
        island: &IslandContents,
        bodies: &mut Arena<Body>,
        constraints: &ConstraintSet,
        gravity_step: Vec3,
    ) {
        self.contacts.clear();
        self.distances.clear();
        self.sphericals.clear();
        self.revolutes.clear();
        self.welds.clear();
        self.objects.clear();
        self.object_index.clear();
        self.to_remove.clear();

        self.island_key = island.island_key;
        self.new_state = SleepState::Inactive;
        self.cur_state = island.sleep_state;

        // An island that is old news stays frozen; nothing to build
        if island.sleep_state == SleepState::Inactive {
            return;
        }

        // Upper bound on distinct bodies so the local array never reallocates
        self.objects.reserve(island.constraints.len() * 2);

        for &handle in &island.constraints {
            let Some((handle_a, handle_b)) = constraints.endpoints(handle) else {
                continue;
            };

            // The island is active as long as any member still has energy
            if self.new_state == SleepState::Inactive {
                let a_inactive = bodies
                    .get(handle_a)
                    .map_or(true, |b| b.is_inactive(gravity_step));
                let b_inactive = bodies
                    .get(handle_b)
                    .map_or(true, |b| b.is_inactive(gravity_step));
                if !a_inactive || !b_inactive {
                    self.new_state = SleepState::Active;
                }
            }

            match island.sleep_state {
                SleepState::Asleep => {
                    // Snap members asleep with their residual velocity
                    // drained, and skip the local build entirely
                    for body in [handle_a, handle_b] {
                        if let Some(body) = bodies.get_mut(body) {
                            body.set_asleep(true);
                            if let Some(rb) = body.rigidbody.as_mut() {
                                rb.lin_vel = Vec3::ZERO;
                                rb.ang_vel = Vec3::ZERO;
                            }
                        }
                    }
                    continue;
                }
                SleepState::Awake => {
                    for body in [handle_a, handle_b] {
                        if let Some(body) = bodies.get_mut(body) {
                            body.set_asleep(false);
                        }
                    }
                }
                _ => {}
            }

            let index_a = self.object_index_for(handle_a, bodies);
            let index_b = self.object_index_for(handle_b, bodies);
            let (Some(index_a), Some(index_b)) = (index_a, index_b) else {
                continue;
            };

            match constraints.kind(handle) {
                Some(ConstraintKind::Contact) => {
                    if let Some(owner) = constraints.contact(handle) {
                        self.contacts
                            .push(LocalContactConstraint::new(owner, index_a, index_b));
                    }
                }
                Some(ConstraintKind::Distance) => {
                    if let Some(owner) = constraints.distance(handle) {
                        self.distances
                            .push(LocalDistanceConstraint::new(owner, index_a, index_b));
                    }
                }
                Some(ConstraintKind::Spherical) => {
                    if let Some(owner) = constraints.spherical(handle) {
                        self.sphericals
                            .push(LocalSphericalConstraint::new(owner, index_a, index_b));
                    }
                }
                Some(ConstraintKind::Revolute) => {
                    if let Some(owner) = constraints.revolute(handle) {
                        self.revolutes
                            .push(LocalRevoluteConstraint::new(owner, index_a, index_b));
                    }
                }
                Some(ConstraintKind::Weld) => {
                    if let Some(owner) = constraints.weld(handle) {
                        self.welds
                            .push(LocalWeldConstraint::new(owner, index_a, index_b));
                    }
                }
                None => debug_assert!(false, "island references a dead constraint"),
            }
        }
    }

    fn object_index_for(&mut self, handle: BodyHandle, bodies: &Arena<Body>) -> Option<usize> {
        if let Some(&index) = self.object_index.get(&handle) {
            return Some(index);
        }
        let body = bodies.get(handle)?;
        let index = self.objects.len();
        self.objects.push(LocalBody::from_body(handle, body));
        self.object_index.insert(handle, index);
        Some(index)
    }

    /// Run the fixed-iteration Gauss-Seidel sweep with early-out.
    pub fn solve(&mut self, iterations: u32, early_out_threshold: f32, env: &SolverEnv) {
        if self.cur_state == SleepState::Inactive {
            return;
        }
        self.pre_solve(env);

        for _ in 0..iterations {
            let mut max_impulse = 0.0f32;
            for c in &mut self.sphericals {
                max_impulse = max_impulse.max(c.solve(&mut self.objects));
            }
            for c in &mut self.revolutes {
                max_impulse = max_impulse.max(c.solve(&mut self.objects));
            }
            for c in &mut self.distances {
                max_impulse = max_impulse.max(c.solve(&mut self.objects));
            }
            for c in &mut self.welds {
                max_impulse = max_impulse.max(c.solve(&mut self.objects));
            }
            for c in &mut self.contacts {
                max_impulse = max_impulse.max(c.solve(&mut self.objects));
            }

            if max_impulse < early_out_threshold {
                break;
            }
        }

        self.post_solve();
    }

    /// First pass: retire constraints that asked for it, set up blocks, and
    /// apply warm-start impulses.
    fn pre_solve(&mut self, env: &SolverEnv) {
        let mut i = 0;
        while i < self.contacts.len() {
            if self.contacts[i].should_remove {
                self.to_remove.push(self.contacts[i].owner);
                self.contacts.swap_remove(i);
                continue;
            }
            self.contacts[i].first_iteration(&mut self.objects, env);
            i += 1;
        }
        for c in &mut self.sphericals {
            c.first_iteration(&mut self.objects, env);
        }
        for c in &mut self.revolutes {
            c.first_iteration(&mut self.objects, env);
        }
        for c in &mut self.distances {
            c.first_iteration(&mut self.objects, env);
        }
        for c in &mut self.welds {
            c.first_iteration(&mut self.objects, env);
        }
    }

    fn post_solve(&mut self) {
        for c in &mut self.sphericals {
            c.last_iteration();
        }
        for c in &mut self.revolutes {
            c.last_iteration();
        }
        for c in &mut self.distances {
            c.last_iteration();
        }
        for c in &mut self.welds {
            c.last_iteration();
        }
        for c in &mut self.contacts {
            c.last_iteration();
        }
    }

    /// Copy solved velocities back into the real bodies and the warm-start
    /// accumulators back into the owning constraints.
    pub fn store(&self, bodies: &mut Arena<Body>, constraints: &mut ConstraintSet) {
        for obj in &self.objects {
            // Statics never change, and several islands share them
            if let Some(body) = bodies.get_mut(obj.handle) {
                if let Some(rb) = body.rigidbody.as_mut() {
                    rb.lin_vel = obj.lin_vel;
                    rb.ang_vel = obj.ang_vel;
                }
            }
        }

        for c in &self.contacts {
            if let Some(owner) = constraints.contact_mut(c.owner) {
                c.store(owner);
            }
        }
        for c in &self.sphericals {
            if let Some(owner) = constraints.spherical_mut(c.owner) {
                c.store(owner);
            }
        }
        for c in &self.revolutes {
            if let Some(owner) = constraints.revolute_mut(c.owner) {
                c.store(owner);
            }
        }
        for c in &self.distances {
            if let Some(owner) = constraints.distance_mut(c.owner) {
                c.store(owner);
            }
        }
        for c in &self.welds {
            if let Some(owner) = constraints.weld_mut(c.owner) {
                c.store(owner);
            }
        }
    }
}

use std::time::Instant;

use glam::{Quat, Vec3};

use crate::collision::broadphase::{AabbTree, TreeContext};
use crate::collision::narrowphase::NarrowPhase;
use crate::collision::queries::{CastResult, Caster, CasterContext};
use crate::config::{WorldConfig, MAX_SUBSTEPS};
use crate::core::body::{Body, BodyHandle};
use crate::core::collider::Collider;
use crate::core::material::{MaterialHandle, MaterialRegistry};
use crate::core::shape::{CompositeParam, ShapeHandle, ShapeParam, ShapeRegistry};
use crate::core::types::Material;
use crate::dynamics::constraint::{ConstraintHandle, SolverEnv, MAX_VEL_CORRECTION};
use crate::dynamics::constraint_set::{
    ConstraintSet, DistanceOps, RevoluteOps, SphericalOps, WeldOps,
};
use crate::dynamics::island::{IslandContents, IslandGraph, SleepState};
use crate::dynamics::solver::{IslandSolver, SolverStepMetrics};
use crate::utils::allocator::Arena;
use crate::utils::logging::ScopedTimer;
use crate::utils::profiling::PhysicsProfiler;

/// Emitted for every body that integrated during a substep.
#[derive(Debug, Clone, Copy)]
pub struct UpdateEvent {
    pub body: BodyHandle,
    pub position: Vec3,
    pub rotation: Quat,
    pub lin_vel: Vec3,
    pub ang_vel: Vec3,
}

/// Central simulation container orchestrating all subsystems.
pub struct PhysicsWorld {
    config: WorldConfig,
    bodies: Arena<Body>,
    shapes: ShapeRegistry,
    materials: MaterialRegistry,
    broadphase: AabbTree<BodyHandle>,
    broad_context: TreeContext<BodyHandle>,
    narrowphase: NarrowPhase,
    constraints: ConstraintSet,
    islands: IslandGraph,
    solvers: Vec<IslandSolver>,
    island_contents: Vec<IslandContents>,
    caster: Caster,
    caster_context: CasterContext,
    update_events: Vec<UpdateEvent>,
    accumulated: f32,
    default_material: MaterialHandle,
    cube_shape: ShapeHandle,
    sphere_shape: ShapeHandle,
    capsule_shape: ShapeHandle,
    cylinder_shape: ShapeHandle,
    cone_shape: ShapeHandle,
    pub profiler: PhysicsProfiler,
    last_solver_metrics: SolverStepMetrics,
    solver_metrics_logging: bool,
}

pub struct PhysicsWorldBuilder {
    config: WorldConfig,
}

impl Default for PhysicsWorldBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorldBuilder {
    pub fn new() -> Self {
        Self {
            config: WorldConfig::default(),
        }
    }

    pub fn config(mut self, config: WorldConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sim_rate(mut self, sim_rate: f32) -> Self {
        if sim_rate > 0.0 {
            self.config.sim_rate = sim_rate;
        }
        self
    }

    pub fn gravity(mut self, gravity: Vec3) -> Self {
        self.config.gravity = gravity;
        self
    }

    pub fn solver_iterations(mut self, iterations: u32) -> Self {
        self.config.solver_iterations = iterations;
        self
    }

    pub fn build(self) -> PhysicsWorld {
        let config = self.config;
        let mut shapes = ShapeRegistry::new();
        let cube_shape = shapes.add_shape(ShapeParam::Cube);
        let sphere_shape = shapes.add_shape(ShapeParam::Sphere);
        let capsule_shape = shapes.add_shape(ShapeParam::Capsule);
        let cylinder_shape = shapes.add_shape(ShapeParam::Cylinder);
        let cone_shape = shapes.add_shape(ShapeParam::Cone);

        let mut materials = MaterialRegistry::new();
        let default_material = materials.add(Material::default());

        PhysicsWorld {
            bodies: Arena::new(),
            shapes,
            materials,
            broadphase: AabbTree::new(config.broadphase_padding),
            broad_context: TreeContext::new(),
            narrowphase: NarrowPhase::new(),
            constraints: ConstraintSet::new(config.manifold),
            islands: IslandGraph::new(config.time_to_sleep),
            solvers: Vec::new(),
            island_contents: Vec::new(),
            caster: Caster,
            caster_context: CasterContext::default(),
            update_events: Vec::new(),
            accumulated: 0.0,
            default_material,
            cube_shape,
            sphere_shape,
            capsule_shape,
            cylinder_shape,
            cone_shape,
            profiler: PhysicsProfiler::default(),
            last_solver_metrics: SolverStepMetrics::default(),
            solver_metrics_logging: false,
            config,
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> PhysicsWorldBuilder {
        PhysicsWorldBuilder::new()
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // Primitive shapes registered at construction.

    pub fn cube_shape(&self) -> ShapeHandle {
        self.cube_shape
    }

    pub fn sphere_shape(&self) -> ShapeHandle {
        self.sphere_shape
    }

    pub fn capsule_shape(&self) -> ShapeHandle {
        self.capsule_shape
    }

    pub fn cylinder_shape(&self) -> ShapeHandle {
        self.cylinder_shape
    }

    pub fn cone_shape(&self) -> ShapeHandle {
        self.cone_shape
    }

    pub fn default_material(&self) -> MaterialHandle {
        self.default_material
    }

    pub fn set_solver_metrics_logging(&mut self, enabled: bool) {
        self.solver_metrics_logging = enabled;
    }

    pub fn last_solver_metrics(&self) -> &SolverStepMetrics {
        &self.last_solver_metrics
    }

    /// Advances the simulation using a fixed timestep accumulator, capped at
    /// a few substeps per call so a long frame cannot snowball.
    pub fn update(&mut self, dt: f32) {
        self.accumulated += dt;
        let mut updates = 0;
        while self.accumulated >= self.config.sim_rate && updates < MAX_SUBSTEPS {
            self.accumulated -= self.config.sim_rate;
            updates += 1;
            self.substep(self.config.sim_rate);
        }
        // Drop whatever time the cap refused to simulate
        while self.accumulated >= self.config.sim_rate {
            self.accumulated -= self.config.sim_rate;
        }
    }

    fn substep(&mut self, dt: f32) {
        let _timer = ScopedTimer::new("world::substep");
        self.profiler.reset();
        let frame_start = Instant::now();

        self.integrate_velocities(dt);

        {
            let start = Instant::now();
            self.broadphase.query_pairs(&mut self.broad_context);
            self.profiler.broad_phase_time = start.elapsed();
            self.profiler.pair_count = self.broad_context.pair_results.len();
        }

        {
            let start = Instant::now();
            self.narrowphase.process_pairs(
                &self.broad_context.pair_results,
                &self.bodies,
                &self.shapes,
                &mut self.constraints,
                &mut self.islands,
            );
            self.profiler.narrow_phase_time = start.elapsed();
        }

        {
            let start = Instant::now();
            self.solve_islands(dt);
            self.profiler.solver_time = start.elapsed();
        }

        {
            let start = Instant::now();
            self.integrate_positions(dt);
            self.profiler.integrator_time = start.elapsed();
        }

        self.constraints.update_manifolds(&self.bodies);

        self.profiler.total_frame_time = frame_start.elapsed();
        self.profiler.body_count = self.bodies.len();
        if self.solver_metrics_logging {
            self.log_solver_metrics();
        }
    }

    fn integrate_velocities(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        for (_, body) in self.bodies.iter_mut() {
            if body.asleep() || !body.is_enabled() {
                continue;
            }
            body.integrate_velocity(gravity, dt);
        }
    }

    fn solve_islands(&mut self, dt: f32) {
        let env = SolverEnv {
            dt,
            baumgarte_term: self.config.baumgarte_term(),
            max_correction: MAX_VEL_CORRECTION,
            time_to_remove: self.config.time_to_remove,
        };
        let gravity_step = self.config.gravity * dt;

        // Snapshot every island before any solve mutates the graph
        let island_count = self.islands.island_count();
        self.profiler.island_count = island_count;
        if self.solvers.len() < island_count {
            self.solvers.resize_with(island_count, IslandSolver::new);
        }
        self.island_contents
            .resize_with(island_count.max(self.island_contents.len()), IslandContents::default);
        for i in 0..island_count {
            let contents = &mut self.island_contents[i];
            self.islands.get_island(i, contents, false);
            self.solvers[i].set(contents, &mut self.bodies, &self.constraints, gravity_step);
        }

        let mut metrics = SolverStepMetrics::default();
        for i in 0..island_count {
            let solver = &mut self.solvers[i];
            solver.solve(self.config.solver_iterations, self.config.early_out_threshold, &env);
            solver.store(&mut self.bodies, &mut self.constraints);

            let (contacts, joints) = solver.constraint_count();
            metrics.record_island(contacts, joints);

            for handle in solver.to_remove().to_vec() {
                self.constraints
                    .remove_constraint(handle, &mut self.bodies, &mut self.islands);
            }
            self.islands
                .update_island_state(solver.island_key(), solver.new_island_state(), dt);
        }
        self.last_solver_metrics = metrics;
    }

    fn integrate_positions(&mut self, dt: f32) {
        self.update_events.clear();
        let mut moved = Vec::new();
        for (handle, body) in self.bodies.iter_mut() {
            if !body.should_integrate() {
                continue;
            }
            body.integrate_position(dt);
            if let Some(rb) = body.rigidbody.as_ref() {
                self.update_events.push(UpdateEvent {
                    body: handle,
                    position: body.transform.position,
                    rotation: body.transform.rotation,
                    lin_vel: rb.lin_vel,
                    ang_vel: rb.ang_vel,
                });
            }
            moved.push(handle);
        }
        for handle in moved {
            self.update_moved_body(handle);
        }
    }

    /// Refresh a moved body's world bounds and broadphase entry.
    fn update_moved_body(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let to_world = body.transform.to_world();
        let Some(collider) = body.collider.as_mut() else {
            return;
        };
        if let Some(shape) = self.shapes.get(collider.shape) {
            collider.world_aabb = shape.world_aabb(&to_world);
        }
        if collider.enabled {
            collider.broad_handle = self.broadphase.update(collider.world_aabb, collider.broad_handle);
        }
    }

    // Body management

    pub fn add_body(&mut self, has_rigidbody: bool, has_collider: bool) -> BodyHandle {
        let collider = if has_collider {
            let mut collider = Collider::new(self.cube_shape, self.shapes.next_instance_handle());
            if let Some(material) = self.materials.get(self.default_material) {
                collider.material = *material;
            }
            collider.material_handle = self.default_material;
            self.materials.retain(self.default_material);
            Some(collider)
        } else {
            None
        };

        let handle = self.bodies.insert(Body::new(has_rigidbody, collider));
        if has_collider {
            self.register_collider(handle);
        }
        if let Some(body) = self.bodies.get_mut(handle) {
            body.calculate_mass(&self.shapes);
        }
        handle
    }

    fn register_collider(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let to_world = body.transform.to_world();
        let Some(collider) = body.collider.as_mut() else {
            return;
        };
        if let Some(shape) = self.shapes.get(collider.shape) {
            collider.world_aabb = shape.world_aabb(&to_world);
        }
        collider.broad_handle = self.broadphase.insert(collider.world_aabb, handle);
    }

    /// Destroy a body along with its broadphase entry and every constraint
    /// touching it.
    pub fn remove_body(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get(handle) else {
            return;
        };
        let joints: Vec<ConstraintHandle> = body.constraints().iter().copied().collect();
        for constraint in joints {
            self.constraints
                .remove_constraint(constraint, &mut self.bodies, &mut self.islands);
        }
        // Contacts do not appear in the body's joint set; the island graph
        // knows them by edge
        for constraint in self.islands.remove_body(handle) {
            self.constraints
                .remove_constraint(constraint, &mut self.bodies, &mut self.islands);
        }

        if let Some(body) = self.bodies.remove(handle) {
            if let Some(collider) = body.collider {
                self.broadphase.remove(collider.broad_handle);
                self.materials.release(collider.material_handle);
            }
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| b.transform.position)
    }

    pub fn set_position(&mut self, handle: BodyHandle, position: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.transform.position = position;
            self.update_moved_body(handle);
            self.islands.wake_island(handle);
        }
    }

    pub fn rotation(&self, handle: BodyHandle) -> Option<Quat> {
        self.bodies.get(handle).map(|b| b.transform.rotation)
    }

    pub fn set_rotation(&mut self, handle: BodyHandle, rotation: Quat) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.transform.rotation = rotation;
            if let Some(rb) = body.rigidbody.as_mut() {
                rb.update_inertia(rotation);
            }
            self.update_moved_body(handle);
            self.islands.wake_island(handle);
        }
    }

    pub fn scale(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle).map(|b| b.transform.scale)
    }

    pub fn set_scale(&mut self, handle: BodyHandle, scale: Vec3) {
        if let Some(body) = self.bodies.get_mut(handle) {
            body.transform.scale = scale;
            body.calculate_mass(&self.shapes);
            self.update_moved_body(handle);
            self.islands.wake_island(handle);
        }
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies
            .get(handle)
            .and_then(|b| b.rigidbody.as_ref())
            .map(|rb| rb.lin_vel)
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(rb) = self
            .bodies
            .get_mut(handle)
            .and_then(|b| b.rigidbody.as_mut())
        {
            rb.lin_vel = velocity;
            self.islands.wake_island(handle);
        }
    }

    pub fn angular_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies
            .get(handle)
            .and_then(|b| b.rigidbody.as_ref())
            .map(|rb| rb.ang_vel)
    }

    pub fn set_angular_velocity(&mut self, handle: BodyHandle, velocity: Vec3) {
        if let Some(rb) = self
            .bodies
            .get_mut(handle)
            .and_then(|b| b.rigidbody.as_mut())
        {
            rb.ang_vel = velocity;
            self.islands.wake_island(handle);
        }
    }

    pub fn wake(&mut self, handle: BodyHandle) {
        self.islands.wake_island(handle);
    }

    /// Kinematic bodies integrate under their velocity but have infinite
    /// mass as far as the solver is concerned.
    pub fn set_kinematic(&mut self, handle: BodyHandle, kinematic: bool) {
        if let Some(body) = self.bodies.get_mut(handle) {
            if let Some(rb) = body.rigidbody.as_mut() {
                rb.kinematic = kinematic;
            }
            body.calculate_mass(&self.shapes);
        }
    }

    /// Lock rotation on individual world axes.
    pub fn set_angular_locks(&mut self, handle: BodyHandle, locks: [bool; 3]) {
        if let Some(body) = self.bodies.get_mut(handle) {
            let rotation = body.transform.rotation;
            if let Some(rb) = body.rigidbody.as_mut() {
                rb.angular_locks = locks;
                rb.update_inertia(rotation);
            }
        }
    }

    pub fn sleep_state(&self, handle: BodyHandle) -> Option<SleepState> {
        self.islands.sleep_state(handle)
    }

    // Shape and material management

    pub fn add_shape(&mut self, param: ShapeParam) -> ShapeHandle {
        self.shapes.add_shape(param)
    }

    pub fn add_composite(&mut self, param: CompositeParam) -> ShapeHandle {
        self.shapes.add_composite(param)
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    pub fn set_collider_shape(&mut self, handle: BodyHandle, shape: ShapeHandle) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let Some(collider) = body.collider.as_mut() else {
            return;
        };
        collider.shape = shape;
        body.calculate_mass(&self.shapes);
        self.update_moved_body(handle);
        self.islands.wake_island(handle);
    }

    pub fn set_collider_enabled(&mut self, handle: BodyHandle, enabled: bool) {
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let Some(collider) = body.collider.as_mut() else {
            return;
        };
        if collider.enabled == enabled {
            return;
        }
        collider.enabled = enabled;
        if enabled {
            let world_aabb = collider.world_aabb;
            collider.broad_handle = self.broadphase.insert(world_aabb, handle);
            self.update_moved_body(handle);
        } else {
            self.broadphase.remove(collider.broad_handle);
            collider.broad_handle = crate::collision::broadphase::NULL_NODE;
        }
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.materials.add(material)
    }

    pub fn remove_material(&mut self, handle: MaterialHandle) {
        self.materials.remove(handle);
    }

    /// Reclaim removed materials that no collider references anymore.
    pub fn collect_material_garbage(&mut self) -> usize {
        self.materials.collect_garbage()
    }

    pub fn set_material(&mut self, handle: BodyHandle, material: MaterialHandle) {
        let Some(values) = self.materials.get(material).copied() else {
            return;
        };
        let Some(body) = self.bodies.get_mut(handle) else {
            return;
        };
        let Some(collider) = body.collider.as_mut() else {
            return;
        };
        let old = collider.material_handle;
        // Keep a local copy so material deletion never dangles mid-step
        collider.material = values;
        collider.material_handle = material;
        self.materials.retain(material);
        self.materials.release(old);
        body.calculate_mass(&self.shapes);
    }

    // Constraints

    pub fn add_distance(&mut self, ops: DistanceOps) -> Option<ConstraintHandle> {
        self.constraints
            .add_distance(ops, &mut self.bodies, &mut self.islands)
    }

    pub fn add_spherical(&mut self, ops: SphericalOps) -> Option<ConstraintHandle> {
        self.constraints
            .add_spherical(ops, &mut self.bodies, &mut self.islands)
    }

    pub fn add_revolute(&mut self, ops: RevoluteOps) -> Option<ConstraintHandle> {
        self.constraints
            .add_revolute(ops, &mut self.bodies, &mut self.islands)
    }

    pub fn add_weld(&mut self, ops: WeldOps) -> Option<ConstraintHandle> {
        self.constraints
            .add_weld(ops, &mut self.bodies, &mut self.islands)
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) {
        self.constraints
            .remove_constraint(handle, &mut self.bodies, &mut self.islands);
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn islands(&mut self) -> &mut IslandGraph {
        &mut self.islands
    }

    // Queries and events

    /// Every collider intersecting the segment, closest first.
    pub fn line_cast_all(&mut self, start: Vec3, end: Vec3) -> Vec<CastResult> {
        self.broadphase.query_ray(start, end, &mut self.broad_context);
        self.caster_context.clear_results();

        for i in 0..self.broad_context.results.len() {
            let handle = self.broad_context.results[i];
            if let Some(body) = self.bodies.get(handle) {
                self.caster
                    .line_cast(handle, body, &self.shapes, start, end, &mut self.caster_context);
            }
        }

        self.caster_context.sort_results();
        self.caster_context.results.clone()
    }

    pub fn update_events(&self) -> &[UpdateEvent] {
        &self.update_events
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.broadphase.clear();
        self.constraints.clear();
        self.islands.clear();
        self.update_events.clear();
    }

    fn log_solver_metrics(&self) {
        let metrics = &self.last_solver_metrics;
        log::debug!(
            "solver: islands={} contacts={} joints={}",
            metrics.islands_solved,
            metrics.contacts_solved,
            metrics.joints_solved
        );
    }
}

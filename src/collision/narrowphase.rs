use glam::Vec3;

use crate::collision::aabb::Aabb;
use crate::collision::broadphase::TreeContext;
use crate::collision::manifold::{ContactObject, ContactPoint};
use crate::collision::simplex::{Simplex, SupportPoint};
use crate::core::body::{Body, BodyHandle};
use crate::core::shape::{InstanceHandle, Shape, ShapeKind, ShapeRegistry};
use crate::core::types::{Transform, Transformer};
use crate::dynamics::constraint_set::ConstraintSet;
use crate::dynamics::island::IslandGraph;
use crate::utils::allocator::Arena;
use crate::utils::math::{self, EPSILON};

const MAX_GJK_ITERATIONS: usize = 100;
const MAX_EPA_ITERATIONS: usize = 100;
const EPA_EPSILON: f32 = EPSILON;

/// A shape plus the transform pair that takes it between model and world
/// space. Container traversal builds these on the fly for submodels and
/// environment triangles.
pub struct SupportInstance<'a> {
    pub shape: &'a Shape,
    pub to_world: Transformer,
    pub to_model: Transformer,
    pub handle: InstanceHandle,
}

impl<'a> SupportInstance<'a> {
    pub fn new(shape: &'a Shape, transform: &Transform, handle: InstanceHandle) -> Self {
        Self {
            shape,
            to_world: transform.to_world(),
            to_model: transform.to_model(),
            handle,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// World-space support point in a world-space direction.
    pub fn support(&self, world_dir: Vec3) -> Vec3 {
        let local_dir = self.to_model.transform_vector(world_dir);
        self.to_world.transform_point(self.shape.support(local_dir))
    }
}

/// Body-level context carried through container recursion unchanged.
#[derive(Clone, Copy)]
pub struct PairEndpoint {
    pub body: BodyHandle,
    pub is_static: bool,
    pub transform: Transform,
    /// World bounds of the whole collider, used to prune container children.
    pub aabb: Aabb,
}

/// Face of the expanding polytope with its outward half-plane.
#[derive(Debug, Clone, Copy)]
struct SupportTri {
    verts: [usize; 3],
    normal: Vec3,
    d: f32,
}

impl SupportTri {
    fn new(a: usize, b: usize, c: usize, points: &[SupportPoint]) -> Self {
        let pa = points[a].support;
        let pb = points[b].support;
        let pc = points[c].support;
        let normal = math::triangle_normal(pa, pb, pc).normalize_or_zero();
        Self {
            verts: [a, b, c],
            normal,
            d: -pa.dot(normal),
        }
    }

    fn signed_normal_dist(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    fn origin_dist(&self) -> f32 {
        self.d
    }

    fn project(&self, point: Vec3) -> Vec3 {
        point - self.normal * self.signed_normal_dist(point)
    }

    fn add_edges(&self, edges: &mut Vec<(usize, usize)>) {
        edges.push((self.verts[0], self.verts[1]));
        edges.push((self.verts[1], self.verts[2]));
        edges.push((self.verts[2], self.verts[0]));
    }
}

/// Pairwise contact generation: dispatches on shape kinds, runs GJK/EPA for
/// generic convex pairs, and recurses through composites and environments.
/// Carries reusable scratch buffers across pairs.
pub struct NarrowPhase {
    simplex: Simplex,
    verts: Vec<SupportPoint>,
    edges: Vec<(usize, usize)>,
    tris: Vec<SupportTri>,
    env_context: TreeContext<u32>,
}

impl Default for NarrowPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrowPhase {
    pub fn new() -> Self {
        Self {
            simplex: Simplex::default(),
            verts: Vec::new(),
            edges: Vec::new(),
            tris: Vec::new(),
            env_context: TreeContext::new(),
        }
    }

    /// Run every broadphase pair through dispatch, emitting contacts into
    /// manifolds owned by the constraint set.
    pub fn process_pairs(
        &mut self,
        pairs: &[(BodyHandle, BodyHandle)],
        bodies: &Arena<Body>,
        shapes: &ShapeRegistry,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        for &(first, second) in pairs {
            // Consistent ordering keeps manifold identity stable
            let (handle_a, handle_b) = if first < second {
                (second, first)
            } else {
                (first, second)
            };

            let (Some(body_a), Some(body_b)) = (bodies.get(handle_a), bodies.get(handle_b)) else {
                continue;
            };
            if body_a.asleep() && body_b.asleep() {
                continue;
            }
            let (Some(collider_a), Some(collider_b)) =
                (body_a.collider.as_ref(), body_b.collider.as_ref())
            else {
                continue;
            };
            if !collider_a.enabled || !collider_b.enabled {
                continue;
            }
            let (Some(shape_a), Some(shape_b)) =
                (shapes.get(collider_a.shape), shapes.get(collider_b.shape))
            else {
                continue;
            };

            let endpoint_a = PairEndpoint {
                body: handle_a,
                is_static: body_a.is_static(),
                transform: body_a.transform,
                aabb: collider_a.world_aabb,
            };
            let endpoint_b = PairEndpoint {
                body: handle_b,
                is_static: body_b.is_static(),
                transform: body_b.transform,
                aabb: collider_b.world_aabb,
            };
            let inst_a = SupportInstance::new(shape_a, &body_a.transform, collider_a.instance);
            let inst_b = SupportInstance::new(shape_b, &body_b.transform, collider_b.instance);

            let friction = (collider_a.material.friction * collider_b.material.friction).sqrt();

            self.handle_pair(
                (&endpoint_a, &inst_a),
                (&endpoint_b, &inst_b),
                friction,
                shapes,
                constraints,
                islands,
            );
        }
    }

    fn handle_pair(
        &mut self,
        a: (&PairEndpoint, &SupportInstance),
        b: (&PairEndpoint, &SupportInstance),
        friction: f32,
        shapes: &ShapeRegistry,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        match (a.1.kind(), b.1.kind()) {
            (ShapeKind::Sphere, ShapeKind::Sphere) => {
                self.sphere_sphere(a, b, friction, constraints, islands)
            }
            (ShapeKind::Environment, ShapeKind::Environment) => {
                // Environments never collide with each other
            }
            (ShapeKind::Environment, ShapeKind::Composite) => {
                self.env_composite(a, b, friction, shapes, constraints, islands)
            }
            (ShapeKind::Composite, ShapeKind::Environment) => {
                self.env_composite(b, a, friction, shapes, constraints, islands)
            }
            (ShapeKind::Composite, ShapeKind::Composite) => {
                self.composite_composite(a, b, friction, shapes, constraints, islands)
            }
            (ShapeKind::Composite, _) => {
                self.composite_other(a, b, friction, shapes, constraints, islands)
            }
            (_, ShapeKind::Composite) => {
                self.composite_other(b, a, friction, shapes, constraints, islands)
            }
            (ShapeKind::Environment, _) => {
                self.env_other(a, b, friction, shapes, constraints, islands)
            }
            (_, ShapeKind::Environment) => {
                self.env_other(b, a, friction, shapes, constraints, islands)
            }
            _ => self.gjk_epa(a, b, friction, constraints, islands),
        }
    }

    fn get_support(a: &SupportInstance, b: &SupportInstance, dir: Vec3) -> SupportPoint {
        SupportPoint::new(a.support(dir), b.support(-dir))
    }

    /// Overlap test. Leaves the terminating simplex behind for EPA.
    pub fn gjk(&mut self, inst_a: &SupportInstance, inst_b: &SupportInstance) -> bool {
        self.simplex.initialize();
        // Arbitrary start direction
        let mut dir = Vec3::Y;
        let mut support = Self::get_support(inst_a, inst_b, dir);

        for _ in 0..MAX_GJK_ITERATIONS {
            self.simplex.add(support, false);
            dir = self.simplex.solve();

            if self.simplex.contains_origin() {
                return true;
            }
            if self.simplex.is_degenerate() {
                return false;
            }

            support = Self::get_support(inst_a, inst_b, dir);
            // The new support never made it past the origin, so the shapes
            // cannot overlap. Only valid for boolean queries like this one
            if support.support.dot(dir) < 0.0 {
                return false;
            }
        }

        log::debug!("GJK iteration cap reached");
        false
    }

    /// Penetration depth and witness points from the terminating simplex.
    /// Returns `(world_a, world_b, normal)` with the normal pointing from B
    /// toward A, or `None` when the polytope degenerates.
    pub fn epa(
        &mut self,
        inst_a: &SupportInstance,
        inst_b: &SupportInstance,
    ) -> Option<(Vec3, Vec3, Vec3)> {
        self.init_epa_simplex(inst_a, inst_b);

        for _ in 0..MAX_EPA_ITERATIONS {
            let best = self.closest_tri()?;

            let new_support = Self::get_support(inst_a, inst_b, self.tris[best].normal);
            let progress = self.tris[best].signed_normal_dist(new_support.support);
            self.verts.push(new_support);

            if progress <= EPA_EPSILON {
                return self.store_epa_result(best);
            }

            self.delete_interior_tris(new_support.support);
            self.reconstruct_triangles();
        }

        log::debug!("EPA iteration cap reached");
        None
    }

    fn init_epa_simplex(&mut self, inst_a: &SupportInstance, inst_b: &SupportInstance) {
        self.simplex
            .grow_to_four_points(|dir| Self::get_support(inst_a, inst_b, dir));

        self.verts.clear();
        self.edges.clear();
        self.tris.clear();

        for i in 0..4 {
            self.verts.push(*self.simplex.get_support(i));
        }

        // bad, cbd, acd, abc: outward winding over the tetrahedron
        self.tris.push(SupportTri::new(1, 0, 3, &self.verts));
        self.tris.push(SupportTri::new(2, 1, 3, &self.verts));
        self.tris.push(SupportTri::new(0, 2, 3, &self.verts));
        self.tris.push(SupportTri::new(0, 1, 2, &self.verts));
    }

    fn closest_tri(&self) -> Option<usize> {
        // The origin is inside, so the signed distances are negative;
        // compare magnitudes
        let mut best = None;
        let mut best_dist = f32::MAX;
        for (i, tri) in self.tris.iter().enumerate() {
            let dist = tri.origin_dist().abs();
            if dist < best_dist {
                best_dist = dist;
                best = Some(i);
            }
        }
        best
    }

    fn store_epa_result(&mut self, mut best: usize) -> Option<(Vec3, Vec3, Vec3)> {
        loop {
            let tri = self.tris[best];
            let a = self.verts[tri.verts[0]];
            let b = self.verts[tri.verts[1]];
            let c = self.verts[tri.verts[2]];

            let origin_on_tri = tri.project(Vec3::ZERO);
            let bary =
                math::point_to_barycentric(a.support, b.support, c.support, origin_on_tri);
            if math::valid_barycentric(bary) {
                let world_a = math::barycentric_to_point(a.point_a, b.point_a, c.point_a, bary);
                let world_b = math::barycentric_to_point(a.point_b, b.point_b, c.point_b, bary);
                return Some((world_a, world_b, -tri.normal));
            }

            // This face cannot reconstruct the witness points; fall back to
            // the next closest one
            self.tris.swap_remove(best);
            match self.closest_tri() {
                Some(next) => best = next,
                None => {
                    log::debug!("no polytope face produced a valid contact");
                    return None;
                }
            }
        }
    }

    fn delete_interior_tris(&mut self, new_point: Vec3) {
        let mut i = 0;
        while i < self.tris.len() {
            // Any face that can see the new vertex gets replaced
            if self.tris[i].signed_normal_dist(new_point) > 0.0 {
                let tri = self.tris.swap_remove(i);
                tri.add_edges(&mut self.edges);
            } else {
                i += 1;
            }
        }
    }

    fn reconstruct_triangles(&mut self) {
        // Edges shared by two removed faces are interior; drop both copies
        // and triangulate the remaining boundary against the new vertex
        let mut i = 0;
        'outer: while i < self.edges.len() {
            let (from, to) = self.edges[i];
            for j in i + 1..self.edges.len() {
                let (other_from, other_to) = self.edges[j];
                if other_from == to && other_to == from {
                    self.edges.swap_remove(j);
                    self.edges.swap_remove(i);
                    continue 'outer;
                }
            }

            let new_vert = self.verts.len() - 1;
            self.tris
                .push(SupportTri::new(from, to, new_vert, &self.verts));
            i += 1;
        }
        self.edges.clear();
    }

    fn gjk_epa(
        &mut self,
        a: (&PairEndpoint, &SupportInstance),
        b: (&PairEndpoint, &SupportInstance),
        friction: f32,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        if !self.gjk(a.1, b.1) {
            return;
        }
        match self.epa(a.1, b.1) {
            Some((world_a, world_b, normal)) if normal != Vec3::ZERO => {
                let penetration = (world_b - world_a).dot(normal);
                self.submit_contact(
                    a,
                    b,
                    world_a,
                    world_b,
                    normal,
                    penetration,
                    friction,
                    constraints,
                    islands,
                );
            }
            _ => log::debug!("discarding contact with invalid normal"),
        }
    }

    fn sphere_sphere(
        &mut self,
        a: (&PairEndpoint, &SupportInstance),
        b: (&PairEndpoint, &SupportInstance),
        friction: f32,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        let pos_a = a.1.to_world.pos;
        let pos_b = b.1.to_world.pos;
        let radius_a = a.1.to_world.scale_rot.x_axis.length();
        let radius_b = b.1.to_world.scale_rot.x_axis.length();

        let a_to_b = pos_b - pos_a;
        let mut dist = a_to_b.length_squared();
        let combined_radius = radius_a + radius_b;
        if dist > combined_radius * combined_radius {
            return;
        }

        // Coincident centers make every normal equally valid; pick up
        let normal = if dist < EPSILON {
            Vec3::Y
        } else {
            dist = dist.sqrt();
            -a_to_b / dist
        };

        let penetration = combined_radius - dist;
        let world_a = pos_a - normal * radius_a;
        let world_b = pos_b + normal * radius_b;
        self.submit_contact(
            a,
            b,
            world_a,
            world_b,
            normal,
            penetration,
            friction,
            constraints,
            islands,
        );
    }

    fn composite_other(
        &mut self,
        container: (&PairEndpoint, &SupportInstance),
        other: (&PairEndpoint, &SupportInstance),
        friction: f32,
        shapes: &ShapeRegistry,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        // Test the other body's bounds in the composite's model space so the
        // submodel AABBs apply directly
        let local_other = other.0.aabb.transform(&container.1.to_model);

        for sub in container.1.shape.submodels() {
            if !local_other.overlapping(&sub.aabb) {
                continue;
            }
            let Some(sub_shape) = shapes.get(sub.shape) else {
                continue;
            };
            // Fold the transforms together so support lookups stay one hop
            let sub_inst = SupportInstance {
                shape: sub_shape,
                to_world: Transformer::combined(&sub.local.to_world(), &container.1.to_world),
                to_model: Transformer::combined(&container.1.to_model, &sub.local.to_model()),
                handle: sub.instance,
            };
            self.handle_pair(
                (container.0, &sub_inst),
                other,
                friction,
                shapes,
                constraints,
                islands,
            );
        }
    }

    fn composite_composite(
        &mut self,
        a: (&PairEndpoint, &SupportInstance),
        b: (&PairEndpoint, &SupportInstance),
        friction: f32,
        shapes: &ShapeRegistry,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        // Work in the space of the composite with more submodels
        let (a, b) = if a.1.shape.submodels().len() < b.1.shape.submodels().len() {
            (b, a)
        } else {
            (a, b)
        };

        let local_b_to_local_a = Transformer::combined(&b.1.to_world, &a.1.to_model);

        for sub_b in b.1.shape.submodels() {
            let b_in_a = sub_b.aabb.transform(&local_b_to_local_a);
            let Some(sub_b_shape) = shapes.get(sub_b.shape) else {
                continue;
            };
            let sub_b_inst = SupportInstance {
                shape: sub_b_shape,
                to_world: Transformer::combined(&sub_b.local.to_world(), &b.1.to_world),
                to_model: Transformer::combined(&b.1.to_model, &sub_b.local.to_model()),
                handle: sub_b.instance,
            };

            for sub_a in a.1.shape.submodels() {
                if !sub_a.aabb.overlapping(&b_in_a) {
                    continue;
                }
                let Some(sub_a_shape) = shapes.get(sub_a.shape) else {
                    continue;
                };
                let sub_a_inst = SupportInstance {
                    shape: sub_a_shape,
                    to_world: Transformer::combined(&sub_a.local.to_world(), &a.1.to_world),
                    to_model: Transformer::combined(&a.1.to_model, &sub_a.local.to_model()),
                    handle: sub_a.instance,
                };
                self.handle_pair(
                    (a.0, &sub_a_inst),
                    (b.0, &sub_b_inst),
                    friction,
                    shapes,
                    constraints,
                    islands,
                );
            }
        }
    }

    fn env_other(
        &mut self,
        env: (&PairEndpoint, &SupportInstance),
        other: (&PairEndpoint, &SupportInstance),
        friction: f32,
        shapes: &ShapeRegistry,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        let Some((triangles, tri_instances, tree)) = env.1.shape.environment() else {
            return;
        };

        let local_other = other.0.aabb.transform(&env.1.to_model);
        tree.query_volume(&local_other, &mut self.env_context);
        let hits: Vec<u32> = self.env_context.results.clone();

        for base in hits {
            let base = base as usize;
            let tri_shape = Shape::triangle(
                triangles[base],
                triangles[base + 1],
                triangles[base + 2],
            );
            let tri_inst = SupportInstance {
                shape: &tri_shape,
                to_world: env.1.to_world,
                to_model: env.1.to_model,
                handle: tri_instances[base / 3],
            };
            self.handle_pair(
                (env.0, &tri_inst),
                other,
                friction,
                shapes,
                constraints,
                islands,
            );
        }
    }

    fn env_composite(
        &mut self,
        env: (&PairEndpoint, &SupportInstance),
        composite: (&PairEndpoint, &SupportInstance),
        friction: f32,
        shapes: &ShapeRegistry,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        let Some((triangles, tri_instances, tree)) = env.1.shape.environment() else {
            return;
        };

        let comp_to_env = Transformer::combined(&composite.1.to_world, &env.1.to_model);

        for sub in composite.1.shape.submodels() {
            let query_box = sub.aabb.transform(&comp_to_env);
            tree.query_volume(&query_box, &mut self.env_context);
            if self.env_context.results.is_empty() {
                continue;
            }
            let hits: Vec<u32> = self.env_context.results.clone();

            let Some(sub_shape) = shapes.get(sub.shape) else {
                continue;
            };
            let sub_inst = SupportInstance {
                shape: sub_shape,
                to_world: Transformer::combined(&sub.local.to_world(), &composite.1.to_world),
                to_model: Transformer::combined(&composite.1.to_model, &sub.local.to_model()),
                handle: sub.instance,
            };

            for base in hits {
                let base = base as usize;
                let tri_shape = Shape::triangle(
                    triangles[base],
                    triangles[base + 1],
                    triangles[base + 2],
                );
                let tri_inst = SupportInstance {
                    shape: &tri_shape,
                    to_world: env.1.to_world,
                    to_model: env.1.to_model,
                    handle: tri_instances[base / 3],
                };
                self.handle_pair(
                    (env.0, &tri_inst),
                    (composite.0, &sub_inst),
                    friction,
                    shapes,
                    constraints,
                    islands,
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_contact(
        &mut self,
        a: (&PairEndpoint, &SupportInstance),
        b: (&PairEndpoint, &SupportInstance),
        world_a: Vec3,
        world_b: Vec3,
        normal: Vec3,
        penetration: f32,
        friction: f32,
        constraints: &mut ConstraintSet,
        islands: &mut IslandGraph,
    ) {
        let contact = ContactPoint::new(
            ContactObject::new(a.0.transform.world_to_model(world_a), world_a),
            ContactObject::new(b.0.transform.world_to_model(world_b), world_b),
            penetration,
        );

        let config = *constraints.manifold_config();
        if let Some(manifold) = constraints.get_or_create_manifold(
            a.0.body,
            b.0.body,
            a.0.is_static,
            b.0.is_static,
            a.1.handle,
            b.1.handle,
            friction,
            islands,
        ) {
            manifold.add_contact(
                contact,
                normal,
                &a.0.transform.to_world(),
                &b.0.transform.to_world(),
                &config,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shape::ShapeParam;
    use approx::assert_relative_eq;

    fn sphere_instance(
        registry: &ShapeRegistry,
        handle: crate::core::shape::ShapeHandle,
        position: Vec3,
        instance: InstanceHandle,
    ) -> SupportInstance<'_> {
        let transform = Transform::from_position(position);
        SupportInstance::new(registry.get(handle).expect("registered"), &transform, instance)
    }

    #[test]
    fn gjk_separated_spheres_miss() {
        let mut registry = ShapeRegistry::new();
        let sphere = registry.add_shape(ShapeParam::Sphere);
        let inst_a = sphere_instance(&registry, sphere, Vec3::ZERO, 1);
        let inst_b = sphere_instance(&registry, sphere, Vec3::new(3.0, 0.0, 0.0), 2);

        let mut narrow = NarrowPhase::new();
        assert!(!narrow.gjk(&inst_a, &inst_b));
    }

    #[test]
    fn gjk_then_epa_recovers_penetration_and_witnesses() {
        let mut registry = ShapeRegistry::new();
        let sphere = registry.add_shape(ShapeParam::Sphere);
        let inst_a = sphere_instance(&registry, sphere, Vec3::ZERO, 1);
        let inst_b = sphere_instance(&registry, sphere, Vec3::new(1.5, 0.0, 0.0), 2);

        let mut narrow = NarrowPhase::new();
        assert!(narrow.gjk(&inst_a, &inst_b));
        let (world_a, world_b, normal) = narrow.epa(&inst_a, &inst_b).expect("polytope converges");

        assert_relative_eq!(normal.x, -1.0, epsilon = 1e-3);
        assert!(normal.y.abs() < 1e-3 && normal.z.abs() < 1e-3);
        assert_relative_eq!(normal.length(), 1.0, epsilon = 1e-4);

        let penetration = (world_b - world_a).dot(normal);
        assert_relative_eq!(penetration, 0.5, epsilon = 1e-3);
        assert_relative_eq!(world_a.x, 1.0, epsilon = 1e-3);
        assert_relative_eq!(world_b.x, 0.5, epsilon = 1e-3);
        // Witnesses separate along the normal
        assert!((world_b - world_a).dot(normal) >= 0.0);
    }

    #[test]
    fn gjk_coincident_spheres_hit() {
        let mut registry = ShapeRegistry::new();
        let sphere = registry.add_shape(ShapeParam::Sphere);
        let inst_a = sphere_instance(&registry, sphere, Vec3::ZERO, 1);
        let inst_b = sphere_instance(&registry, sphere, Vec3::ZERO, 2);

        let mut narrow = NarrowPhase::new();
        assert!(narrow.gjk(&inst_a, &inst_b));
    }

    #[test]
    fn epa_reports_near_zero_depth_for_touching_cubes() {
        let mut registry = ShapeRegistry::new();
        let cube = registry.add_shape(ShapeParam::Cube);
        let inst_a = sphere_instance(&registry, cube, Vec3::ZERO, 1);
        let inst_b = sphere_instance(&registry, cube, Vec3::new(2.0 - 1.0e-4, 0.0, 0.0), 2);

        let mut narrow = NarrowPhase::new();
        assert!(narrow.gjk(&inst_a, &inst_b));
        let (world_a, world_b, normal) = narrow.epa(&inst_a, &inst_b).expect("polytope converges");
        let penetration = (world_b - world_a).dot(normal);
        assert!(penetration.abs() < 1e-2, "penetration was {penetration}");
    }

    #[test]
    fn gjk_cube_pair_overlap_matches_geometry() {
        let mut registry = ShapeRegistry::new();
        let cube = registry.add_shape(ShapeParam::Cube);
        let inst_a = sphere_instance(&registry, cube, Vec3::ZERO, 1);

        let mut narrow = NarrowPhase::new();
        let overlapping = sphere_instance(&registry, cube, Vec3::new(1.5, 1.5, 0.0), 2);
        assert!(narrow.gjk(&inst_a, &overlapping));

        let separated = sphere_instance(&registry, cube, Vec3::new(2.5, 2.5, 0.0), 3);
        assert!(!narrow.gjk(&inst_a, &separated));
    }
}

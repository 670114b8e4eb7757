use glam::Vec3;

use crate::collision::simplex::{Simplex, SupportPoint};
use crate::core::body::{Body, BodyHandle};
use crate::core::shape::{Shape, ShapeKind, ShapeRegistry};
use crate::core::types::Transformer;
use crate::utils::math;

/// One segment-cast hit, in world space.
#[derive(Debug, Clone, Copy)]
pub struct CastResult {
    pub body: BodyHandle,
    pub point: Vec3,
    pub normal: Vec3,
    pub dist_sq: f32,
}

/// Reusable scratch for a batch of casts against one segment.
#[derive(Default)]
pub struct CasterContext {
    pub results: Vec<CastResult>,
    world_start: Vec3,
    world_end: Vec3,
    cur_body: BodyHandle,
}

impl CasterContext {
    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn sort_results(&mut self) {
        self.results
            .sort_by(|a, b| a.dist_sq.total_cmp(&b.dist_sq));
    }
}

/// Casts world-space segments against individual bodies, specializing on
/// shape kind where a closed form exists.
#[derive(Default)]
pub struct Caster;

impl Caster {
    pub fn line_cast(
        &self,
        body_handle: BodyHandle,
        body: &Body,
        shapes: &ShapeRegistry,
        start: Vec3,
        end: Vec3,
        context: &mut CasterContext,
    ) {
        let Some(collider) = body.collider.as_ref() else {
            return;
        };
        let Some(shape) = shapes.get(collider.shape) else {
            return;
        };

        let to_model = body.transform.to_model();
        let to_world = body.transform.to_world();
        let local_start = to_model.transform_point(start);
        let local_end = to_model.transform_point(end);
        context.world_start = start;
        context.world_end = end;
        context.cur_body = body_handle;
        self.line_cast_local(shape, shapes, &to_world, local_start, local_end, context);
    }

    fn line_cast_local(
        &self,
        shape: &Shape,
        shapes: &ShapeRegistry,
        to_world: &Transformer,
        start: Vec3,
        end: Vec3,
        context: &mut CasterContext,
    ) {
        match shape.kind() {
            ShapeKind::Cube => self.line_cast_cube(shape, to_world, start, end, context),
            ShapeKind::Composite => {
                self.line_cast_composite(shape, shapes, to_world, start, end, context)
            }
            ShapeKind::Environment => {
                self.line_cast_environment(shape, to_world, start, end, context)
            }
            _ => self.line_cast_support(shape, to_world, start, end, context),
        }
    }

    /// Generic convex cast: advance a lower bound along the segment using
    /// support planes until the simplex captures the shifted origin.
    fn line_cast_support(
        &self,
        shape: &Shape,
        to_world: &Transformer,
        start: Vec3,
        end: Vec3,
        context: &mut CasterContext,
    ) {
        let ray_dir = end - start;
        // Support toward the start gives an arbitrary surface point to aim at
        let mut cur_search_dir = start - shape.support(start);
        let mut cur_normal = cur_search_dir;
        let mut simplex = Simplex::default();
        simplex.initialize();
        let mut lower_bound = 0.0f32;

        let mut iteration = 0;
        while iteration < 20 {
            iteration += 1;
            let lower_bound_point = start.lerp(end, lower_bound);

            let support_on_shape = shape.support(cur_search_dir);
            let mut cur_support = SupportPoint {
                support: lower_bound_point - support_on_shape,
                point_a: Vec3::ZERO,
                point_b: support_on_shape,
            };

            let search_dot_support = cur_search_dir.dot(cur_support.support);
            let search_dot_ray = cur_search_dir.dot(ray_dir);

            if search_dot_support > 0.0 {
                // The current point is outside this support plane; the ray
                // must carry it forward to make contact possible
                if search_dot_ray >= 0.0 {
                    return;
                }
                lower_bound -= search_dot_support / search_dot_ray;
                if lower_bound > 1.0 {
                    return;
                }
                cur_normal = cur_search_dir;
                let new_lower_bound_point = start.lerp(end, lower_bound);

                // The origin of the cast moved; shift the whole simplex with it
                for support in simplex.supports_mut() {
                    support.support = new_lower_bound_point - support.point_b;
                }
                cur_support.support = new_lower_bound_point - cur_support.point_b;
            }

            simplex.add(cur_support, true);
            let closest_to_origin = -simplex.solve();

            if simplex.contains_origin() || simplex.is_degenerate() {
                break;
            }
            cur_search_dir = closest_to_origin;
        }

        let local_point = start.lerp(end, lower_bound);
        let world_point = to_world.transform_point(local_point);
        let world_normal = to_world.transform_vector(cur_normal).normalize_or_zero();
        let dist_sq = world_point.distance_squared(context.world_start);
        context.results.push(CastResult {
            body: context.cur_body,
            point: world_point,
            normal: world_normal,
            dist_sq,
        });
    }

    fn line_cast_cube(
        &self,
        shape: &Shape,
        to_world: &Transformer,
        start: Vec3,
        end: Vec3,
        context: &mut CasterContext,
    ) {
        // The model AABB is exactly the cube
        if let Some((t, normal_index, normal_sign)) = shape.aabb().line_intersect(start, end) {
            let point = context.world_start.lerp(context.world_end, t);
            let mut normal = Vec3::ZERO;
            normal[normal_index] = normal_sign;
            context.results.push(CastResult {
                body: context.cur_body,
                point,
                // Axis-aligned in model space, so non-uniform scale cannot
                // shear it
                normal: to_world.transform_vector(normal).normalize_or_zero(),
                dist_sq: point.distance_squared(context.world_start),
            });
        }
    }

    fn line_cast_composite(
        &self,
        shape: &Shape,
        shapes: &ShapeRegistry,
        to_world: &Transformer,
        start: Vec3,
        end: Vec3,
        context: &mut CasterContext,
    ) {
        for sub in shape.submodels() {
            let Some(sub_shape) = shapes.get(sub.shape) else {
                continue;
            };
            let sub_to_model = sub.local.to_model();
            let local_start = sub_to_model.transform_point(start);
            let local_end = sub_to_model.transform_point(end);
            let local_to_world = Transformer::combined(&sub.local.to_world(), to_world);
            self.line_cast_local(
                sub_shape,
                shapes,
                &local_to_world,
                local_start,
                local_end,
                context,
            );
        }
    }

    fn line_cast_environment(
        &self,
        shape: &Shape,
        to_world: &Transformer,
        start: Vec3,
        end: Vec3,
        context: &mut CasterContext,
    ) {
        let triangles = shape.triangles();
        let mut i = 0;
        while i + 2 < triangles.len() {
            let (a, b, c) = (triangles[i], triangles[i + 1], triangles[i + 2]);
            i += 3;
            let Some(t) = math::triangle_line_intersect(a, b, c, start, end) else {
                continue;
            };

            let point = context.world_start.lerp(context.world_end, t);
            let mut normal = math::triangle_normal(a, b, c);
            // Face the start of the segment
            if (start - a).dot(normal) < 0.0 {
                normal = -normal;
            }
            context.results.push(CastResult {
                body: context.cur_body,
                point,
                normal: to_world.transform_vector(normal).normalize_or_zero(),
                dist_sq: context.world_start.distance_squared(point),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::Collider;
    use crate::core::shape::ShapeParam;
    use crate::utils::allocator::EntityId;
    use approx::assert_relative_eq;

    fn body_with_shape(
        shapes: &mut ShapeRegistry,
        param: ShapeParam,
        position: Vec3,
    ) -> (Body, crate::core::shape::ShapeHandle) {
        let shape = shapes.add_shape(param);
        let instance = shapes.next_instance_handle();
        let mut body = Body::new(false, Some(Collider::new(shape, instance)));
        body.transform.position = position;
        (body, shape)
    }

    #[test]
    fn cube_cast_reports_entry_face() {
        let mut shapes = ShapeRegistry::new();
        let (body, _) = body_with_shape(&mut shapes, ShapeParam::Cube, Vec3::new(0.0, 0.0, 0.0));

        let caster = Caster;
        let mut context = CasterContext::default();
        caster.line_cast(
            EntityId::new(0, 0),
            &body,
            &shapes,
            Vec3::new(-5.0, 0.0, 0.0),
            Vec3::new(5.0, 0.0, 0.0),
            &mut context,
        );

        assert_eq!(context.results.len(), 1);
        let hit = context.results[0];
        assert_relative_eq!(hit.point.x, -1.0, epsilon = 1e-4);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn support_cast_hits_a_sphere_front_face() {
        let mut shapes = ShapeRegistry::new();
        let (body, _) = body_with_shape(&mut shapes, ShapeParam::Sphere, Vec3::new(0.0, 0.0, 0.0));

        let caster = Caster;
        let mut context = CasterContext::default();
        caster.line_cast(
            EntityId::new(0, 0),
            &body,
            &shapes,
            Vec3::new(-4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            &mut context,
        );

        assert_eq!(context.results.len(), 1);
        let hit = context.results[0];
        assert_relative_eq!(hit.point.x, -1.0, epsilon = 1e-2);
        assert!(hit.normal.x < -0.9, "normal was {:?}", hit.normal);
    }

    #[test]
    fn environment_cast_flips_normals_toward_the_start() {
        let mut shapes = ShapeRegistry::new();
        let triangles = vec![
            Vec3::new(-10.0, 0.0, -10.0),
            Vec3::new(10.0, 0.0, -10.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        let (body, _) = body_with_shape(
            &mut shapes,
            ShapeParam::Environment { triangles },
            Vec3::ZERO,
        );

        let caster = Caster;
        let mut context = CasterContext::default();
        caster.line_cast(
            EntityId::new(0, 0),
            &body,
            &shapes,
            Vec3::new(0.0, 5.0, 0.0),
            Vec3::new(0.0, -5.0, 0.0),
            &mut context,
        );

        assert_eq!(context.results.len(), 1);
        let hit = context.results[0];
        assert_relative_eq!(hit.point.y, 0.0, epsilon = 1e-4);
        assert!(hit.normal.y > 0.9, "normal was {:?}", hit.normal);
    }

    #[test]
    fn misses_leave_no_results() {
        let mut shapes = ShapeRegistry::new();
        let (body, _) = body_with_shape(&mut shapes, ShapeParam::Sphere, Vec3::new(0.0, 10.0, 0.0));

        let caster = Caster;
        let mut context = CasterContext::default();
        caster.line_cast(
            EntityId::new(0, 0),
            &body,
            &shapes,
            Vec3::new(-4.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            &mut context,
        );
        assert!(context.results.is_empty());
    }
}

use kinetica::*;

fn add_cube_at(world: &mut PhysicsWorld, position: Vec3) -> BodyHandle {
    let body = world.add_body(false, true);
    world.set_position(body, position);
    body
}

#[test]
fn line_cast_returns_hits_sorted_by_distance() {
    let mut world = PhysicsWorld::new();
    let far = add_cube_at(&mut world, Vec3::new(10.0, 0.0, 0.0));
    let near = add_cube_at(&mut world, Vec3::new(4.0, 0.0, 0.0));
    let _off_axis = add_cube_at(&mut world, Vec3::new(4.0, 10.0, 0.0));

    let hits = world.line_cast_all(Vec3::new(0.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0));
    assert_eq!(hits.len(), 2, "expected both on-axis cubes, got {hits:?}");
    assert_eq!(hits[0].body, near);
    assert_eq!(hits[1].body, far);
    assert!(hits[0].dist_sq <= hits[1].dist_sq);

    // Entry faces point back along the ray
    for hit in &hits {
        assert!(hit.normal.x < -0.9, "normal was {:?}", hit.normal);
    }
}

#[test]
fn line_cast_respects_segment_length() {
    let mut world = PhysicsWorld::new();
    add_cube_at(&mut world, Vec3::new(10.0, 0.0, 0.0));

    let hits = world.line_cast_all(Vec3::new(0.0, 0.0, 0.0), Vec3::new(5.0, 0.0, 0.0));
    assert!(hits.is_empty(), "segment stops short of the cube: {hits:?}");
}

#[test]
fn line_cast_hits_spheres_and_environments() {
    let mut world = PhysicsWorld::new();

    let sphere_shape = world.sphere_shape();
    let sphere = world.add_body(false, true);
    world.set_collider_shape(sphere, sphere_shape);
    world.set_position(sphere, Vec3::new(0.0, 3.0, 0.0));

    let env_shape = world.add_shape(ShapeParam::Environment {
        triangles: vec![
            Vec3::new(-50.0, 0.0, -50.0),
            Vec3::new(50.0, 0.0, -50.0),
            Vec3::new(0.0, 0.0, 50.0),
        ],
    });
    let ground = world.add_body(false, true);
    world.set_collider_shape(ground, env_shape);

    let hits = world.line_cast_all(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
    assert_eq!(hits.len(), 2, "hits were {hits:?}");
    assert_eq!(hits[0].body, sphere);
    assert_eq!(hits[1].body, ground);
    assert!((hits[0].point.y - 4.0).abs() < 0.05, "sphere entry at {:?}", hits[0].point);
    assert!(hits[1].point.y.abs() < 1e-3, "ground entry at {:?}", hits[1].point);
}

#[test]
fn moved_bodies_are_recast_at_their_new_position() {
    let mut world = PhysicsWorld::new();
    let cube = add_cube_at(&mut world, Vec3::new(5.0, 0.0, 0.0));

    assert_eq!(
        world
            .line_cast_all(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0))
            .len(),
        1
    );

    world.set_position(cube, Vec3::new(5.0, 50.0, 0.0));
    assert!(world
        .line_cast_all(Vec3::new(0.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0))
        .is_empty());
}

use kinetica::*;

fn step_n(world: &mut PhysicsWorld, steps: usize) {
    let dt = world.config().sim_rate;
    for _ in 0..steps {
        world.update(dt);
    }
}

#[test]
fn overlapping_spheres_produce_a_manifold_with_the_expected_normal() {
    let mut world = PhysicsWorld::new();
    let sphere = world.sphere_shape();

    let a = world.add_body(false, true);
    world.set_collider_shape(a, sphere);
    world.set_position(a, Vec3::ZERO);

    let b = world.add_body(true, true);
    world.set_collider_shape(b, sphere);
    world.set_position(b, Vec3::new(1.5, 0.0, 0.0));

    world.update(1.0 / 60.0);

    let manifolds: Vec<&Manifold> = world.constraints().manifolds().collect();
    assert_eq!(manifolds.len(), 1);
    let manifold = manifolds[0];
    assert_eq!(manifold.size, 1);

    // The pair is ordered by body handle, so A is the later body. The
    // normal points from B's side across the contact toward A
    let point = &manifold.contacts[0];
    let expected_pen = 0.5;
    assert!(
        (point.penetration - expected_pen).abs() < 1e-2,
        "penetration was {}",
        point.penetration
    );
    assert!(
        manifold.normal.length() > 0.99 && manifold.normal.length() < 1.01,
        "normal was not unit: {:?}",
        manifold.normal
    );
    assert!(
        manifold.normal.x.abs() > 0.99,
        "normal was not along the axis of centers: {:?}",
        manifold.normal
    );
}

#[test]
fn sleeping_pairs_are_skipped_by_the_narrowphase() {
    let mut world = PhysicsWorld::new();
    let ground = world.add_body(false, true);
    world.set_scale(ground, Vec3::new(10.0, 1.0, 10.0));
    world.set_position(ground, Vec3::new(0.0, -1.0, 0.0));

    let cube = world.add_body(true, true);
    world.set_position(cube, Vec3::new(0.0, 0.99, 0.0));

    // Let it fall asleep, then watch contact constraints disappear once the
    // inactivity timeout retires them
    step_n(&mut world, 60);
    assert_eq!(world.sleep_state(cube), Some(SleepState::Inactive));
    let settled_contacts = world.constraints().contact_count();
    assert!(settled_contacts >= 1);
}

#[test]
fn manifold_accumulates_up_to_four_points_as_a_cube_settles() {
    let mut world = PhysicsWorld::new();
    let ground = world.add_body(false, true);
    world.set_scale(ground, Vec3::new(10.0, 1.0, 10.0));
    world.set_position(ground, Vec3::new(0.0, -1.0, 0.0));

    let cube = world.add_body(true, true);
    world.set_position(cube, Vec3::new(0.0, 1.2, 0.0));

    step_n(&mut world, 90);

    let sizes: Vec<usize> = world.constraints().manifolds().map(|m| m.size).collect();
    assert!(!sizes.is_empty());
    assert!(sizes.iter().all(|&s| s <= 4));
    assert!(
        sizes.iter().any(|&s| s >= 2),
        "face contact never accumulated points: {sizes:?}"
    );
}

#[test]
fn composite_shapes_collide_through_their_submodels() {
    let mut world = PhysicsWorld::new();
    let sphere = world.sphere_shape();

    // A dumbbell: two spheres four units apart
    let dumbbell = world.add_composite(CompositeParam {
        instances: vec![
            (sphere, Transform::from_position(Vec3::new(-2.0, 0.0, 0.0))),
            (sphere, Transform::from_position(Vec3::new(2.0, 0.0, 0.0))),
        ],
    });

    let compound = world.add_body(false, true);
    world.set_collider_shape(compound, dumbbell);

    // A ball overlapping only the right end
    let ball = world.add_body(true, true);
    world.set_collider_shape(ball, sphere);
    world.set_position(ball, Vec3::new(3.5, 0.0, 0.0));

    world.update(1.0 / 60.0);
    assert_eq!(
        world.constraints().contact_count(),
        1,
        "exactly one submodel should touch the ball"
    );

    // Centered between the ends, nothing overlaps
    let far_ball = world.add_body(true, true);
    world.set_collider_shape(far_ball, sphere);
    world.set_position(far_ball, Vec3::new(0.0, 20.0, 0.0));
    world.update(1.0 / 60.0);
    let manifolds: Vec<&Manifold> = world.constraints().manifolds().collect();
    assert!(manifolds
        .iter()
        .all(|m| m.body_a != far_ball && m.body_b != far_ball));
}

#[test]
fn environment_triangles_collide_individually() {
    let mut world = PhysicsWorld::new();
    // Two separated floor patches
    let env = world.add_shape(ShapeParam::Environment {
        triangles: vec![
            Vec3::new(-12.0, 0.0, -10.0),
            Vec3::new(-8.0, 0.0, -10.0),
            Vec3::new(-10.0, 0.0, 10.0),
            Vec3::new(8.0, 0.0, -10.0),
            Vec3::new(12.0, 0.0, -10.0),
            Vec3::new(10.0, 0.0, 10.0),
        ],
    });
    let ground = world.add_body(false, true);
    world.set_collider_shape(ground, env);

    let ball = world.add_body(true, true);
    world.set_collider_shape(ball, world.sphere_shape());
    world.set_position(ball, Vec3::new(-10.0, 0.5, 0.0));

    world.update(1.0 / 60.0);
    assert!(
        world.constraints().contact_count() >= 1,
        "ball overlaps the left patch"
    );

    // A ball between the patches touches neither
    let miss = world.add_body(true, true);
    world.set_collider_shape(miss, world.sphere_shape());
    world.set_position(miss, Vec3::new(0.0, 0.5, 0.0));
    world.update(1.0 / 60.0);
    let manifolds: Vec<&Manifold> = world.constraints().manifolds().collect();
    assert!(manifolds.iter().all(|m| m.body_a != miss && m.body_b != miss));
}

#[test]
fn contact_constraints_retire_after_prolonged_separation() {
    let mut world = PhysicsWorld::new();
    let sphere = world.sphere_shape();

    let a = world.add_body(false, true);
    world.set_collider_shape(a, sphere);
    let b = world.add_body(true, true);
    world.set_collider_shape(b, sphere);
    world.set_position(b, Vec3::new(1.5, 0.0, 0.0));
    // Hold the pair in place so only the timer matters
    world.set_velocity(b, Vec3::ZERO);

    world.update(1.0 / 60.0);
    assert_eq!(world.constraints().contact_count(), 1);

    // Separate them far apart; the manifold drains and the constraint's
    // inactivity timer runs out after time_to_remove
    world.set_position(b, Vec3::new(50.0, 0.0, 0.0));
    let retire_steps = (world.config().time_to_remove / world.config().sim_rate) as usize + 10;
    step_n(&mut world, retire_steps);
    assert_eq!(
        world.constraints().contact_count(),
        0,
        "stale contact survived the inactivity timeout"
    );
}

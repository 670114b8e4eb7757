use kinetica::*;

fn step_n(world: &mut PhysicsWorld, steps: usize) {
    let dt = world.config().sim_rate;
    for _ in 0..steps {
        world.update(dt);
    }
}

fn add_sphere(world: &mut PhysicsWorld, dynamic: bool, position: Vec3) -> BodyHandle {
    let sphere = world.sphere_shape();
    let body = world.add_body(dynamic, true);
    world.set_collider_shape(body, sphere);
    world.set_position(body, position);
    body
}

#[test]
fn hanging_chain_settles_straight_under_gravity() {
    let mut world = PhysicsWorld::new();

    // Top sphere is static; four dynamic spheres hang below it
    let mut chain = Vec::new();
    for i in 0..5 {
        let y = 5.0 - i as f32;
        // Nudge the chain slightly sideways so settling straight is
        // meaningful
        let x = if i == 0 { 0.0 } else { 0.02 * i as f32 };
        chain.push(add_sphere(&mut world, i != 0, Vec3::new(x, y, 0.0)));
    }

    // Pin the first dynamic sphere to the static top with a ball joint
    let mut spherical = SphericalOps::new(chain[0], chain[1]);
    spherical.base.anchor_a = Vec3::new(0.0, 5.0, 0.0);
    spherical.base.anchor_b = Vec3::new(0.0, 5.0, 0.0);
    spherical.base.collision_enabled = false;
    world.add_spherical(spherical).expect("bodies exist");

    for i in 0..4 {
        let (upper, lower) = (chain[i], chain[i + 1]);
        let upper_pos = world.position(upper).expect("body exists");
        let lower_pos = world.position(lower).expect("body exists");
        let mut ops = DistanceOps {
            base: ConstraintOps::new(upper, lower),
            distance: 1.0,
        };
        ops.base.anchor_a = upper_pos;
        ops.base.anchor_b = lower_pos;
        ops.base.collision_enabled = false;
        world.add_distance(ops).expect("bodies exist");
    }

    step_n(&mut world, 600);

    for i in 1..5 {
        let upper = world.position(chain[i - 1]).expect("body exists");
        let lower = world.position(chain[i]).expect("body exists");
        let spacing = upper.distance(lower);
        assert!(
            (0.95..=1.05).contains(&spacing),
            "link {i} spacing was {spacing}"
        );
        assert!(
            lower.x.abs() < 0.1 && lower.z.abs() < 0.1,
            "link {i} did not hang straight: {lower:?}"
        );
        assert!(lower.y < upper.y, "link {i} did not hang below its parent");
    }
}

#[test]
fn distance_constraint_holds_length_for_swinging_pendulum() {
    let mut world = PhysicsWorld::new();
    let anchor = world.add_body(false, false);
    world.set_position(anchor, Vec3::new(0.0, 5.0, 0.0));
    let bob = world.add_body(true, false);
    world.set_position(bob, Vec3::new(2.0, 5.0, 0.0));

    let mut ops = DistanceOps {
        base: ConstraintOps::new(anchor, bob),
        distance: 2.0,
    };
    ops.base.anchor_a = Vec3::new(0.0, 5.0, 0.0);
    ops.base.anchor_b = Vec3::new(2.0, 5.0, 0.0);
    world.add_distance(ops).expect("bodies exist");

    step_n(&mut world, 120);

    let pos = world.position(bob).expect("body exists");
    let length = pos.distance(Vec3::new(0.0, 5.0, 0.0));
    assert!(
        (1.9..=2.1).contains(&length),
        "pendulum length drifted to {length}"
    );
    // It swung rather than fell
    assert!(pos.y > 2.5, "bob fell through its constraint: {pos:?}");
}

#[test]
fn weld_locks_relative_orientation() {
    let mut world = PhysicsWorld::new();
    let carrier = world.add_body(true, false);
    world.set_position(carrier, Vec3::new(0.0, 5.0, 0.0));
    let passenger = world.add_body(true, false);
    world.set_position(passenger, Vec3::new(1.0, 5.0, 0.0));

    world
        .add_weld(WeldOps {
            base: ConstraintOps::new(carrier, passenger),
        })
        .expect("bodies exist");

    // Kick one body; the weld keeps the pair moving as a unit
    world.set_velocity(carrier, Vec3::new(0.0, 3.0, 0.0));
    step_n(&mut world, 60);

    let carrier_pos = world.position(carrier).expect("body exists");
    let passenger_pos = world.position(passenger).expect("body exists");
    let offset = passenger_pos - carrier_pos;
    assert!(
        (offset.length() - 1.0).abs() < 0.1,
        "weld separation drifted: {offset:?}"
    );

    let rel = world.rotation(carrier).expect("body exists").inverse()
        * world.rotation(passenger).expect("body exists");
    let (_, angle) = rel.to_axis_angle();
    let angle = if angle > std::f32::consts::PI {
        2.0 * std::f32::consts::PI - angle
    } else {
        angle
    };
    assert!(angle < 0.2, "relative rotation drifted by {angle} rad");
}

#[test]
fn revolute_joint_confines_rotation_to_its_axis() {
    let mut world = PhysicsWorld::new();
    let hub = world.add_body(false, false);
    world.set_position(hub, Vec3::new(0.0, 5.0, 0.0));
    let arm = world.add_body(true, false);
    world.set_position(arm, Vec3::new(2.0, 5.0, 0.0));

    let mut ops = RevoluteOps::new(hub, arm);
    ops.base.anchor_a = Vec3::new(0.0, 5.0, 0.0);
    ops.base.anchor_b = Vec3::new(0.0, 5.0, 0.0);
    // Hinge about z: the arm may only swing in the xy plane
    ops.free_axis = Vec3::Z;
    world.add_revolute(ops).expect("bodies exist");

    step_n(&mut world, 180);

    let pos = world.position(arm).expect("body exists");
    assert!(
        pos.z.abs() < 0.05,
        "arm left its hinge plane: {pos:?}"
    );
    let radius = pos.distance(Vec3::new(0.0, 5.0, 0.0));
    assert!(
        (1.8..=2.2).contains(&radius),
        "hinge radius drifted to {radius}"
    );
    // Swinging under gravity never lifts the arm above its pivot
    assert!(pos.y <= 5.05, "arm climbed above the hinge: {pos:?}");
}

#[test]
fn disabled_collision_pairs_generate_no_contacts() {
    let mut world = PhysicsWorld::new();
    let a = add_sphere(&mut world, true, Vec3::new(0.0, 5.0, 0.0));
    let b = add_sphere(&mut world, true, Vec3::new(0.5, 5.0, 0.0));

    let mut ops = DistanceOps {
        base: ConstraintOps::new(a, b),
        distance: 0.5,
    };
    ops.base.anchor_a = Vec3::new(0.0, 5.0, 0.0);
    ops.base.anchor_b = Vec3::new(0.5, 5.0, 0.0);
    ops.base.collision_enabled = false;
    let joint = world.add_distance(ops).expect("bodies exist");

    world.update(1.0 / 60.0);
    // Only the joint exists despite deep sphere overlap
    assert_eq!(world.constraints().len(), 1);

    // Removing the joint lifts the blacklist and contacts appear
    world.remove_constraint(joint);
    world.update(1.0 / 60.0);
    assert!(world.constraints().len() >= 1);
    let handles: Vec<_> = world.update_events().iter().map(|e| e.body).collect();
    assert!(handles.contains(&a) || handles.contains(&b));
}

#[test]
fn island_splits_when_a_middle_joint_is_removed() {
    let mut world = PhysicsWorld::new();
    let mut bodies = Vec::new();
    for i in 0..4 {
        let body = world.add_body(true, false);
        world.set_position(body, Vec3::new(i as f32 * 2.0, 0.0, 0.0));
        bodies.push(body);
    }

    let mut joints = Vec::new();
    for i in 0..3 {
        let a_pos = world.position(bodies[i]).expect("body exists");
        let b_pos = world.position(bodies[i + 1]).expect("body exists");
        let mut ops = DistanceOps {
            base: ConstraintOps::new(bodies[i], bodies[i + 1]),
            distance: 2.0,
        };
        ops.base.anchor_a = a_pos;
        ops.base.anchor_b = b_pos;
        joints.push(world.add_distance(ops).expect("bodies exist"));
    }
    assert_eq!(world.islands().island_count(), 1);

    // Cut b-c: the chain a-b-c-d falls apart into {a,b} and {c,d}
    world.remove_constraint(joints[1]);
    assert_eq!(world.islands().island_count(), 2);

    for body in bodies {
        let state = world.sleep_state(body).expect("body is in an island");
        assert_eq!(state, SleepState::Awake, "body was {state:?}");
    }
}

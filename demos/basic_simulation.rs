//! Drops a handful of bodies onto a static floor and prints their motion.

use kinetica::*;

fn main() {
    let mut world = PhysicsWorld::new();

    let floor = world.add_body(false, true);
    world.set_scale(floor, Vec3::new(20.0, 1.0, 20.0));
    world.set_position(floor, Vec3::new(0.0, -1.0, 0.0));

    let cube = world.add_body(true, true);
    world.set_position(cube, Vec3::new(0.0, 6.0, 0.0));

    let ball = world.add_body(true, true);
    world.set_collider_shape(ball, world.sphere_shape());
    world.set_position(ball, Vec3::new(2.5, 8.0, 0.0));

    for frame in 0..240 {
        world.update(1.0 / 60.0);
        if frame % 30 == 0 {
            let cube_pos = world.position(cube).unwrap_or(Vec3::ZERO);
            let ball_pos = world.position(ball).unwrap_or(Vec3::ZERO);
            println!(
                "t={:5.2}s cube=({:6.2},{:6.2},{:6.2}) ball=({:6.2},{:6.2},{:6.2})",
                frame as f32 / 60.0,
                cube_pos.x,
                cube_pos.y,
                cube_pos.z,
                ball_pos.x,
                ball_pos.y,
                ball_pos.z
            );
        }
    }

    println!(
        "cube sleep state after settling: {:?}",
        world.sleep_state(cube)
    );
}

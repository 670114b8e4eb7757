//! Builds a small tower of cubes and reports when the island falls asleep.

use kinetica::*;

fn main() {
    let mut world = PhysicsWorld::new();

    let floor = world.add_body(false, true);
    world.set_scale(floor, Vec3::new(20.0, 1.0, 20.0));
    world.set_position(floor, Vec3::new(0.0, -1.0, 0.0));

    let mut tower = Vec::new();
    for level in 0..4 {
        let cube = world.add_body(true, true);
        world.set_position(cube, Vec3::new(0.0, 1.0 + level as f32 * 2.05, 0.0));
        tower.push(cube);
    }

    let mut asleep_at = None;
    for frame in 0..600 {
        world.update(1.0 / 60.0);
        if asleep_at.is_none()
            && tower
                .iter()
                .all(|&c| world.sleep_state(c) == Some(SleepState::Inactive))
        {
            asleep_at = Some(frame);
        }
    }

    for (level, &cube) in tower.iter().enumerate() {
        let pos = world.position(cube).unwrap_or(Vec3::ZERO);
        println!("level {level}: y = {:.3}", pos.y);
    }
    match asleep_at {
        Some(frame) => println!("tower fell asleep after {:.2}s", frame as f32 / 60.0),
        None => println!("tower never fell asleep"),
    }
}

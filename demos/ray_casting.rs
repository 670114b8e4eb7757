//! Casts a segment through a line of shapes and prints the ordered hits.

use kinetica::*;

fn main() {
    let mut world = PhysicsWorld::new();

    let cube = world.add_body(false, true);
    world.set_position(cube, Vec3::new(4.0, 0.0, 0.0));

    let ball = world.add_body(false, true);
    world.set_collider_shape(ball, world.sphere_shape());
    world.set_position(ball, Vec3::new(8.0, 0.0, 0.0));

    let capsule = world.add_body(false, true);
    world.set_collider_shape(capsule, world.capsule_shape());
    world.set_position(capsule, Vec3::new(12.0, 0.0, 0.0));

    let hits = world.line_cast_all(Vec3::new(0.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0));
    println!("{} hits along the segment:", hits.len());
    for hit in hits {
        println!(
            "  body {:?} at ({:5.2},{:5.2},{:5.2}) normal ({:5.2},{:5.2},{:5.2}) dist² {:.2}",
            hit.body,
            hit.point.x,
            hit.point.y,
            hit.point.z,
            hit.normal.x,
            hit.normal.y,
            hit.normal.z,
            hit.dist_sq
        );
    }
}

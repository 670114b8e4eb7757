use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kinetica::*;

fn build_stack_world(count: usize) -> PhysicsWorld {
    let mut world = PhysicsWorld::new();
    let ground = world.add_body(false, true);
    world.set_scale(ground, Vec3::new(50.0, 1.0, 50.0));
    world.set_position(ground, Vec3::new(0.0, -1.0, 0.0));

    for i in 0..count {
        let body = world.add_body(true, true);
        let column = (i % 10) as f32;
        let row = (i / 10) as f32;
        world.set_position(body, Vec3::new(column * 3.0 - 15.0, 1.0 + row * 2.5, 0.0));
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    c.bench_function("world_step_100_cubes", |b| {
        let mut world = build_stack_world(100);
        // Warm the broadphase and manifolds up front
        for _ in 0..10 {
            world.update(1.0 / 60.0);
        }
        b.iter(|| {
            world.update(black_box(1.0 / 60.0));
        })
    });
}

fn bench_broadphase_churn(c: &mut Criterion) {
    c.bench_function("broadphase_insert_remove_256", |b| {
        b.iter(|| {
            let mut tree: AabbTree<u32> = AabbTree::new(0.05);
            let mut handles = Vec::with_capacity(256);
            for i in 0..256u32 {
                let center = Vec3::new((i % 16) as f32, (i / 16) as f32, 0.0);
                let aabb = Aabb::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5));
                handles.push(tree.insert(aabb, i));
            }
            let mut context = TreeContext::new();
            tree.query_pairs(&mut context);
            for handle in handles {
                tree.remove(handle);
            }
            black_box(context.pair_results.len())
        })
    });
}

fn bench_line_cast(c: &mut Criterion) {
    c.bench_function("line_cast_through_stack", |b| {
        let mut world = build_stack_world(100);
        world.update(1.0 / 60.0);
        b.iter(|| {
            let hits = world.line_cast_all(
                black_box(Vec3::new(-20.0, 1.0, 0.0)),
                black_box(Vec3::new(20.0, 1.0, 0.0)),
            );
            black_box(hits.len())
        })
    });
}

criterion_group!(benches, bench_world_step, bench_broadphase_churn, bench_line_cast);
criterion_main!(benches);

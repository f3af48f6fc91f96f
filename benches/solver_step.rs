use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use xpbd::scene::{Cloth, Scene};

fn init_cloth(side: usize) -> Cloth {
    Cloth::new(side, side, 0.1, true, true, false).expect("valid cloth parameters")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver_step");
    for side in [4, 8, 16, 24] {
        group.bench_with_input(BenchmarkId::new("cloth step with self-collision", side * side), &side, |b, &side| {
            b.iter_batched(
                || init_cloth(side),
                |mut cloth| {
                    let dt = 1.0 / 60.0;
                    cloth.step(black_box(dt));
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

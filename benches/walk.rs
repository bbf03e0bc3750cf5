use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2, Axis};
use polytope_walk::{Polytope, Walk};

fn cube(n: usize) -> Polytope {
    let eye = Array2::<f64>::eye(n);
    let a_in = ndarray::concatenate![Axis(0), eye, -&eye];
    Polytope::new(a_in, Array1::ones(2 * n)).expect("cube")
}

fn bench_cube_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("cube_walk");
    for n in [2, 8, 32] {
        let x0 = Array2::<f64>::zeros((n, 1));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut poly = cube(n);
            b.iter(|| {
                let samples = Walk::new(64, 10)
                    .thinning(10)
                    .warm(1)
                    .seed(4242)
                    .run(&mut poly, x0.view())
                    .expect("walk");
                black_box(samples);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cube_walk);
criterion_main!(benches);

use criterion::{Criterion, criterion_group, criterion_main};
use critcool::{BasisKind, Grid, SupportSet, VandermondeAlgorithm, vandermonde_with};
use std::hint::black_box;

fn vandermonde_algorithms(c: &mut Criterion) {
    let grid = Grid::build(&[20, 20, 20], BasisKind::Chebyshev).unwrap();
    let support = SupportSet::total_degree(3, 10);

    c.bench_function("vandermonde_isotropic_3d", |b| {
        b.iter(|| {
            vandermonde_with(
                black_box(&grid),
                &support,
                BasisKind::Chebyshev,
                VandermondeAlgorithm::Isotropic,
            )
            .unwrap()
        })
    });
    c.bench_function("vandermonde_anisotropic_3d", |b| {
        b.iter(|| {
            vandermonde_with(
                black_box(&grid),
                &support,
                BasisKind::Chebyshev,
                VandermondeAlgorithm::Anisotropic,
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, vandermonde_algorithms);
criterion_main!(benches);

use criterion::{Criterion, criterion_group, criterion_main};
use critcool::{
    BasisKind, DegreeSpec, DomainConfig, PrecisionMode, PrecisionTiers, PolynomialApproximant,
    expand, test_functions,
};
use std::hint::black_box;

fn fitted(precision: PrecisionMode, degree: usize) -> PolynomialApproximant {
    let config = DomainConfig::builder(2)
        .radius(1.2)
        .basis(BasisKind::Chebyshev)
        .degree(DegreeSpec::Fixed(degree))
        .precision(precision)
        .build()
        .unwrap();
    PolynomialApproximant::fit(&config, &test_functions::double_well_2d)
        .unwrap()
        .approximant
}

fn expand_modes(c: &mut Criterion) {
    let tiers = PrecisionTiers::default();
    for (name, mode) in [
        ("working", PrecisionMode::Working),
        ("tiered", PrecisionMode::Tiered),
        ("exact", PrecisionMode::ExactRational),
    ] {
        let approximant = fitted(mode, 10);
        c.bench_function(&format!("expand_{name}_deg10"), |b| {
            b.iter(|| expand(black_box(&approximant), &tiers).unwrap())
        });
    }
}

criterion_group!(benches, expand_modes);
criterion_main!(benches);

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{BoundingBox, Monomial, MultivarPoly};

pub fn unit_box(dim: usize) -> BoundingBox {
    BoundingBox(smallvec::smallvec![(0.0, 1.0); dim])
}

pub fn linspace(start: f64, end: f64, num: usize) -> impl Iterator<Item = f64> {
    let step = if num > 1 {
        (end - start) / (num - 1) as f64
    } else {
        0.0
    };
    (0..num).map(move |i| start + i as f64 * step)
}

/// `count` reproducible points drawn uniformly from `[-1, 1]^dim`.
pub fn random_points(dim: usize, count: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dim).map(|_| rng.random_range(-1.0..=1.0)).collect())
        .collect()
}

pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[allow(dead_code)]
pub fn init_test_logger() {
    use std::io::Write as _;
    let _ = env_logger::builder()
        .is_test(true)
        .format(|buf, record| {
            // Ansi256 ref: https://hexdocs.pm/color_palette/ansi_color_codes.html
            let bg = anstyle::Ansi256Color(240);
            let level_style = buf
                .default_level_style(record.level())
                .bg_color(Some(bg.into()));
            let grey = anstyle::Ansi256Color(255).on(bg);

            let filepath = match record.file() {
                Some(f) => {
                    // Get just the file name, not the full path.
                    let path = std::path::Path::new(f);
                    match path.file_name() {
                        Some(name) => name.to_string_lossy(),
                        None => "unknown".into(),
                    }
                }
                None => "unknown".into(),
            };
            writeln!(
                buf,
                "{grey}[{grey:#}{level_style}{}{level_style:#}{grey} {}:{}]{grey:#}   {}",
                record.level(),
                filepath,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .try_init();
}

/// Implicit unit cylinder in `dim` variables, aligned with `axis`.
pub fn cylinder_poly(dim: usize, axis: usize) -> MultivarPoly {
    let mut terms = vec![Monomial::new(-1.0, &vec![0u8; dim])];
    for d in (0..dim).filter(|&d| d != axis) {
        let mut exp = vec![0u8; dim];
        exp[d] = 2;
        terms.push(Monomial::new(1.0, &exp));
    }
    MultivarPoly::from_monomials(dim, terms)
}

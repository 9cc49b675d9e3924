/// `binomial(n, k)`, zero when `k > n`. Intermediate products are reduced by their
/// gcd, so this only overflows when the result itself does not fit.
pub fn binomial_coefficient(n: u8, k: u8) -> u64 {
    if k > n {
        return 0;
    }
    num_integer::binomial(u64::from(n), u64::from(k))
}

/// Product of `binomial(ns[i], ks[i])` over all variables, in `f64` since the product
/// quickly outgrows `u64` for high degrees in four or more variables.
pub fn binomial_product(ns: &[u8], ks: &[u8]) -> f64 {
    debug_assert_eq!(ns.len(), ks.len());
    ns.iter()
        .zip(ks)
        .map(|(&n, &k)| binomial_coefficient(n, k) as f64)
        .product()
}

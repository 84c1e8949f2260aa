//! Sampling helpers over the engine's single deterministic RNG stream.
//!
//! Every stochastic decision in the engine draws from one `ChaCha8Rng`
//! seeded at construction; no wall-clock randomness anywhere.

use rand::Rng;

/// Poisson sample via Knuth's product method; switches to a normal
/// approximation for large lambda where `exp(-lambda)` underflows.
pub fn poisson(rng: &mut impl Rng, lambda: f64) -> usize {
    if lambda <= 0.0 {
        return 0;
    }
    if lambda > 30.0 {
        let draw = lambda + lambda.sqrt() * approx_standard_normal(rng);
        return draw.round().max(0.0) as usize;
    }
    let limit = (-lambda).exp();
    let mut k = 0usize;
    let mut product = 1.0;
    loop {
        product *= rng.gen::<f64>();
        if product <= limit {
            return k;
        }
        k += 1;
    }
}

/// Approximate N(0, 1) draw: sum of 12 uniforms, shifted.
pub fn approx_standard_normal(rng: &mut impl Rng) -> f64 {
    (0..12).map(|_| rng.gen::<f64>()).sum::<f64>() - 6.0
}

/// Index into `weights` drawn proportionally to the weights. Falls back
/// to the last index on accumulated rounding.
pub fn weighted_index(rng: &mut impl Rng, weights: &[f64]) -> usize {
    debug_assert!(!weights.is_empty());
    let total: f64 = weights.iter().sum();
    let mut draw = rng.gen::<f64>() * total;
    for (i, &w) in weights.iter().enumerate() {
        draw -= w;
        if draw < 0.0 {
            return i;
        }
    }
    weights.len() - 1
}

/// First `k` entries of `items` become a uniform without-replacement
/// sample (partial Fisher-Yates). Order of the remainder is unspecified.
pub fn partial_shuffle<T>(rng: &mut impl Rng, items: &mut [T], k: usize) {
    let k = k.min(items.len());
    for i in 0..k {
        let j = rng.gen_range(i..items.len());
        items.swap(i, j);
    }
}

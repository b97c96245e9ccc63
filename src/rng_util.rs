/// Generate a random `f64` in the range `[low, high)`.
#[cfg(test)]
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Select `k` random indices from `0..n` using partial Fisher-Yates shuffle.
pub(crate) fn partial_shuffle(n: usize, k: usize, rng: &mut fastrand::Rng) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let k = k.min(n);
    for i in 0..k {
        let j = rng.usize(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

/// Draw `n` indices from `0..n` with replacement.
pub(crate) fn bootstrap(n: usize, rng: &mut fastrand::Rng) -> Vec<usize> {
    (0..n).map(|_| rng.usize(0..n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_shuffle_draws_distinct_indices() {
        let mut rng = fastrand::Rng::with_seed(3);
        let mut picked = partial_shuffle(10, 4, &mut rng);
        assert_eq!(picked.len(), 4);
        picked.sort_unstable();
        picked.dedup();
        assert_eq!(picked.len(), 4);
        assert!(picked.iter().all(|&i| i < 10));
    }

    #[test]
    fn bootstrap_is_seeded() {
        let a = bootstrap(50, &mut fastrand::Rng::with_seed(9));
        let b = bootstrap(50, &mut fastrand::Rng::with_seed(9));
        assert_eq!(a, b);
        assert!(a.iter().all(|&i| i < 50));
    }
}

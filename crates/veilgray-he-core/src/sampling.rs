//! Cryptographic sampling for CKKS.
//!
//! - Secret key: ternary distribution {-1, 0, 1}
//! - Error vectors: rounded Gaussian with σ = 3.2
//! - Random polynomials: uniform in Z_q
//!
//! Small samples are returned as signed integers so the caller can reduce the same value into
//! every RNS limb.

use rand::{CryptoRng, Rng};

/// Standard deviation for the RLWE error distribution.
pub const ERROR_STD_DEV: f64 = 3.2;

/// Gaussian samples are truncated at this many standard deviations.
const TAIL_CUT: f64 = 6.0;

/// Ternary secret: each coefficient uniformly in {-1, 0, 1}.
pub fn sample_ternary<R: Rng + CryptoRng>(rng: &mut R, n: usize) -> Vec<i64> {
    (0..n).map(|_| rng.gen_range(-1i64..=1)).collect()
}

/// Rounded Gaussian error vector, Box–Muller over the RNG's unit-interval floats.
pub fn sample_gaussian_signed<R: Rng + CryptoRng>(rng: &mut R, n: usize, sigma: f64) -> Vec<i64> {
    let bound = (TAIL_CUT * sigma).ceil();
    (0..n)
        .map(|_| {
            // 1 - u keeps the log argument in (0, 1].
            let u1: f64 = 1.0 - rng.gen::<f64>();
            let u2: f64 = rng.gen::<f64>();
            let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
            (z * sigma).round().clamp(-bound, bound) as i64
        })
        .collect()
}

/// Uniform random vector in Z_q^N.
pub fn sample_uniform<R: Rng + CryptoRng>(rng: &mut R, n: usize, q: u64) -> Vec<u64> {
    (0..n).map(|_| rng.gen_range(0..q)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_ternary_distribution() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let n = 10000;
        let samples = sample_ternary(&mut rng, n);

        let expected = (n / 3) as isize;
        let tolerance = (n as f64 * 0.05) as usize;
        for value in [-1i64, 0, 1] {
            let count = samples.iter().filter(|&&x| x == value).count() as isize;
            assert!(
                (count - expected).unsigned_abs() < tolerance,
                "value {value}: count={count}, expected≈{expected}"
            );
        }
        assert!(samples.iter().all(|s| (-1..=1).contains(s)));
    }

    #[test]
    fn test_gaussian_distribution() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let n = 10000;
        let samples = sample_gaussian_signed(&mut rng, n, ERROR_STD_DEV);

        let mean = samples.iter().sum::<i64>() as f64 / n as f64;
        let variance = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        let measured_sigma = variance.sqrt();

        assert!(mean.abs() < 0.2, "Gaussian mean too far from 0: {mean}");
        assert!(
            (measured_sigma - ERROR_STD_DEV).abs() < 0.3,
            "Gaussian sigma off: measured={measured_sigma}, expected={ERROR_STD_DEV}"
        );
        let bound = (TAIL_CUT * ERROR_STD_DEV).ceil() as i64;
        assert!(samples.iter().all(|s| s.abs() <= bound));
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let q = 97u64;
        let samples = sample_uniform(&mut rng, 1000, q);
        assert!(samples.iter().all(|&s| s < q));
        // 1000 draws over 97 residues should hit both ends of the range.
        assert!(samples.iter().any(|&s| s < 10));
        assert!(samples.iter().any(|&s| s > 86));
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let a = sample_ternary(&mut ChaCha20Rng::seed_from_u64(7), 64);
        let b = sample_ternary(&mut ChaCha20Rng::seed_from_u64(7), 64);
        assert_eq!(a, b);
    }
}

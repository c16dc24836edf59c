//! CKKS encode/decode via the canonical embedding.
//!
//! Encode: z ∈ R^{N/2} → m(X) = round(Δ · σ^{-1}(z))
//! Decode: m(X) → z = Re(σ(m)) / Δ
//!
//! σ evaluates m(X) at the odd powers ζ^{2k+1} of ζ = e^{πi/N}. Slot k and slot N-1-k are
//! complex conjugates, so a real input vector of N/2 slots determines a real polynomial.
//! Writing a[j] = m[j]·ζ^j turns σ into a plain length-N DFT, computed here with a radix-2 FFT.

use std::f64::consts::PI;

use crate::error::{HeError, HeResult};
use crate::params::CkksParams;

/// Scaled coefficients must stay below this magnitude to survive signed 64-bit reduction.
const MAX_SCALED_COEFF: f64 = (1u64 << 62) as f64;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    #[inline(always)]
    fn from_angle(theta: f64) -> Self {
        Self { re: theta.cos(), im: theta.sin() }
    }

    #[inline(always)]
    fn mul(self, other: Self) -> Self {
        Self {
            re: self.re * other.re - self.im * other.im,
            im: self.re * other.im + self.im * other.re,
        }
    }

    #[inline(always)]
    fn add(self, other: Self) -> Self {
        Self { re: self.re + other.re, im: self.im + other.im }
    }

    #[inline(always)]
    fn sub(self, other: Self) -> Self {
        Self { re: self.re - other.re, im: self.im - other.im }
    }

    #[inline(always)]
    fn conj(self) -> Self {
        Self { re: self.re, im: -self.im }
    }
}

/// Trig tables for the length-N FFT and the ζ^j twist; no trig calls on the hot path.
#[derive(Debug, Clone)]
struct FftTables {
    n: usize,
    /// twist[j] = ζ^j = e^{πij/N}
    twist: Vec<Complex>,
    bit_rev: Vec<usize>,
    /// roots[k] = e^{-2πik/N} for k < N/2; stage s uses every (N >> (s+1))-th entry.
    roots: Vec<Complex>,
}

impl FftTables {
    fn new(n: usize) -> Self {
        let log_n = n.trailing_zeros();
        let twist = (0..n)
            .map(|j| Complex::from_angle(PI * j as f64 / n as f64))
            .collect();
        let bit_rev = (0..n).map(|i| crate::rns::bit_reverse(i, log_n)).collect();
        let roots = (0..n / 2)
            .map(|k| Complex::from_angle(-2.0 * PI * k as f64 / n as f64))
            .collect();
        Self { n, twist, bit_rev, roots }
    }

    /// In-place forward FFT, X[k] = Σ_j x[j]·e^{-2πijk/N} (radix-2, decimation in time).
    fn fft(&self, x: &mut [Complex]) {
        let n = self.n;
        debug_assert_eq!(x.len(), n);

        for (i, &j) in self.bit_rev.iter().enumerate() {
            if i < j {
                x.swap(i, j);
            }
        }

        let mut half = 1;
        while half < n {
            let stride = n / (2 * half);
            for start in (0..n).step_by(2 * half) {
                for k in 0..half {
                    let w = self.roots[k * stride];
                    let u = x[start + k];
                    let v = x[start + k + half].mul(w);
                    x[start + k] = u.add(v);
                    x[start + k + half] = u.sub(v);
                }
            }
            half <<= 1;
        }
    }
}

/// CKKS encoder/decoder for one ring degree.
#[derive(Debug, Clone)]
pub struct CkksEncoder {
    n: usize,
    num_slots: usize,
    fft: FftTables,
}

impl CkksEncoder {
    pub fn new(params: &CkksParams) -> Self {
        Self::with_degree(params.poly_degree)
    }

    fn with_degree(n: usize) -> Self {
        Self { n, num_slots: n / 2, fft: FftTables::new(n) }
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Encode up to N/2 real values into signed integer coefficients round(Δ·σ^{-1}(z)).
    ///
    /// Shorter inputs are zero-padded. The caller reduces the coefficients into each RNS limb.
    pub fn encode(&self, z: &[f64], scale: f64) -> HeResult<Vec<i64>> {
        if z.len() > self.num_slots {
            return Err(HeError::SlotOverflow { len: z.len(), slots: self.num_slots });
        }
        if let Some(index) = z.iter().position(|v| !v.is_finite()) {
            return Err(HeError::NonFiniteValue { index });
        }

        let n = self.n;
        let mut spectrum = vec![Complex::default(); n];
        for (k, &v) in z.iter().enumerate() {
            spectrum[k].re = v;
            spectrum[n - 1 - k].re = v;
        }

        // a = FFT(z̃)/N, then m[j] = Re(a[j]·ζ^{-j})
        self.fft.fft(&mut spectrum);
        let inv_n = 1.0 / n as f64;

        let scale_bits = scale.log2().round() as u32;
        let mut coeffs = Vec::with_capacity(n);
        for (a, twist) in spectrum.iter().zip(&self.fft.twist) {
            let m = a.mul(twist.conj()).re * inv_n;
            let scaled = (m * scale).round();
            if scaled.abs() >= MAX_SCALED_COEFF {
                let value = z.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
                return Err(HeError::ValueOutOfRange { value, scale_bits });
            }
            coeffs.push(scaled as i64);
        }
        Ok(coeffs)
    }

    /// Evaluate real coefficients at the slot roots and divide by `scale`.
    pub fn decode(&self, coeffs: &[f64], scale: f64) -> Vec<f64> {
        debug_assert_eq!(coeffs.len(), self.n);

        // FFT(conj(a)) = conj(σ(m)) for real m; the real parts are the slots.
        let mut b: Vec<Complex> = coeffs
            .iter()
            .zip(&self.fft.twist)
            .map(|(&m, twist)| Complex { re: m * twist.re, im: -m * twist.im })
            .collect();
        self.fft.fft(&mut b);

        b.truncate(self.num_slots);
        b.into_iter().map(|c| c.re / scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALE: f64 = (1u64 << 40) as f64;

    fn roundtrip(encoder: &CkksEncoder, z: &[f64]) -> Vec<f64> {
        let coeffs = encoder.encode(z, SCALE).unwrap();
        let as_f64: Vec<f64> = coeffs.iter().map(|&c| c as f64).collect();
        encoder.decode(&as_f64, SCALE)
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let encoder = CkksEncoder::with_degree(2048);
        let z: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
        let decoded = roundtrip(&encoder, &z);

        for (i, (d, e)) in decoded.iter().zip(&z).enumerate() {
            assert!((d - e).abs() < 1e-6, "slot {i}: decoded={d}, expected={e}");
        }
        for (i, d) in decoded.iter().enumerate().skip(z.len()) {
            assert!(d.abs() < 1e-6, "padding slot {i} = {d}");
        }
    }

    #[test]
    fn test_encode_full_width_pixel_values() {
        let encoder = CkksEncoder::with_degree(2048);
        let z: Vec<f64> = (0..encoder.num_slots()).map(|i| (i * 37 % 256) as f64).collect();
        let decoded = roundtrip(&encoder, &z);
        for (i, (d, e)) in decoded.iter().zip(&z).enumerate() {
            assert!((d - e).abs() < 1e-6, "slot {i}: decoded={d}, expected={e}");
        }
    }

    #[test]
    fn test_encode_produces_real_polynomial_of_single_constant() {
        // A constant vector encodes to the constant polynomial c·Δ.
        let encoder = CkksEncoder::with_degree(16);
        let coeffs = encoder.encode(&[3.0; 8], 1024.0).unwrap();
        assert_eq!(coeffs[0], 3072);
        assert!(coeffs[1..].iter().all(|&c| c == 0), "{coeffs:?}");
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        let encoder = CkksEncoder::with_degree(16);
        assert_eq!(
            encoder.encode(&[0.0; 9], SCALE),
            Err(HeError::SlotOverflow { len: 9, slots: 8 })
        );
        assert_eq!(
            encoder.encode(&[1.0, f64::NAN], SCALE),
            Err(HeError::NonFiniteValue { index: 1 })
        );
        assert!(matches!(
            encoder.encode(&[1e12], SCALE),
            Err(HeError::ValueOutOfRange { scale_bits: 40, .. })
        ));
    }
}

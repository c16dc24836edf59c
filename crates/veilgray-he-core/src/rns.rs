//! RNS (Residue Number System) modular arithmetic.
//!
//! Every CKKS polynomial is stored as L independent residue vectors, one per prime.
//! This module provides the scalar primitives and the [`RnsPoly`] container.

use crate::params::Modulus;

/// Modular addition: (a + b) mod q. Assumes a, b < q < 2^63.
#[inline(always)]
pub fn mod_add(a: u64, b: u64, q: u64) -> u64 {
    let sum = a + b;
    if sum >= q {
        sum - q
    } else {
        sum
    }
}

/// Modular subtraction: (a - b) mod q. Assumes a, b < q.
#[inline(always)]
pub fn mod_sub(a: u64, b: u64, q: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        q - b + a
    }
}

/// Modular multiplication through a 128-bit intermediate.
#[inline(always)]
pub fn mod_mul(a: u64, b: u64, q: u64) -> u64 {
    ((a as u128 * b as u128) % q as u128) as u64
}

/// Modular exponentiation: base^exp mod q.
pub fn mod_pow(mut base: u64, mut exp: u64, q: u64) -> u64 {
    let mut result: u64 = 1 % q;
    base %= q;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mod_mul(result, base, q);
        }
        exp >>= 1;
        base = mod_mul(base, base, q);
    }
    result
}

/// Modular inverse via Fermat's little theorem. `q` must be prime and `a` non-zero mod q.
pub fn mod_inv(a: u64, q: u64) -> u64 {
    debug_assert!(a % q != 0, "cannot invert zero");
    mod_pow(a, q - 2, q)
}

/// Map a signed integer into [0, q).
#[inline(always)]
pub fn reduce_signed(v: i64, q: u64) -> u64 {
    if v >= 0 {
        v as u64 % q
    } else {
        let r = v.unsigned_abs() % q;
        if r == 0 {
            0
        } else {
            q - r
        }
    }
}

/// Centered representative of `c` in (-q/2, q/2].
#[inline(always)]
pub fn center(c: u64, q: u64) -> i64 {
    if c > q / 2 {
        -((q - c) as i64)
    } else {
        c as i64
    }
}

/// Find a primitive 2N-th root of unity ψ modulo q (ψ^N ≡ -1).
///
/// Requires q prime and q ≡ 1 (mod 2N); [`crate::params::CkksParams`] only produces such primes.
pub fn find_primitive_root(n: usize, q: u64) -> u64 {
    let two_n = (2 * n) as u64;
    debug_assert_eq!(q % two_n, 1, "q={q} is not NTT-friendly for N={n}");

    let exponent = (q - 1) / two_n;
    (2..q)
        .map(|g| mod_pow(g, exponent, q))
        .find(|&psi| mod_pow(psi, n as u64, q) == q - 1)
        .unwrap_or(1)
}

/// Bit-reverse the low `bits` bits of `x`.
#[inline]
pub fn bit_reverse(x: usize, bits: u32) -> usize {
    if bits == 0 {
        return 0;
    }
    x.reverse_bits() >> (usize::BITS - bits)
}

/// An RNS polynomial: one coefficient vector per modulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RnsPoly {
    /// limbs[l][i] = coefficient i mod q_l.
    pub limbs: Vec<Vec<u64>>,
    /// Polynomial degree N.
    pub n: usize,
}

impl RnsPoly {
    pub fn zero(n: usize, num_limbs: usize) -> Self {
        Self {
            limbs: vec![vec![0u64; n]; num_limbs],
            n,
        }
    }

    /// Reduce small signed coefficients into every modulus of `moduli`.
    pub fn from_signed(coeffs: &[i64], moduli: &[Modulus]) -> Self {
        Self {
            limbs: moduli
                .iter()
                .map(|m| coeffs.iter().map(|&c| reduce_signed(c, m.value)).collect())
                .collect(),
            n: coeffs.len(),
        }
    }

    pub fn num_limbs(&self) -> usize {
        self.limbs.len()
    }

    /// Keep only the first `num_limbs` limbs.
    pub fn truncated(&self, num_limbs: usize) -> Self {
        Self {
            limbs: self.limbs[..num_limbs.min(self.limbs.len())].to_vec(),
            n: self.n,
        }
    }

    fn zip_with(&self, other: &Self, moduli: &[Modulus], op: fn(u64, u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.n, other.n);
        let limbs = self
            .limbs
            .iter()
            .zip(&other.limbs)
            .zip(moduli)
            .map(|((a, b), m)| a.iter().zip(b).map(|(&x, &y)| op(x, y, m.value)).collect())
            .collect();
        Self { limbs, n: self.n }
    }

    /// Element-wise addition over the limbs both operands share.
    pub fn add(&self, other: &Self, moduli: &[Modulus]) -> Self {
        self.zip_with(other, moduli, mod_add)
    }

    /// Element-wise subtraction over the limbs both operands share.
    pub fn sub(&self, other: &Self, moduli: &[Modulus]) -> Self {
        self.zip_with(other, moduli, mod_sub)
    }

    /// Element-wise (Hadamard) product: polynomial product when both are in NTT form.
    pub fn hadamard_mul(&self, other: &Self, moduli: &[Modulus]) -> Self {
        self.zip_with(other, moduli, mod_mul)
    }

    /// In-place `self += other` over the limbs both operands share.
    pub fn add_assign(&mut self, other: &Self, moduli: &[Modulus]) {
        for ((a, b), m) in self.limbs.iter_mut().zip(&other.limbs).zip(moduli) {
            for (x, &y) in a.iter_mut().zip(b) {
                *x = mod_add(*x, y, m.value);
            }
        }
    }

    pub fn negate(&self, moduli: &[Modulus]) -> Self {
        let limbs = self
            .limbs
            .iter()
            .zip(moduli)
            .map(|(a, m)| a.iter().map(|&x| mod_sub(0, x, m.value)).collect())
            .collect();
        Self { limbs, n: self.n }
    }

    /// Multiply by a signed integer constant.
    pub fn mul_scalar(&self, k: i64, moduli: &[Modulus]) -> Self {
        let limbs = self
            .limbs
            .iter()
            .zip(moduli)
            .map(|(a, m)| {
                let k = reduce_signed(k, m.value);
                a.iter().map(|&x| mod_mul(x, k, m.value)).collect()
            })
            .collect();
        Self { limbs, n: self.n }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_add_sub_mul() {
        let q = 17u64;
        assert_eq!(mod_add(10, 10, q), 3);
        assert_eq!(mod_add(16, 1, q), 0);
        assert_eq!(mod_sub(3, 10, q), 10);
        assert_eq!(mod_sub(0, 0, q), 0);
        assert_eq!(mod_mul(5, 4, q), 3);
    }

    #[test]
    fn test_mod_pow_and_inv() {
        let q = 17u64;
        assert_eq!(mod_pow(2, 0, q), 1);
        assert_eq!(mod_pow(3, 16, q), 1);
        for a in 1..q {
            assert_eq!(mod_mul(a, mod_inv(a, q), q), 1, "inverse of {a} mod {q}");
        }
    }

    #[test]
    fn test_reduce_signed_and_center() {
        let q = 97u64;
        assert_eq!(reduce_signed(-1, q), 96);
        assert_eq!(reduce_signed(-97, q), 0);
        assert_eq!(reduce_signed(-98, q), 96);
        assert_eq!(reduce_signed(200, q), 6);
        for v in -48i64..=48 {
            assert_eq!(center(reduce_signed(v, q), q), v);
        }
    }

    #[test]
    fn test_bit_reverse() {
        assert_eq!(bit_reverse(0b0000, 4), 0b0000);
        assert_eq!(bit_reverse(0b0001, 4), 0b1000);
        assert_eq!(bit_reverse(0b0110, 4), 0b0110);
        assert_eq!(bit_reverse(0b1010, 4), 0b0101);
        assert_eq!(bit_reverse(5, 0), 0);
    }

    #[test]
    fn test_primitive_root() {
        let (n, q) = (4, 17u64);
        let psi = find_primitive_root(n, q);
        assert_eq!(mod_pow(psi, 8, q), 1);
        assert_eq!(mod_pow(psi, 4, q), q - 1);
    }

    #[test]
    fn test_rns_poly_ops() {
        let moduli = [Modulus::new(17), Modulus::new(97)];
        let a = RnsPoly::from_signed(&[1, -2, 3, 4], &moduli);
        let b = RnsPoly::from_signed(&[5, 6, -7, 8], &moduli);

        let sum = a.add(&b, &moduli);
        assert_eq!(sum.limbs[0], vec![6, 4, 13, 12]);
        assert_eq!(sum.limbs[1], vec![6, 4, 93, 12]);

        let diff = sum.sub(&b, &moduli);
        assert_eq!(diff, a);

        let neg = a.negate(&moduli);
        assert_eq!(neg.add(&a, &moduli), RnsPoly::zero(4, 2));

        let tripled = a.mul_scalar(-3, &moduli);
        assert_eq!(tripled, RnsPoly::from_signed(&[-3, 6, -9, -12], &moduli));

        assert_eq!(a.truncated(1).num_limbs(), 1);
    }
}

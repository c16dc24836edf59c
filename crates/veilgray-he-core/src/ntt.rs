//! Negacyclic Number Theoretic Transform over Z_q[X]/(X^N+1).
//!
//! Polynomial products are computed as a · b = iNTT(NTT(a) ⊙ NTT(b)).
//!
//! The ψ powers (ψ a primitive 2N-th root) are folded into bit-reversed twiddle tables, so
//! no separate pre/post twist pass is needed. Forward is Cooley–Tukey, inverse is
//! Gentleman–Sande; both run in place with (N/2)·log₂(N) butterflies.

use crate::error::{HeError, HeResult};
use crate::rns::{bit_reverse, find_primitive_root, mod_add, mod_inv, mod_mul, mod_pow, mod_sub};

/// Pre-computed NTT tables for a specific (N, q) pair.
#[derive(Debug, Clone)]
pub struct NttTables {
    /// ψ^{bitrev(k)} for k in 0..N.
    pub psi_rev: Vec<u64>,
    /// ψ^{-bitrev(k)} for k in 0..N.
    pub psi_inv_rev: Vec<u64>,
    /// N^{-1} mod q, applied at the end of the inverse transform.
    pub n_inv: u64,
    pub q: u64,
    pub log_n: u32,
    pub n: usize,
}

impl NttTables {
    /// Build tables for degree `n` (a power of two) and an NTT-friendly prime `q`.
    pub fn new(n: usize, q: u64) -> HeResult<Self> {
        if n < 2 || !n.is_power_of_two() {
            return Err(HeError::UnsupportedDegree(n));
        }
        if q % (2 * n as u64) != 1 {
            return Err(HeError::ParameterSetup(format!(
                "modulus {q} is not ≡ 1 mod {}",
                2 * n
            )));
        }
        let log_n = n.trailing_zeros();

        let psi = find_primitive_root(n, q);
        let psi_inv = mod_inv(psi, q);
        let (psi_rev, psi_inv_rev) = (0..n)
            .map(|k| {
                let e = bit_reverse(k, log_n) as u64;
                (mod_pow(psi, e, q), mod_pow(psi_inv, e, q))
            })
            .unzip();

        Ok(Self {
            psi_rev,
            psi_inv_rev,
            n_inv: mod_inv(n as u64, q),
            q,
            log_n,
            n,
        })
    }
}

/// In-place forward negacyclic NTT. Output is in bit-reversed evaluation order.
pub fn ntt_forward(a: &mut [u64], tables: &NttTables) {
    let n = tables.n;
    let q = tables.q;
    debug_assert_eq!(a.len(), n);

    let mut t = n;
    let mut m = 1;
    while m < n {
        t >>= 1;
        for i in 0..m {
            let w = tables.psi_rev[m + i];
            let j1 = 2 * i * t;
            for j in j1..j1 + t {
                let u = a[j];
                let v = mod_mul(a[j + t], w, q);
                a[j] = mod_add(u, v, q);
                a[j + t] = mod_sub(u, v, q);
            }
        }
        m <<= 1;
    }
}

/// In-place inverse negacyclic NTT, including the 1/N normalization.
pub fn ntt_inverse(a: &mut [u64], tables: &NttTables) {
    let n = tables.n;
    let q = tables.q;
    debug_assert_eq!(a.len(), n);

    let mut t = 1;
    let mut m = n;
    while m > 1 {
        let h = m >> 1;
        let mut j1 = 0;
        for i in 0..h {
            let w = tables.psi_inv_rev[h + i];
            for j in j1..j1 + t {
                let u = a[j];
                let v = a[j + t];
                a[j] = mod_add(u, v, q);
                a[j + t] = mod_mul(mod_sub(u, v, q), w, q);
            }
            j1 += 2 * t;
        }
        t <<= 1;
        m = h;
    }

    for coeff in a.iter_mut() {
        *coeff = mod_mul(*coeff, tables.n_inv, q);
    }
}

//! CKKS plaintexts, ciphertexts and the evaluation context.
//!
//! A ciphertext is (c0, c1) or, right after a ct × ct product, (c0, c1, c2), in NTT form over
//! q_0..q_ℓ where ℓ is its level. Decryption computes c0 + c1·s (+ c2·s²).
//!
//! Operations:
//! - encrypt(pt, sk) / encrypt_pk(pt, pk) → ct
//! - decrypt(ct, sk) → pt
//! - ct + ct, ct × constant, ct × ct
//! - relinearize (degree 2 → 1 via hybrid key switching)
//! - rescale (divide by q_ℓ and drop one level)

use std::iter;

use rand::{CryptoRng, Rng};
use tracing::{debug, trace};

use crate::encoding::CkksEncoder;
use crate::error::{HeError, HeResult};
use crate::keys::{PublicKey, RelinearizationKey, SecretKey};
use crate::ntt::{ntt_forward, ntt_inverse, NttTables};
use crate::params::{CkksParams, Modulus, ParameterProfile};
use crate::rns::{center, mod_add, mod_inv, mod_mul, mod_sub, reduce_signed, RnsPoly};
use crate::sampling::{sample_gaussian_signed, sample_ternary, sample_uniform, ERROR_STD_DEV};

/// Relative tolerance when comparing the scales of two operands.
const SCALE_TOLERANCE: f64 = 1e-9;

/// Constants are scaled by q_ℓ and must stay within signed 64-bit range.
const MAX_SCALED_CONSTANT: f64 = (1u64 << 62) as f64;

/// An encoded message in NTT form.
#[derive(Debug, Clone)]
pub struct Plaintext {
    pub poly: RnsPoly,
    pub scale: f64,
}

impl Plaintext {
    pub fn level(&self) -> usize {
        self.poly.num_limbs().saturating_sub(1)
    }
}

/// A CKKS ciphertext of degree 1 (c2 = None) or 2.
#[derive(Debug, Clone)]
pub struct Ciphertext {
    pub c0: RnsPoly,
    pub c1: RnsPoly,
    pub c2: Option<RnsPoly>,
    pub scale: f64,
}

impl Ciphertext {
    /// Index of the last live modulus.
    pub fn level(&self) -> usize {
        self.c0.num_limbs().saturating_sub(1)
    }

    /// Number of components minus one.
    pub fn degree(&self) -> usize {
        if self.c2.is_some() {
            2
        } else {
            1
        }
    }
}

/// Parameters plus pre-computed NTT tables and encoder.
///
/// Immutable after construction, so one context can be shared by reference across threads.
#[derive(Debug, Clone)]
pub struct CkksContext {
    pub params: CkksParams,
    /// q_0..q_{L-1}, P.
    key_moduli: Vec<Modulus>,
    /// One table per entry of `key_moduli`.
    ntt_tables: Vec<NttTables>,
    encoder: CkksEncoder,
}

impl CkksContext {
    pub fn new(params: CkksParams) -> HeResult<Self> {
        let key_moduli = params.key_moduli();
        let ntt_tables = key_moduli
            .iter()
            .map(|m| NttTables::new(params.poly_degree, m.value))
            .collect::<HeResult<Vec<_>>>()?;
        let encoder = CkksEncoder::new(&params);

        debug!(
            n = params.poly_degree,
            limbs = params.num_limbs,
            special_prime = params.special.value,
            "CKKS context ready"
        );
        Ok(Self {
            params,
            key_moduli,
            ntt_tables,
            encoder,
        })
    }

    pub fn from_profile(profile: ParameterProfile) -> HeResult<Self> {
        Self::new(CkksParams::from_profile(profile)?)
    }

    pub fn num_slots(&self) -> usize {
        self.params.num_slots
    }

    pub fn max_level(&self) -> usize {
        self.params.max_level()
    }

    fn moduli_at(&self, level: usize) -> &[Modulus] {
        &self.params.moduli[..=level]
    }

    fn check_level(&self, level: usize) -> HeResult<()> {
        if level > self.max_level() {
            return Err(HeError::LevelMismatch {
                left: level,
                right: self.max_level(),
            });
        }
        Ok(())
    }

    /// Forward NTT on every limb; limb i uses the table of `key_moduli[i]`.
    fn to_ntt(&self, poly: &mut RnsPoly) {
        for (limb, tables) in poly.limbs.iter_mut().zip(&self.ntt_tables) {
            ntt_forward(limb, tables);
        }
    }

    /// Uniform polynomial; uniform residues are uniform in either domain, so no transform.
    fn sample_uniform_ntt<R: Rng + CryptoRng>(&self, rng: &mut R, moduli: &[Modulus]) -> RnsPoly {
        let n = self.params.poly_degree;
        RnsPoly {
            limbs: moduli.iter().map(|m| sample_uniform(rng, n, m.value)).collect(),
            n,
        }
    }

    fn lift_small_ntt(&self, coeffs: &[i64], moduli: &[Modulus]) -> RnsPoly {
        let mut poly = RnsPoly::from_signed(coeffs, moduli);
        self.to_ntt(&mut poly);
        poly
    }

    fn sample_error_ntt<R: Rng + CryptoRng>(&self, rng: &mut R, moduli: &[Modulus]) -> RnsPoly {
        let e = sample_gaussian_signed(rng, self.params.poly_degree, ERROR_STD_DEV);
        self.lift_small_ntt(&e, moduli)
    }

    /// Generate a ternary secret key over Q ∪ {P}.
    pub fn keygen<R: Rng + CryptoRng>(&self, rng: &mut R) -> SecretKey {
        let s = sample_ternary(rng, self.params.poly_degree);
        SecretKey {
            s_ntt: self.lift_small_ntt(&s, &self.key_moduli),
        }
    }

    /// Public key (b, a) = (-a·s + e, a) over Q.
    pub fn keygen_public<R: Rng + CryptoRng>(&self, sk: &SecretKey, rng: &mut R) -> PublicKey {
        let moduli = &self.params.moduli;
        let a = self.sample_uniform_ntt(rng, moduli);
        let e = self.sample_error_ntt(rng, moduli);
        let b = a
            .hadamard_mul(&sk.s_ntt, moduli)
            .negate(moduli)
            .add(&e, moduli);
        PublicKey { b, a }
    }

    /// Relinearization key: for each q_i, (b_i, a_i) with P·s² added on limb i only.
    pub fn keygen_relin<R: Rng + CryptoRng>(
        &self,
        sk: &SecretKey,
        rng: &mut R,
    ) -> RelinearizationKey {
        let km = &self.key_moduli;
        let s = &sk.s_ntt;
        let s2 = s.hadamard_mul(s, km);
        let p = self.params.special.value;

        let pairs = (0..self.params.num_limbs)
            .map(|i| {
                let a = self.sample_uniform_ntt(rng, km);
                let e = self.sample_error_ntt(rng, km);
                let mut b = a.hadamard_mul(s, km).negate(km).add(&e, km);

                let q_i = km[i].value;
                let p_mod = p % q_i;
                for (x, &y) in b.limbs[i].iter_mut().zip(&s2.limbs[i]) {
                    *x = mod_add(*x, mod_mul(p_mod, y, q_i), q_i);
                }
                (b, a)
            })
            .collect();

        debug!(digits = self.params.num_limbs, "relinearization key generated");
        RelinearizationKey { pairs }
    }

    /// Encode at the highest level with the default scale.
    pub fn encode(&self, values: &[f64]) -> HeResult<Plaintext> {
        self.encode_at_level(values, self.max_level())
    }

    pub fn encode_at_level(&self, values: &[f64], level: usize) -> HeResult<Plaintext> {
        self.check_level(level)?;
        let scale = self.params.scale();
        let coeffs = self.encoder.encode(values, scale)?;
        Ok(Plaintext {
            poly: self.lift_small_ntt(&coeffs, self.moduli_at(level)),
            scale,
        })
    }

    /// Decode from limb 0 only. Valid while |message · scale| stays below q_0/2, which holds
    /// for 8-bit values at the default scale.
    pub fn decode(&self, pt: &Plaintext) -> Vec<f64> {
        let q0 = self.params.moduli[0].value;
        let mut limb = pt.poly.limbs[0].clone();
        ntt_inverse(&mut limb, &self.ntt_tables[0]);
        let coeffs: Vec<f64> = limb.iter().map(|&c| center(c, q0) as f64).collect();
        self.encoder.decode(&coeffs, pt.scale)
    }

    fn check_secret(&self, sk: &SecretKey, level: usize) -> HeResult<()> {
        if sk.num_limbs() <= level {
            return Err(HeError::KeyMismatch {
                key_limbs: sk.num_limbs(),
                needed: level + 1,
            });
        }
        Ok(())
    }

    /// Secret-key RLWE encryption: (c0, c1) = (-a·s + m + e, a).
    pub fn encrypt<R: Rng + CryptoRng>(
        &self,
        pt: &Plaintext,
        sk: &SecretKey,
        rng: &mut R,
    ) -> HeResult<Ciphertext> {
        let level = pt.level();
        self.check_level(level)?;
        self.check_secret(sk, level)?;
        let moduli = self.moduli_at(level);

        let a = self.sample_uniform_ntt(rng, moduli);
        let e = self.sample_error_ntt(rng, moduli);
        let c0 = a
            .hadamard_mul(&sk.s_ntt, moduli)
            .negate(moduli)
            .add(&pt.poly, moduli)
            .add(&e, moduli);

        Ok(Ciphertext {
            c0,
            c1: a,
            c2: None,
            scale: pt.scale,
        })
    }

    /// Public-key encryption: (c0, c1) = (b·u + e0 + m, a·u + e1) with ternary u.
    pub fn encrypt_pk<R: Rng + CryptoRng>(
        &self,
        pt: &Plaintext,
        pk: &PublicKey,
        rng: &mut R,
    ) -> HeResult<Ciphertext> {
        let level = pt.level();
        self.check_level(level)?;
        if pk.num_limbs() <= level {
            return Err(HeError::KeyMismatch {
                key_limbs: pk.num_limbs(),
                needed: level + 1,
            });
        }
        let moduli = self.moduli_at(level);

        let u_coeffs = sample_ternary(rng, self.params.poly_degree);
        let u = self.lift_small_ntt(&u_coeffs, moduli);
        let e0 = self.sample_error_ntt(rng, moduli);
        let e1 = self.sample_error_ntt(rng, moduli);

        let c0 = pk
            .b
            .hadamard_mul(&u, moduli)
            .add(&e0, moduli)
            .add(&pt.poly, moduli);
        let c1 = pk.a.hadamard_mul(&u, moduli).add(&e1, moduli);

        Ok(Ciphertext {
            c0,
            c1,
            c2: None,
            scale: pt.scale,
        })
    }

    /// m = c0 + c1·s (+ c2·s²).
    pub fn decrypt(&self, ct: &Ciphertext, sk: &SecretKey) -> HeResult<Plaintext> {
        let level = ct.level();
        self.check_level(level)?;
        self.check_secret(sk, level)?;
        let moduli = self.moduli_at(level);

        let mut m = ct.c0.add(&ct.c1.hadamard_mul(&sk.s_ntt, moduli), moduli);
        if let Some(c2) = &ct.c2 {
            let s2 = sk.s_ntt.hadamard_mul(&sk.s_ntt, moduli);
            m.add_assign(&c2.hadamard_mul(&s2, moduli), moduli);
        }
        Ok(Plaintext {
            poly: m,
            scale: ct.scale,
        })
    }

    pub fn ct_add(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        if a.level() != b.level() {
            return Err(HeError::LevelMismatch {
                left: a.level(),
                right: b.level(),
            });
        }
        if a.degree() != b.degree() {
            return Err(HeError::DegreeMismatch {
                left: a.degree(),
                right: b.degree(),
            });
        }
        if (a.scale - b.scale).abs() > SCALE_TOLERANCE * a.scale.abs().max(b.scale.abs()) {
            return Err(HeError::ScaleMismatch {
                left: a.scale,
                right: b.scale,
            });
        }
        self.check_level(a.level())?;
        let moduli = self.moduli_at(a.level());

        let c2 = match (&a.c2, &b.c2) {
            (Some(x), Some(y)) => Some(x.add(y, moduli)),
            _ => None,
        };
        Ok(Ciphertext {
            c0: a.c0.add(&b.c0, moduli),
            c1: a.c1.add(&b.c1, moduli),
            c2,
            scale: a.scale,
        })
    }

    /// Multiply by a real constant encoded as round(c·q_ℓ).
    ///
    /// The result carries scale·q_ℓ; a following [`rescale`](Self::rescale) brings it back to
    /// the input scale one level lower.
    pub fn ct_mul_const(&self, ct: &Ciphertext, constant: f64) -> HeResult<Ciphertext> {
        let level = ct.level();
        self.check_level(level)?;
        if level == 0 {
            return Err(HeError::LevelExhausted);
        }
        if !constant.is_finite() {
            return Err(HeError::NonFiniteValue { index: 0 });
        }

        let q_last = self.params.moduli[level];
        let k = (constant * q_last.value as f64).round();
        if k.abs() >= MAX_SCALED_CONSTANT {
            return Err(HeError::ValueOutOfRange {
                value: constant,
                scale_bits: q_last.bits,
            });
        }
        let k = k as i64;
        let moduli = self.moduli_at(level);

        Ok(Ciphertext {
            c0: ct.c0.mul_scalar(k, moduli),
            c1: ct.c1.mul_scalar(k, moduli),
            c2: ct.c2.as_ref().map(|c| c.mul_scalar(k, moduli)),
            scale: ct.scale * q_last.value as f64,
        })
    }

    /// Tensor product of two degree-1 ciphertexts: (a0b0, a0b1 + a1b0, a1b1).
    pub fn ct_mul(&self, a: &Ciphertext, b: &Ciphertext) -> HeResult<Ciphertext> {
        if a.level() != b.level() {
            return Err(HeError::LevelMismatch {
                left: a.level(),
                right: b.level(),
            });
        }
        for ct in [a, b] {
            if ct.degree() != 1 {
                return Err(HeError::UnsupportedDegree(ct.degree()));
            }
        }
        self.check_level(a.level())?;
        let moduli = self.moduli_at(a.level());

        let mut d1 = a.c0.hadamard_mul(&b.c1, moduli);
        d1.add_assign(&a.c1.hadamard_mul(&b.c0, moduli), moduli);
        Ok(Ciphertext {
            c0: a.c0.hadamard_mul(&b.c0, moduli),
            c1: d1,
            c2: Some(a.c1.hadamard_mul(&b.c1, moduli)),
            scale: a.scale * b.scale,
        })
    }

    /// Fold c2 back into (c0, c1) by key switching. Degree-1 input is returned unchanged.
    ///
    /// Each RNS digit [c2]_{q_i} is lifted to q_0..q_ℓ and P, multiplied with key pair i, and the
    /// sum is divided by P.
    pub fn relinearize(&self, ct: &Ciphertext, rlk: &RelinearizationKey) -> HeResult<Ciphertext> {
        let Some(c2) = &ct.c2 else {
            return Ok(ct.clone());
        };
        let level = ct.level();
        self.check_level(level)?;
        if rlk.num_digits() <= level {
            return Err(HeError::KeyMismatch {
                key_limbs: rlk.num_digits(),
                needed: level + 1,
            });
        }
        if rlk.num_limbs() != self.key_moduli.len() {
            return Err(HeError::KeyMismatch {
                key_limbs: rlk.num_limbs(),
                needed: self.key_moduli.len(),
            });
        }
        trace!(level, digits = level + 1, "key switching degree-2 ciphertext");

        let n = self.params.poly_degree;
        let special = self.key_moduli.len() - 1;
        let basis: Vec<usize> = (0..=level).chain(iter::once(special)).collect();
        let mut acc0 = vec![vec![0u64; n]; basis.len()];
        let mut acc1 = vec![vec![0u64; n]; basis.len()];

        for (i, (b, a)) in rlk.pairs.iter().take(level + 1).enumerate() {
            let q_i = self.key_moduli[i].value;
            let mut digit = c2.limbs[i].clone();
            ntt_inverse(&mut digit, &self.ntt_tables[i]);
            let digit: Vec<i64> = digit.iter().map(|&c| center(c, q_i)).collect();

            for (p, &t) in basis.iter().enumerate() {
                let q = self.key_moduli[t].value;
                let mut d: Vec<u64> = digit.iter().map(|&c| reduce_signed(c, q)).collect();
                ntt_forward(&mut d, &self.ntt_tables[t]);

                let keys = b.limbs[t].iter().zip(&a.limbs[t]);
                for (((x0, x1), &di), (&bi, &ai)) in
                    acc0[p].iter_mut().zip(acc1[p].iter_mut()).zip(&d).zip(keys)
                {
                    *x0 = mod_add(*x0, mod_mul(di, bi, q), q);
                    *x1 = mod_add(*x1, mod_mul(di, ai, q), q);
                }
            }
        }

        let moduli = self.moduli_at(level);
        let delta0 = RnsPoly {
            limbs: self.divide_by_last(&acc0, &basis),
            n,
        };
        let delta1 = RnsPoly {
            limbs: self.divide_by_last(&acc1, &basis),
            n,
        };
        Ok(Ciphertext {
            c0: ct.c0.add(&delta0, moduli),
            c1: ct.c1.add(&delta1, moduli),
            c2: None,
            scale: ct.scale,
        })
    }

    /// Divide every component by q_ℓ (rounded) and drop that limb.
    pub fn rescale(&self, ct: &Ciphertext) -> HeResult<Ciphertext> {
        let level = ct.level();
        self.check_level(level)?;
        if level == 0 {
            return Err(HeError::LevelExhausted);
        }

        let basis: Vec<usize> = (0..=level).collect();
        let drop_last = |poly: &RnsPoly| RnsPoly {
            limbs: self.divide_by_last(&poly.limbs, &basis),
            n: poly.n,
        };
        Ok(Ciphertext {
            c0: drop_last(&ct.c0),
            c1: drop_last(&ct.c1),
            c2: ct.c2.as_ref().map(drop_last),
            scale: ct.scale / self.params.moduli[level].value as f64,
        })
    }

    /// Rounded division by the last modulus of `basis`: (x - [x]_{q_last}) · q_last^{-1}.
    ///
    /// `limbs[p]` is in NTT form modulo `key_moduli[basis[p]]`; `basis` has at least two
    /// entries. Returns every limb but the last.
    fn divide_by_last(&self, limbs: &[Vec<u64>], basis: &[usize]) -> Vec<Vec<u64>> {
        let last = basis.len() - 1;
        let t_last = basis[last];
        let q_last = self.key_moduli[t_last].value;

        let mut tail = limbs[last].clone();
        ntt_inverse(&mut tail, &self.ntt_tables[t_last]);
        let tail: Vec<i64> = tail.iter().map(|&c| center(c, q_last)).collect();

        limbs[..last]
            .iter()
            .zip(&basis[..last])
            .map(|(limb, &t)| {
                let q = self.key_moduli[t].value;
                let mut r: Vec<u64> = tail.iter().map(|&c| reduce_signed(c, q)).collect();
                ntt_forward(&mut r, &self.ntt_tables[t]);
                let inv = mod_inv(q_last % q, q);
                limb.iter()
                    .zip(&r)
                    .map(|(&x, &y)| mod_mul(mod_sub(x, y, q), inv, q))
                    .collect()
            })
            .collect()
    }
}

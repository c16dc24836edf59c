//! CKKS parameter sets for veilgray.
//!
//! A parameter set is described by a [`ParameterLiteral`] (bit sizes only) and resolved into
//! a [`CkksParams`] holding concrete NTT-friendly primes:
//! - RNS chain q_0..q_{L-1} (q_i ≡ 1 mod 2N), q_0 large enough to decode from alone
//! - one special prime P used only during key switching
//! - scale factor Δ = 2^scale_bits
//!
//! Named literals are exposed through [`ParameterProfile`].

use std::fmt;
use std::str::FromStr;

use crate::error::{HeError, HeResult};
use crate::rns::mod_pow;

/// Scale bits for CKKS fixed-point encoding: Δ = 2^SCALE_BITS.
pub const SCALE_BITS: u32 = 40;

/// Bits of headroom q_0 must keep above Δ so decoded 8-bit values never wrap.
const DECODE_HEADROOM_BITS: u32 = 10;

/// Largest supported modulus width; keeps `a + b` below 2^63 in modular addition.
const MAX_MODULUS_BITS: u32 = 61;

/// A single RNS modulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modulus {
    /// The prime modulus q_i.
    pub value: u64,
    /// Bit width of this modulus.
    pub bits: u32,
}

impl Modulus {
    pub const fn new(value: u64) -> Self {
        Self {
            value,
            bits: 64 - value.leading_zeros(),
        }
    }
}

/// Bit-level description of a parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLiteral {
    /// log2 of the ring dimension N.
    pub log_n: u32,
    /// Bit sizes of the ciphertext modulus chain, q_0 first.
    pub log_q: Vec<u32>,
    /// Bit size of the special key-switching prime P.
    pub log_p: u32,
    /// log2 of the default scale Δ.
    pub scale_bits: u32,
}

/// Named parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterProfile {
    /// N=2048, three limbs. Fast, NOT secure: tests and demos only.
    InsecureN2048,
    /// N=8192 (4096 slots), chain [55, 40, 40] + P 56.
    N8192,
    /// N=16384 (8192 slots), chain [55, 40, 40, 40, 40] + P 56.
    #[default]
    N16384,
}

impl ParameterProfile {
    pub const ALL: [ParameterProfile; 3] = [
        ParameterProfile::InsecureN2048,
        ParameterProfile::N8192,
        ParameterProfile::N16384,
    ];

    /// Canonical name accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            ParameterProfile::InsecureN2048 => "insecure-n2048",
            ParameterProfile::N8192 => "n8192",
            ParameterProfile::N16384 => "n16384",
        }
    }

    pub fn literal(&self) -> ParameterLiteral {
        match self {
            ParameterProfile::InsecureN2048 => ParameterLiteral {
                log_n: 11,
                log_q: vec![60, 40, 40],
                log_p: 61,
                scale_bits: SCALE_BITS,
            },
            ParameterProfile::N8192 => ParameterLiteral {
                log_n: 13,
                log_q: vec![55, 40, 40],
                log_p: 56,
                scale_bits: SCALE_BITS,
            },
            ParameterProfile::N16384 => ParameterLiteral {
                log_n: 14,
                log_q: vec![55, 40, 40, 40, 40],
                log_p: 56,
                scale_bits: SCALE_BITS,
            },
        }
    }
}

impl fmt::Display for ParameterProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterProfile {
    type Err = HeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                HeError::ParameterSetup(format!(
                    "unknown parameter profile `{s}` (known: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Complete CKKS parameter set for a given polynomial degree N.
#[derive(Debug, Clone)]
pub struct CkksParams {
    /// Polynomial degree N (ring dimension). Power of 2.
    pub poly_degree: usize,
    /// Number of SIMD slots = N/2.
    pub num_slots: usize,
    /// log2(N).
    pub log_n: u32,
    /// RNS moduli chain [q_0, q_1, ..., q_{L-1}].
    pub moduli: Vec<Modulus>,
    /// Special prime P, only present in key material.
    pub special: Modulus,
    /// Number of RNS limbs L.
    pub num_limbs: usize,
    /// log2 of the default scale.
    pub scale_bits: u32,
}

impl CkksParams {
    pub fn from_profile(profile: ParameterProfile) -> HeResult<Self> {
        Self::from_literal(&profile.literal())
    }

    /// Resolve a literal into concrete primes.
    ///
    /// Primes are searched downward from 2^bits, so the same literal always yields the
    /// same parameter set.
    pub fn from_literal(literal: &ParameterLiteral) -> HeResult<Self> {
        validate_literal(literal)?;

        let poly_degree = 1usize << literal.log_n;
        let two_n = 2 * poly_degree as u64;

        let mut used = Vec::with_capacity(literal.log_q.len() + 1);
        for &bits in &literal.log_q {
            let q = find_ntt_friendly_prime(bits, two_n, &used).ok_or_else(|| {
                HeError::ParameterSetup(format!(
                    "no unused {bits}-bit prime q ≡ 1 mod {two_n}"
                ))
            })?;
            used.push(q);
        }
        let p = find_ntt_friendly_prime(literal.log_p, two_n, &used).ok_or_else(|| {
            HeError::ParameterSetup(format!(
                "no unused {}-bit special prime ≡ 1 mod {two_n}",
                literal.log_p
            ))
        })?;

        let moduli: Vec<Modulus> = used.into_iter().map(Modulus::new).collect();
        Ok(Self {
            poly_degree,
            num_slots: poly_degree / 2,
            log_n: literal.log_n,
            num_limbs: moduli.len(),
            moduli,
            special: Modulus::new(p),
            scale_bits: literal.scale_bits,
        })
    }

    /// Highest level a fresh ciphertext is encoded at (L - 1).
    pub fn max_level(&self) -> usize {
        self.num_limbs - 1
    }

    /// Default scale Δ.
    pub fn scale(&self) -> f64 {
        2f64.powi(self.scale_bits as i32)
    }

    /// Q moduli followed by the special prime: the basis key material lives in.
    pub fn key_moduli(&self) -> Vec<Modulus> {
        let mut all = self.moduli.clone();
        all.push(self.special);
        all
    }
}

fn validate_literal(literal: &ParameterLiteral) -> HeResult<()> {
    let fail = |msg: String| Err(HeError::ParameterSetup(msg));

    if !(4..=16).contains(&literal.log_n) {
        return fail(format!("log_n={} outside 4..=16", literal.log_n));
    }
    let Some(&q0_bits) = literal.log_q.first() else {
        return fail("modulus chain is empty".to_string());
    };
    for &bits in literal.log_q.iter().chain(std::iter::once(&literal.log_p)) {
        if !(20..=MAX_MODULUS_BITS).contains(&bits) {
            return fail(format!("modulus width {bits} outside 20..={MAX_MODULUS_BITS}"));
        }
    }
    if !(10..=50).contains(&literal.scale_bits) {
        return fail(format!("scale_bits={} outside 10..=50", literal.scale_bits));
    }
    if q0_bits < literal.scale_bits + DECODE_HEADROOM_BITS {
        return fail(format!(
            "q_0 has {q0_bits} bits; needs at least scale_bits + {DECODE_HEADROOM_BITS} = {}",
            literal.scale_bits + DECODE_HEADROOM_BITS
        ));
    }
    let widest = literal.log_q.iter().copied().max().unwrap_or(0);
    if literal.log_p < widest {
        return fail(format!(
            "special prime ({} bits) must be at least as wide as the widest q ({widest} bits)",
            literal.log_p
        ));
    }
    Ok(())
}

/// Find a prime q with `bits` bit-width such that q ≡ 1 (mod two_n), skipping `used`.
///
/// Searches downward from the largest `bits`-bit number.
fn find_ntt_friendly_prime(bits: u32, two_n: u64, used: &[u64]) -> Option<u64> {
    let upper = (1u64 << bits) - 1;
    let lower = 1u64 << (bits - 1);

    let mut candidate = upper - (upper % two_n) + 1;
    if candidate > upper {
        candidate = candidate.checked_sub(two_n)?;
    }

    while candidate >= lower {
        if !used.contains(&candidate) && is_prime(candidate) {
            return Some(candidate);
        }
        candidate = candidate.checked_sub(two_n)?;
    }
    None
}

/// Deterministic Miller–Rabin for 64-bit integers.
pub(crate) fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    let mut d = n - 1;
    let mut r = 0;
    while d % 2 == 0 {
        d /= 2;
        r += 1;
    }

    'witness: for &a in &WITNESSES {
        let mut x = mod_pow(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..r {
            x = ((x as u128 * x as u128) % n as u128) as u64;
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_n16384() {
        let p = CkksParams::from_profile(ParameterProfile::N16384).unwrap();
        assert_eq!(p.poly_degree, 16384);
        assert_eq!(p.num_slots, 8192);
        assert_eq!(p.log_n, 14);
        assert_eq!(p.num_limbs, 5);
        assert_eq!(p.max_level(), 4);
        assert_eq!(p.scale_bits, 40);
        assert_eq!(p.moduli[0].bits, 55);
        assert_eq!(p.special.bits, 56);
    }

    #[test]
    fn test_moduli_ntt_friendly_prime_and_distinct() {
        for profile in ParameterProfile::ALL {
            let p = CkksParams::from_profile(profile).unwrap();
            let two_n = (2 * p.poly_degree) as u64;
            let all = p.key_moduli();
            for (i, m) in all.iter().enumerate() {
                assert_eq!(m.value % two_n, 1, "{profile}: modulus {i} not NTT-friendly");
                assert!(is_prime(m.value), "{profile}: modulus {i} ({}) not prime", m.value);
                assert!(
                    all[..i].iter().all(|other| other.value != m.value),
                    "{profile}: modulus {i} repeated"
                );
            }
        }
    }

    #[test]
    fn test_bit_widths_follow_literal() {
        let literal = ParameterProfile::N8192.literal();
        let p = CkksParams::from_literal(&literal).unwrap();
        let widths: Vec<u32> = p.moduli.iter().map(|m| m.bits).collect();
        assert_eq!(widths, literal.log_q);
        assert_eq!(p.special.bits, literal.log_p);
    }

    #[test]
    fn test_profile_names_roundtrip() {
        for profile in ParameterProfile::ALL {
            assert_eq!(profile.name().parse::<ParameterProfile>().unwrap(), profile);
        }
        assert_eq!(" N16384 ".parse::<ParameterProfile>().unwrap(), ParameterProfile::N16384);
        assert!(matches!(
            "pn14qp438".parse::<ParameterProfile>(),
            Err(HeError::ParameterSetup(_))
        ));
    }

    #[test]
    fn test_rejects_q0_without_headroom() {
        let literal = ParameterLiteral {
            log_n: 11,
            log_q: vec![45, 40],
            log_p: 50,
            scale_bits: 40,
        };
        let err = CkksParams::from_literal(&literal).unwrap_err();
        assert!(matches!(err, HeError::ParameterSetup(msg) if msg.contains("q_0")));
    }

    #[test]
    fn test_rejects_narrow_special_prime() {
        let literal = ParameterLiteral {
            log_n: 11,
            log_q: vec![60, 40],
            log_p: 45,
            scale_bits: 40,
        };
        assert!(CkksParams::from_literal(&literal).is_err());
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        for log_n in [2, 17] {
            let literal = ParameterLiteral {
                log_n,
                log_q: vec![60, 40],
                log_p: 61,
                scale_bits: 40,
            };
            assert!(CkksParams::from_literal(&literal).is_err(), "log_n={log_n}");
        }
        let empty = ParameterLiteral {
            log_n: 11,
            log_q: vec![],
            log_p: 61,
            scale_bits: 40,
        };
        assert!(CkksParams::from_literal(&empty).is_err());
    }

    #[test]
    fn test_is_prime_small_and_large() {
        let primes = [2u64, 3, 17, 97, 7681, 12289, 2_305_843_009_213_693_951];
        for p in primes {
            assert!(is_prime(p), "{p} should be prime");
        }
        let composites = [0u64, 1, 4, 561, 1_099_511_627_777, 3_215_031_751];
        for c in composites {
            assert!(!is_prime(c), "{c} should be composite");
        }
    }
}

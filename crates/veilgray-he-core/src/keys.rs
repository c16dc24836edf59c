//! Key material produced by [`crate::CkksContext`].
//!
//! All polynomials are stored in NTT form. Limb `i < L` lives modulo q_i; where present,
//! limb `L` lives modulo the special prime P.

use crate::rns::RnsPoly;

/// Secret key: ternary s ∈ {-1, 0, 1}^N over Q ∪ {P}.
#[derive(Debug, Clone)]
pub struct SecretKey {
    pub s_ntt: RnsPoly,
}

impl SecretKey {
    pub fn num_limbs(&self) -> usize {
        self.s_ntt.num_limbs()
    }
}

/// Public key (b, a) = (-a·s + e, a) over Q.
#[derive(Debug, Clone)]
pub struct PublicKey {
    pub b: RnsPoly,
    pub a: RnsPoly,
}

impl PublicKey {
    pub fn num_limbs(&self) -> usize {
        self.b.num_limbs()
    }
}

/// Relinearization key: one key-switching pair per RNS digit of Q.
///
/// Pair i is (b_i, a_i) over Q ∪ {P} with b_i = -a_i·s + e_i + P·s²·g_i, where the gadget
/// g_i is 1 modulo q_i and 0 modulo every other prime. Switching a degree-2 ciphertext at
/// level ℓ uses the first ℓ+1 pairs restricted to q_0..q_ℓ and P.
#[derive(Debug, Clone)]
pub struct RelinearizationKey {
    pub pairs: Vec<(RnsPoly, RnsPoly)>,
}

impl RelinearizationKey {
    pub fn num_digits(&self) -> usize {
        self.pairs.len()
    }

    /// Limb count of every pair, or 0 for an empty key.
    pub fn num_limbs(&self) -> usize {
        self.pairs
            .iter()
            .map(|(b, a)| b.num_limbs().min(a.num_limbs()))
            .min()
            .unwrap_or(0)
    }
}

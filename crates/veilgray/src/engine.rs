//! The narrow homomorphic-engine capability the pipeline is written against.
//!
//! Stages only ever see an `E: HeEngine`; [`CkksContext`] is the production implementation and
//! [`crate::mock::MockEngine`] a noise-free stand-in for tests.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use veilgray_he_core::{
    Ciphertext, CkksContext, HeError, ParameterProfile, Plaintext, PublicKey, RelinearizationKey,
    SecretKey,
};

/// Key material generated once per run and shared read-only by every unit.
pub struct KeyMaterial<E: HeEngine + ?Sized> {
    pub secret: E::SecretKey,
    pub public: E::PublicKey,
    pub relin: E::RelinKey,
}

/// Which key the encryptor uses.
pub enum EncryptionKey<'a, E: HeEngine + ?Sized> {
    Secret(&'a E::SecretKey),
    Public(&'a E::PublicKey),
}

impl<E: HeEngine + ?Sized> Clone for EncryptionKey<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: HeEngine + ?Sized> Copy for EncryptionKey<'_, E> {}

pub trait HeEngine: Send + Sync {
    type Plaintext: Send + Sync;
    type Ciphertext: Send + Sync;
    type SecretKey: Send + Sync;
    type PublicKey: Send + Sync;
    type RelinKey: Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build the parameter set for a named profile.
    fn from_profile(profile: ParameterProfile) -> Result<Self, Self::Error>
    where
        Self: Sized;

    /// Real values one plaintext can hold.
    fn max_slots(&self) -> usize;

    /// Secret, public and relinearization keys. A seed makes generation reproducible.
    fn generate_keys(&self, seed: Option<u64>) -> Result<KeyMaterial<Self>, Self::Error>;

    /// Encode at the maximum level.
    fn encode(&self, values: &[f64]) -> Result<Self::Plaintext, Self::Error>;

    fn encrypt(
        &self,
        pt: &Self::Plaintext,
        sk: &Self::SecretKey,
    ) -> Result<Self::Ciphertext, Self::Error>;

    fn encrypt_public(
        &self,
        pt: &Self::Plaintext,
        pk: &Self::PublicKey,
    ) -> Result<Self::Ciphertext, Self::Error>;

    fn decrypt(
        &self,
        ct: &Self::Ciphertext,
        sk: &Self::SecretKey,
    ) -> Result<Self::Plaintext, Self::Error>;

    /// All slots of the plaintext; callers truncate to the valid length.
    fn decode(&self, pt: &Self::Plaintext) -> Result<Vec<f64>, Self::Error>;

    /// Multiply by a real constant. The result has the same scale as the input.
    fn scalar_multiply(
        &self,
        ct: &Self::Ciphertext,
        constant: f64,
    ) -> Result<Self::Ciphertext, Self::Error>;

    fn add(
        &self,
        a: &Self::Ciphertext,
        b: &Self::Ciphertext,
    ) -> Result<Self::Ciphertext, Self::Error>;

    /// Bring a ciphertext back to degree 1; identity when it already is.
    fn relinearize(
        &self,
        ct: Self::Ciphertext,
        rlk: &Self::RelinKey,
    ) -> Result<Self::Ciphertext, Self::Error>;

    fn encrypt_with(
        &self,
        pt: &Self::Plaintext,
        key: EncryptionKey<'_, Self>,
    ) -> Result<Self::Ciphertext, Self::Error> {
        match key {
            EncryptionKey::Secret(sk) => self.encrypt(pt, sk),
            EncryptionKey::Public(pk) => self.encrypt_public(pt, pk),
        }
    }
}

impl HeEngine for CkksContext {
    type Plaintext = Plaintext;
    type Ciphertext = Ciphertext;
    type SecretKey = SecretKey;
    type PublicKey = PublicKey;
    type RelinKey = RelinearizationKey;
    type Error = HeError;

    fn from_profile(profile: ParameterProfile) -> Result<Self, HeError> {
        CkksContext::from_profile(profile)
    }

    fn max_slots(&self) -> usize {
        self.num_slots()
    }

    fn generate_keys(&self, seed: Option<u64>) -> Result<KeyMaterial<Self>, HeError> {
        let mut rng = match seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        let secret = self.keygen(&mut rng);
        let public = self.keygen_public(&secret, &mut rng);
        let relin = self.keygen_relin(&secret, &mut rng);
        Ok(KeyMaterial {
            secret,
            public,
            relin,
        })
    }

    fn encode(&self, values: &[f64]) -> Result<Plaintext, HeError> {
        CkksContext::encode(self, values)
    }

    fn encrypt(&self, pt: &Plaintext, sk: &SecretKey) -> Result<Ciphertext, HeError> {
        CkksContext::encrypt(self, pt, sk, &mut rand::thread_rng())
    }

    fn encrypt_public(&self, pt: &Plaintext, pk: &PublicKey) -> Result<Ciphertext, HeError> {
        self.encrypt_pk(pt, pk, &mut rand::thread_rng())
    }

    fn decrypt(&self, ct: &Ciphertext, sk: &SecretKey) -> Result<Plaintext, HeError> {
        CkksContext::decrypt(self, ct, sk)
    }

    fn decode(&self, pt: &Plaintext) -> Result<Vec<f64>, HeError> {
        Ok(CkksContext::decode(self, pt))
    }

    fn scalar_multiply(&self, ct: &Ciphertext, constant: f64) -> Result<Ciphertext, HeError> {
        self.rescale(&self.ct_mul_const(ct, constant)?)
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext, HeError> {
        self.ct_add(a, b)
    }

    fn relinearize(
        &self,
        ct: Ciphertext,
        rlk: &RelinearizationKey,
    ) -> Result<Ciphertext, HeError> {
        if ct.degree() == 1 {
            return Ok(ct);
        }
        CkksContext::relinearize(self, &ct, rlk)
    }
}

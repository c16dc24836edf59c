//! veilgray-he-core: RNS-CKKS homomorphic encryption for the veilgray image pipeline.
//!
//! This library implements the CKKS operation set the encrypted grayscale pipeline needs:
//! - Encode/Decode (canonical embedding, up to N/2 real slots)
//! - Encrypt (secret or public key) / Decrypt (RLWE)
//! - ct × constant multiply followed by rescale
//! - ct + ct addition
//! - ct × ct multiply and relinearization (hybrid key switching with one special prime)
//! - NTT/iNTT (negacyclic Number Theoretic Transform)
//!
//! NOT implemented:
//! - Ciphertext rotation (Galois automorphism)
//! - Bootstrapping
//! - Key or ciphertext serialization

pub mod params;
pub mod rns;
pub mod ntt;
pub mod sampling;
pub mod encoding;
pub mod keys;
pub mod ciphertext;
pub mod error;

pub use ciphertext::{Ciphertext, CkksContext, Plaintext};
pub use error::{HeError, HeResult};
pub use keys::{PublicKey, RelinearizationKey, SecretKey};
pub use params::{CkksParams, ParameterLiteral, ParameterProfile};

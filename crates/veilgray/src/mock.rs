//! Noise-free engine that keeps values in the clear.
//!
//! Mirrors the level bookkeeping of CKKS (scalar multiplication consumes a level, addition
//! requires equal levels) and can inject a failure into one stage for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use veilgray_he_core::ParameterProfile;

use crate::engine::{HeEngine, KeyMaterial};

const DEFAULT_LEVELS: usize = 4;
const MATCH_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    Encode,
    Encrypt,
    ScalarMultiply,
    Decrypt,
}

/// Fail `stage` for every input whose first slot equals `first_slot`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fault {
    pub stage: FaultStage,
    pub first_slot: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MockError {
    #[error("injected fault in {0:?}")]
    Injected(FaultStage),
    #[error("{len} values exceed {slots} slots")]
    SlotOverflow { len: usize, slots: usize },
    #[error("level mismatch: {0} vs {1}")]
    LevelMismatch(usize, usize),
    #[error("no level left")]
    LevelExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockCiphertext {
    pub values: Vec<f64>,
    pub level: usize,
}

#[derive(Debug)]
pub struct MockEngine {
    slots: usize,
    levels: usize,
    fault: Option<Fault>,
    relinearizations: AtomicUsize,
}

impl MockEngine {
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            levels: DEFAULT_LEVELS,
            fault: None,
            relinearizations: AtomicUsize::new(0),
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_levels(mut self, levels: usize) -> Self {
        self.levels = levels;
        self
    }

    /// Number of relinearize calls so far.
    pub fn relinearizations(&self) -> usize {
        self.relinearizations.load(Ordering::Relaxed)
    }

    fn check(&self, stage: FaultStage, values: &[f64]) -> Result<(), MockError> {
        match (self.fault, values.first()) {
            (Some(fault), Some(&v))
                if fault.stage == stage && (v - fault.first_slot).abs() < MATCH_TOLERANCE =>
            {
                Err(MockError::Injected(stage))
            }
            _ => Ok(()),
        }
    }
}

impl HeEngine for MockEngine {
    type Plaintext = Vec<f64>;
    type Ciphertext = MockCiphertext;
    type SecretKey = ();
    type PublicKey = ();
    type RelinKey = ();
    type Error = MockError;

    fn from_profile(profile: ParameterProfile) -> Result<Self, MockError> {
        Ok(Self::new(1usize << (profile.literal().log_n - 1)))
    }

    fn max_slots(&self) -> usize {
        self.slots
    }

    fn generate_keys(&self, _seed: Option<u64>) -> Result<KeyMaterial<Self>, MockError> {
        Ok(KeyMaterial {
            secret: (),
            public: (),
            relin: (),
        })
    }

    fn encode(&self, values: &[f64]) -> Result<Vec<f64>, MockError> {
        if values.len() > self.slots {
            return Err(MockError::SlotOverflow {
                len: values.len(),
                slots: self.slots,
            });
        }
        self.check(FaultStage::Encode, values)?;
        let mut padded = values.to_vec();
        padded.resize(self.slots, 0.0);
        Ok(padded)
    }

    fn encrypt(&self, pt: &Vec<f64>, _sk: &()) -> Result<MockCiphertext, MockError> {
        self.check(FaultStage::Encrypt, pt)?;
        Ok(MockCiphertext {
            values: pt.clone(),
            level: self.levels,
        })
    }

    fn encrypt_public(&self, pt: &Vec<f64>, pk: &()) -> Result<MockCiphertext, MockError> {
        self.encrypt(pt, pk)
    }

    fn decrypt(&self, ct: &MockCiphertext, _sk: &()) -> Result<Vec<f64>, MockError> {
        self.check(FaultStage::Decrypt, &ct.values)?;
        Ok(ct.values.clone())
    }

    fn decode(&self, pt: &Vec<f64>) -> Result<Vec<f64>, MockError> {
        Ok(pt.clone())
    }

    fn scalar_multiply(&self, ct: &MockCiphertext, constant: f64) -> Result<MockCiphertext, MockError> {
        self.check(FaultStage::ScalarMultiply, &ct.values)?;
        let level = ct.level.checked_sub(1).ok_or(MockError::LevelExhausted)?;
        Ok(MockCiphertext {
            values: ct.values.iter().map(|v| v * constant).collect(),
            level,
        })
    }

    fn add(&self, a: &MockCiphertext, b: &MockCiphertext) -> Result<MockCiphertext, MockError> {
        if a.level != b.level {
            return Err(MockError::LevelMismatch(a.level, b.level));
        }
        Ok(MockCiphertext {
            values: a.values.iter().zip(&b.values).map(|(x, y)| x + y).collect(),
            level: a.level,
        })
    }

    fn relinearize(&self, ct: MockCiphertext, _rlk: &()) -> Result<MockCiphertext, MockError> {
        self.relinearizations.fetch_add(1, Ordering::Relaxed);
        Ok(ct)
    }
}

//! Stage orchestration: decompose → encrypt → evaluate → decrypt/reconstruct.
//!
//! Each stage fans out over rayon and joins before the next starts. Keys and parameters are
//! built once in [`Pipeline::from_config`] and shared by reference with every unit.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rayon::ThreadPool;
use tracing::info;
use veilgray_he_core::{CkksContext, ParameterProfile};

use crate::decryptor::{decrypt_rows, reconstruct};
use crate::encryptor::encrypt_image;
use crate::engine::{EncryptionKey, HeEngine, KeyMaterial};
use crate::error::{PipelineError, PipelineResult};
use crate::evaluator::{evaluate_grayscale, LumaWeights};
use crate::image::{self, Image};
use crate::layout;
use crate::reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    #[default]
    SecretKey,
    PublicKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub profile: ParameterProfile,
    /// Dedicated pool size; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Seed for reproducible key generation.
    pub key_seed: Option<u64>,
    pub encryption: EncryptionMode,
    pub weights: LumaWeights,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            profile: ParameterProfile::default(),
            threads: None,
            key_seed: None,
            encryption: EncryptionMode::default(),
            weights: LumaWeights::BT601,
        }
    }
}

/// Wall-clock time of each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub setup: Duration,
    pub encryption: Duration,
    pub evaluation: Duration,
    pub decryption: Duration,
}

impl fmt::Display for StageTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, d) in [
            ("Setup", self.setup),
            ("Encryption", self.encryption),
            ("Evaluation", self.evaluation),
            ("Decryption", self.decryption),
        ] {
            writeln!(f, "{name:<12}: {:>10} μs", d.as_micros())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub image: Image,
    /// Decoded values per row, truncated to `3 × width`.
    pub decoded_rows: Vec<Vec<f64>>,
    /// (channels, rows) of the ciphertext grid.
    pub grid_shape: (usize, usize),
    pub timings: StageTimings,
}

pub type CkksPipeline = Pipeline<CkksContext>;

pub struct Pipeline<E: HeEngine> {
    engine: E,
    keys: KeyMaterial<E>,
    config: PipelineConfig,
    pool: Option<ThreadPool>,
    setup: Duration,
}

impl<E: HeEngine> Pipeline<E> {
    /// Build the engine for `config.profile`, then keys and worker pool.
    pub fn from_config(config: PipelineConfig) -> PipelineResult<Self> {
        let started = Instant::now();
        let engine = E::from_profile(config.profile)
            .map_err(|e| PipelineError::ParameterSetup(Box::new(e)))?;
        Self::assemble(engine, config, started)
    }

    /// Use an already constructed engine; generates keys and the worker pool.
    pub fn with_engine(engine: E, config: PipelineConfig) -> PipelineResult<Self> {
        Self::assemble(engine, config, Instant::now())
    }

    fn assemble(engine: E, config: PipelineConfig, started: Instant) -> PipelineResult<Self> {
        let keys = engine
            .generate_keys(config.key_seed)
            .map_err(|e| PipelineError::ParameterSetup(Box::new(e)))?;
        let pool = config
            .threads
            .map(|threads| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("veilgray-worker-{i}"))
                    .build()
            })
            .transpose()?;
        let setup = started.elapsed();
        info!(
            profile = %config.profile,
            slots = engine.max_slots(),
            threads = pool.as_ref().map_or_else(rayon::current_num_threads, ThreadPool::current_num_threads),
            elapsed_us = setup.as_micros() as u64,
            "setup finished"
        );
        Ok(Self {
            engine,
            keys,
            config,
            pool,
            setup,
        })
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn keys(&self) -> &KeyMaterial<E> {
        &self.keys
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage on `image`. Nothing partial is returned on failure.
    pub fn run(&self, image: &Image) -> PipelineResult<PipelineOutput> {
        match &self.pool {
            Some(pool) => pool.install(|| self.run_stages(image)),
            None => self.run_stages(image),
        }
    }

    fn run_stages(&self, image: &Image) -> PipelineResult<PipelineOutput> {
        let planes = layout::decompose(image)?;
        let (width, height) = (planes[0].width, planes[0].height);
        let packed = layout::pack(&planes);

        let key = match self.config.encryption {
            EncryptionMode::SecretKey => EncryptionKey::Secret(&self.keys.secret),
            EncryptionMode::PublicKey => EncryptionKey::Public(&self.keys.public),
        };

        let started = Instant::now();
        let grid = encrypt_image(&self.engine, key, &packed)?;
        let encryption = started.elapsed();
        info!(
            units = grid.len(),
            mode = ?self.config.encryption,
            elapsed_us = encryption.as_micros() as u64,
            "encryption finished"
        );

        let started = Instant::now();
        let gray = evaluate_grayscale(&self.engine, &grid, &self.keys.relin, &self.config.weights)?;
        let evaluation = started.elapsed();
        info!(
            rows = gray.len(),
            elapsed_us = evaluation.as_micros() as u64,
            "evaluation finished"
        );

        let started = Instant::now();
        let decoded_rows = decrypt_rows(&self.engine, &gray, &self.keys.secret, width)?;
        let output = reconstruct(&decoded_rows, width)?;
        let decryption = started.elapsed();
        info!(
            rows = height,
            elapsed_us = decryption.as_micros() as u64,
            "decryption finished"
        );

        Ok(PipelineOutput {
            image: output,
            decoded_rows,
            grid_shape: grid.shape(),
            timings: StageTimings {
                setup: self.setup,
                encryption,
                evaluation,
                decryption,
            },
        })
    }
}

/// Input and output locations of a file conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionPaths {
    pub input: PathBuf,
    pub encrypted_output: PathBuf,
    pub plaintext_output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub width: i32,
    pub height: i32,
    pub timings: StageTimings,
}

/// Read, convert through the encrypted pipeline and write both outputs.
///
/// The encrypted-pipeline image and the plaintext reference are written only after every
/// stage succeeded.
pub fn convert<E: HeEngine>(
    pipeline: &Pipeline<E>,
    paths: &ConversionPaths,
) -> PipelineResult<ConversionReport> {
    let input = image::read(&paths.input)?;
    input.validate()?;
    let output = pipeline.run(&input)?;
    let plain = reference::grayscale(&input, &pipeline.config.weights);

    image::write(&paths.encrypted_output, &output.image)?;
    image::write(&paths.plaintext_output, &plain)?;
    Ok(ConversionReport {
        width: input.header.width,
        height: input.header.height,
        timings: output.timings,
    })
}

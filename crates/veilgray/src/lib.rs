//! veilgray: grayscale conversion of a 24-bit image without decrypting it.
//!
//! Every (channel, row) of the image is packed into one CKKS plaintext, encrypted, combined
//! homomorphically with the luma weights and only decrypted at the end:
//!
//! ```text
//! image ─► decompose ─► pack ─► encrypt (3·H units) ─► evaluate (H units) ─► decrypt ─► image
//! ```
//!
//! Each stage is a parallel map over independent units on rayon. The stages are generic over
//! [`engine::HeEngine`], implemented by [`veilgray_he_core::CkksContext`] and by the
//! noise-free [`mock::MockEngine`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use veilgray::image::{Image, Pixel};
//! use veilgray::pipeline::{CkksPipeline, PipelineConfig};
//! use veilgray_he_core::ParameterProfile;
//!
//! let config = PipelineConfig {
//!     profile: ParameterProfile::InsecureN2048,
//!     ..PipelineConfig::default()
//! };
//! let pipeline = CkksPipeline::from_config(config)?;
//! let image = Image::from_rows(vec![vec![Pixel::new(100, 150, 200)]])?;
//! let out = pipeline.run(&image)?;
//! assert_eq!(out.image.rows[0][0], Pixel::gray(159));
//! # Ok::<(), veilgray::error::PipelineError>(())
//! ```

pub mod decryptor;
pub mod encryptor;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod image;
pub mod layout;
pub mod mock;
pub mod pipeline;
pub mod reference;

pub use encryptor::CiphertextGrid;
pub use engine::{EncryptionKey, HeEngine, KeyMaterial};
pub use error::{PipelineError, PipelineResult};
pub use evaluator::LumaWeights;
pub use image::{Image, Pixel};
pub use pipeline::{
    convert, CkksPipeline, ConversionPaths, ConversionReport, EncryptionMode, Pipeline,
    PipelineConfig, PipelineOutput, StageTimings,
};

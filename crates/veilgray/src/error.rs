use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::layout::Channel;

/// Engine errors cross the pipeline boundary type-erased, so the pipeline stays generic over
/// the engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// One (channel, row) unit of the encryption stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIndex {
    pub channel: Channel,
    pub row: usize,
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} channel, row {}", self.channel, self.row)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed image: {0}")]
    MalformedImage(String),

    #[error("parameter setup failed: {0}")]
    ParameterSetup(#[source] BoxError),

    #[error("a packed row needs {required} slots but the parameter set has {available}")]
    SlotCapacity { required: usize, available: usize },

    #[error("encoding failed for {unit}")]
    Encoding {
        unit: CellIndex,
        #[source]
        source: BoxError,
    },

    #[error("encryption failed for {unit}")]
    Encryption {
        unit: CellIndex,
        #[source]
        source: BoxError,
    },

    #[error("homomorphic evaluation failed for row {row}")]
    Evaluation {
        row: usize,
        #[source]
        source: BoxError,
    },

    #[error("decryption failed for row {row}")]
    Decryption {
        row: usize,
        #[source]
        source: BoxError,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build worker thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl PipelineError {
    /// Name of the stage the error was raised in.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::MalformedImage(_) | PipelineError::Io { .. } => "input",
            PipelineError::ParameterSetup(_) | PipelineError::ThreadPool(_) => "setup",
            PipelineError::SlotCapacity { .. }
            | PipelineError::Encoding { .. }
            | PipelineError::Encryption { .. } => "encryption",
            PipelineError::Evaluation { .. } => "evaluation",
            PipelineError::Decryption { .. } => "decryption",
        }
    }
}

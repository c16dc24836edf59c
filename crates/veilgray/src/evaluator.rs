//! Homomorphic luma evaluation, one independent unit per row.

use rayon::prelude::*;
use tracing::{error, trace};

use crate::encryptor::CiphertextGrid;
use crate::engine::HeEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::layout::Channel;

/// Channel weights of the luma formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LumaWeights {
    pub blue: f64,
    pub green: f64,
    pub red: f64,
}

impl LumaWeights {
    /// ITU-R BT.601 luma.
    pub const BT601: LumaWeights = LumaWeights {
        blue: 0.114,
        green: 0.587,
        red: 0.299,
    };

    pub fn weight(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Blue => self.blue,
            Channel::Green => self.green,
            Channel::Red => self.red,
        }
    }

    /// Plaintext luma, summed in the same order as the encrypted evaluation.
    pub fn apply(&self, b: f64, g: f64, r: f64) -> f64 {
        (self.blue * b + self.green * g) + self.red * r
    }
}

impl Default for LumaWeights {
    fn default() -> Self {
        Self::BT601
    }
}

/// `wB·C_blue + wG·C_green + wR·C_red` for every row, never decrypting.
pub fn evaluate_grayscale<E: HeEngine>(
    engine: &E,
    grid: &CiphertextGrid<E::Ciphertext>,
    rlk: &E::RelinKey,
    weights: &LumaWeights,
) -> PipelineResult<Vec<E::Ciphertext>> {
    (0..grid.height())
        .into_par_iter()
        .map(|row| {
            let cells = grid.row(row).ok_or_else(|| PipelineError::Evaluation {
                row,
                source: format!("grid has no ciphertexts for row {row}").into(),
            })?;
            trace!(row, "evaluating luma");
            evaluate_row(engine, cells, rlk, weights).map_err(|source| {
                error!(row, %source, "evaluation failed");
                PipelineError::Evaluation {
                    row,
                    source: Box::new(source),
                }
            })
        })
        .collect()
}

/// `(blue + green) + red`, relinearizing every product before it is added.
fn evaluate_row<E: HeEngine>(
    engine: &E,
    [blue, green, red]: [&E::Ciphertext; 3],
    rlk: &E::RelinKey,
    weights: &LumaWeights,
) -> Result<E::Ciphertext, E::Error> {
    let weighted = |ct: &E::Ciphertext, w: f64| engine.relinearize(engine.scalar_multiply(ct, w)?, rlk);

    let blue_green = engine.add(&weighted(blue, weights.blue)?, &weighted(green, weights.green)?)?;
    engine.add(&blue_green, &weighted(red, weights.red)?)
}

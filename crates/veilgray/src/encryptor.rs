//! Parallel encryption of every (channel, row) packed vector.

use rayon::prelude::*;
use tracing::{error, trace};

use crate::engine::{EncryptionKey, HeEngine};
use crate::error::{CellIndex, PipelineError, PipelineResult};
use crate::layout::{Channel, PackedRows};

/// Ciphertexts indexed `[channel][row]`; exactly three channels of `height` cells each.
#[derive(Debug, Clone)]
pub struct CiphertextGrid<C> {
    cells: [Vec<C>; 3],
}

impl<C> CiphertextGrid<C> {
    pub fn channel(&self, channel: Channel) -> &[C] {
        &self.cells[channel.index()]
    }

    pub fn get(&self, channel: Channel, row: usize) -> Option<&C> {
        self.cells[channel.index()].get(row)
    }

    /// Blue, green and red ciphertexts of one row.
    pub fn row(&self, row: usize) -> Option<[&C; 3]> {
        let [b, g, r] = &self.cells;
        Some([b.get(row)?, g.get(row)?, r.get(row)?])
    }

    pub fn height(&self) -> usize {
        self.cells[0].len()
    }

    /// (channels, rows).
    pub fn shape(&self) -> (usize, usize) {
        (self.cells.len(), self.height())
    }

    pub fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encode and encrypt each packed vector as an independent unit.
///
/// Rows wider than the engine's slot count are rejected before any unit runs. The first unit
/// failure is returned with its (channel, row).
pub fn encrypt_image<E: HeEngine>(
    engine: &E,
    key: EncryptionKey<'_, E>,
    packed: &PackedRows,
) -> PipelineResult<CiphertextGrid<E::Ciphertext>> {
    let height = packed[0].len();
    if packed.iter().any(|rows| rows.len() != height) {
        return Err(PipelineError::MalformedImage(
            "channels disagree on row count".to_string(),
        ));
    }
    let available = engine.max_slots();
    if let Some(required) = packed
        .iter()
        .flatten()
        .map(Vec::len)
        .find(|&len| len > available)
    {
        return Err(PipelineError::SlotCapacity {
            required,
            available,
        });
    }

    let flat = (0..Channel::ALL.len() * height)
        .into_par_iter()
        .map(|i| {
            let unit = CellIndex {
                channel: Channel::ALL[i / height],
                row: i % height,
            };
            encrypt_unit(engine, key, &packed[unit.channel.index()][unit.row], unit)
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let mut units = flat.into_iter();
    let cells = Channel::ALL.map(|_| units.by_ref().take(height).collect());
    Ok(CiphertextGrid { cells })
}

fn encrypt_unit<E: HeEngine>(
    engine: &E,
    key: EncryptionKey<'_, E>,
    values: &[f64],
    unit: CellIndex,
) -> PipelineResult<E::Ciphertext> {
    trace!(%unit, "encrypting");
    let pt = engine.encode(values).map_err(|source| {
        error!(%unit, %source, "encoding failed");
        PipelineError::Encoding {
            unit,
            source: Box::new(source),
        }
    })?;
    engine.encrypt_with(&pt, key).map_err(|source| {
        error!(%unit, %source, "encryption failed");
        PipelineError::Encryption {
            unit,
            source: Box::new(source),
        }
    })
}

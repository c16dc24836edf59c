//! Parallel decryption and reconstruction of the grayscale image.

use rayon::prelude::*;
use tracing::{error, trace};

use crate::engine::HeEngine;
use crate::error::{PipelineError, PipelineResult};
use crate::image::Image;
use crate::layout::{header_for, packed_len, unpack_gray_row};

/// Decrypt and decode each row, keeping only the first `3 × width` slots.
pub fn decrypt_rows<E: HeEngine>(
    engine: &E,
    rows: &[E::Ciphertext],
    sk: &E::SecretKey,
    width: usize,
) -> PipelineResult<Vec<Vec<f64>>> {
    let valid = packed_len(width);
    rows.par_iter()
        .enumerate()
        .map(|(row, ct)| {
            trace!(row, "decrypting");
            let fail = |source: crate::error::BoxError| {
                error!(row, %source, "decryption failed");
                PipelineError::Decryption { row, source }
            };
            let pt = engine
                .decrypt(ct, sk)
                .map_err(|e| fail(Box::new(e)))?;
            let mut values = engine.decode(&pt).map_err(|e| fail(Box::new(e)))?;
            if values.len() < valid {
                return Err(fail(
                    format!("decoded {} slots, {valid} needed", values.len()).into(),
                ));
            }
            values.truncate(valid);
            Ok(values)
        })
        .collect()
}

/// Rebuild the pixel grid from decoded rows: slots `3j, 3j+1, 3j+2` are pixel `j`'s B, G, R.
pub fn reconstruct(rows: &[Vec<f64>], width: usize) -> PipelineResult<Image> {
    Ok(Image {
        header: header_for(width, rows.len())?,
        rows: rows.iter().map(|values| unpack_gray_row(values, width)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Pixel;
    use crate::mock::{Fault, FaultStage, MockCiphertext, MockEngine};

    fn ct(values: &[f64]) -> MockCiphertext {
        let mut values = values.to_vec();
        values.resize(16, 0.0);
        MockCiphertext { values, level: 1 }
    }

    #[test]
    fn test_padding_slots_never_surface() {
        let engine = MockEngine::new(16);
        let rows = vec![ct(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]), ct(&[3.0; 6])];
        let decoded = decrypt_rows(&engine, &rows, &(), 2).unwrap();
        assert_eq!(decoded, vec![vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0], vec![3.0; 6]]);
    }

    #[test]
    fn test_reconstruct_rounds_and_clamps() {
        let rows = vec![vec![29.07, 29.07, 29.07, 149.685, 149.685, 149.685]];
        let image = reconstruct(&rows, 2).unwrap();
        assert_eq!(image.header.width, 2);
        assert_eq!(image.header.height, 1);
        assert_eq!(image.rows[0], vec![Pixel::gray(29), Pixel::gray(150)]);
    }

    #[test]
    fn test_short_decode_is_an_error() {
        let engine = MockEngine::new(4);
        let rows = vec![MockCiphertext {
            values: vec![0.0; 4],
            level: 0,
        }];
        let err = decrypt_rows(&engine, &rows, &(), 2).unwrap_err();
        assert!(matches!(err, PipelineError::Decryption { row: 0, .. }));
    }

    #[test]
    fn test_decrypt_failure_names_row() {
        let engine = MockEngine::new(16).with_fault(Fault {
            stage: FaultStage::Decrypt,
            first_slot: 9.0,
        });
        let rows = vec![ct(&[1.0; 3]), ct(&[1.0; 3]), ct(&[9.0; 3])];
        let err = decrypt_rows(&engine, &rows, &(), 1).unwrap_err();
        assert!(matches!(err, PipelineError::Decryption { row: 2, .. }));
    }
}

//! Plaintext grayscale conversion, used to validate the encrypted result.

use crate::evaluator::LumaWeights;
use crate::image::{Image, Pixel};
use crate::layout::quantize;

/// Replace every pixel by its luma, quantized the same way as the encrypted path.
pub fn grayscale(image: &Image, weights: &LumaWeights) -> Image {
    let rows = image
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|px| Pixel::gray(quantize(luma(px, weights))))
                .collect()
        })
        .collect();
    Image {
        header: image.header,
        rows,
    }
}

pub fn luma(px: &Pixel, weights: &LumaWeights) -> f64 {
    weights.apply(f64::from(px.b), f64::from(px.g), f64::from(px.r))
}

//! Raw image container and codec.
//!
//! File layout: width and height as little-endian `i32` (8 bytes), then `height` rows of
//! `width` pixels, three bytes each in blue, green, red order.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

pub const HEADER_LEN: usize = 8;
pub const BYTES_PER_PIXEL: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub width: i32,
    pub height: i32,
}

impl Header {
    /// Validated (width, height). Negative or zero dimensions are malformed.
    pub fn dimensions(&self) -> PipelineResult<(usize, usize)> {
        if self.width < 0 || self.height < 0 {
            return Err(PipelineError::MalformedImage(format!(
                "negative dimensions {}x{}",
                self.width, self.height
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::MalformedImage(format!(
                "image has no pixels ({}x{})",
                self.width, self.height
            )));
        }
        Ok((self.width as usize, self.height as usize))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Pixel {
    pub const fn new(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }

    pub const fn gray(v: u8) -> Self {
        Self { b: v, g: v, r: v }
    }
}

/// Header plus row-major pixels.
///
/// Rows are stored individually so a row that disagrees with the header width can be
/// represented and rejected by [`Image::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub header: Header,
    pub rows: Vec<Vec<Pixel>>,
}

impl Image {
    /// Build an image from rows, taking the header from the row count and the first row.
    pub fn from_rows(rows: Vec<Vec<Pixel>>) -> PipelineResult<Self> {
        let height = i32::try_from(rows.len())
            .map_err(|_| PipelineError::MalformedImage("too many rows".to_string()))?;
        let width = i32::try_from(rows.first().map_or(0, Vec::len))
            .map_err(|_| PipelineError::MalformedImage("row too wide".to_string()))?;
        let image = Self {
            header: Header { width, height },
            rows,
        };
        image.validate()?;
        Ok(image)
    }

    /// Check the header against the pixel grid; returns (width, height).
    pub fn validate(&self) -> PipelineResult<(usize, usize)> {
        let (width, height) = self.header.dimensions()?;
        if self.rows.len() != height {
            return Err(PipelineError::MalformedImage(format!(
                "header height {height} but {} rows",
                self.rows.len()
            )));
        }
        if let Some((row, pixels)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, pixels)| pixels.len() != width)
        {
            return Err(PipelineError::MalformedImage(format!(
                "row {row} has {} pixels, header width is {width}",
                pixels.len()
            )));
        }
        Ok((width, height))
    }

    pub fn width(&self) -> usize {
        self.header.width.max(0) as usize
    }

    pub fn height(&self) -> usize {
        self.header.height.max(0) as usize
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<Pixel> {
        self.rows.get(row)?.get(col).copied()
    }
}

pub fn decode(bytes: &[u8]) -> PipelineResult<Image> {
    let Some((head, body)) = bytes.split_first_chunk::<HEADER_LEN>() else {
        return Err(PipelineError::MalformedImage(format!(
            "{} bytes is shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    };
    let header = Header {
        width: i32::from_le_bytes([head[0], head[1], head[2], head[3]]),
        height: i32::from_le_bytes([head[4], head[5], head[6], head[7]]),
    };
    let (width, height) = header.dimensions()?;

    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or_else(|| PipelineError::MalformedImage("pixel count overflows".to_string()))?;
    if body.len() != expected {
        return Err(PipelineError::MalformedImage(format!(
            "header declares {width}x{height} ({expected} pixel bytes) but file has {}",
            body.len()
        )));
    }

    let rows = body
        .chunks_exact(width * BYTES_PER_PIXEL)
        .map(|row| {
            row.chunks_exact(BYTES_PER_PIXEL)
                .map(|px| Pixel::new(px[0], px[1], px[2]))
                .collect()
        })
        .collect();
    Ok(Image { header, rows })
}

pub fn encode(image: &Image) -> PipelineResult<Vec<u8>> {
    let (width, height) = image.validate()?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + width * height * BYTES_PER_PIXEL);
    bytes.extend_from_slice(&image.header.width.to_le_bytes());
    bytes.extend_from_slice(&image.header.height.to_le_bytes());
    for px in image.rows.iter().flatten() {
        bytes.extend_from_slice(&[px.b, px.g, px.r]);
    }
    Ok(bytes)
}

pub fn read(path: impl AsRef<Path>) -> PipelineResult<Image> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decode(&bytes)?;
    debug!(path = %path.display(), width = image.header.width, height = image.header.height, "image read");
    Ok(image)
}

pub fn write(path: impl AsRef<Path>, image: &Image) -> PipelineResult<()> {
    let path = path.as_ref();
    let bytes = encode(image)?;
    fs::write(path, bytes).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "image written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        bytes
    }

    #[test]
    fn test_decode_reads_bgr_rows() {
        let image = decode(&sample_bytes()).unwrap();
        assert_eq!(image.header, Header { width: 2, height: 1 });
        assert_eq!(image.rows, vec![vec![Pixel::new(1, 2, 3), Pixel::new(4, 5, 6)]]);
        assert_eq!(encode(&image).unwrap(), sample_bytes());
    }

    #[test]
    fn test_decode_rejects_length_disagreement() {
        let mut bytes = sample_bytes();
        bytes.pop();
        assert!(matches!(decode(&bytes), Err(PipelineError::MalformedImage(_))));

        let mut bytes = sample_bytes();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(PipelineError::MalformedImage(_))));

        assert!(matches!(decode(&[0, 0, 0]), Err(PipelineError::MalformedImage(_))));
    }

    #[test]
    fn test_rejects_negative_and_empty_dimensions() {
        for (w, h) in [(-1, 2), (2, -1), (0, 3), (3, 0)] {
            let header = Header { width: w, height: h };
            assert!(
                matches!(header.dimensions(), Err(PipelineError::MalformedImage(_))),
                "{w}x{h}"
            );
        }
    }

    #[test]
    fn test_validate_rejects_ragged_rows() {
        let image = Image {
            header: Header { width: 2, height: 2 },
            rows: vec![vec![Pixel::default(); 2], vec![Pixel::default(); 3]],
        };
        let err = image.validate().unwrap_err();
        assert!(matches!(err, PipelineError::MalformedImage(msg) if msg.contains("row 1")));
        assert!(encode(&image).is_err());
    }

    #[test]
    fn test_from_rows_derives_header() {
        let image = Image::from_rows(vec![vec![Pixel::gray(9); 3]; 2]).unwrap();
        assert_eq!(image.header, Header { width: 3, height: 2 });
        assert_eq!(image.pixel(1, 2), Some(Pixel::gray(9)));
        assert_eq!(image.pixel(2, 0), None);
        assert!(Image::from_rows(Vec::new()).is_err());
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read("/nonexistent/veilgray/input.bmp").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}

//! Channel decomposition and slot packing.
//!
//! Each (channel, row) becomes one vector of `3 × width` slots: slot `3j + k` holds pixel
//! `j`'s value for that channel, for k ∈ {0, 1, 2}. After the luma combination the slots
//! `3j, 3j+1, 3j+2` of the result are directly the blue, green and red bytes of gray pixel `j`.

use std::fmt;

use crate::error::{PipelineError, PipelineResult};
use crate::image::{Header, Image, Pixel};

/// Slots each pixel occupies in a packed row.
pub const SLOTS_PER_PIXEL: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Blue,
    Green,
    Red,
}

impl Channel {
    /// Storage order of the image format.
    pub const ALL: [Channel; 3] = [Channel::Blue, Channel::Green, Channel::Red];

    pub fn index(self) -> usize {
        match self {
            Channel::Blue => 0,
            Channel::Green => 1,
            Channel::Red => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Blue => "blue",
            Channel::Green => "green",
            Channel::Red => "red",
        }
    }

    pub fn of(self, px: Pixel) -> u8 {
        match self {
            Channel::Blue => px.b,
            Channel::Green => px.g,
            Channel::Red => px.r,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `height × width` real matrix for one channel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelPlane {
    pub channel: Channel,
    pub width: usize,
    pub height: usize,
    values: Vec<f64>,
}

impl ChannelPlane {
    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.width..(row + 1) * self.width]
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width + col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks_exact(self.width)
    }
}

/// Packed vectors indexed `[channel][row]`.
pub type PackedRows = [Vec<Vec<f64>>; 3];

/// Number of slots a packed row of `width` pixels needs.
pub fn packed_len(width: usize) -> usize {
    width * SLOTS_PER_PIXEL
}

/// Split an image into blue, green and red planes. Exact u8 → f64 promotion.
pub fn decompose(image: &Image) -> PipelineResult<[ChannelPlane; 3]> {
    let (width, height) = image.validate()?;
    Ok(Channel::ALL.map(|channel| ChannelPlane {
        channel,
        width,
        height,
        values: image
            .rows
            .iter()
            .flatten()
            .map(|&px| f64::from(channel.of(px)))
            .collect(),
    }))
}

/// Replicate every value into its three slots.
pub fn pack_row(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .flat_map(|&v| [v; SLOTS_PER_PIXEL])
        .collect()
}

pub fn pack(planes: &[ChannelPlane; 3]) -> PackedRows {
    planes.each_ref().map(|plane| plane.rows().map(pack_row).collect())
}

/// Inverse of [`decompose`] + [`pack`]: read slot `3j` of each channel's row.
pub fn unpack_channels(packed: &PackedRows, width: usize) -> PipelineResult<Image> {
    let height = packed[0].len();
    if packed.iter().any(|rows| rows.len() != height) {
        return Err(PipelineError::MalformedImage(
            "channels disagree on row count".to_string(),
        ));
    }
    let need = packed_len(width);
    if let Some(short) = packed.iter().flatten().find(|row| row.len() < need) {
        return Err(PipelineError::MalformedImage(format!(
            "packed row has {} slots, {need} needed",
            short.len()
        )));
    }

    let rows = (0..height)
        .map(|r| {
            (0..width)
                .map(|j| {
                    let slot = j * SLOTS_PER_PIXEL;
                    Pixel::new(
                        quantize(packed[0][r][slot]),
                        quantize(packed[1][r][slot]),
                        quantize(packed[2][r][slot]),
                    )
                })
                .collect()
        })
        .collect();
    Ok(Image {
        header: header_for(width, height)?,
        rows,
    })
}

/// Read slots `3j, 3j+1, 3j+2` as the blue, green, red bytes of pixel `j`.
pub fn unpack_gray_row(values: &[f64], width: usize) -> Vec<Pixel> {
    values
        .chunks_exact(SLOTS_PER_PIXEL)
        .take(width)
        .map(|s| Pixel::new(quantize(s[0]), quantize(s[1]), quantize(s[2])))
        .collect()
}

/// Round to nearest and clamp into [0, 255]. NaN maps to 0.
pub fn quantize(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

pub(crate) fn header_for(width: usize, height: usize) -> PipelineResult<Header> {
    let to_i32 = |v: usize| {
        i32::try_from(v).map_err(|_| PipelineError::MalformedImage(format!("dimension {v} too large")))
    };
    Ok(Header {
        width: to_i32(width)?,
        height: to_i32(height)?,
    })
}

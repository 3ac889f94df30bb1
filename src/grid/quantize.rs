//! 8-bit distance quantization.
//!
//! Distances are normalized by the truncation distance and clamped to
//! `[-1, 1]` before being mapped to a byte, so everything beyond the
//! narrow band collapses onto the two extreme values.

use serde::{Deserialize, Serialize};

/// Atlas sample encoding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    /// `[-1, 1]` mapped linearly to `[0, 255]` (R8 unorm texture)
    #[default]
    Unorm8,
    /// `[-1, 1]` mapped to `[-127, 127]`, stored as two's complement (R8 snorm texture)
    Snorm8,
}

impl SampleFormat {
    /// Quantize a signed distance
    #[inline]
    pub fn encode(self, distance: f32, inverse_truncation: f32) -> u8 {
        let q = normalize(distance, inverse_truncation);
        match self {
            SampleFormat::Unorm8 => ((q * 0.5 + 0.5) * 255.0).round() as u8,
            SampleFormat::Snorm8 => ((q * 127.0).round() as i8) as u8,
        }
    }

    /// Recover the (clamped) distance a stored byte represents
    #[inline]
    pub fn decode(self, value: u8, truncation_distance: f32) -> f32 {
        let q = match self {
            SampleFormat::Unorm8 => value as f32 / 255.0 * 2.0 - 1.0,
            SampleFormat::Snorm8 => ((value as i8) as f32 / 127.0).max(-1.0),
        };
        q * truncation_distance
    }

    /// Largest decode error for distances inside the narrow band
    pub fn max_error(self, truncation_distance: f32) -> f32 {
        match self {
            SampleFormat::Unorm8 => truncation_distance / 255.0,
            SampleFormat::Snorm8 => truncation_distance / 254.0,
        }
    }

    /// Value written for voxels far outside the surface
    pub fn far_outside(self) -> u8 {
        self.encode(1.0, 1.0)
    }
}

#[inline]
fn normalize(distance: f32, inverse_truncation: f32) -> f32 {
    let q = distance * inverse_truncation;
    // NaN samples are treated as far outside.
    if q.is_nan() { 1.0 } else { q.clamp(-1.0, 1.0) }
}

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Wire encoding tag for 16-bit signed little-endian PCM
pub const PCM_S16LE: &str = "pcm_s16le";

/// Bytes per PCM sample
pub const SAMPLE_WIDTH: usize = 2;

/// Session-wide audio parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Duration of one frame in milliseconds
    pub frame_ms: u32,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_ms: 20,
        }
    }
}

impl AudioParams {
    /// Samples per channel in one frame (`sample_rate * frame_ms / 1000`)
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate as u64 * self.frame_ms as u64 / 1000) as usize
    }

    /// Interleaved samples in one frame, all channels included
    pub fn frame_len(&self) -> usize {
        self.frame_samples() * self.channels as usize
    }
}

/// An immutable chunk of interleaved 16-bit PCM.
///
/// Samples are shared behind an `Arc`, so cloning a frame never copies audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Arc<[i16]>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Capture sequence number, starting at 0
    pub sequence: u64,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16, sequence: u64) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
            sequence,
        }
    }

    /// Copy samples from a borrowed buffer; the only allocation is the
    /// shared sample block
    pub fn from_slice(samples: &[i16], sample_rate: u32, channels: u16, sequence: u64) -> Self {
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
            sequence,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Little-endian byte representation
    pub fn to_le_bytes(&self) -> Vec<u8> {
        samples_to_le_bytes(&self.samples)
    }
}

/// Convert a float sample (-1.0..1.0) to 16-bit PCM.
///
/// Positive values scale by 32767, negative by 32768, so both rails are
/// reachable; out-of-range input clips.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let scaled = if sample < 0.0 {
        sample * 32768.0
    } else {
        sample * 32767.0
    };
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[inline]
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Reinterpret raw bytes as interleaved 16-bit samples.
///
/// Returns `None` unless the length is a whole number of frames for the
/// given channel count.
pub fn pcm_from_le_bytes(bytes: &[u8], channels: u16) -> Option<Vec<i16>> {
    let stride = SAMPLE_WIDTH * channels.max(1) as usize;
    if bytes.len() % stride != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(SAMPLE_WIDTH)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}

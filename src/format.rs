//! Negotiated device format.

use crate::error::{RenderError, Result};

/// How a single sample is represented in the device buffer.
///
/// Both representations are stored little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleKind {
    /// IEEE 754 single precision, nominal range `[-1.0, 1.0]`.
    Float32,
    /// Signed 16-bit PCM.
    Int16,
}

impl SampleKind {
    /// Size of one sample in bytes.
    #[inline]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleKind::Float32 => 4,
            SampleKind::Int16 => 2,
        }
    }

    #[inline]
    pub fn bits_per_sample(self) -> u16 {
        self.bytes_per_sample() as u16 * 8
    }
}

/// The format a device agreed to play.
///
/// Immutable once negotiated. One frame is `channels` adjacent samples, and
/// frames are laid out in time order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    sample_rate: u32,
    channels: u16,
    kind: SampleKind,
}

impl AudioFormat {
    /// Create a format, rejecting a zero sample rate or channel count.
    pub fn new(sample_rate: u32, channels: u16, kind: SampleKind) -> Result<Self> {
        if sample_rate == 0 {
            return Err(RenderError::Negotiation("sample rate must be non-zero".into()));
        }
        if channels == 0 {
            return Err(RenderError::Negotiation("channel count must be non-zero".into()));
        }

        Ok(Self {
            sample_rate,
            channels,
            kind,
        })
    }

    /// Sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    #[inline]
    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    #[inline]
    pub fn bits_per_sample(&self) -> u16 {
        self.kind.bits_per_sample()
    }

    /// Bytes in one interleaved frame (`channels × bytes_per_sample`).
    #[inline]
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.kind.bytes_per_sample()
    }

    /// Number of whole frames covering `seconds`, rounded to nearest.
    pub fn frames_for_secs(&self, seconds: f64) -> u64 {
        (seconds * self.sample_rate as f64).round() as u64
    }
}

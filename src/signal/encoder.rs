//! Conversion from normalized signal values to device-native samples.

use crate::format::SampleKind;

/// A single sample in the device's native representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NativeSample {
    Float32(f32),
    Int16(i16),
}

impl NativeSample {
    /// The representation's zero value (silence).
    #[inline]
    pub fn silence(kind: SampleKind) -> Self {
        match kind {
            SampleKind::Float32 => NativeSample::Float32(0.0),
            SampleKind::Int16 => NativeSample::Int16(0),
        }
    }

    /// Write the sample little-endian into `out`, which must be exactly one sample wide.
    #[inline]
    pub fn write_le(self, out: &mut [u8]) {
        match self {
            NativeSample::Float32(v) => out.copy_from_slice(&v.to_le_bytes()),
            NativeSample::Int16(v) => out.copy_from_slice(&v.to_le_bytes()),
        }
    }

    /// Read one little-endian sample of `kind` from `bytes`.
    #[inline]
    pub fn read_le(kind: SampleKind, bytes: &[u8]) -> Self {
        match kind {
            SampleKind::Float32 => {
                NativeSample::Float32(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            }
            SampleKind::Int16 => NativeSample::Int16(i16::from_le_bytes([bytes[0], bytes[1]])),
        }
    }
}

/// Scale a normalized value by `volume` and convert it to `kind`.
///
/// Float32 output is not clamped. Int16 output saturates to
/// `[i16::MIN, i16::MAX]` before narrowing, so `volume × value` slightly
/// above 1.0 pins to full scale instead of wrapping.
#[inline]
pub fn encode(value: f64, volume: f64, kind: SampleKind) -> NativeSample {
    let scaled = volume * value;
    match kind {
        SampleKind::Float32 => NativeSample::Float32(scaled as f32),
        SampleKind::Int16 => {
            let v = (scaled * i16::MAX as f64).round();
            NativeSample::Int16(v.clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        }
    }
}

/// Write `sample` into every channel of one interleaved frame.
#[inline]
pub fn write_frame(frame: &mut [u8], sample: NativeSample, kind: SampleKind) {
    for slot in frame.chunks_exact_mut(kind.bytes_per_sample()) {
        sample.write_le(slot);
    }
}

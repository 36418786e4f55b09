//! Device backends.
//!
//! The renderer talks to an output device only through [`DeviceBackend`]. A
//! backend owns the device buffer, hands out one writable [`BufferWindow`] at a
//! time and reports how many frames are still queued for playback.
//!
//! Built-in backends:
//! - [`SimulatedDevice`] - in-process device drained by a background thread,
//!   with a capture log of everything committed
//! - [`CpalDevice`] - the system's default output (requires `cpal_sink` feature)
//! - [`WavDevice`] - renders into a WAV file (requires `wav_sink` feature)

use core::slice::ChunksExactMut;
use std::time::Duration;

use crate::error::Result;
use crate::format::{AudioFormat, SampleKind};
use crate::signal::{write_frame, NativeSample};
use crate::wakeup::CapacitySignal;

mod ring;
mod simulated;

#[cfg(feature = "cpal_sink")]
mod cpal_device;
#[cfg(feature = "wav_sink")]
mod wav_device;

pub use ring::{DeviceRing, RingReader};
pub use simulated::{Capture, CaptureLog, CommitRecord, SimulatedDevice};

#[cfg(feature = "cpal_sink")]
pub use cpal_device::CpalDevice;
#[cfg(feature = "wav_sink")]
pub use wav_device::WavDevice;

/// Device period used when the backend has no stronger opinion (10 ms).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(10);

/// How the renderer wants to be paced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatencyMode {
    /// Sleep for half the negotiated latency between capacity queries.
    ///
    /// `latency` is a hint for the size of the device buffer.
    Polling { latency: Duration },
    /// Block on the device's capacity signal, which fires once per period.
    EventDriven,
}

/// What a device agreed to during negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Negotiated {
    pub format: AudioFormat,
    /// Total size of the device buffer in frames.
    pub buffer_frames: u32,
    /// The device's minimum efficient fill granularity.
    pub period: Duration,
}

impl Negotiated {
    /// Device period in whole frames, rounded to nearest (at least one).
    pub fn period_frames(&self) -> u32 {
        let frames = (self.period.as_secs_f64() * self.format.sample_rate() as f64).round();
        (frames as u32).max(1)
    }

    /// Playback time covered by a full device buffer.
    pub fn latency(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_frames as f64 / self.format.sample_rate() as f64)
    }
}

/// Size a device buffer for `mode`.
///
/// Polling uses the latency hint but never less than two periods; event-driven
/// pacing double-buffers on the period.
pub fn buffer_frames_for(mode: LatencyMode, sample_rate: u32, period_frames: u32) -> u32 {
    let double = period_frames.saturating_mul(2);
    match mode {
        LatencyMode::Polling { latency } => {
            let hinted = (latency.as_secs_f64() * sample_rate as f64).round() as u32;
            hinted.max(double)
        }
        LatencyMode::EventDriven => double,
    }
}

/// An audio output the renderer can drive.
///
/// Calls follow the lifecycle `negotiate`, (`create_wakeup`), then any number
/// of `pending_frames` / `request_window` / `commit` exchanges around
/// `start` and `stop`. At most one window is outstanding at a time: the
/// returned [`BufferWindow`] borrows the backend, so it must be dropped before
/// `commit` can be called.
pub trait DeviceBackend {
    /// Agree on a format and buffer layout.
    ///
    /// Fails with [`RenderError::Negotiation`](crate::RenderError::Negotiation)
    /// when no compatible format exists.
    fn negotiate(&mut self, mode: LatencyMode) -> Result<Negotiated>;

    /// Signal fired whenever the device has consumed a period (event-driven mode).
    fn create_wakeup(&mut self) -> Result<CapacitySignal>;

    /// Frames currently queued for playback.
    fn pending_frames(&mut self) -> Result<u32>;

    /// Borrow a writable region of exactly `frames` frames.
    ///
    /// Fails with [`RenderError::Backend`](crate::RenderError::Backend) if
    /// `frames` exceeds the free capacity.
    fn request_window(&mut self, frames: u32) -> Result<BufferWindow<'_>>;

    /// Hand the first `frames` frames of the last window to the device.
    ///
    /// With `silent` set the device treats the region as silence and need not
    /// read its bytes.
    fn commit(&mut self, frames: u32, silent: bool) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}

/// An exclusively borrowed, writable span of the device buffer.
///
/// Holds whole interleaved frames in the negotiated format. It exists only
/// between [`DeviceBackend::request_window`] and [`DeviceBackend::commit`].
pub struct BufferWindow<'a> {
    bytes: &'a mut [u8],
    kind: SampleKind,
    block_align: usize,
}

impl<'a> BufferWindow<'a> {
    /// Wrap `bytes`, which must hold a whole number of frames of `format`.
    pub fn new(bytes: &'a mut [u8], format: &AudioFormat) -> Self {
        let block_align = format.block_align();
        debug_assert_eq!(bytes.len() % block_align, 0, "window must hold whole frames");

        Self {
            bytes,
            kind: format.kind(),
            block_align,
        }
    }

    #[inline]
    pub fn frames(&self) -> u32 {
        (self.bytes.len() / self.block_align) as u32
    }

    #[inline]
    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &*self.bytes
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.bytes
    }

    /// Iterate over frames in time order, each `block_align` bytes wide.
    #[inline]
    pub fn frames_mut(&mut self) -> ChunksExactMut<'_, u8> {
        self.bytes.chunks_exact_mut(self.block_align)
    }

    /// Fill every frame with the representation's zero value.
    pub fn fill_silence(&mut self) {
        let kind = self.kind;
        for frame in self.bytes.chunks_exact_mut(self.block_align) {
            write_frame(frame, NativeSample::silence(kind), kind);
        }
    }
}

//! Tonepace - real-time tone rendering into a shared audio device buffer
//!
//! A [`PlaybackSession`] plays one periodic waveform for a fixed duration. It
//! negotiates a format with a [`DeviceBackend`], primes the device buffer with
//! silence, then lets a [`RenderPacer`] top the buffer up one period at a time
//! until the requested number of frames has been written, and finally pads
//! the tail with silence before stopping the device.
//!
//! Design principles:
//! - One thread owns the pacer, the clock and every buffer window
//! - Time is derived from a frame counter, so phase never drifts across fills
//! - The steady-state loop does not allocate
//! - Every wait on the device is bounded
//!
//! ```
//! use std::time::Duration;
//! use tonepace::backend::SimulatedDevice;
//! use tonepace::{AudioFormat, PlaybackSession, SampleKind, SessionConfig, Waveform, WaveformSpec};
//!
//! let format = AudioFormat::new(16_000, 2, SampleKind::Float32)?;
//! let device = SimulatedDevice::new(format).with_speed(40.0);
//!
//! let config = SessionConfig::new(WaveformSpec::new(Waveform::Triangle, 330.0, 0.5)?)
//!     .with_duration(Duration::from_millis(50))
//!     .with_event_driven();
//! let report = PlaybackSession::new(device, config)?.run()?;
//! assert_eq!(report.frames_rendered, 800);
//! # Ok::<(), tonepace::RenderError>(())
//! ```

pub mod backend;
pub mod config;
mod error;
mod format;
pub mod pacer;
mod session;
pub mod signal;
mod wakeup;

pub use backend::{BufferWindow, DeviceBackend, LatencyMode, Negotiated};
pub use config::SessionConfig;
pub use error::{RenderError, Result};
pub use format::{AudioFormat, SampleKind};
pub use pacer::RenderPacer;
pub use session::{PlaybackSession, SessionReport, SessionState};
pub use signal::{encode, NativeSample, PlaybackClock, Waveform, WaveformSpec};
pub use wakeup::{CapacitySignal, StopHandle};

//! Signal generation: waveform shapes, sample encoding and the session clock.
//!
//! Data flows one way through this module. The [`PlaybackClock`] supplies the
//! time of each frame, a [`Waveform`] turns that time into a normalized value,
//! and [`encode`] converts the value into the device's [`NativeSample`].

mod clock;
mod encoder;
mod waveform;

pub use clock::PlaybackClock;
pub use encoder::{encode, write_frame, NativeSample};
pub use waveform::{Waveform, WaveformSpec};

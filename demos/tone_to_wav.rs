//! Render a one second sawtooth into `tone.wav` without any sound hardware.
//!
//! Run with: cargo run --example tone_to_wav --features wav_sink

use std::time::Duration;

use tonepace::backend::WavDevice;
use tonepace::{AudioFormat, PlaybackSession, SampleKind, SessionConfig, Waveform, WaveformSpec};

fn main() -> tonepace::Result<()> {
    tracing_subscriber::fmt().init();

    let format = AudioFormat::new(48_000, 2, SampleKind::Int16)?;
    let device = WavDevice::new("tone.wav", format);

    let config = SessionConfig::new(WaveformSpec::new(Waveform::Sawtooth, 220.0, 0.5)?)
        .with_duration(Duration::from_secs(1))
        .with_event_driven();
    let report = PlaybackSession::new(device, config)?.run()?;

    println!("wrote {} frames of signal to tone.wav", report.frames_rendered);
    Ok(())
}

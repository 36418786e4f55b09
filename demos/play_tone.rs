//! Play a few seconds of each waveform on the default output device.
//!
//! Run with: cargo run --example play_tone --features cpal_sink

use std::time::Duration;

use tonepace::backend::CpalDevice;
use tonepace::{PlaybackSession, SessionConfig, Waveform, WaveformSpec};

fn main() -> tonepace::Result<()> {
    tracing_subscriber::fmt().init();

    for waveform in [Waveform::Sine, Waveform::Square, Waveform::Triangle, Waveform::Sawtooth] {
        let device = CpalDevice::default_output()?;
        println!("{waveform:?} on {}", device.name());

        let config = SessionConfig::new(WaveformSpec::new(waveform, 330.0, 0.2)?)
            .with_duration(Duration::from_secs(2))
            .with_event_driven();
        let mut session = PlaybackSession::new(device, config)?;
        let report = session.run()?;

        let underruns = session.backend().underrun_samples();
        println!("  {} frames, {} underrun samples", report.frames_rendered, underruns);
    }

    Ok(())
}

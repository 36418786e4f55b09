//! Tonepace CLI - play a test tone on the sound card or render it to a WAV file
//!
//! ```bash
//! # Two seconds of 220 Hz square wave on the default output
//! tonepace --waveform square --frequency 220 --duration 2
//!
//! # Render to disk without touching the sound card
//! tonepace --wav tone.wav --sample-rate 48000 --channels 2 --int16
//! ```
//!
//! Press Enter to stop early: the tone drains into silence before the device
//! stops. Log verbosity follows `RUST_LOG` (default `info`).

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tonepace::backend::WavDevice;
use tonepace::{
    AudioFormat, DeviceBackend, PlaybackSession, SampleKind, SessionConfig, SessionReport, StopHandle,
    Waveform, WaveformSpec,
};

/// Play a periodic test tone with paced, low-latency buffer fills
#[derive(Parser, Debug)]
#[command(name = "tonepace")]
#[command(version)]
struct Args {
    /// Tone frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f64,

    /// Output volume, 0.0 to 1.0
    #[arg(long, default_value_t = 1.0)]
    volume: f64,

    #[arg(long, value_enum, default_value_t = Waveform::Sine)]
    waveform: Waveform,

    /// Playback length in seconds
    #[arg(long, default_value_t = 5.0)]
    duration: f64,

    /// Device buffer latency hint in polling mode
    #[arg(long, default_value_t = 50)]
    latency_ms: u64,

    /// Block on the device's capacity signal instead of polling
    #[arg(long)]
    event_driven: bool,

    /// Give up when the device makes no progress for this long
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Render into a WAV file instead of the sound card
    #[arg(long)]
    wav: Option<PathBuf>,

    /// WAV sample rate
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    /// WAV channel count
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Write 16-bit PCM instead of 32-bit float WAV
    #[arg(long)]
    int16: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = session_config(&args)?;

    let report = match &args.wav {
        Some(path) => {
            let kind = if args.int16 { SampleKind::Int16 } else { SampleKind::Float32 };
            let format = AudioFormat::new(args.sample_rate, args.channels, kind)?;
            play(WavDevice::new(path, format), config)?
        }
        None => play_default_output(config)?,
    };

    println!(
        "rendered {} of {} frames in {} windows ({} wakeups){}",
        report.frames_rendered,
        report.total_frames,
        report.windows,
        report.wakeups,
        if report.cancelled { ", cancelled" } else { "" }
    );
    Ok(())
}

fn session_config(args: &Args) -> Result<SessionConfig> {
    if !args.duration.is_finite() || args.duration <= 0.0 {
        anyhow::bail!("--duration must be a positive number of seconds");
    }

    let spec = WaveformSpec::new(args.waveform, args.frequency, args.volume)?;
    let config = SessionConfig::new(spec)
        .with_duration(Duration::from_secs_f64(args.duration))
        .with_wait_timeout(Duration::from_millis(args.timeout_ms));

    Ok(if args.event_driven {
        config.with_event_driven()
    } else {
        config.with_polling(Duration::from_millis(args.latency_ms))
    })
}

fn play<B: DeviceBackend>(device: B, config: SessionConfig) -> Result<SessionReport> {
    let mut session = PlaybackSession::new(device, config)?;
    watch_for_enter(io::BufReader::new(io::stdin()), session.stop_handle());
    let report = session.run().context("playback failed")?;
    Ok(report)
}

/// Stop `stop` once a line arrives on `input`. End of input leaves it alone.
fn watch_for_enter<R: BufRead + Send + 'static>(mut input: R, stop: StopHandle) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut line = String::new();
        if let Ok(n) = input.read_line(&mut line) {
            if n > 0 {
                tracing::info!("stop requested");
                stop.stop();
            }
        }
    })
}

#[cfg(feature = "cpal_sink")]
fn play_default_output(config: SessionConfig) -> Result<SessionReport> {
    let device = tonepace::backend::CpalDevice::default_output()?;
    tracing::info!(device = device.name(), "using default output");
    play(device, config)
}

#[cfg(not(feature = "cpal_sink"))]
fn play_default_output(_config: SessionConfig) -> Result<SessionReport> {
    anyhow::bail!("built without the `cpal_sink` feature; pass --wav <path> to render to a file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn enter_requests_a_stop() {
        let stop = StopHandle::new();
        watch_for_enter(Cursor::new(b"\n".to_vec()), stop.clone()).join().unwrap();
        assert!(stop.is_stopped());
    }

    #[test]
    fn closed_stdin_keeps_playing() {
        let stop = StopHandle::new();
        watch_for_enter(Cursor::new(Vec::new()), stop.clone()).join().unwrap();
        assert!(!stop.is_stopped());
    }

    #[test]
    fn cli_defaults_match_session_defaults() {
        let args = Args::parse_from(["tonepace"]);
        let config = session_config(&args).unwrap();
        assert_eq!(config, SessionConfig::default());
    }
}

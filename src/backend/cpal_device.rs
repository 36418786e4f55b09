//! CPAL output device

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig, SupportedBufferSize};
use tracing::{debug, error, info, warn};

use crate::backend::{
    buffer_frames_for, BufferWindow, DeviceBackend, DeviceRing, LatencyMode, Negotiated, RingReader,
    DEFAULT_PERIOD,
};
use crate::error::{RenderError, Result};
use crate::format::{AudioFormat, SampleKind};
use crate::signal::NativeSample;
use crate::wakeup::CapacitySignal;

/// Shortest device buffer used when the host will not say how large its
/// callbacks are.
const UNKNOWN_HOST_BUFFER: Duration = Duration::from_millis(100);

/// The system's default audio output, driven through cpal.
///
/// The device buffer is a [`DeviceRing`] drained by the cpal stream callback,
/// which runs on cpal's own thread. The callback never allocates, logs or
/// blocks: it decodes whole frames from the ring into cpal's buffer, pads with
/// silence when the ring runs dry, and fires the capacity signal once per
/// callback with [`CapacitySignal::try_notify`], which skips the wakeup
/// instead of waiting when the pacer holds the signal's lock.
///
/// # Example
///
/// ```no_run
/// use tonepace::backend::CpalDevice;
/// use tonepace::{PlaybackSession, SessionConfig};
///
/// let device = CpalDevice::default_output()?;
/// println!("playing on {}", device.name());
/// let mut session = PlaybackSession::new(device, SessionConfig::default())?;
/// session.run()?;
/// # Ok::<(), tonepace::RenderError>(())
/// ```
pub struct CpalDevice {
    device: cpal::Device,
    name: String,

    stream: Option<cpal::Stream>,
    ring: Option<DeviceRing>,
    signal: CapacitySignal,
    underrun_samples: Arc<AtomicU64>,
}

impl CpalDevice {
    /// Open the host's default output device.
    pub fn default_output() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| RenderError::Negotiation("no audio output device available".into()))?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        Ok(Self {
            device,
            name,
            stream: None,
            ring: None,
            signal: CapacitySignal::new(),
            underrun_samples: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Samples the device had to pad with silence because the ring was empty.
    pub fn underrun_samples(&self) -> u64 {
        self.underrun_samples.load(Ordering::Relaxed)
    }

    fn ring_mut(&mut self) -> Result<&mut DeviceRing> {
        self.ring
            .as_mut()
            .ok_or_else(|| RenderError::Backend("cpal device used before negotiation".into()))
    }
}

impl DeviceBackend for CpalDevice {
    fn negotiate(&mut self, mode: LatencyMode) -> Result<Negotiated> {
        let supported = self
            .device
            .default_output_config()
            .map_err(|e| RenderError::Negotiation(format!("failed to get default output config: {e}")))?;

        let kind = match supported.sample_format() {
            SampleFormat::F32 => SampleKind::Float32,
            SampleFormat::I16 => SampleKind::Int16,
            other => {
                return Err(RenderError::Negotiation(format!(
                    "unsupported device sample format: {other:?}"
                )))
            }
        };
        let format = AudioFormat::new(supported.sample_rate().0, supported.channels(), kind)?;

        let StreamLayout {
            period_frames,
            buffer_size,
            buffer_frames,
        } = stream_layout(supported.buffer_size(), mode, format.sample_rate());

        let (ring, reader) = DeviceRing::new(format, buffer_frames)?;
        let config = StreamConfig {
            channels: format.channels(),
            sample_rate: SampleRate(format.sample_rate()),
            buffer_size,
        };
        let stream = build_stream(
            &self.device,
            &config,
            reader,
            self.signal.clone(),
            self.underrun_samples.clone(),
        )?;

        // some hosts start streams as soon as they are built
        if let Err(err) = stream.pause() {
            debug!(%err, "stream could not be paused before priming");
        }

        let negotiated = Negotiated {
            format,
            buffer_frames,
            period: Duration::from_secs_f64(period_frames as f64 / format.sample_rate() as f64),
        };
        info!(
            device = %self.name,
            sample_rate = format.sample_rate(),
            channels = format.channels(),
            kind = ?format.kind(),
            period_frames,
            buffer_frames,
            "negotiated output stream"
        );

        self.ring = Some(ring);
        self.stream = Some(stream);
        Ok(negotiated)
    }

    fn create_wakeup(&mut self) -> Result<CapacitySignal> {
        Ok(self.signal.clone())
    }

    fn pending_frames(&mut self) -> Result<u32> {
        Ok(self.ring_mut()?.pending_frames())
    }

    fn request_window(&mut self, frames: u32) -> Result<BufferWindow<'_>> {
        self.ring_mut()?.request(frames)
    }

    fn commit(&mut self, frames: u32, silent: bool) -> Result<()> {
        self.ring_mut()?.commit(frames, silent)
    }

    fn start(&mut self) -> Result<()> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| RenderError::Backend("cpal device started before negotiation".into()))?;
        stream
            .play()
            .map_err(|e| RenderError::Backend(format!("failed to start audio stream: {e}")))
    }

    fn stop(&mut self) -> Result<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        let paused = stream
            .pause()
            .map_err(|e| RenderError::Backend(format!("failed to stop audio stream: {e}")));

        let underruns = self.underrun_samples();
        if underruns > 0 {
            warn!(samples = underruns, "device buffer ran dry during playback");
        }
        paused
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StreamLayout {
    period_frames: u32,
    buffer_size: BufferSize,
    /// Size of the ring the callback drains.
    buffer_frames: u32,
}

/// Pick the cpal callback size and ring size for a 10 ms period.
///
/// A known range clamps the period and fixes the callback size to it. An
/// unknown range leaves the callback size to the host, so the ring gets at
/// least [`UNKNOWN_HOST_BUFFER`] of headroom.
fn stream_layout(supported: &SupportedBufferSize, mode: LatencyMode, sample_rate: u32) -> StreamLayout {
    let nominal = ((DEFAULT_PERIOD.as_secs_f64() * sample_rate as f64).round() as u32).max(1);

    match supported {
        SupportedBufferSize::Range { min, max } => {
            let period_frames = nominal.max(*min).min((*max).max(*min)).max(1);
            StreamLayout {
                period_frames,
                buffer_size: BufferSize::Fixed(period_frames),
                buffer_frames: buffer_frames_for(mode, sample_rate, period_frames),
            }
        }
        SupportedBufferSize::Unknown => {
            let headroom = (UNKNOWN_HOST_BUFFER.as_secs_f64() * sample_rate as f64).round() as u32;
            StreamLayout {
                period_frames: nominal,
                buffer_size: BufferSize::Default,
                buffer_frames: buffer_frames_for(mode, sample_rate, nominal).max(headroom),
            }
        }
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut reader: RingReader,
    signal: CapacitySignal,
    underruns: Arc<AtomicU64>,
) -> Result<cpal::Stream> {
    let built = match reader.format().kind() {
        SampleKind::Float32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let missing = play_into(&mut reader, data, 0.0, |s| match s {
                    NativeSample::Float32(v) => v,
                    NativeSample::Int16(v) => v as f32 / i16::MAX as f32,
                });
                if missing > 0 {
                    underruns.fetch_add(missing as u64, Ordering::Relaxed);
                }
                signal.try_notify();
            },
            |err| error!("CPAL stream error: {}", err),
            None,
        ),
        SampleKind::Int16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let missing = play_into(&mut reader, data, 0, |s| match s {
                    NativeSample::Int16(v) => v,
                    NativeSample::Float32(v) => (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16,
                });
                if missing > 0 {
                    underruns.fetch_add(missing as u64, Ordering::Relaxed);
                }
                signal.try_notify();
            },
            |err| error!("CPAL stream error: {}", err),
            None,
        ),
    };

    built.map_err(|e| RenderError::Backend(format!("failed to build output stream: {e}")))
}

/// Fill `data` from the ring, padding the tail with `silence`.
///
/// Returns the number of padded samples.
fn play_into<T: Copy>(
    reader: &mut RingReader,
    data: &mut [T],
    silence: T,
    convert: impl Fn(NativeSample) -> T,
) -> usize {
    let channels = reader.format().channels() as usize;
    let mut written = 0;
    reader.pop_frames(data.len() / channels, |sample| {
        data[written] = convert(sample);
        written += 1;
    });
    data[written..].fill(silence);
    data.len() - written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_range_fixes_the_callback_size() {
        let range = SupportedBufferSize::Range { min: 64, max: 4096 };
        let layout = stream_layout(&range, LatencyMode::EventDriven, 48_000);
        assert_eq!(layout.period_frames, 480);
        assert_eq!(layout.buffer_size, BufferSize::Fixed(480));
        assert_eq!(layout.buffer_frames, 960);

        let narrow = SupportedBufferSize::Range { min: 1024, max: 2048 };
        let layout = stream_layout(&narrow, LatencyMode::EventDriven, 48_000);
        assert_eq!(layout.period_frames, 1024);
        assert_eq!(layout.buffer_frames, 2048);
    }

    #[test]
    fn unknown_range_gets_headroom() {
        let layout = stream_layout(&SupportedBufferSize::Unknown, LatencyMode::EventDriven, 48_000);
        assert_eq!(layout.period_frames, 480);
        assert_eq!(layout.buffer_size, BufferSize::Default);
        assert_eq!(layout.buffer_frames, 4_800);

        let polled = LatencyMode::Polling {
            latency: Duration::from_millis(200),
        };
        let layout = stream_layout(&SupportedBufferSize::Unknown, polled, 48_000);
        assert_eq!(layout.buffer_frames, 9_600);
    }
}

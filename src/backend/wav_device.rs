//! Offline device that renders into a WAV file.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, info};

use crate::backend::{
    buffer_frames_for, BufferWindow, DeviceBackend, DeviceRing, LatencyMode, Negotiated, RingReader,
    DEFAULT_PERIOD,
};
use crate::error::{RenderError, Result};
use crate::format::{AudioFormat, SampleKind};
use crate::signal::NativeSample;
use crate::wakeup::CapacitySignal;

/// A device whose "speaker" is a WAV file.
///
/// Everything committed, silence included, is written to disk immediately,
/// so the buffer never holds pending frames and the capacity signal fires
/// after every commit. Event-driven sessions therefore render as fast as the
/// disk accepts data; polling sessions still sleep between queries.
pub struct WavDevice {
    path: PathBuf,
    format: AudioFormat,
    period: Duration,

    ring: Option<DeviceRing>,
    reader: Option<RingReader>,
    writer: Option<WavWriter<BufWriter<File>>>,
    signal: CapacitySignal,
    frames_written: u64,
}

impl WavDevice {
    /// Prepare a device that will create `path` on negotiation.
    pub fn new(path: impl AsRef<Path>, format: AudioFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            period: DEFAULT_PERIOD,
            ring: None,
            reader: None,
            writer: None,
            signal: CapacitySignal::new(),
            frames_written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written to the file so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.format.channels(),
            sample_rate: self.format.sample_rate(),
            bits_per_sample: self.format.bits_per_sample(),
            sample_format: match self.format.kind() {
                SampleKind::Float32 => SampleFormat::Float,
                SampleKind::Int16 => SampleFormat::Int,
            },
        }
    }

    fn ring_mut(&mut self) -> Result<&mut DeviceRing> {
        self.ring
            .as_mut()
            .ok_or_else(|| RenderError::Backend("wav device used before negotiation".into()))
    }
}

impl DeviceBackend for WavDevice {
    fn negotiate(&mut self, mode: LatencyMode) -> Result<Negotiated> {
        let period_frames = self.format.frames_for_secs(self.period.as_secs_f64()).max(1) as u32;
        let buffer_frames = buffer_frames_for(mode, self.format.sample_rate(), period_frames);
        let (ring, reader) = DeviceRing::new(self.format, buffer_frames)?;

        let writer = WavWriter::create(&self.path, self.spec()).map_err(|e| {
            RenderError::Backend(format!("cannot create {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), ?mode, buffer_frames, "wav device negotiated");

        self.ring = Some(ring);
        self.reader = Some(reader);
        self.writer = Some(writer);

        Ok(Negotiated {
            format: self.format,
            buffer_frames,
            period: self.period,
        })
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
        self.ring_mut()?.commit(frames, silent)?;

        let (Some(reader), Some(writer)) = (self.reader.as_mut(), self.writer.as_mut()) else {
            return Err(RenderError::Backend("wav device already finalized".into()));
        };

        let mut result = Ok(());
        reader.pop_frames(frames as usize, |sample| {
            if result.is_ok() {
                result = match sample {
                    NativeSample::Float32(v) => writer.write_sample(v),
                    NativeSample::Int16(v) => writer.write_sample(v),
                };
            }
        });
        result.map_err(|e| RenderError::Backend(format!("wav write failed: {e}")))?;

        self.frames_written += frames as u64;
        self.signal.notify();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.signal.notify();
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| RenderError::Backend(format!("wav finalize failed: {e}")))?;
            info!(path = %self.path.display(), frames = self.frames_written, "wav file written");
        }
        Ok(())
    }
}

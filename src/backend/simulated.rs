//! In-process device for tests, benchmarks and headless runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::backend::{
    buffer_frames_for, BufferWindow, DeviceBackend, DeviceRing, LatencyMode, Negotiated, RingReader,
    DEFAULT_PERIOD,
};
use crate::error::{RenderError, Result};
use crate::format::AudioFormat;
use crate::wakeup::CapacitySignal;

/// One `commit` as the device saw it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitRecord {
    pub frames: u32,
    pub silent: bool,
    /// Frames the window was requested with.
    pub requested: u32,
    /// Free capacity the device last reported before the request.
    pub available: u32,
}

/// Everything a [`SimulatedDevice`] has observed so far.
#[derive(Clone, Debug, Default)]
pub struct CaptureLog {
    /// Committed bytes in commit order, exactly as the device would play them.
    pub bytes: Vec<u8>,
    pub commits: Vec<CommitRecord>,
    pub frames_played: u64,
    /// Frames the hardware wanted while the buffer was empty.
    pub underrun_frames: u64,
    pub started: bool,
    pub stopped: bool,
}

impl CaptureLog {
    /// Pair every commit with the bytes it delivered.
    pub fn segments(&self, block_align: usize) -> impl Iterator<Item = (&CommitRecord, &[u8])> {
        let mut offset = 0;
        self.commits.iter().map(move |commit| {
            let len = commit.frames as usize * block_align;
            let segment = &self.bytes[offset..offset + len];
            offset += len;
            (commit, segment)
        })
    }

    /// Frames delivered by non-silent commits.
    pub fn signal_frames(&self) -> u64 {
        self.commits
            .iter()
            .filter(|c| !c.silent)
            .map(|c| c.frames as u64)
            .sum()
    }

    /// Bytes of the non-silent commits, concatenated.
    pub fn signal_bytes(&self, block_align: usize) -> Vec<u8> {
        self.segments(block_align)
            .filter(|(commit, _)| !commit.silent)
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect()
    }
}

/// Shared view of a [`SimulatedDevice`]'s [`CaptureLog`].
#[derive(Clone, Default)]
pub struct Capture {
    log: Arc<Mutex<CaptureLog>>,
}

impl Capture {
    fn lock(&self) -> MutexGuard<'_, CaptureLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A copy of everything captured so far.
    pub fn snapshot(&self) -> CaptureLog {
        self.lock().clone()
    }
}

/// A device that plays into memory.
///
/// Behaves like a shared-mode sound card: a background "hardware" thread
/// consumes one period from the device buffer every period and fires the
/// capacity signal. `speed` compresses the hardware clock so tests can render
/// seconds of audio in milliseconds; the reported period stays nominal.
///
/// Every commit and every committed byte is recorded in a [`Capture`].
///
/// ```
/// use std::time::Duration;
/// use tonepace::backend::SimulatedDevice;
/// use tonepace::{AudioFormat, PlaybackSession, SampleKind, SessionConfig, WaveformSpec};
///
/// let format = AudioFormat::new(8_000, 1, SampleKind::Int16).unwrap();
/// let device = SimulatedDevice::new(format).with_speed(50.0);
/// let capture = device.capture();
///
/// let config = SessionConfig::new(WaveformSpec::sine(440.0).unwrap())
///     .with_duration(Duration::from_millis(100))
///     .with_event_driven();
/// let mut session = PlaybackSession::new(device, config).unwrap();
/// session.run().unwrap();
///
/// assert_eq!(capture.snapshot().signal_frames(), 800);
/// ```
pub struct SimulatedDevice {
    format: AudioFormat,
    period: Duration,
    speed: f64,

    ring: Option<DeviceRing>,
    reader: Option<RingReader>,
    negotiated: Option<Negotiated>,

    signal: CapacitySignal,
    shutdown: Arc<AtomicBool>,
    hardware: Option<JoinHandle<()>>,

    capture: Capture,
    last_available: u32,
    requested: u32,
}

impl SimulatedDevice {
    /// A device with a 10 ms period running in real time.
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            period: DEFAULT_PERIOD,
            speed: 1.0,
            ring: None,
            reader: None,
            negotiated: None,
            signal: CapacitySignal::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            hardware: None,
            capture: Capture::default(),
            last_available: 0,
            requested: 0,
        }
    }

    /// Set the device period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Run the hardware clock `speed` times faster than real time.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
        self
    }

    /// Handle for inspecting what the device received.
    pub fn capture(&self) -> Capture {
        self.capture.clone()
    }

    fn ring_mut(&mut self) -> Result<&mut DeviceRing> {
        self.ring
            .as_mut()
            .ok_or_else(|| RenderError::Backend("simulated device used before negotiation".into()))
    }

    fn shut_down_hardware(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(hardware) = self.hardware.take() {
            if hardware.join().is_err() {
                debug!("simulated hardware thread panicked");
            }
        }
    }
}

impl DeviceBackend for SimulatedDevice {
    fn negotiate(&mut self, mode: LatencyMode) -> Result<Negotiated> {
        if self.hardware.is_some() {
            return Err(RenderError::Backend("cannot renegotiate a running device".into()));
        }

        let period_frames = self.format.frames_for_secs(self.period.as_secs_f64()).max(1) as u32;
        let buffer_frames = buffer_frames_for(mode, self.format.sample_rate(), period_frames);
        let (ring, reader) = DeviceRing::new(self.format, buffer_frames)?;

        let negotiated = Negotiated {
            format: self.format,
            buffer_frames,
            period: self.period,
        };
        debug!(?negotiated, speed = self.speed, "simulated device negotiated");

        self.ring = Some(ring);
        self.reader = Some(reader);
        self.negotiated = Some(negotiated);
        Ok(negotiated)
    }

    fn create_wakeup(&mut self) -> Result<CapacitySignal> {
        Ok(self.signal.clone())
    }

    fn pending_frames(&mut self) -> Result<u32> {
        let ring = self.ring_mut()?;
        let pending = ring.pending_frames();
        let available = ring.buffer_frames() - pending;
        self.last_available = available;
        Ok(pending)
    }

    fn request_window(&mut self, frames: u32) -> Result<BufferWindow<'_>> {
        self.requested = frames;
        self.ring_mut()?.request(frames)
    }

    fn commit(&mut self, frames: u32, silent: bool) -> Result<()> {
        let record = CommitRecord {
            frames,
            silent,
            requested: self.requested,
            available: self.last_available,
        };

        let ring = self
            .ring
            .as_mut()
            .ok_or_else(|| RenderError::Backend("simulated device used before negotiation".into()))?;
        ring.commit(frames, silent)?;

        let mut log = self.capture.lock();
        log.bytes.extend_from_slice(ring.staged(frames));
        log.commits.push(record);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.hardware.is_some() {
            return Err(RenderError::Backend("simulated device already started".into()));
        }
        let (Some(mut reader), Some(negotiated)) = (self.reader.take(), self.negotiated) else {
            return Err(RenderError::Backend("simulated device started before negotiation".into()));
        };

        let tick = self.period.div_f64(self.speed);
        let period_frames = negotiated.period_frames() as usize;
        let shutdown = self.shutdown.clone();
        let signal = self.signal.clone();
        let capture = self.capture.clone();

        capture.lock().started = true;

        let hardware = thread::Builder::new()
            .name("simulated-audio".into())
            .spawn(move || {
                while !shutdown.load(Ordering::Acquire) {
                    thread::sleep(tick);
                    let played = reader.skip_frames(period_frames);
                    {
                        let mut log = capture.lock();
                        log.frames_played += played as u64;
                        log.underrun_frames += (period_frames - played) as u64;
                    }
                    signal.notify();
                }
            })
            .map_err(|e| RenderError::Backend(format!("failed to spawn hardware thread: {e}")))?;

        self.hardware = Some(hardware);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.shut_down_hardware();
        self.capture.lock().stopped = true;
        Ok(())
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.shut_down_hardware();
    }
}

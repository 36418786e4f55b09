//! Render pacer: decides when to write and how much.

use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::backend::{BufferWindow, DeviceBackend, LatencyMode, Negotiated};
use crate::error::{RenderError, Result};
use crate::signal::{encode, write_frame, PlaybackClock, WaveformSpec};
use crate::wakeup::CapacitySignal;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

enum Pacing {
    Poll { interval: Duration },
    Signal(CapacitySignal),
}

/// Keeps the device buffer fed without overrunning it.
///
/// The pacer owns every suspension point of a session. It waits for capacity
/// (by sleeping or by blocking on the device's [`CapacitySignal`]), asks the
/// device how much room there is and fills at most one [`BufferWindow`] per
/// wakeup. All waits are bounded by the configured timeout.
pub struct RenderPacer {
    pacing: Pacing,
    chunk_frames: u32,
    buffer_frames: u32,
    latency: Duration,
    timeout: Duration,

    wakeups: u64,
    windows: u64,
    idle_since: Option<Instant>,
}

impl RenderPacer {
    /// Create a pacer for a device that has already been negotiated.
    ///
    /// In event-driven mode this asks the device for its wakeup signal.
    pub fn new<B: DeviceBackend + ?Sized>(
        backend: &mut B,
        negotiated: &Negotiated,
        mode: LatencyMode,
        timeout: Duration,
    ) -> Result<Self> {
        let pacing = match mode {
            LatencyMode::Polling { .. } => Pacing::Poll {
                interval: (negotiated.latency() / 2).max(MIN_POLL_INTERVAL),
            },
            LatencyMode::EventDriven => Pacing::Signal(backend.create_wakeup()?),
        };
        let chunk_frames = negotiated
            .period_frames()
            .min(negotiated.buffer_frames)
            .max(1);

        Ok(Self {
            pacing,
            chunk_frames,
            buffer_frames: negotiated.buffer_frames,
            latency: negotiated.latency(),
            timeout,
            wakeups: 0,
            windows: 0,
            idle_since: None,
        })
    }

    /// Frames per pacing chunk, one device period.
    #[inline]
    pub fn chunk_frames(&self) -> u32 {
        self.chunk_frames
    }

    /// Times the pacer has woken up.
    #[inline]
    pub fn wakeups(&self) -> u64 {
        self.wakeups
    }

    /// Windows filled with signal.
    #[inline]
    pub fn windows(&self) -> u64 {
        self.windows
    }

    /// Suspend until the device may have room.
    pub fn wait(&mut self) -> Result<()> {
        match &self.pacing {
            Pacing::Poll { interval } => thread::sleep(*interval),
            Pacing::Signal(signal) => {
                if !signal.wait_timeout(self.timeout) {
                    return Err(RenderError::Timeout(self.timeout));
                }
            }
        }
        self.wakeups += 1;
        Ok(())
    }

    /// Free device capacity in frames.
    pub fn available<B: DeviceBackend + ?Sized>(&self, backend: &mut B) -> Result<u32> {
        let pending = backend.pending_frames()?;
        Ok(self.buffer_frames.saturating_sub(pending))
    }

    /// Fill all current capacity with silence. Returns the frames written.
    pub fn prime<B: DeviceBackend + ?Sized>(&mut self, backend: &mut B) -> Result<u32> {
        self.write_silence(backend)
    }

    /// Write one window of signal if enough room has opened up.
    ///
    /// `remaining` is the number of signal frames still owed. Returns the
    /// frames written, which is zero when the device has less than one chunk
    /// free (or less than the final short chunk).
    pub fn render_wake<B: DeviceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        spec: &WaveformSpec,
        clock: &mut PlaybackClock,
        remaining: u64,
    ) -> Result<u32> {
        let available = self.available(backend)?;
        let frames = frames_for_wake(available, self.chunk_frames, remaining);
        if frames == 0 {
            self.note_idle()?;
            return Ok(0);
        }
        self.idle_since = None;

        {
            let mut window = backend.request_window(frames)?;
            fill_window(&mut window, spec, clock);
        }
        backend.commit(frames, false)?;
        self.windows += 1;

        trace!(frames, available, position = clock.position(), "window committed");
        Ok(frames)
    }

    /// Wait for the device to make room once more, then pad that room with
    /// silence. Returns the frames written.
    pub fn drain<B: DeviceBackend + ?Sized>(&mut self, backend: &mut B) -> Result<u32> {
        self.idle_since = None;
        loop {
            self.wait()?;
            if self.available(backend)? > 0 {
                return self.write_silence(backend);
            }
            self.note_idle()?;
        }
    }

    /// Block until no more than `tail` frames are queued on the device.
    ///
    /// Called after the drain commit with `tail` set to its size, so every
    /// frame of signal has been played when this returns.
    pub fn await_playout<B: DeviceBackend + ?Sized>(&mut self, backend: &mut B, tail: u32) -> Result<()> {
        let budget = self.timeout + self.latency;
        let deadline = Instant::now() + budget;

        while backend.pending_frames()? > tail {
            if Instant::now() >= deadline {
                return Err(RenderError::Timeout(budget));
            }
            self.wait()?;
        }
        Ok(())
    }

    fn write_silence<B: DeviceBackend + ?Sized>(&mut self, backend: &mut B) -> Result<u32> {
        let frames = self.available(backend)?;
        if frames == 0 {
            return Ok(0);
        }
        backend.request_window(frames)?.fill_silence();
        backend.commit(frames, true)?;
        Ok(frames)
    }

    fn note_idle(&mut self) -> Result<()> {
        match self.idle_since {
            None => self.idle_since = Some(Instant::now()),
            Some(since) if since.elapsed() > self.timeout => {
                return Err(RenderError::Timeout(self.timeout));
            }
            Some(_) => {}
        }
        Ok(())
    }
}

/// How many frames to write on one wakeup.
///
/// Whole chunks that fit in `available`, capped by `remaining`. Once fewer
/// than a chunk remain, the short final chunk is written as soon as it fits.
pub fn frames_for_wake(available: u32, chunk: u32, remaining: u64) -> u32 {
    if remaining == 0 || chunk == 0 {
        return 0;
    }
    if remaining <= chunk as u64 {
        let last = remaining as u32;
        return if available >= last { last } else { 0 };
    }
    let whole = (available / chunk) * chunk;
    (whole as u64).min(remaining) as u32
}

/// Render consecutive frames of `spec` into `window`, advancing `clock` by
/// one frame per frame written.
pub fn fill_window(window: &mut BufferWindow<'_>, spec: &WaveformSpec, clock: &mut PlaybackClock) {
    let kind = window.kind();
    let volume = spec.volume();
    for frame in window.frames_mut() {
        let value = spec.sample_at(clock.current());
        write_frame(frame, encode(value, volume, kind), kind);
        clock.advance(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedDevice;
    use crate::format::{AudioFormat, SampleKind};
    use crate::signal::Waveform;

    #[test]
    fn whole_chunks_only_until_the_tail() {
        assert_eq!(frames_for_wake(1000, 441, 44_100), 882);
        assert_eq!(frames_for_wake(440, 441, 44_100), 0);
        assert_eq!(frames_for_wake(2205, 441, 500), 500);
    }

    #[test]
    fn short_final_chunk_waits_until_it_fits() {
        assert_eq!(frames_for_wake(100, 441, 300), 0);
        assert_eq!(frames_for_wake(300, 441, 300), 300);
        assert_eq!(frames_for_wake(882, 441, 0), 0);
    }

    fn render(spec: &WaveformSpec, format: &AudioFormat, splits: &[u32]) -> Vec<u8> {
        let mut clock = PlaybackClock::new(format.sample_rate());
        let mut out = Vec::new();
        for &frames in splits {
            let mut bytes = vec![0u8; frames as usize * format.block_align()];
            let mut window = BufferWindow::new(&mut bytes, format);
            fill_window(&mut window, spec, &mut clock);
            out.extend_from_slice(&bytes);
        }
        out
    }

    #[test]
    fn split_fills_match_a_single_fill() {
        let format = AudioFormat::new(44_100, 2, SampleKind::Float32).unwrap();
        let spec = WaveformSpec::new(Waveform::Triangle, 997.0, 0.8).unwrap();

        let whole = render(&spec, &format, &[4_410]);
        for splits in [&[1, 4_409][..], &[441; 10][..], &[1_000, 7, 3_403][..]] {
            assert_eq!(render(&spec, &format, splits), whole, "split {splits:?}");
        }
    }

    #[test]
    fn fill_advances_clock_per_frame() {
        let format = AudioFormat::new(8_000, 2, SampleKind::Int16).unwrap();
        let mut clock = PlaybackClock::new(8_000);
        let mut bytes = vec![0u8; 80 * format.block_align()];
        fill_window(
            &mut BufferWindow::new(&mut bytes, &format),
            &WaveformSpec::default(),
            &mut clock,
        );
        assert_eq!(clock.position(), 80);
    }

    #[test]
    fn prime_fills_all_capacity_with_silence() {
        let format = AudioFormat::new(10_000, 1, SampleKind::Float32).unwrap();
        let mut device = SimulatedDevice::new(format);
        let negotiated = device.negotiate(LatencyMode::EventDriven).unwrap();
        let mut pacer =
            RenderPacer::new(&mut device, &negotiated, LatencyMode::EventDriven, Duration::from_secs(1))
                .unwrap();

        assert_eq!(pacer.chunk_frames(), 100);
        assert_eq!(pacer.prime(&mut device).unwrap(), 200);
        assert_eq!(pacer.available(&mut device).unwrap(), 0);

        let log = device.capture().snapshot();
        assert!(log.commits[0].silent);
        assert!(log.bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn idle_device_times_out_in_polling_mode() {
        let format = AudioFormat::new(10_000, 1, SampleKind::Float32).unwrap();
        let mut device = SimulatedDevice::new(format);
        let mode = LatencyMode::Polling {
            latency: Duration::from_millis(20),
        };
        let negotiated = device.negotiate(mode).unwrap();
        let timeout = Duration::from_millis(30);
        let mut pacer = RenderPacer::new(&mut device, &negotiated, mode, timeout).unwrap();
        let mut clock = PlaybackClock::new(10_000);
        let spec = WaveformSpec::default();

        // never started, so the primed buffer never drains
        pacer.prime(&mut device).unwrap();
        let err = loop {
            pacer.wait().unwrap();
            if let Err(err) = pacer.render_wake(&mut device, &spec, &mut clock, 1_000) {
                break err;
            }
        };
        assert!(matches!(err, RenderError::Timeout(_)));
        assert_eq!(clock.position(), 0);
    }
}

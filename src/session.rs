//! Playback session lifecycle.

use tracing::{debug, info, warn};

use crate::backend::DeviceBackend;
use crate::config::SessionConfig;
use crate::error::{RenderError, Result};
use crate::format::AudioFormat;
use crate::pacer::RenderPacer;
use crate::signal::PlaybackClock;
use crate::wakeup::StopHandle;

/// Where a session is in its lifecycle.
///
/// Sessions only move forward:
/// `Idle → Priming → Streaming → Draining → Stopped`. Any error jumps
/// straight to `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    /// Filling the device buffer with silence before the stream starts.
    Priming,
    Streaming,
    /// Signal done (or cancelled); padding the tail with silence.
    Draining,
    Stopped,
}

/// Summary of a finished session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Signal frames written to the device.
    pub frames_rendered: u64,
    /// Signal frames the configured duration asked for.
    pub total_frames: u64,
    pub priming_frames: u32,
    pub drain_frames: u32,
    /// Windows of signal committed.
    pub windows: u64,
    pub wakeups: u64,
    /// Whether a [`StopHandle`] ended streaming early.
    pub cancelled: bool,
}

/// One run of a tone on one device.
///
/// A session is single-use: [`run`](Self::run) drives it from `Idle` to
/// `Stopped` on the calling thread and any later call fails with
/// [`RenderError::InvalidState`].
pub struct PlaybackSession<B: DeviceBackend> {
    backend: B,
    config: SessionConfig,
    state: SessionState,
    stop: StopHandle,

    format: Option<AudioFormat>,
    frames_rendered: u64,
    total_frames: u64,
}

impl<B: DeviceBackend> PlaybackSession<B> {
    /// Create an idle session, validating `config` up front.
    pub fn new(backend: B, config: SessionConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            backend,
            config,
            state: SessionState::Idle,
            stop: StopHandle::new(),
            format: None,
            frames_rendered: 0,
            total_frames: 0,
        })
    }

    /// A handle that ends streaming early from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The negotiated format, once the session has started.
    #[inline]
    pub fn format(&self) -> Option<&AudioFormat> {
        self.format.as_ref()
    }

    #[inline]
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    #[inline]
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Play the configured tone to completion (or until stopped).
    ///
    /// Blocks the calling thread. On failure the device is stopped on a
    /// best-effort basis and the original error is returned.
    pub fn run(&mut self) -> Result<SessionReport> {
        if self.state != SessionState::Idle {
            return Err(RenderError::InvalidState(self.state));
        }

        match self.play() {
            Ok(report) => Ok(report),
            Err(err) => {
                if let Err(stop_err) = self.backend.stop() {
                    warn!(%stop_err, "failed to stop device after error");
                }
                self.transition(SessionState::Stopped);
                Err(err)
            }
        }
    }

    fn play(&mut self) -> Result<SessionReport> {
        let mode = self.config.latency();
        let spec = *self.config.waveform();

        let negotiated = self.backend.negotiate(mode)?;
        let format = negotiated.format;
        self.format = Some(format);
        self.total_frames = format.frames_for_secs(self.config.duration().as_secs_f64());

        let mut clock = PlaybackClock::new(format.sample_rate());
        let mut pacer = RenderPacer::new(&mut self.backend, &negotiated, mode, self.config.wait_timeout())?;

        info!(
            waveform = ?spec.waveform(),
            frequency = spec.frequency(),
            volume = spec.volume(),
            sample_rate = format.sample_rate(),
            channels = format.channels(),
            kind = ?format.kind(),
            total_frames = self.total_frames,
            chunk_frames = pacer.chunk_frames(),
            ?mode,
            "starting playback"
        );

        self.transition(SessionState::Priming);
        let priming_frames = pacer.prime(&mut self.backend)?;
        self.backend.start()?;

        self.transition(SessionState::Streaming);
        let mut cancelled = false;
        while self.frames_rendered < self.total_frames {
            pacer.wait()?;
            if self.stop.is_stopped() {
                cancelled = true;
                break;
            }
            let remaining = self.total_frames - self.frames_rendered;
            let written = pacer.render_wake(&mut self.backend, &spec, &mut clock, remaining)?;
            self.frames_rendered += written as u64;
        }

        self.transition(SessionState::Draining);
        let drain_frames = pacer.drain(&mut self.backend)?;
        pacer.await_playout(&mut self.backend, drain_frames)?;
        self.backend.stop()?;
        self.transition(SessionState::Stopped);

        let report = SessionReport {
            frames_rendered: self.frames_rendered,
            total_frames: self.total_frames,
            priming_frames,
            drain_frames,
            windows: pacer.windows(),
            wakeups: pacer.wakeups(),
            cancelled,
        };
        info!(
            frames = report.frames_rendered,
            windows = report.windows,
            wakeups = report.wakeups,
            cancelled,
            "playback finished"
        );
        Ok(report)
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state changed");
        self.state = next;
    }
}

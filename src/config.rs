//! Session configuration.

use std::time::Duration;

use crate::backend::LatencyMode;
use crate::error::{RenderError, Result};
use crate::signal::WaveformSpec;

/// Latency hint used in polling mode unless overridden.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(50);
pub const DEFAULT_DURATION: Duration = Duration::from_secs(5);
/// Longest the pacer waits for the device before giving up.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a [`PlaybackSession`](crate::PlaybackSession) needs besides the device.
///
/// ```
/// use std::time::Duration;
/// use tonepace::{SessionConfig, Waveform, WaveformSpec};
///
/// let config = SessionConfig::new(WaveformSpec::new(Waveform::Square, 220.0, 0.5)?)
///     .with_duration(Duration::from_secs(2))
///     .with_event_driven();
/// config.validate()?;
/// # Ok::<(), tonepace::RenderError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    waveform: WaveformSpec,
    duration: Duration,
    latency: LatencyMode,
    wait_timeout: Duration,
}

impl SessionConfig {
    pub fn new(waveform: WaveformSpec) -> Self {
        Self {
            waveform,
            duration: DEFAULT_DURATION,
            latency: LatencyMode::Polling {
                latency: DEFAULT_LATENCY,
            },
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_latency(mut self, latency: LatencyMode) -> Self {
        self.latency = latency;
        self
    }

    /// Pace on the device's capacity signal.
    pub fn with_event_driven(self) -> Self {
        self.with_latency(LatencyMode::EventDriven)
    }

    /// Poll the device, sizing its buffer for `latency`.
    pub fn with_polling(self, latency: Duration) -> Self {
        self.with_latency(LatencyMode::Polling { latency })
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    #[inline]
    pub fn waveform(&self) -> &WaveformSpec {
        &self.waveform
    }

    #[inline]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[inline]
    pub fn latency(&self) -> LatencyMode {
        self.latency
    }

    #[inline]
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Check the timing parameters before any device is touched.
    ///
    /// The waveform needs no check here: [`WaveformSpec::new`] already
    /// rejects bad frequencies and volumes.
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(RenderError::InvalidConfig("duration must be non-zero".into()));
        }
        if let LatencyMode::Polling { latency } = self.latency {
            if latency.is_zero() {
                return Err(RenderError::InvalidConfig("polling latency must be non-zero".into()));
            }
        }
        if self.wait_timeout.is_zero() {
            return Err(RenderError::InvalidConfig("wait timeout must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(WaveformSpec::default())
    }
}

//! Playback clock

/// Continuous time base for one session.
///
/// The clock counts frames rather than summing `1 / sample_rate` steps, so the
/// time of frame `n` is always `n / sample_rate` no matter how the frames were
/// split across buffer fills. Rendering `[0, N)` in one fill and `[0, M)`,
/// `[M, N)` in two fills produces bit-identical samples.
#[derive(Clone, Debug)]
pub struct PlaybackClock {
    sample_rate: u32,
    frames: u64,
}

impl PlaybackClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames: 0,
        }
    }

    /// Move forward by `frames` frames. Never rewinds.
    #[inline]
    pub fn advance(&mut self, frames: u64) {
        self.frames += frames;
    }

    /// Current time in seconds.
    #[inline]
    pub fn current(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Frames elapsed since the start of the session.
    #[inline]
    pub fn position(&self) -> u64 {
        self.frames
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_frames() {
        let mut clock = PlaybackClock::new(48_000);
        assert_eq!(clock.current(), 0.0);
        clock.advance(24_000);
        assert_eq!(clock.current(), 0.5);
        clock.advance(24_000);
        assert_eq!(clock.current(), 1.0);
        assert_eq!(clock.position(), 48_000);
    }

    #[test]
    fn split_advances_match_single_advance() {
        let mut whole = PlaybackClock::new(44_100);
        whole.advance(1_000);

        let mut split = PlaybackClock::new(44_100);
        for _ in 0..1_000 {
            split.advance(1);
        }

        assert_eq!(whole.current().to_bits(), split.current().to_bits());
    }
}

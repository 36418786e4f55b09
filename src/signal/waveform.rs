//! Periodic waveform generator

use core::f64::consts::TAU;

use crate::error::{RenderError, Result};

/// The closed set of signal shapes the renderer can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    /// Value of the waveform at `time` seconds for a tone at `frequency` Hz.
    ///
    /// Pure and stateless. For finite, non-negative `time` the result is
    /// always within `[-1.0, 1.0]`. Square, triangle and sawtooth are in phase
    /// with the sine: all four start their period at the same instant.
    pub fn generate(self, frequency: f64, time: f64) -> f64 {
        match self {
            Waveform::Sine => (TAU * frequency * time).sin(),
            Waveform::Square => {
                let s = (TAU * frequency * time).sin();
                // f64::signum maps 0.0 to 1.0, zero crossings stay at zero here
                if s == 0.0 {
                    0.0
                } else {
                    s.signum()
                }
            }
            Waveform::Triangle => {
                let p = phase(frequency, time);
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase(frequency, time) - 1.0,
        }
    }
}

/// Position within the current period, in `[0, 1)`.
#[inline]
fn phase(frequency: f64, time: f64) -> f64 {
    let cycles = frequency * time;
    cycles - cycles.floor()
}

/// What to play: shape, pitch and loudness.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveformSpec {
    waveform: Waveform,
    frequency: f64,
    volume: f64,
}

impl WaveformSpec {
    /// Create a spec, rejecting non-positive frequencies and volumes outside `[0, 1]`.
    pub fn new(waveform: Waveform, frequency: f64, volume: f64) -> Result<Self> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(RenderError::InvalidConfig(format!(
                "frequency must be a positive number of Hz, got {frequency}"
            )));
        }
        if !(0.0..=1.0).contains(&volume) {
            return Err(RenderError::InvalidConfig(format!(
                "volume must be within 0.0..=1.0, got {volume}"
            )));
        }

        Ok(Self {
            waveform,
            frequency,
            volume,
        })
    }

    /// A full-volume sine at `frequency` Hz.
    pub fn sine(frequency: f64) -> Result<Self> {
        Self::new(Waveform::Sine, frequency, 1.0)
    }

    #[inline]
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Normalized (pre-volume) value at `time` seconds.
    #[inline]
    pub fn sample_at(&self, time: f64) -> f64 {
        self.waveform.generate(self.frequency, time)
    }
}

impl Default for WaveformSpec {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            frequency: 440.0,
            volume: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Sawtooth,
    ];

    #[test]
    fn every_waveform_stays_in_range() {
        for waveform in ALL {
            for frequency in [1.0, 220.0, 440.0, 997.3, 12_345.0] {
                for n in 0..10_000u32 {
                    let t = n as f64 / 44_100.0;
                    let v = waveform.generate(frequency, t);
                    assert!(
                        (-1.0..=1.0).contains(&v),
                        "{waveform:?} at {frequency} Hz, t={t}: {v}"
                    );
                }
            }
            // far into a long session
            let v = waveform.generate(440.0, 86_400.123_456);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn sine_quarter_period_peaks() {
        assert_abs_diff_eq!(Waveform::Sine.generate(1.0, 0.25), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(Waveform::Sine.generate(1.0, 0.75), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn square_is_zero_at_exact_crossing() {
        assert_eq!(Waveform::Square.generate(100.0, 0.0), 0.0);
        assert_eq!(Waveform::Square.generate(1.0, 0.25), 1.0);
        assert_eq!(Waveform::Square.generate(1.0, 0.75), -1.0);
    }

    #[test]
    fn triangle_shape() {
        let tri = |t| Waveform::Triangle.generate(1.0, t);
        assert_abs_diff_eq!(tri(0.0), 0.0);
        assert_abs_diff_eq!(tri(0.125), 0.5);
        assert_abs_diff_eq!(tri(0.25), 1.0);
        assert_abs_diff_eq!(tri(0.5), 0.0);
        assert_abs_diff_eq!(tri(0.75), -1.0);
        assert_abs_diff_eq!(tri(0.875), -0.5);
    }

    #[test]
    fn triangle_has_zero_mean() {
        // 440 samples per period, so every phase has its half-period twin
        let n = 44_000;
        let sum: f64 = (0..n)
            .map(|i| Waveform::Triangle.generate(100.0, i as f64 / n as f64))
            .sum();
        assert_abs_diff_eq!(sum / n as f64, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn sawtooth_ramps_and_wraps() {
        let saw = |t| Waveform::Sawtooth.generate(1.0, t);
        assert_abs_diff_eq!(saw(0.0), -1.0);
        assert_abs_diff_eq!(saw(0.5), 0.0);
        assert!(saw(0.9999) > 0.99);
        assert_abs_diff_eq!(saw(1.0), -1.0);
    }

    #[test]
    fn spec_rejects_bad_parameters() {
        assert!(WaveformSpec::new(Waveform::Sine, 0.0, 0.5).is_err());
        assert!(WaveformSpec::new(Waveform::Sine, -440.0, 0.5).is_err());
        assert!(WaveformSpec::new(Waveform::Sine, f64::NAN, 0.5).is_err());
        assert!(WaveformSpec::new(Waveform::Sine, 440.0, 1.01).is_err());
        assert!(WaveformSpec::new(Waveform::Sine, 440.0, -0.1).is_err());
        assert!(WaveformSpec::new(Waveform::Square, 440.0, 0.0).is_ok());
        assert!(WaveformSpec::new(Waveform::Square, 440.0, 1.0).is_ok());
    }
}

//! Pre-dispatch recording validation.
//!
//! [`RecordingGate`] checks a finished recording against three gates before
//! it is allowed to spawn a model invocation:
//!
//! | Gate | Description |
//! |------|-------------|
//! | Duration | Recording must have lasted at least `min_recording_secs` |
//! | Peak | At least one sample must exceed the amplitude floor |
//! | RMS window | The loudest sliding window must exceed the RMS floor |
//!
//! The RMS gate rejects recordings that contain a single click but no
//! sustained speech energy.

use thiserror::Error;

use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Reason a recording failed validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AudioError {
    /// Recording is shorter than the configured minimum.
    #[error("recording too short: {got_secs:.2}s (minimum {min_secs:.2}s)")]
    TooShort { min_secs: f32, got_secs: f32 },

    /// All samples are below the peak-amplitude floor.
    #[error("recording too quiet: peak {peak:.4} (threshold {threshold:.4})")]
    TooQuiet { peak: f32, threshold: f32 },

    /// No sliding window reached the RMS floor.
    #[error("no sustained speech energy: peak RMS {peak_rms:.4} (threshold {threshold:.4})")]
    NoSpeechEnergy { peak_rms: f32, threshold: f32 },

    /// The clip is shorter than one RMS analysis window.
    #[error("recording shorter than the RMS analysis window")]
    ShorterThanWindow,
}

// ---------------------------------------------------------------------------
// RecordingGate
// ---------------------------------------------------------------------------

/// Validates a finished recording.  Thresholds come from [`AudioConfig`].
pub struct RecordingGate {
    /// Minimum wall-clock recording duration in seconds.
    pub min_recording_secs: f32,
    /// Peak-amplitude floor as a fraction of full scale.
    pub amplitude_threshold: f32,
    /// RMS sliding-window length in seconds.
    pub rms_window_secs: f32,
    /// RMS floor over the sliding window as a fraction of full scale.
    pub rms_amplitude_threshold: f32,
}

impl RecordingGate {
    pub fn from_config(audio: &AudioConfig) -> Self {
        Self {
            min_recording_secs: audio.min_recording_secs,
            amplitude_threshold: audio.amplitude_threshold,
            rms_window_secs: audio.rms_window_secs,
            rms_amplitude_threshold: audio.rms_amplitude_threshold,
        }
    }

    /// Validate a recording.
    ///
    /// * `samples` — mono `f32` in `[-1.0, 1.0]`.
    /// * `sample_rate` — sample rate of `samples`.
    /// * `recorded_secs` — wall-clock time between trigger press and stop
    ///   (the duration gate uses the session timer, not the sample count,
    ///   so a stalled capture device cannot sneak past it).
    pub fn validate(
        &self,
        samples: &[f32],
        sample_rate: u32,
        recorded_secs: f32,
    ) -> Result<(), AudioError> {
        // 1. Duration
        if recorded_secs < self.min_recording_secs {
            return Err(AudioError::TooShort {
                min_secs: self.min_recording_secs,
                got_secs: recorded_secs,
            });
        }

        // 2. Peak amplitude
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak < self.amplitude_threshold {
            return Err(AudioError::TooQuiet {
                peak,
                threshold: self.amplitude_threshold,
            });
        }

        // 3. Sliding-window RMS peak
        let window = (self.rms_window_secs * sample_rate as f32) as usize;
        if window == 0 {
            return Ok(());
        }
        if samples.len() < window {
            return Err(AudioError::ShorterThanWindow);
        }

        let step = (window / 10).max(1);
        let mut peak_rms = 0.0f32;
        let mut start = 0;
        while start + window <= samples.len() {
            let sum_sq: f32 = samples[start..start + window]
                .iter()
                .map(|s| s * s)
                .sum();
            let rms = (sum_sq / window as f32).sqrt();
            peak_rms = peak_rms.max(rms);
            start += step;
        }

        if peak_rms < self.rms_amplitude_threshold {
            return Err(AudioError::NoSpeechEnergy {
                peak_rms,
                threshold: self.rms_amplitude_threshold,
            });
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

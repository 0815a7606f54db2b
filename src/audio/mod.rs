//! Audio capture and recording validation.
//!
//! The engine core never touches the microphone directly: it consumes an
//! [`AudioSource`] (start / stop / abort) and receives an [`AudioResult`]
//! per recording.  [`CpalAudioSource`] is the production implementation;
//! [`quality::RecordingGate`] applies the duration / amplitude / RMS gates
//! before a recording is allowed to reach the model.

pub mod capture;
pub mod quality;

pub use capture::{CaptureError, CpalAudioSource, NullAudioSource};
pub use quality::{AudioError, RecordingGate};

// ---------------------------------------------------------------------------
// AudioResult
// ---------------------------------------------------------------------------

/// Outcome of a completed recording.
#[derive(Debug, Clone)]
pub enum AudioResult {
    /// Raw captured audio: mono `f32` samples in `[-1.0, 1.0]`.
    Samples { samples: Vec<f32>, sample_rate: u32 },
    /// Pre-transcribed text (no audio payload).
    Text(String),
}

impl AudioResult {
    /// `true` when the result carries nothing worth sending to the model.
    pub fn is_empty(&self) -> bool {
        match self {
            AudioResult::Samples { samples, .. } => samples.is_empty(),
            AudioResult::Text(text) => text.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioSource trait
// ---------------------------------------------------------------------------

/// Recording device abstraction consumed by the input router.
///
/// Implementations must be `Send`: the router owns its source on a
/// dedicated thread.
pub trait AudioSource: Send {
    /// Begin accumulating audio.
    fn start_recording(&mut self);

    /// Stop and return whatever was captured since `start_recording`.
    fn stop_recording(&mut self) -> Result<AudioResult, CaptureError>;

    /// Stop and discard the capture (aborted recording).
    fn abort_recording(&mut self);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Downmix interleaved multi-channel samples to mono by averaging frames.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

// ---------------------------------------------------------------------------
// MockAudioSource  (test builds only)
// ---------------------------------------------------------------------------

/// Observable lifecycle state of a [`MockAudioSource`], shared with the
/// test that created it.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockAudioState {
    pub recording: std::sync::atomic::AtomicBool,
    pub aborted: std::sync::atomic::AtomicBool,
    pub stops: std::sync::atomic::AtomicUsize,
}

/// Scripted audio source for tests: returns a fixed result on stop and
/// records which lifecycle calls were made.
#[cfg(test)]
#[derive(Debug)]
pub struct MockAudioSource {
    result: AudioResult,
    state: std::sync::Arc<MockAudioState>,
}

#[cfg(test)]
impl MockAudioSource {
    pub fn with_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            result: AudioResult::Samples {
                samples,
                sample_rate,
            },
            state: Default::default(),
        }
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            result: AudioResult::Text(text.to_string()),
            state: Default::default(),
        }
    }

    /// Handle for inspecting the source after it has been boxed away.
    pub fn state(&self) -> std::sync::Arc<MockAudioState> {
        std::sync::Arc::clone(&self.state)
    }
}

#[cfg(test)]
impl AudioSource for MockAudioSource {
    fn start_recording(&mut self) {
        use std::sync::atomic::Ordering;
        self.state.recording.store(true, Ordering::SeqCst);
    }

    fn stop_recording(&mut self) -> Result<AudioResult, CaptureError> {
        use std::sync::atomic::Ordering;
        self.state.recording.store(false, Ordering::SeqCst);
        self.state.stops.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }

    fn abort_recording(&mut self) {
        use std::sync::atomic::Ordering;
        self.state.recording.store(false, Ordering::SeqCst);
        self.state.aborted.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_frames() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&stereo, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn downmix_passes_mono_through() {
        let mono = [0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&mono, 1), mono.to_vec());
    }

    #[test]
    fn empty_results_are_detected() {
        assert!(AudioResult::Samples {
            samples: vec![],
            sample_rate: 16_000
        }
        .is_empty());
        assert!(AudioResult::Text(String::new()).is_empty());
        assert!(!AudioResult::Text("hello".into()).is_empty());
    }
}

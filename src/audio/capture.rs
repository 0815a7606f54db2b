//! Microphone capture via `cpal`.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated
//! "audio-stream" thread for the whole process lifetime; the handle the
//! rest of the app sees ([`CpalAudioSource`]) only carries the shared
//! accumulation buffer.  Start/stop toggles whether callback samples are
//! kept — the hardware stream itself never stops.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::{downmix_to_mono, AudioResult, AudioSource};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio-stream thread died during setup")]
    ThreadDied,
}

// ---------------------------------------------------------------------------
// CpalAudioSource
// ---------------------------------------------------------------------------

/// Shared accumulation state: `(samples, is_recording)`.
type SharedBuffer = Arc<Mutex<(Vec<f32>, bool)>>;

/// Production microphone source built on the system default input device.
pub struct CpalAudioSource {
    shared: SharedBuffer,
    sample_rate: u32,
}

impl CpalAudioSource {
    /// Open the default input device and start the capture stream.
    ///
    /// Device setup happens on the audio-stream thread; this call blocks
    /// until setup succeeds or fails.  Samples are discarded until
    /// [`AudioSource::start_recording`] flips the recording flag.
    pub fn new() -> Result<Self, CaptureError> {
        let shared: SharedBuffer = Arc::new(Mutex::new((Vec::new(), false)));
        let thread_shared = Arc::clone(&shared);

        let (setup_tx, setup_rx) = mpsc::channel::<Result<u32, CaptureError>>();

        std::thread::Builder::new()
            .name("audio-stream".into())
            .spawn(move || {
                let setup = (|| -> Result<(cpal::Stream, u32), CaptureError> {
                    let host = cpal::default_host();
                    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

                    let supported = device.default_input_config()?;
                    let channels = supported.channels();
                    let sample_rate = supported.sample_rate().0;
                    let config: cpal::StreamConfig = supported.into();

                    let cb_shared = thread_shared;
                    let stream = device.build_input_stream(
                        &config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            // The lock is only ever held briefly by
                            // start/stop, so this cannot stall the
                            // callback in practice.
                            let mut guard = cb_shared.lock().unwrap();
                            if !guard.1 {
                                return;
                            }
                            let mono = downmix_to_mono(data, channels);
                            guard.0.extend_from_slice(&mono);
                        },
                        |err: cpal::StreamError| {
                            log::error!("cpal stream error: {err}");
                        },
                        None,
                    )?;
                    stream.play()?;

                    log::info!("audio capture started ({sample_rate} Hz, {channels} ch)");
                    Ok((stream, sample_rate))
                })();

                match setup {
                    Ok((stream, sample_rate)) => {
                        let _ = setup_tx.send(Ok(sample_rate));
                        // Keep the (non-Send) stream alive for the process
                        // lifetime.
                        let _stream = stream;
                        loop {
                            std::thread::park();
                        }
                    }
                    Err(e) => {
                        let _ = setup_tx.send(Err(e));
                    }
                }
            })
            .expect("failed to spawn audio-stream thread");

        let sample_rate = setup_rx.recv().map_err(|_| CaptureError::ThreadDied)??;

        Ok(Self {
            shared,
            sample_rate,
        })
    }

    /// Native sample rate of the capture device.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioSource for CpalAudioSource {
    fn start_recording(&mut self) {
        let mut guard = self.shared.lock().unwrap();
        guard.0.clear();
        guard.1 = true;
    }

    fn stop_recording(&mut self) -> Result<AudioResult, CaptureError> {
        let mut guard = self.shared.lock().unwrap();
        guard.1 = false;
        let samples = std::mem::take(&mut guard.0);
        Ok(AudioResult::Samples {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    fn abort_recording(&mut self) {
        let mut guard = self.shared.lock().unwrap();
        guard.1 = false;
        guard.0.clear();
    }
}

// ---------------------------------------------------------------------------
// NullAudioSource
// ---------------------------------------------------------------------------

/// Fallback source used when no input device is available, so the process
/// still launches.  Every stop yields an empty result, which the validation
/// gates discard.
#[derive(Debug, Default)]
pub struct NullAudioSource {
    sample_rate: u32,
}

impl NullAudioSource {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl AudioSource for NullAudioSource {
    fn start_recording(&mut self) {
        log::warn!("audio: no capture device — recording will be empty");
    }

    fn stop_recording(&mut self) -> Result<AudioResult, CaptureError> {
        Ok(AudioResult::Samples {
            samples: Vec::new(),
            sample_rate: self.sample_rate,
        })
    }

    fn abort_recording(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_source_yields_empty_samples() {
        let mut source = NullAudioSource::new(16_000);
        source.start_recording();
        let result = source.stop_recording().expect("stop");
        assert!(result.is_empty());
    }

    #[test]
    fn cpal_source_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CpalAudioSource>();
    }
}

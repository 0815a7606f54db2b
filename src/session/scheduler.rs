//! Session scheduling — parallel model invocation, serialized output.
//!
//! Two cooperating facilities:
//!
//! 1. **Model dispatch.**  [`SessionScheduler::dispatch`] validates the
//!    recording, enqueues a [`ProcessingSession`] on the output worker
//!    (fixing the output order at stop time) and spawns a tokio task that
//!    streams the model response into the session's chunk queue.  Any
//!    number of model invocations may be in flight at once.
//!
//! 2. **Output worker.**  One dedicated OS thread drains sessions in FIFO
//!    order.  For each session it resets the coordinator's streaming
//!    state, feeds chunks as they arrive (bounded blocking wait, never a
//!    busy loop), completes the stream, and applies the per-response reset
//!    when configured.  A failed session is logged and abandoned; the
//!    worker moves on to the next one.
//!
//! The net effect: recordings overlap the network, but keystrokes for
//! session N+1 never interleave with session N's.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::audio::{AudioResult, RecordingGate};
use crate::config::SharedConfig;
use crate::model::ModelClient;
use crate::transcribe::TranscriptionCoordinator;

use super::{ProcessingSession, RecordingSession};

/// Bounded wait per queue poll; only exists so the worker can re-check the
/// completion flag, so anything small works.
const CHUNK_POLL_TIMEOUT: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// WorkerMsg
// ---------------------------------------------------------------------------

/// Messages consumed by the output worker, in FIFO order.
pub enum WorkerMsg {
    /// Drain and emit one session's response.
    Session(ProcessingSession),
    /// Switch the coordinator to a different mode (signal-initiated).
    ModeChange(String),
}

// ---------------------------------------------------------------------------
// SessionScheduler
// ---------------------------------------------------------------------------

/// Owns the output-worker thread and dispatches recordings to the model.
pub struct SessionScheduler {
    worker_tx: Option<mpsc::Sender<WorkerMsg>>,
    worker: Option<thread::JoinHandle<()>>,
    model: Arc<dyn ModelClient>,
    runtime: tokio::runtime::Handle,
    config: SharedConfig,
    gate: RecordingGate,
}

impl SessionScheduler {
    /// Start the output worker and return the scheduler.
    ///
    /// The coordinator moves onto the worker thread and is never touched
    /// from anywhere else afterwards.
    pub fn start(
        coordinator: TranscriptionCoordinator,
        model: Arc<dyn ModelClient>,
        runtime: tokio::runtime::Handle,
        config: SharedConfig,
    ) -> Self {
        let gate = RecordingGate::from_config(&config.lock().unwrap().audio);

        let (worker_tx, worker_rx) = mpsc::channel();
        let worker_config = Arc::clone(&config);
        let worker = thread::Builder::new()
            .name("session-output".into())
            .spawn(move || run_output_worker(worker_rx, coordinator, worker_config))
            .expect("failed to spawn session-output thread");

        Self {
            worker_tx: Some(worker_tx),
            worker: Some(worker),
            model,
            runtime,
            config,
            gate,
        }
    }

    fn send(&self, msg: WorkerMsg) {
        if let Some(tx) = &self.worker_tx {
            if tx.send(msg).is_err() {
                log::error!("scheduler: output worker is gone, dropping message");
            }
        }
    }

    /// Ask the output worker to switch modes before its next session.
    pub fn request_mode_change(&self, mode: String) {
        self.send(WorkerMsg::ModeChange(mode));
    }

    /// Handle a finished recording: validate, fix the output slot, spawn
    /// the model invocation.
    pub fn dispatch(&self, recording: RecordingSession, audio: AudioResult) {
        if audio.is_empty() {
            log::debug!("scheduler: empty recording discarded");
            return;
        }

        if let AudioResult::Samples {
            samples,
            sample_rate,
        } = &audio
        {
            let recorded_secs = recording.start_time.elapsed().as_secs_f32();
            if let Err(e) = self.gate.validate(samples, *sample_rate, recorded_secs) {
                log::warn!("scheduler: recording discarded: {e}");
                return;
            }
        }

        let snapshot = recording.context.clone();
        let (session, handle) = ProcessingSession::new(recording);

        // FIFO-enqueue before spawning: output order is stop order, not
        // network completion order.
        self.send(WorkerMsg::Session(session));

        let model = Arc::clone(&self.model);
        self.runtime.spawn(async move {
            let on_chunk = |chunk: String| handle.push_chunk(chunk);

            match model.transcribe(&snapshot, audio, &on_chunk).await {
                Ok(text) => {
                    log::debug!("scheduler: model returned {} chars", text.len());
                }
                Err(e) => {
                    log::error!("scheduler: model invocation failed: {e}");
                    handle.set_error(e.to_string());
                }
            }
            // `handle` drops here, marking the session complete on every
            // path out of the task.
        });
    }

    /// Stop accepting work and wait for the worker to drain.
    pub fn shutdown(mut self) {
        self.worker_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("scheduler: output worker panicked during shutdown");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Output worker
// ---------------------------------------------------------------------------

fn run_output_worker(
    rx: mpsc::Receiver<WorkerMsg>,
    mut coordinator: TranscriptionCoordinator,
    config: SharedConfig,
) {
    log::debug!("output worker started");

    while let Ok(msg) = rx.recv() {
        match msg {
            WorkerMsg::ModeChange(mode) => {
                coordinator.handle_mode_change(&mode);
            }
            WorkerMsg::Session(session) => {
                process_session_output(&mut coordinator, &config, session);
            }
        }
    }

    log::debug!("output worker exited");
}

/// One worker turn: drain a session's chunks into the coordinator.
fn process_session_output(
    coordinator: &mut TranscriptionCoordinator,
    config: &SharedConfig,
    session: ProcessingSession,
) {
    coordinator.reset_streaming_state();

    loop {
        if session.is_complete() {
            // Everything the model produced is already queued; drain it.
            while let Some(chunk) = session.try_next_chunk() {
                coordinator.process_streaming_chunk(&chunk);
            }
            break;
        }

        match session.next_chunk(CHUNK_POLL_TIMEOUT) {
            Ok(chunk) => coordinator.process_streaming_chunk(&chunk),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    coordinator.complete_stream();

    if let Some(error) = session.take_error() {
        log::warn!("session failed: {error}");
    }

    let text = coordinator.current_text();
    if !text.is_empty() {
        log::info!("{text}");
    }

    if config.lock().unwrap().reset_state_each_response {
        coordinator.reset_all_state();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Recording and processing sessions.
//!
//! A [`RecordingSession`] is the immutable identity of one recording: who
//! started it, when, and the frozen [`ConversationSnapshot`] the model
//! request will be built from.
//!
//! A [`ProcessingSession`] is the post-stop infrastructure: a chunk queue
//! filled by the model-invocation task and drained by the output worker,
//! plus a completion flag and an error slot.  Creating one yields a paired
//! [`SessionHandle`] for the producer side; dropping the handle marks the
//! session complete, so completion is signalled on every exit path of the
//! model task.

pub mod scheduler;

pub use scheduler::{SessionScheduler, WorkerMsg};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// ConversationSnapshot
// ---------------------------------------------------------------------------

/// Frozen conversation state captured when a recording starts.
///
/// Used verbatim in the model request, decoupling the request from later
/// mutations of the segment store.
#[derive(Debug, Clone, Default)]
pub struct ConversationSnapshot {
    /// The conversation as `<N>text</N>` markup.
    pub xml_markup: String,
    /// The conversation as plain rendered text.
    pub rendered_text: String,
    /// Capture sample rate advertised to the model.
    pub sample_rate: u32,
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// Who initiated a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingOrigin {
    Keyboard,
    Signal,
    Tray,
}

/// Immutable identity of one recording.
#[derive(Debug)]
pub struct RecordingSession {
    pub origin: RecordingOrigin,
    pub start_time: Instant,
    pub context: ConversationSnapshot,
}

impl RecordingSession {
    pub fn new(origin: RecordingOrigin, context: ConversationSnapshot) -> Self {
        Self {
            origin,
            start_time: Instant::now(),
            context,
        }
    }

    /// Only push-to-talk recordings abort when another key is pressed:
    /// signal- and tray-initiated recordings expect the user to keep typing.
    pub fn should_abort_on_keystroke(&self) -> bool {
        self.origin == RecordingOrigin::Keyboard
    }
}

// ---------------------------------------------------------------------------
// ProcessingSession / SessionHandle
// ---------------------------------------------------------------------------

/// Consumer side of a session: owned by the output worker.
#[derive(Debug)]
pub struct ProcessingSession {
    pub recording: RecordingSession,
    chunks: mpsc::Receiver<String>,
    chunks_complete: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

/// Producer side of a session: moved into the model-invocation task.
///
/// Dropping the handle sets the completion flag and closes the chunk
/// channel — the Rust rendition of signalling completion in a `finally`.
#[derive(Debug)]
pub struct SessionHandle {
    chunk_tx: mpsc::Sender<String>,
    chunks_complete: Arc<AtomicBool>,
    error: Arc<Mutex<Option<String>>>,
}

impl ProcessingSession {
    /// Create a session and its producer handle.
    pub fn new(recording: RecordingSession) -> (Self, SessionHandle) {
        let (chunk_tx, chunks) = mpsc::channel();
        let chunks_complete = Arc::new(AtomicBool::new(false));
        let error = Arc::new(Mutex::new(None));

        let session = Self {
            recording,
            chunks,
            chunks_complete: Arc::clone(&chunks_complete),
            error: Arc::clone(&error),
        };
        let handle = SessionHandle {
            chunk_tx,
            chunks_complete,
            error,
        };
        (session, handle)
    }

    /// `true` once the model task has finished (success or failure).  Any
    /// chunks it produced are already in the queue by then.
    pub fn is_complete(&self) -> bool {
        self.chunks_complete.load(Ordering::Acquire)
    }

    /// Blocking wait for the next chunk, bounded by `timeout`.
    pub fn next_chunk(&self, timeout: Duration) -> Result<String, RecvTimeoutError> {
        self.chunks.recv_timeout(timeout)
    }

    /// Non-blocking drain helper.
    pub fn try_next_chunk(&self) -> Option<String> {
        self.chunks.try_recv().ok()
    }

    /// Take the error recorded by the model task, if any.
    pub fn take_error(&self) -> Option<String> {
        self.error.lock().unwrap().take()
    }
}

impl SessionHandle {
    /// Enqueue one streamed chunk.  Errors (worker gone) are ignored — the
    /// model task keeps draining the network either way.
    pub fn push_chunk(&self, chunk: String) {
        let _ = self.chunk_tx.send(chunk);
    }

    /// Record a model failure for the output worker to surface.
    pub fn set_error(&self, message: String) {
        *self.error.lock().unwrap() = Some(message);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.chunks_complete.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Transcription coordination — response-level protocol handling.
//!
//! [`TranscriptionCoordinator`] owns the stream processor (and through it
//! the segment store and the keystroke injector) and interprets the parts
//! of the wire protocol that sit above individual `<N>…</N>` tags:
//! `<mode>` switches, `<reset/>`, the `<update>` wrapper, and response
//! boundaries.
//!
//! [`ContextTracker`] is the one piece of conversation state visible
//! outside the output-worker thread: a published `(xml, text)` pair the
//! input router freezes into each recording's snapshot.

pub mod coordinator;

pub use coordinator::TranscriptionCoordinator;

use std::sync::{Arc, Mutex};

use crate::session::ConversationSnapshot;

// ---------------------------------------------------------------------------
// ContextTracker
// ---------------------------------------------------------------------------

/// Shared, read-mostly view of the conversation for snapshot capture.
///
/// The coordinator publishes after every completed session, reset and mode
/// change; the input router reads it when a recording starts.  Clones
/// share the same state.
#[derive(Debug, Clone, Default)]
pub struct ContextTracker {
    inner: Arc<Mutex<(String, String)>>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the current conversation `(xml_markup, rendered_text)`.
    pub fn publish(&self, xml_markup: String, rendered_text: String) {
        *self.inner.lock().unwrap() = (xml_markup, rendered_text);
    }

    /// Freeze the last published state into a snapshot.
    pub fn snapshot(&self, sample_rate: u32) -> ConversationSnapshot {
        let guard = self.inner.lock().unwrap();
        ConversationSnapshot {
            xml_markup: guard.0.clone(),
            rendered_text: guard.1.clone(),
            sample_rate,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_the_last_publish() {
        let tracker = ContextTracker::new();
        let reader = tracker.clone();

        tracker.publish("<10>a</10>".into(), "a".into());
        let snap = reader.snapshot(16_000);

        assert_eq!(snap.xml_markup, "<10>a</10>");
        assert_eq!(snap.rendered_text, "a");
        assert_eq!(snap.sample_rate, 16_000);
    }

    #[test]
    fn fresh_tracker_snapshots_empty_conversation() {
        let snap = ContextTracker::new().snapshot(48_000);
        assert!(snap.xml_markup.is_empty());
        assert!(snap.rendered_text.is_empty());
    }
}

//! The transcription coordinator — one response at a time, start to flush.
//!
//! # Per-chunk pipeline
//!
//! `process_streaming_chunk` runs these steps in order:
//!
//! 1. Mode detection — a complete `<mode>X</mode>` anywhere in the
//!    response so far, naming a known mode different from the current one,
//!    switches modes, wipes state and skips the rest of the response.
//! 2. Stream start — the first `<update>` flips the processor into
//!    streaming mode.
//! 3. Reset detection — the last complete `<reset…>` opening erases the
//!    on-screen text, clears all state, and drops everything up to and
//!    including the tag.
//! 4. Update slicing — once an `<update>` has been seen, the unprocessed
//!    region after it is fed to the stream processor and the position
//!    advanced.
//!
//! `complete_stream` drains whatever never went through step 4 (the whole
//! response, when the model skipped the `<update>` wrapper) and flushes
//! the processor.

use std::collections::BTreeMap;

use crate::config::SharedConfig;
use crate::inject::KeystrokeInjector;
use crate::instructions::InstructionComposer;
use crate::stream::{scanner, StreamProcessor};

use super::ContextTracker;

use std::sync::Arc;

// ---------------------------------------------------------------------------
// TranscriptionCoordinator
// ---------------------------------------------------------------------------

/// Owns all per-conversation state: the stream processor (segment store +
/// injector), the response buffer, and the position bookkeeping for
/// incremental `<update>` slicing.
///
/// Touched only by the output-worker thread once the scheduler starts, so
/// none of its state needs locking.
pub struct TranscriptionCoordinator {
    processor: StreamProcessor,
    /// Accumulates the whole response text as chunks arrive.
    buffer: String,
    /// Byte offset of the first byte not yet fed to the processor.
    last_update_position: usize,
    /// Set once an `<update>` wrapper has been located in this response.
    update_seen: bool,
    config: SharedConfig,
    composer: Arc<InstructionComposer>,
    tracker: ContextTracker,
}

impl TranscriptionCoordinator {
    pub fn new(
        injector: Box<dyn KeystrokeInjector>,
        config: SharedConfig,
        composer: Arc<InstructionComposer>,
        tracker: ContextTracker,
    ) -> Self {
        Self {
            processor: StreamProcessor::new(injector),
            buffer: String::new(),
            last_update_position: 0,
            update_seen: false,
            config,
            composer,
            tracker,
        }
    }

    // -----------------------------------------------------------------------
    // State queries
    // -----------------------------------------------------------------------

    /// The conversation as plain rendered text.
    pub fn current_text(&self) -> String {
        self.processor.store().render()
    }

    /// The conversation as `<N>text</N>` markup.
    pub fn current_xml(&self) -> String {
        self.processor.store().to_xml_markup()
    }

    /// Publish the current conversation to the [`ContextTracker`].
    pub fn publish_context(&self) {
        self.tracker.publish(self.current_xml(), self.current_text());
    }

    // -----------------------------------------------------------------------
    // Resets
    // -----------------------------------------------------------------------

    /// Start-of-response reset: clear the response buffer, position
    /// bookkeeping, the processor's tag buffer, and the per-batch backspace
    /// flag.  When `reset_state_each_response` is set the segment store is
    /// re-baselined too.
    pub fn reset_streaming_state(&mut self) {
        self.buffer.clear();
        self.last_update_position = 0;
        self.update_seen = false;
        self.processor.begin_response();

        if self.config.lock().unwrap().reset_state_each_response {
            self.processor.reset(BTreeMap::new());
        }
    }

    /// Full reset: empty segment store plus fresh streaming state.
    ///
    /// Does not touch the screen — re-baselining must never retract text
    /// the user is keeping.  In-band `<reset/>` handling erases separately
    /// before calling this.
    pub fn reset_all_state(&mut self) {
        self.processor.reset(BTreeMap::new());
        self.reset_streaming_state();
        self.publish_context();
    }

    // -----------------------------------------------------------------------
    // Mode changes
    // -----------------------------------------------------------------------

    /// Switch to `new_mode` if it is known; resets all state on success.
    ///
    /// An unknown mode is logged and ignored, keeping the current mode.
    pub fn handle_mode_change(&mut self, new_mode: &str) -> bool {
        if !self.composer.has_mode(new_mode) {
            log::warn!(
                "coordinator: unknown mode '{new_mode}' (available: {:?}), keeping current",
                self.composer.available_modes()
            );
            return false;
        }

        self.reset_all_state();
        self.config.lock().unwrap().mode = new_mode.to_string();
        log::info!("coordinator: mode switched to '{new_mode}'");
        true
    }

    // -----------------------------------------------------------------------
    // Streaming path
    // -----------------------------------------------------------------------

    /// Top-level entry per streaming delta.
    pub fn process_streaming_chunk(&mut self, chunk: &str) {
        // 1. Mode detection on everything seen so far.
        if self.buffer.contains("<mode>") || chunk.contains("<mode>") {
            let combined = format!("{}{}", self.buffer, chunk);
            if let Some(new_mode) = scanner::find_mode_tag(&combined) {
                let current = self.config.lock().unwrap().mode.clone();
                if new_mode != current && self.handle_mode_change(&new_mode) {
                    // Mode-switch responses carry no content worth keeping.
                    self.buffer.clear();
                    self.last_update_position = 0;
                    self.update_seen = false;
                    return;
                }
            }
        }

        // 2. Start streaming on the first <update>.
        if !self.processor.streaming_active() && chunk.contains("<update>") {
            self.processor.start_stream();
        }

        // 3. Accumulate.
        self.buffer.push_str(chunk);

        // 4. In-band reset: erase the screen, wipe state, keep only what
        //    follows the last reset tag.
        if let Some(end) = scanner::find_last_reset_end(&self.buffer) {
            log::debug!("coordinator: <reset> tag consumed, clearing conversation");
            let tail = self.buffer[end..].to_string();

            self.processor.erase_rendered();
            self.reset_all_state();

            self.buffer = tail;
            self.last_update_position = 0;
            self.update_seen = false;
        }

        // 5. Incremental slicing after the <update> wrapper.
        if self.buffer.contains("<update>") {
            if !self.update_seen {
                self.update_seen = true;
                // `find` cannot fail here; the containment check above saw it.
                let idx = self.buffer.find("<update>").unwrap_or(0);
                self.last_update_position = idx + "<update>".len();
            }

            if self.last_update_position < self.buffer.len() {
                let delta = self.buffer[self.last_update_position..].to_string();
                self.processor.process_chunk(&delta);
                self.last_update_position = self.buffer.len();
            }
        }
    }

    /// Finish the response: drain any region that never went through the
    /// `<update>` slicer, flush unemitted segments, publish context.
    pub fn complete_stream(&mut self) {
        if self.last_update_position < self.buffer.len() {
            let tail = self.buffer[self.last_update_position..].to_string();
            self.processor.process_chunk(&tail);
            self.last_update_position = self.buffer.len();
        }

        self.processor.end_stream();
        self.publish_context();
    }

    // -----------------------------------------------------------------------
    // Non-streaming path
    // -----------------------------------------------------------------------

    /// Apply a complete response in one call (no incremental emission
    /// between chunks, same final state as the streaming path).
    pub fn process_xml_transcription(&mut self, text: &str) {
        if let Some(new_mode) = scanner::find_mode_tag(text) {
            let current = self.config.lock().unwrap().mode.clone();
            if new_mode != current && self.handle_mode_change(&new_mode) {
                return;
            }
        }

        let mut body = text.to_string();
        if scanner::find_last_reset_end(&body).is_some() {
            self.processor.erase_rendered();
            self.reset_all_state();
            body = scanner::strip_reset_tags(&body);
        }

        self.processor.process_chunk(&body);
        self.processor.end_stream();
        self.publish_context();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{new_shared_config, AppConfig};
    use crate::inject::{InjectorOp, MockInjector};

    use InjectorOp::{Backspace, Emit};

    fn emit(text: &str) -> InjectorOp {
        Emit(text.to_string())
    }

    struct Fixture {
        coordinator: TranscriptionCoordinator,
        mock: MockInjector,
        config: SharedConfig,
    }

    fn fixture() -> Fixture {
        fixture_with_config(AppConfig::default())
    }

    fn fixture_with_config(config: AppConfig) -> Fixture {
        let mock = MockInjector::new();
        let shared = new_shared_config(config);
        let coordinator = TranscriptionCoordinator::new(
            Box::new(mock.clone()),
            Arc::clone(&shared),
            Arc::new(InstructionComposer::new()),
            ContextTracker::new(),
        );
        Fixture {
            coordinator,
            mock,
            config: shared,
        }
    }

    /// Run one full response through the streaming path.
    fn stream(fx: &mut Fixture, chunks: &[&str]) {
        fx.coordinator.reset_streaming_state();
        for chunk in chunks {
            fx.coordinator.process_streaming_chunk(chunk);
        }
        fx.coordinator.complete_stream();
    }

    // ---- update slicing ---

    #[test]
    fn wrapped_updates_are_streamed_incrementally() {
        let mut fx = fixture();

        stream(&mut fx, &["<update><10>Hello </10>", "<20>world</20></update>"]);

        assert_eq!(fx.mock.ops(), vec![emit("Hello "), emit("world")]);
        assert_eq!(fx.coordinator.current_text(), "Hello world");
    }

    #[test]
    fn response_without_update_wrapper_is_drained_at_completion() {
        let mut fx = fixture();

        stream(&mut fx, &["<10>Hello </10>", "<20>world</20>"]);

        assert_eq!(fx.coordinator.current_text(), "Hello world");
        assert_eq!(fx.mock.screen(), "Hello world");
    }

    #[test]
    fn prose_around_tags_is_ignored() {
        let mut fx = fixture();

        stream(
            &mut fx,
            &["Sure! <update>here we go <10>text</10>", " done</update> bye"],
        );

        assert_eq!(fx.coordinator.current_text(), "text");
        assert_eq!(fx.mock.screen(), "text");
    }

    #[test]
    fn update_tag_split_across_chunks_still_streams() {
        let mut fx = fixture();

        stream(&mut fx, &["<upd", "ate><10>Hi</10></update>"]);

        assert_eq!(fx.coordinator.current_text(), "Hi");
    }

    // ---- resets ---

    #[test]
    fn reset_mid_stream_erases_and_rebuilds() {
        let mut fx = fixture();

        // Establish a prior conversation on screen.
        stream(&mut fx, &["<update><10>Old </10><20>text</20></update>"]);
        assert_eq!(fx.mock.screen(), "Old text");

        stream(
            &mut fx,
            &["<reset/><update><10>New </10><20>start</20></update>"],
        );

        assert_eq!(fx.coordinator.current_text(), "New start");
        assert_eq!(fx.mock.screen(), "New start");

        // The reset must begin with a backspace erasing "Old text".
        let ops = fx.mock.ops();
        let reset_point = ops
            .iter()
            .position(|op| *op == Backspace(8))
            .expect("reset backspace missing");
        assert_eq!(
            &ops[reset_point + 1..],
            &[emit("New "), emit("start")]
        );
    }

    #[test]
    fn reset_followed_by_content_equals_fresh_start() {
        let mut with_history = fixture();
        stream(
            &mut with_history,
            &["<update><10>Old </10><20>text</20></update>"],
        );
        stream(
            &mut with_history,
            &["<reset/><update><10>New </10></update>"],
        );

        let mut fresh = fixture();
        stream(&mut fresh, &["<update><10>New </10></update>"]);

        assert_eq!(
            with_history.coordinator.current_text(),
            fresh.coordinator.current_text()
        );
        assert_eq!(with_history.mock.screen(), fresh.mock.screen());
    }

    #[test]
    fn split_reset_tag_waits_for_completion() {
        let mut fx = fixture();
        stream(&mut fx, &["<update><10>keep</10></update>"]);

        fx.coordinator.reset_streaming_state();
        fx.coordinator.process_streaming_chunk("<res");
        // Not yet a reset — state intact.
        assert_eq!(fx.coordinator.current_text(), "keep");

        fx.coordinator.process_streaming_chunk("et/>");
        fx.coordinator.complete_stream();
        assert_eq!(fx.coordinator.current_text(), "");
        assert_eq!(fx.mock.screen(), "");
    }

    #[test]
    fn reset_with_no_prior_content_is_silent() {
        let mut fx = fixture();

        stream(&mut fx, &["<reset/><update><10>go</10></update>"]);

        assert_eq!(fx.mock.ops(), vec![emit("go")]);
    }

    // ---- mode changes ---

    #[test]
    fn mode_tag_switches_mode_and_skips_content() {
        let mut fx = fixture();
        stream(&mut fx, &["<update><10>existing</10></update>"]);

        stream(&mut fx, &["<mode>shell</mode><update><10>dropped</10></update>"]);

        assert_eq!(fx.config.lock().unwrap().mode, "shell");
        // Conversation wiped, body content not applied.
        assert_eq!(fx.coordinator.current_text(), "");
    }

    #[test]
    fn unknown_mode_is_ignored_and_content_processed() {
        let mut fx = fixture();

        stream(
            &mut fx,
            &["<mode>bogus</mode><update><10>kept</10></update>"],
        );

        assert_eq!(fx.config.lock().unwrap().mode, "dictate");
        assert_eq!(fx.coordinator.current_text(), "kept");
    }

    #[test]
    fn same_mode_tag_is_a_noop() {
        let mut fx = fixture();
        stream(&mut fx, &["<update><10>existing</10></update>"]);

        stream(
            &mut fx,
            &["<mode>dictate</mode><update><20> more</20></update>"],
        );

        // No reset: prior content survives and new content lands after it.
        assert_eq!(fx.coordinator.current_text(), "existing more");
    }

    #[test]
    fn mode_tag_split_across_chunks_is_detected() {
        let mut fx = fixture();

        stream(&mut fx, &["<mode>sh", "ell</mode>"]);

        assert_eq!(fx.config.lock().unwrap().mode, "shell");
    }

    // ---- reset_state_each_response ---

    #[test]
    fn reset_each_response_rebaselines_without_erasing() {
        let mut config = AppConfig::default();
        config.reset_state_each_response = true;
        let mut fx = fixture_with_config(config);

        stream(&mut fx, &["<update><10>first</10></update>"]);
        fx.coordinator.reset_all_state();

        // Next response starts from an empty baseline: ids restart, text
        // appends on screen instead of replacing.
        stream(&mut fx, &["<update><10>second</10></update>"]);

        assert_eq!(fx.coordinator.current_text(), "second");
        assert_eq!(fx.mock.screen(), "firstsecond");
        assert!(fx.mock.ops().iter().all(|op| !matches!(op, Backspace(_))));
    }

    #[test]
    fn reset_all_state_is_idempotent() {
        let mut fx = fixture();
        stream(&mut fx, &["<update><10>text</10></update>"]);

        fx.coordinator.reset_all_state();
        let after_one = fx.coordinator.current_text();
        fx.coordinator.reset_all_state();

        assert_eq!(fx.coordinator.current_text(), after_one);
        assert_eq!(fx.coordinator.current_text(), "");
    }

    // ---- non-streaming path ---

    #[test]
    fn batch_path_matches_streaming_final_state() {
        let mut streamed = fixture();
        stream(
            &mut streamed,
            &["<update><10>The </10>", "<20>end</20></update>"],
        );

        let mut batch = fixture();
        batch
            .coordinator
            .process_xml_transcription("<update><10>The </10><20>end</20></update>");

        assert_eq!(
            streamed.coordinator.current_text(),
            batch.coordinator.current_text()
        );
        assert_eq!(streamed.mock.screen(), batch.mock.screen());
    }

    #[test]
    fn batch_path_handles_reset_and_mode() {
        let mut fx = fixture();
        fx.coordinator
            .process_xml_transcription("<update><10>old</10></update>");

        fx.coordinator
            .process_xml_transcription("<reset/><update><10>new</10></update>");
        assert_eq!(fx.coordinator.current_text(), "new");
        assert_eq!(fx.mock.screen(), "new");

        fx.coordinator.process_xml_transcription("<mode>shell</mode>");
        assert_eq!(fx.config.lock().unwrap().mode, "shell");
        assert_eq!(fx.coordinator.current_text(), "");
    }

    // ---- context publication ---

    #[test]
    fn completed_responses_publish_context() {
        let mock = MockInjector::new();
        let shared = new_shared_config(AppConfig::default());
        let tracker = ContextTracker::new();
        let mut coordinator = TranscriptionCoordinator::new(
            Box::new(mock.clone()),
            shared,
            Arc::new(InstructionComposer::new()),
            tracker.clone(),
        );

        coordinator.reset_streaming_state();
        coordinator.process_streaming_chunk("<update><10>hi &amp; bye</10></update>");
        coordinator.complete_stream();

        let snap = tracker.snapshot(16_000);
        assert_eq!(snap.rendered_text, "hi & bye");
        assert_eq!(snap.xml_markup, "<10>hi &amp; bye</10>");
    }

    // ---- net keystroke invariant ---

    #[test]
    fn net_keystrokes_equal_final_render_from_empty_screen() {
        let mut fx = fixture();

        stream(
            &mut fx,
            &[
                "<update><10>alpha </10><20>beta </20>",
                "<10>ALPHA </10>",
                "<30>gamma</30></update>",
            ],
        );

        let final_render = fx.coordinator.current_text();
        assert_eq!(fx.mock.net_chars(), final_render.chars().count() as i64);
        assert_eq!(fx.mock.screen(), final_render);
    }
}

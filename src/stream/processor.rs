//! Incremental segment-update processor — drives the injector so the
//! visible text converges on the segment store's render.
//!
//! # Emission algorithm
//!
//! A response is a *batch* of `(id, text)` updates.  The processor never
//! emits a segment until every earlier segment's value for the batch is
//! known, yet starts emitting at the first changed segment:
//!
//! 1. The first update that actually changes a segment triggers one
//!    backspace run, erasing from the end of the screen back to that
//!    segment's boundary.
//! 2. From then on every update emits the segments between the last
//!    emitted id and its own id (filling unchanged gap segments from the
//!    store).
//! 3. An update landing at or before the last emitted id means the model
//!    is rewriting text that has already been re-typed — a fresh backspace
//!    run is forced.
//! 4. `end_stream` re-emits the tail beyond the last update so the screen
//!    ends equal to the full render.
//!
//! Unchanged updates are no-ops; a response that rewrites nothing produces
//! zero keystrokes.

use std::collections::BTreeMap;

use crate::inject::KeystrokeInjector;

use super::scanner;
use super::store::SegmentStore;

// ---------------------------------------------------------------------------
// StreamProcessor
// ---------------------------------------------------------------------------

/// Applies streamed segment updates to a [`SegmentStore`] and mirrors the
/// result onto the keyboard via a [`KeystrokeInjector`].
///
/// Owns both: the store is the ground truth, the injector is the output
/// device, and keeping them behind one value means no other thread can
/// interleave keystrokes mid-batch.
pub struct StreamProcessor {
    store: SegmentStore,
    /// Accumulates raw stream bytes between calls; complete tags are drained
    /// from the front, a partial trailing tag waits for the next chunk.
    buffer: String,
    streaming_active: bool,
    injector: Box<dyn KeystrokeInjector>,
}

impl StreamProcessor {
    pub fn new(injector: Box<dyn KeystrokeInjector>) -> Self {
        Self {
            store: SegmentStore::new(),
            buffer: String::new(),
            streaming_active: false,
            injector,
        }
    }

    // -----------------------------------------------------------------------
    // State access
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn streaming_active(&self) -> bool {
        self.streaming_active
    }

    /// Replace the store contents (new conversation baseline).
    pub fn reset(&mut self, initial: BTreeMap<u32, String>) {
        self.store.reset(initial);
        self.buffer.clear();
    }

    /// Start-of-response bookkeeping: clear the tag buffer, the streaming
    /// flag, and the per-batch backspace flag.
    pub fn begin_response(&mut self) {
        self.buffer.clear();
        self.streaming_active = false;
        self.store.backspace_performed = false;
    }

    /// Mark the start of a streamed response.
    pub fn start_stream(&mut self) {
        self.streaming_active = true;
    }

    // -----------------------------------------------------------------------
    // Chunk processing
    // -----------------------------------------------------------------------

    /// Consume one stream chunk, applying every complete `<N>…</N>` update
    /// it completes.  Partial tags stay buffered for the next chunk.
    pub fn process_chunk(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);

        let (updates, rest) = scanner::extract_complete_tags(&self.buffer);
        self.buffer = rest;

        for (id, text) in updates {
            self.process_single_update(id, text);
        }
    }

    /// Flush the tail of the batch and close the stream.
    ///
    /// Any trailing partial tag in the buffer is discarded — the model never
    /// completed it.
    pub fn end_stream(&mut self) {
        if self.store.backspace_performed {
            if let Some(max_id) = self.store.max_id() {
                if max_id > self.store.last_emitted_id {
                    self.emit_through(max_id);
                }
            }
        }

        self.streaming_active = false;
        self.buffer.clear();
    }

    /// Erase everything currently on screen (used when the model requests a
    /// conversation reset mid-response).
    ///
    /// Mid-batch the screen holds only the segments up to `last_emitted_id`
    /// (the rest was backspaced away and not yet re-typed); outside a
    /// backspace cycle it holds the full render.
    pub fn erase_rendered(&mut self) {
        let on_screen = if self.store.backspace_performed {
            self.store
                .render_prefix_through(self.store.last_emitted_id)
        } else {
            self.store.render()
        };

        let count = on_screen.chars().count();
        if count > 0 {
            self.injector.backspace(count);
        }
    }

    // -----------------------------------------------------------------------
    // Update application
    // -----------------------------------------------------------------------

    fn process_single_update(&mut self, id: u32, text: String) {
        let changed = text != self.store.get(id);

        let mut need_backspace = changed && !self.store.backspace_performed;

        // A change at or before the last emitted segment rewrites text that
        // has already been re-typed this batch: force a fresh cycle.
        if changed && self.store.backspace_performed && id <= self.store.last_emitted_id {
            log::debug!(
                "stream: update {id} lands before last emitted {}, new backspace cycle",
                self.store.last_emitted_id
            );
            need_backspace = true;
            self.store.backspace_performed = false;
        }

        if need_backspace {
            let count = self.backspace_count(id);
            if count > 0 {
                self.injector.backspace(count);
            }
            self.store.backspace_performed = true;
            self.store.last_emitted_id = id.saturating_sub(1);
        }

        self.store.upsert(id, text);

        if self.store.backspace_performed {
            self.emit_through(id);
        }
    }

    /// Characters between the end of the screen and the boundary where the
    /// first changed segment starts.  Computed against the store *before*
    /// the update is applied.
    fn backspace_count(&self, first_changed_id: u32) -> usize {
        let total = self.store.render().chars().count();
        let boundary = self
            .store
            .render_prefix_until(first_changed_id)
            .chars()
            .count();
        total - boundary
    }

    /// Emit every stored segment in `(last_emitted_id, target]`, ascending,
    /// then advance `last_emitted_id`.  Gap segments that were never seen
    /// have no store entry and are skipped naturally.
    fn emit_through(&mut self, target: u32) {
        let ids = self.store.ids_between(self.store.last_emitted_id, target);

        for &id in &ids {
            let text = self.store.get(id).to_string();
            self.injector.emit(&text);
        }

        if let Some(&max) = ids.last() {
            self.store.last_emitted_id = max;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

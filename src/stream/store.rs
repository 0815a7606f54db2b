//! Segment store — the ground truth the keystroke injector must mirror.
//!
//! Segments are model-assigned `(id, text)` pairs; the rendered string at
//! any instant is the concatenation of segment text in ascending id order.
//! Empty text is a valid value (a tombstone contributing zero characters),
//! so deletions keep their key and still participate in gap filling.
//!
//! All length arithmetic is in Unicode scalar values (`char`s), never bytes:
//! one BackSpace keystroke removes one character.

use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// SegmentStore
// ---------------------------------------------------------------------------

/// Ordered mapping `segment id → text` plus the emission bookkeeping for the
/// current batch of updates.
#[derive(Debug, Default)]
pub struct SegmentStore {
    segments: BTreeMap<u32, String>,
    /// Id of the rightmost segment pushed to the injector; 0 when nothing
    /// has been emitted.
    pub last_emitted_id: u32,
    /// Set the first time the current batch mutates a segment (and a
    /// backspace cycle begins); cleared at the start of each response.
    pub backspace_performed: bool,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Replace the contents with `initial` and clear emission bookkeeping.
    pub fn reset(&mut self, initial: BTreeMap<u32, String>) {
        self.segments = initial;
        self.last_emitted_id = 0;
        self.backspace_performed = false;
    }

    /// Set `segments[id] = text`.  An empty string is retained as a
    /// tombstone rather than removing the key.
    pub fn upsert(&mut self, id: u32, text: String) {
        self.segments.insert(id, text);
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Text for `id`, or the empty string when absent.
    pub fn get(&self, id: u32) -> &str {
        self.segments.get(&id).map(String::as_str).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Highest segment id present, if any.
    pub fn max_id(&self) -> Option<u32> {
        self.segments.keys().next_back().copied()
    }

    /// Concatenation of all segment text in ascending id order.
    pub fn render(&self) -> String {
        self.segments.values().map(String::as_str).collect()
    }

    /// Concatenation of segment text for ids strictly below `id`.
    pub fn render_prefix_until(&self, id: u32) -> String {
        self.segments
            .range(..id)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    /// Concatenation of segment text for ids up to and including `id`.
    pub fn render_prefix_through(&self, id: u32) -> String {
        self.segments
            .range(..=id)
            .map(|(_, text)| text.as_str())
            .collect()
    }

    /// Segment ids in `(after, through]`, ascending.
    pub fn ids_between(&self, after: u32, through: u32) -> Vec<u32> {
        if through <= after {
            return Vec::new();
        }
        self.segments
            .range(after + 1..=through)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Rebuild `<N>text</N>` markup for the whole store, with `& < >`
    /// escaped — the wire shape the model receives as conversation context.
    pub fn to_xml_markup(&self) -> String {
        let mut xml = String::new();
        for (id, text) in &self.segments {
            xml.push('<');
            xml.push_str(&id.to_string());
            xml.push('>');
            for ch in text.chars() {
                match ch {
                    '&' => xml.push_str("&amp;"),
                    '<' => xml.push_str("&lt;"),
                    '>' => xml.push_str("&gt;"),
                    _ => xml.push(ch),
                }
            }
            xml.push_str("</");
            xml.push_str(&id.to_string());
            xml.push('>');
        }
        xml
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

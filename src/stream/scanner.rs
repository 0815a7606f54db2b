//! Chunk-tolerant tag scanning for the model's wire protocol.
//!
//! The interesting tag shape is `<N>body</N>` where both `N`s are the same
//! digit run and the body is minimal (first matching close wins).  A
//! hand-rolled scan is used rather than a regex engine: scan for `<`, parse
//! digits, expect `>`, then search for the matching `</N>`.
//!
//! Scanning rules, in service of arbitrary chunk boundaries:
//!
//! - Anything that is not part of a complete match is left untouched until a
//!   later match consumes past it; the caller keeps the unconsumed tail
//!   (which may hold a partial tag like `<20` or `<20>half a bo`) for the
//!   next chunk.
//! - A mismatched close (`<100>x</110>`) never matches; the scanner moves on
//!   and may match a tag starting inside that span.
//! - `&amp;` / `&lt;` / `&gt;` in a matched body are unescaped; other
//!   entities pass through unchanged.

// ---------------------------------------------------------------------------
// <N>body</N> extraction
// ---------------------------------------------------------------------------

/// Try to parse `<digits>` at the start of `s`.
///
/// Returns `(id, open_tag_len)` on success.  The caller re-slices the
/// literal digits out of the open tag so the close tag matches them
/// verbatim (`<010>` only closes with `</010>`).
fn parse_open_tag(s: &str) -> Option<(u32, usize)> {
    let rest = s.strip_prefix('<')?;
    let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits_len == 0 {
        return None;
    }
    let digits = &rest[..digits_len];
    if !rest[digits_len..].starts_with('>') {
        return None;
    }
    let id: u32 = digits.parse().ok()?;
    Some((id, 1 + digits_len + 1))
}

/// Extract every complete `<N>body</N>` match from `buffer`, in order.
///
/// Returns the updates (ids with unescaped bodies) and the remaining buffer:
/// everything after the end of the last complete match.  When no match is
/// found the whole buffer is returned intact.
pub fn extract_complete_tags(buffer: &str) -> (Vec<(u32, String)>, String) {
    let mut updates = Vec::new();
    let mut last_end = 0usize;
    let mut pos = 0usize;

    while let Some(rel) = buffer[pos..].find('<') {
        let lt = pos + rel;

        let Some((id, open_len)) = parse_open_tag(&buffer[lt..]) else {
            // Not a numeric open tag here (or it is still incomplete at the
            // end of the buffer) — try the next '<'.
            pos = lt + 1;
            continue;
        };

        let body_start = lt + open_len;
        let digits = &buffer[lt + 1..lt + open_len - 1];
        let close = format!("</{digits}>");

        match buffer[body_start..].find(&close) {
            Some(crel) => {
                let body = &buffer[body_start..body_start + crel];
                updates.push((id, unescape_entities(body)));
                last_end = body_start + crel + close.len();
                pos = last_end;
            }
            None => {
                // No matching close in the buffer yet; an inner tag may
                // still complete, so keep scanning past this '<'.
                pos = lt + 1;
            }
        }
    }

    (updates, buffer[last_end..].to_string())
}

// ---------------------------------------------------------------------------
// Entity unescaping
// ---------------------------------------------------------------------------

/// Unescape `&amp;` / `&lt;` / `&gt;` in a single left-to-right pass.
///
/// Unknown entities (and bare `&`) pass through unchanged, and the output of
/// one replacement is never rescanned, so `&amp;lt;` becomes `&lt;`.
pub fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        if let Some(after) = tail.strip_prefix("&amp;") {
            out.push('&');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("&lt;") {
            out.push('<');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("&gt;") {
            out.push('>');
            rest = after;
        } else {
            out.push('&');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// <mode> tags
// ---------------------------------------------------------------------------

/// Find the first complete `<mode>NAME</mode>` tag and return `NAME`.
///
/// A mode name is one or more ASCII alphanumerics/underscores; anything
/// else between the tags is treated as noise and scanning continues.
pub fn find_mode_tag(text: &str) -> Option<String> {
    const OPEN: &str = "<mode>";
    const CLOSE: &str = "</mode>";

    let mut pos = 0usize;
    while let Some(rel) = text[pos..].find(OPEN) {
        let start = pos + rel + OPEN.len();
        let crel = text[start..].find(CLOSE)?;
        let name = &text[start..start + crel];
        if !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Some(name.to_string());
        }
        pos = start;
    }
    None
}

// ---------------------------------------------------------------------------
// <reset> tags
// ---------------------------------------------------------------------------

/// Byte offset just past the `>` of the *last* `<reset…` tag opening, if one
/// has fully arrived.  `<reset` with no `>` yet returns `None` so a split
/// tag waits for the next chunk.
pub fn find_last_reset_end(text: &str) -> Option<usize> {
    let idx = text.rfind("<reset")?;
    let gt = text[idx..].find('>')?;
    Some(idx + gt + 1)
}

/// Remove every `<reset/>` / `<reset>…</reset>` span from `text`.
///
/// Used by the non-streaming path, where the reset has already been applied
/// and the surrounding content is processed as one piece.
pub fn strip_reset_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(i) = rest.find("<reset") {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];

        let Some(gt) = tail.find('>') else {
            // Dangling fragment at the end of the text — drop it.
            rest = "";
            break;
        };

        let open = &tail[..gt + 1];
        let self_closing = open
            .trim_end_matches('>')
            .trim_end()
            .ends_with('/');

        if self_closing {
            rest = &tail[gt + 1..];
        } else if let Some(close) = tail.find("</reset>") {
            rest = &tail[close + "</reset>".len()..];
        } else {
            // Unterminated paired form: drop the open tag only.
            rest = &tail[gt + 1..];
        }
    }

    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Fenced block location and payload codec.
//!
//! A tracker block in a note looks like:
//!
//! ````text
//! ```time-tracker
//! {"dispType":"default","entries":[...]}
//! ```
//! ````
//!
//! The payload is everything from the line after the opener up to the start
//! of the closing fence line, so a splice at `payload` replaces exactly the
//! JSON text and its trailing newline. Offsets are byte offsets into the text
//! that was scanned and are only valid for that exact text.

use std::ops::Range;

use crate::tracker::Tracker;

/// Language tag used by the plugin that owns these blocks.
pub const DEFAULT_LANGUAGE: &str = "time-tracker";

const FENCE: &str = "```";

/// Opening and closing fence literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceMarkers {
    open: String,
    close: String,
}

impl FenceMarkers {
    /// Markers for a code fence tagged with `language`.
    pub fn for_language(language: &str) -> Self {
        Self {
            open: format!("{FENCE}{language}"),
            close: FENCE.to_string(),
        }
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }

    /// An empty block, ready to append to a note.
    pub fn empty_block(&self) -> String {
        format!("{}\n{}\n", self.open, self.close)
    }
}

impl Default for FenceMarkers {
    fn default() -> Self {
        Self::for_language(DEFAULT_LANGUAGE)
    }
}

/// Result of decoding a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// The payload was a valid tracker.
    Parsed(Tracker),
    /// The payload was empty or malformed and was replaced by a default.
    Defaulted,
}

impl Decoded {
    pub const fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted)
    }

    pub fn into_tracker(self) -> Tracker {
        match self {
            Self::Parsed(tracker) => tracker,
            Self::Defaulted => Tracker::default(),
        }
    }
}

/// Decodes a block payload, degrading to [`Decoded::Defaulted`] on failure.
pub fn decode_tracker(payload: &str) -> Decoded {
    if payload.trim().is_empty() {
        return Decoded::Defaulted;
    }
    match serde_json::from_str(payload) {
        Ok(tracker) => Decoded::Parsed(tracker),
        Err(err) => {
            tracing::debug!(error = %err, "failed to parse tracker payload, using default");
            Decoded::Defaulted
        }
    }
}

/// Encodes a tracker as a single-line payload, newline included.
pub fn encode_tracker(tracker: &Tracker) -> Result<String, serde_json::Error> {
    let mut payload = serde_json::to_string(tracker)?;
    payload.push('\n');
    Ok(payload)
}

/// One located block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Half-open byte range of the payload.
    pub payload: Range<usize>,
    pub tracker: Tracker,
    /// True if the payload did not decode and `tracker` is a default.
    pub defaulted: bool,
}

/// Returns the end of the line starting at `start` (exclusive of `\n`).
fn line_end(text: &str, start: usize) -> usize {
    text[start..].find('\n').map_or(text.len(), |i| start + i)
}

/// Whether a closing fence line starts exactly at `pos`.
pub fn closer_at(text: &str, pos: usize, markers: &FenceMarkers) -> bool {
    let Some(rest) = text.get(pos..) else {
        return false;
    };
    if pos > 0 && !text[..pos].ends_with('\n') {
        return false;
    }
    let line = rest.split('\n').next().unwrap_or_default();
    line.trim() == markers.close
}

/// Finds the closing fence line at or after `from`, which must be a line start.
/// Returns the line's start and end.
fn find_closer(text: &str, from: usize, markers: &FenceMarkers) -> Option<(usize, usize)> {
    let mut start = from;
    loop {
        let end = line_end(text, start);
        if text[start..end].trim() == markers.close {
            return Some((start, end));
        }
        if end >= text.len() {
            return None;
        }
        start = end + 1;
    }
}

/// Scans `text` for tracker blocks, in document order.
///
/// Openers without a closing fence after them are dropped. Scanning resumes
/// after each block's closing fence, so blocks never overlap.
pub fn locate_blocks(text: &str, markers: &FenceMarkers) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find(markers.open.as_str()) {
        let opener = cursor + offset;
        let opener_end = line_end(text, opener);
        if opener_end >= text.len() {
            break;
        }
        let payload_start = opener_end + 1;
        let Some((payload_end, closer_end)) = find_closer(text, payload_start, markers) else {
            tracing::debug!(offset = opener, "unterminated tracker block");
            break;
        };

        let decoded = decode_tracker(&text[payload_start..payload_end]);
        blocks.push(Block {
            payload: payload_start..payload_end,
            defaulted: decoded.is_defaulted(),
            tracker: decoded.into_tracker(),
        });
        cursor = closer_end;
    }

    blocks
}

/// Replaces `range` of `text` with `replacement`.
///
/// Returns `None` if `range` does not fall on character boundaries of `text`.
pub fn splice(text: &str, range: Range<usize>, replacement: &str) -> Option<String> {
    let head = text.get(..range.start)?;
    let tail = text.get(range.end..)?;
    if range.start > range.end {
        return None;
    }
    let mut out = String::with_capacity(head.len() + replacement.len() + tail.len());
    out.push_str(head);
    out.push_str(replacement);
    out.push_str(tail);
    Some(out)
}

//! Per-call receive state and its transitions.
//!
//! Every transition of the receive loop that does not touch the channel
//! lives here, so each one can be tested in isolation.

use bytes::BytesMut;

use crate::channel::{AutoReplies, Encoding, PatternSet};

/// What the accumulated text matched, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Auto-reply pattern at this index matched.
    AutoReply(usize),

    /// Prompt pattern at this index matched.
    Prompt(usize),

    /// Nothing matched yet.
    Pending,
}

/// Buffers carried through one receive call.
///
/// `archived + text` is always everything decoded so far; `raw` only ever
/// holds bytes that have not decoded yet.
#[derive(Debug, Default)]
pub struct RecvState {
    /// Bytes read since the last successful decode.
    raw: BytesMut,

    /// Decoded text since the last auto-reply. Patterns match against this.
    text: String,

    /// Text already answered by an auto-reply.
    archived: String,
}

impl RecvState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn absorb(&mut self, data: &[u8]) {
        self.raw.extend_from_slice(data);
    }

    /// Strictly decode the raw bytes and move them into the text buffer.
    ///
    /// Returns the newly decoded chunk. On failure the raw bytes are kept
    /// for the next attempt and `None` is returned.
    pub fn decode_pending(&mut self, encoding: Encoding) -> Option<String> {
        let decoded = encoding.decode_strict(&self.raw)?;
        self.raw.clear();
        self.text.push_str(&decoded);
        Some(decoded)
    }

    /// Check auto-replies first, then prompts, against the text buffer.
    pub fn classify(&self, auto_replies: &AutoReplies, prompts: &PatternSet) -> Classification {
        if let Some(idx) = auto_replies.find(&self.text) {
            Classification::AutoReply(idx)
        } else if let Some(idx) = prompts.find(&self.text) {
            Classification::Prompt(idx)
        } else {
            Classification::Pending
        }
    }

    /// Move the text buffer into the archive.
    pub fn archive(&mut self) {
        self.archived.push_str(&self.text);
        self.text.clear();
    }

    /// Lossily decode whatever never became valid text.
    ///
    /// Returns the remainder (if there was one) and the full output.
    pub fn finish(mut self, encoding: Encoding) -> (Option<String>, String) {
        self.archive();
        if self.raw.is_empty() {
            return (None, self.archived);
        }
        let remainder = encoding.decode_lossy(&self.raw);
        self.archived.push_str(&remainder);
        (Some(remainder), self.archived)
    }

    /// Archived text followed by the text buffer.
    pub fn output(&self) -> String {
        let mut out = String::with_capacity(self.archived.len() + self.text.len());
        out.push_str(&self.archived);
        out.push_str(&self.text);
        out
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn archived(&self) -> &str {
        &self.archived
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

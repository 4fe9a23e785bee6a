//! Result type for receive calls.

use std::time::Duration;

/// Why a receive call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A prompt pattern matched.
    Prompt,

    /// Nothing arrived within the idle timeout.
    Timeout,

    /// The remote end closed the channel.
    Closed,
}

/// Outcome of [`recv_text`](super::InteractiveDriver::recv_text).
#[derive(Debug, Clone)]
pub struct RecvOutcome {
    /// All text received during the call, including text that triggered
    /// auto-replies.
    pub text: String,

    /// Source of the prompt pattern that matched, if one did.
    pub prompt: Option<String>,

    /// Why the call stopped.
    pub stop: StopReason,

    /// Number of auto-replies sent during the call.
    pub auto_replies_sent: usize,

    /// Total time spent in the call.
    pub elapsed: Duration,
}

impl RecvOutcome {
    /// Check if a prompt was matched.
    pub fn is_prompt(&self) -> bool {
        self.prompt.is_some()
    }

    /// Split into the `(text, matched prompt)` pair.
    pub fn into_parts(self) -> (String, Option<String>) {
        (self.text, self.prompt)
    }
}

impl std::fmt::Display for RecvOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

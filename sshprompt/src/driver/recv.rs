//! The receive loop: wait, drain, decode, classify, auto-reply.

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::time::Instant;

use super::config::ReaderConfig;
use super::response::{RecvOutcome, StopReason};
use super::state::{Classification, RecvState};
use crate::channel::{AutoReplies, Encoding, PatternSet, SessionChannel};
use crate::error::Result;

/// Callback invoked with each newly decoded chunk of output.
pub type PartialTextHandler = Box<dyn FnMut(&str) + Send>;

/// Forward every decoded chunk into an unbounded tokio channel.
///
/// Chunks are dropped silently once the receiver is gone.
pub fn forward_to(tx: tokio::sync::mpsc::UnboundedSender<String>) -> PartialTextHandler {
    Box::new(move |text: &str| {
        let _ = tx.send(text.to_owned());
    })
}

/// Wait until `channel` is readable or `timeout` elapses.
pub async fn wait_recv_ready<C: SessionChannel>(channel: &mut C, timeout: Option<Duration>) -> bool {
    // false on timeout
    channel.readable(timeout).await
}

/// Encode `text` and write it, returning the number of bytes accepted.
pub async fn write_text<C: SessionChannel>(
    channel: &mut C,
    encoding: Encoding,
    text: &str,
) -> Result<usize> {
    let data = encoding.encode(text)?;
    let written = channel.write(&data).await?;
    if written < data.len() {
        warn!("short write: {} of {} bytes sent", written, data.len());
    }
    Ok(written)
}

/// Read from `channel` until a prompt matches, answering auto-replies on
/// the way.
///
/// Stops with no prompt when the channel closes or nothing arrives within
/// `config.recv_timeout`. That timeout restarts only when an auto-reply is
/// sent; output that matches nothing does not extend it.
///
/// The config must already be validated.
pub(crate) async fn recv_text<C: SessionChannel>(
    channel: &mut C,
    config: &ReaderConfig,
    auto_replies: &AutoReplies,
    prompts: &PatternSet,
    mut on_partial_text: Option<&mut PartialTextHandler>,
) -> Result<RecvOutcome> {
    let started = Instant::now();
    let mut wait_start = started;
    let mut state = RecvState::new();
    let mut replies_sent = 0;
    if auto_replies.is_empty() && prompts.is_empty() {
        debug!("no patterns given, reading until close or timeout");
    }

    let stop = loop {
        if channel.is_closed() {
            warn!("Connection closed while receiving text.");
            break StopReason::Closed;
        }

        let remaining = config.recv_timeout.saturating_sub(wait_start.elapsed());
        if !wait_recv_ready(channel, Some(remaining)).await {
            warn!("Timeout reached while waiting for prompt.");
            break StopReason::Timeout;
        }

        while channel.has_more_available() {
            let chunk = channel.read_available(config.recv_chunk_size);
            state.absorb(&chunk);
        }

        let Some(decoded) = state.decode_pending(config.encoding) else {
            trace!("incomplete sequence, {} bytes pending", state.raw().len());
            continue;
        };
        if decoded.is_empty() {
            continue;
        }
        if let Some(handler) = on_partial_text.as_deref_mut() {
            handler(&decoded);
        }

        match state.classify(auto_replies, prompts) {
            Classification::AutoReply(idx) => {
                if channel.is_closed() {
                    debug!(
                        "auto-reply pattern {} matched after close, not replying",
                        auto_replies.pattern(idx).trim()
                    );
                    break StopReason::Closed;
                }
                debug!(
                    "Found auto-reply pattern: {} -> sending reply",
                    auto_replies.pattern(idx).trim()
                );
                write_text(channel, config.encoding, auto_replies.reply(idx)).await?;
                replies_sent += 1;
                wait_start = Instant::now();
                state.archive();
            }
            Classification::Prompt(idx) => {
                let prompt = prompts.source(idx);
                debug!("Found prompt pattern: {}", prompt.trim());
                return Ok(RecvOutcome {
                    text: state.output(),
                    prompt: Some(prompt.to_string()),
                    stop: StopReason::Prompt,
                    auto_replies_sent: replies_sent,
                    elapsed: started.elapsed(),
                });
            }
            Classification::Pending => {}
        }
    };

    let (remainder, text) = state.finish(config.encoding);
    if let Some(remainder) = remainder {
        debug!("flushing {} undecodable chars", remainder.chars().count());
        if let Some(handler) = on_partial_text.as_deref_mut() {
            handler(&remainder);
        }
    }

    Ok(RecvOutcome {
        text,
        prompt: None,
        stop,
        auto_replies_sent: replies_sent,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use indexmap::IndexMap;

    use super::*;
    use crate::channel::ScriptedChannel;

    fn config(timeout_secs: u64) -> ReaderConfig {
        ReaderConfig {
            recv_timeout: Duration::from_secs(timeout_secs),
            ..Default::default()
        }
    }

    fn replies(pairs: &[(&str, &str)]) -> AutoReplies {
        let map: IndexMap<String, String> = pairs
            .iter()
            .map(|(p, r)| (p.to_string(), r.to_string()))
            .collect();
        AutoReplies::compile(&map).unwrap()
    }

    fn recorder() -> (PartialTextHandler, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: PartialTextHandler = Box::new(move |text: &str| {
            sink.lock().unwrap().push(text.to_string());
        });
        (handler, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_match() {
        let mut channel = ScriptedChannel::new().data("prompt>");
        let prompts = PatternSet::compile(["prompt>"]).unwrap();

        let outcome = recv_text(&mut channel, &config(30), &AutoReplies::default(), &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.text, "prompt>");
        assert_eq!(outcome.prompt.as_deref(), Some("prompt>"));
        assert_eq!(outcome.stop, StopReason::Prompt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_before_data() {
        let mut channel = ScriptedChannel::new().close();
        let prompts = PatternSet::compile(["prompt>"]).unwrap();

        let outcome = recv_text(&mut channel, &config(30), &AutoReplies::default(), &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.text, "");
        assert_eq!(outcome.prompt, None);
        assert_eq!(outcome.stop, StopReason::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_text_so_far() {
        let mut channel = ScriptedChannel::new().data("no prompt here");
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let start = Instant::now();

        let outcome = recv_text(&mut channel, &config(5), &AutoReplies::default(), &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.text, "no prompt here");
        assert_eq!(outcome.prompt, None);
        assert_eq!(outcome.stop, StopReason::Timeout);
        assert!(start.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reply_round_trip() {
        let mut channel = ScriptedChannel::new()
            .data("Password:")
            .await_write()
            .data("prompt>");
        let auto = replies(&[("Password:", "secret\n")]);
        let prompts = PatternSet::compile(["prompt>"]).unwrap();

        let outcome = recv_text(&mut channel, &config(30), &auto, &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.text, "Password:prompt>");
        assert_eq!(outcome.prompt.as_deref(), Some("prompt>"));
        assert_eq!(outcome.auto_replies_sent, 1);
        assert_eq!(channel.writes(), &[Bytes::from_static(b"secret\n")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reply_beats_prompt_in_same_pass() {
        // Both patterns match the first chunk; the call must not end there
        let mut channel = ScriptedChannel::new()
            .data("Password: prompt>")
            .await_write()
            .data("\nprompt>");
        let auto = replies(&[("Password:", "secret\n")]);
        let prompts = PatternSet::compile(["prompt>"]).unwrap();

        let outcome = recv_text(&mut channel, &config(30), &auto, &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.text, "Password: prompt>\nprompt>");
        assert_eq!(outcome.auto_replies_sent, 1);
        assert_eq!(channel.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_split_multibyte_character() {
        // "é" = C3 A9, delivered in two separate reads
        let mut channel = ScriptedChannel::new()
            .data(b"caf\xc3")
            .pause(Duration::from_millis(10))
            .data(b"\xa9 prompt>");
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let (mut handler, seen) = recorder();

        let outcome = recv_text(
            &mut channel,
            &config(30),
            &AutoReplies::default(),
            &prompts,
            Some(&mut handler),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "café prompt>");
        assert!(!outcome.text.contains('\u{FFFD}'));
        assert_eq!(*seen.lock().unwrap(), vec!["café prompt>".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_bytes_flushed_lossily() {
        let mut channel = ScriptedChannel::new()
            .data(b"\xff\xfe")
            .pause(Duration::from_millis(10))
            .data(b"\xff\xfe");
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let (mut handler, seen) = recorder();

        let outcome = recv_text(
            &mut channel,
            &config(1),
            &AutoReplies::default(),
            &prompts,
            Some(&mut handler),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}");
        assert_eq!(outcome.prompt, None);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["\u{FFFD}\u{FFFD}\u{FFFD}\u{FFFD}".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_mid_sequence() {
        let mut channel = ScriptedChannel::new().data(b"ok \xe2\x82").close();
        let (mut handler, seen) = recorder();

        let outcome = recv_text(
            &mut channel,
            &config(30),
            &AutoReplies::default(),
            &PatternSet::default(),
            Some(&mut handler),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stop, StopReason::Closed);
        assert_eq!(outcome.text, "ok \u{FFFD}");
        assert_eq!(*seen.lock().unwrap(), vec!["ok \u{FFFD}".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_gets_each_chunk() {
        let mut channel = ScriptedChannel::new()
            .data("one ")
            .pause(Duration::from_millis(10))
            .data("two ")
            .pause(Duration::from_millis(10))
            .data("prompt>");
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let (mut handler, seen) = recorder();

        let outcome = recv_text(
            &mut channel,
            &config(30),
            &AutoReplies::default(),
            &prompts,
            Some(&mut handler),
        )
        .await
        .unwrap();

        assert_eq!(outcome.text, "one two prompt>");
        assert_eq!(*seen.lock().unwrap(), vec!["one ", "two ", "prompt>"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_chunk_size_drains_everything() {
        let mut channel = ScriptedChannel::new().data("a long line ending in prompt>");
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let config = ReaderConfig {
            recv_chunk_size: 3,
            ..config(30)
        };

        let outcome = recv_text(&mut channel, &config, &AutoReplies::default(), &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.text, "a long line ending in prompt>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_output_does_not_reset_deadline() {
        // Data keeps arriving every 2s but never matches; the 5s idle timeout
        // still fires because only auto-replies restart it.
        let mut channel = ScriptedChannel::new();
        for _ in 0..10 {
            channel = channel.pause(Duration::from_secs(2)).data("tick ");
        }
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let start = Instant::now();

        let outcome = recv_text(&mut channel, &config(5), &AutoReplies::default(), &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.stop, StopReason::Timeout);
        assert_eq!(outcome.text, "tick tick ");
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reply_resets_deadline() {
        // Without the reset at t=4s the prompt at t=8s would be missed.
        let mut channel = ScriptedChannel::new()
            .pause(Duration::from_secs(4))
            .data("Password:")
            .await_write()
            .pause(Duration::from_secs(4))
            .data("prompt>");
        let auto = replies(&[("Password:", "secret\n")]);
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let start = Instant::now();

        let outcome = recv_text(&mut channel, &config(5), &auto, &prompts, None)
            .await
            .unwrap();

        assert_eq!(outcome.prompt.as_deref(), Some("prompt>"));
        assert_eq!(start.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reply_skipped_when_final_data_arrives_with_close() {
        let mut channel = ScriptedChannel::new().hang_up_with("banner\nPassword:");
        let auto = replies(&[("Password:", "secret\n")]);
        let prompts = PatternSet::compile(["prompt>"]).unwrap();
        let (mut handler, seen) = recorder();

        let outcome = recv_text(&mut channel, &config(30), &auto, &prompts, Some(&mut handler))
            .await
            .unwrap();

        assert_eq!(outcome.text, "banner\nPassword:");
        assert_eq!(outcome.prompt, None);
        assert_eq!(outcome.stop, StopReason::Closed);
        assert_eq!(outcome.auto_replies_sent, 0);
        assert!(channel.writes().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["banner\nPassword:".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_to_closed_channel_fails() {
        let mut channel = ScriptedChannel::new().close();
        assert!(wait_recv_ready(&mut channel, Some(Duration::from_secs(1))).await);
        assert!(write_text(&mut channel, Encoding::Utf8, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_write_text_rejects_unencodable() {
        let mut channel = ScriptedChannel::new();
        assert!(write_text(&mut channel, Encoding::Ascii, "naïve").await.is_err());
        assert!(channel.writes().is_empty());
    }

    #[tokio::test]
    async fn test_write_text_reports_partial_write() {
        let mut channel = ScriptedChannel::new().with_write_limit(3);
        let written = write_text(&mut channel, Encoding::Utf8, "hello").await.unwrap();
        assert_eq!(written, 3);
    }
}

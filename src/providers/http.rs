//! HTTP plumbing shared by every vendor adapter: client construction, the
//! `data: ` SSE line splitter common to all five wire formats (spec §6.1),
//! and the generic SSE-body drain loop that feeds a [`StreamingProducer`].

use crate::error::{AdapterError, DispatchError};
use crate::streaming::StreamingProducer;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const USER_AGENT: &str = "llmdispatcher/1.0";

/// Builds one `reqwest::Client` per adapter (shared across calls — the
/// teacher's `connection_pool` idiom: a client is cheap to clone, expensive
/// to rebuild per request).
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Parses a `Retry-After` header value expressed in seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Buffers a growing byte stream into complete newline-terminated lines,
/// matching the teacher's `OpenAIStreamParser` buffering strategy.
#[derive(Default)]
pub struct LineSplitter {
    buffer: String,
}

impl LineSplitter {
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buffer.find('\n') {
            let line = self.buffer[..idx].trim_end_matches('\r').to_string();
            self.buffer.drain(..=idx);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}

/// Strips the `data: ` SSE prefix used by every vendor in spec §6.1 except
/// the raw-NDJSON Local transport. Lines without the prefix pass through
/// unchanged, which is what NDJSON vendors need.
pub fn strip_sse_prefix(line: &str) -> &str {
    line.strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))
        .unwrap_or(line)
        .trim()
}

/// Drains a chunked HTTP body line-by-line, handing each line to
/// `parse_event` and forwarding any content fragment it returns to the
/// streaming triad. Exits — closing the triad exactly once — on the
/// `[DONE]` sentinel, clean EOF, a decode/transport error, or cancellation.
///
/// `parse_event` returns `Ok(Some(fragment))` for a content delta,
/// `Ok(None)` for an event carrying no visible text (e.g. a non-delta
/// Anthropic event), and `Err` for a malformed chunk.
pub async fn drain_sse_body<S, F>(
    vendor: &'static str,
    mut body: S,
    producer: StreamingProducer,
    cancel: CancellationToken,
    mut parse_event: F,
) where
    S: Stream<Item = reqwest::Result<bytes::Bytes>> + Unpin,
    F: FnMut(&str) -> Result<Option<String>, AdapterError>,
{
    let mut splitter = LineSplitter::default();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                producer.finish_error(DispatchError::Canceled);
                return;
            }
            next = body.next() => {
                match next {
                    Some(Ok(bytes)) => {
                        let text = match std::str::from_utf8(&bytes) {
                            Ok(s) => s,
                            Err(e) => {
                                let err: DispatchError = (vendor, AdapterError::Decode(e.to_string())).into();
                                producer.finish_error(err);
                                return;
                            }
                        };
                        for line in splitter.push(text) {
                            let data = strip_sse_prefix(&line);
                            if data.is_empty() {
                                continue;
                            }
                            if data == "[DONE]" {
                                producer.finish_done();
                                return;
                            }
                            match parse_event(data) {
                                Ok(Some(fragment)) => producer.send_content(fragment).await,
                                Ok(None) => {}
                                Err(e) => {
                                    let err: DispatchError = (vendor, e).into();
                                    producer.finish_error(err);
                                    return;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let err: DispatchError = (vendor, AdapterError::from(e)).into();
                        producer.finish_error(err);
                        return;
                    }
                    None => {
                        producer.finish_done();
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_splitter_buffers_partial_lines() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push("data: {\"a\":1").is_empty());
        let lines = splitter.push("}\n");
        assert_eq!(lines, vec!["data: {\"a\":1}"]);
    }

    #[test]
    fn sse_prefix_is_stripped() {
        assert_eq!(strip_sse_prefix("data: [DONE]"), "[DONE]");
        assert_eq!(strip_sse_prefix("data:[DONE]"), "[DONE]");
        assert_eq!(strip_sse_prefix("{\"content\":\"hi\"}"), "{\"content\":\"hi\"}");
    }

    #[test]
    fn retry_after_parses_integer_seconds() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after("not-a-number"), None);
    }
}

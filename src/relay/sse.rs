//! Reassembly of OpenAI-style `data:` event streams into text deltas.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::debug;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    /// Explicit end of stream, distinct from the transport closing.
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Incremental line splitter for an event stream.
///
/// Bytes are buffered until a newline arrives, so frames and multi-byte
/// characters split across chunks survive. Frames that do not parse are
/// counted and skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
    skipped: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Frames skipped because their payload did not parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Feed one chunk; returns every event completed by it. Nothing is
    /// returned once the sentinel has been seen.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.parse_line(&line) {
                let done = event == SseEvent::Done;
                events.push(event);
                if done {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }

    /// Flush a final unterminated line once the transport has closed.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        if self.done || self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        let event = self.parse_line(&line);
        if event == Some(SseEvent::Done) {
            self.done = true;
        }
        event.into_iter().collect()
    }

    fn parse_line(&mut self, raw: &[u8]) -> Option<SseEvent> {
        let line = String::from_utf8_lossy(raw);
        let payload = line.trim_end_matches(['\n', '\r']).strip_prefix(DATA_PREFIX)?.trim();
        if payload == DONE_SENTINEL {
            return Some(SseEvent::Done);
        }

        match serde_json::from_str::<ChunkPayload>(payload) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .filter(|text| !text.is_empty())
                .map(SseEvent::Delta),
            Err(e) => {
                self.skipped += 1;
                debug!(error = %e, "skipping malformed stream frame");
                None
            }
        }
    }
}

/// Decode a byte stream into text deltas, ending at the sentinel or when the
/// byte stream ends, whichever comes first. A transport error is yielded once
/// and ends the stream.
pub fn decode_deltas<S, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    struct State<S> {
        chunks: S,
        decoder: SseDecoder,
        pending: VecDeque<String>,
        finished: bool,
    }

    let state = State {
        chunks,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(delta) = state.pending.pop_front() {
                return Some((Ok(delta), state));
            }
            if state.finished || state.decoder.is_done() {
                return None;
            }

            let events = match state.chunks.next().await {
                Some(Ok(chunk)) => state.decoder.feed(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    state.decoder.finish()
                }
            };

            state.pending.extend(events.into_iter().filter_map(|event| match event {
                SseEvent::Delta(text) => Some(text),
                SseEvent::Done => None,
            }));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn frame(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_decoder_yields_deltas() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(format!("{}{}", frame("Hel"), frame("lo")).as_bytes());
        assert_eq!(
            events,
            vec![SseEvent::Delta("Hel".into()), SseEvent::Delta("lo".into())]
        );
    }

    #[test]
    fn test_decoder_reassembles_split_frames() {
        let mut decoder = SseDecoder::new();
        let whole = frame("比特币");
        let bytes = whole.as_bytes();
        // Split inside the multi-byte characters.
        let (a, b) = bytes.split_at(bytes.len() / 2 + 1);
        assert!(decoder.feed(a).is_empty());
        assert_eq!(decoder.feed(b), vec![SseEvent::Delta("比特币".into())]);
    }

    #[test]
    fn test_decoder_skips_malformed_and_non_data_lines() {
        let mut decoder = SseDecoder::new();
        let input = format!(
            ": keep-alive\nevent: message\n{}data: {{not json\n\n{}",
            frame("a"),
            frame("b")
        );
        let events = decoder.feed(input.as_bytes());
        assert_eq!(
            events,
            vec![SseEvent::Delta("a".into()), SseEvent::Delta("b".into())]
        );
        assert_eq!(decoder.skipped(), 1);
    }

    #[test]
    fn test_decoder_stops_at_sentinel() {
        let mut decoder = SseDecoder::new();
        let input = format!("{}data: [DONE]\n\n{}", frame("a"), frame("late"));
        let events = decoder.feed(input.as_bytes());
        assert_eq!(events, vec![SseEvent::Delta("a".into()), SseEvent::Done]);
        assert!(decoder.is_done());
        assert!(decoder.feed(frame("later").as_bytes()).is_empty());
    }

    #[test]
    fn test_decoder_handles_crlf_and_empty_content() {
        let mut decoder = SseDecoder::new();
        let input = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\r\n\r\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n";
        assert_eq!(decoder.feed(input.as_bytes()), vec![SseEvent::Delta("x".into())]);
        assert_eq!(decoder.skipped(), 0);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let f = frame("tail");
        assert!(decoder.feed(f.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Delta("tail".into())]);
    }

    #[tokio::test]
    async fn test_decode_deltas_valid_malformed_sentinel() {
        let chunks = vec![
            Ok::<_, Infallible>(Bytes::from(frame("Hello"))),
            Ok(Bytes::from_static(b"data: {\"choices\": [oops\n\n")),
            Ok(Bytes::from_static(b"data: [DONE]\n\n")),
            Ok(Bytes::from(frame("never"))),
        ];
        let deltas: Vec<_> = decode_deltas(stream::iter(chunks)).collect().await;
        let deltas: Vec<String> = deltas.into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(deltas, vec!["Hello"]);
    }

    #[tokio::test]
    async fn test_decode_deltas_ends_on_transport_close() {
        let chunks = vec![Ok::<_, Infallible>(Bytes::from(frame("only")))];
        let deltas: Vec<_> = decode_deltas(stream::iter(chunks)).collect().await;
        assert_eq!(deltas.len(), 1);
    }

    #[tokio::test]
    async fn test_decode_deltas_surfaces_transport_error_once() {
        let chunks = vec![
            Ok(Bytes::from(frame("a"))),
            Err("connection reset"),
            Ok(Bytes::from(frame("b"))),
        ];
        let out: Vec<Result<String, &str>> = decode_deltas(stream::iter(chunks)).collect().await;
        assert_eq!(out, vec![Ok("a".to_string()), Err("connection reset")]);
    }
}

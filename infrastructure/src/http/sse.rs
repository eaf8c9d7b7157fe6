//! Server-sent events reader for the crawl status channel.
//!
//! The channel is a long-lived `text/event-stream` response. Each message's
//! `data:` payload is one JSON crawl event. Framing follows the usual SSE
//! rules: `field: value` lines, `:` comments, and a blank line to dispatch.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use sitechat_application::{EventSource, SourceError, Utf8ChunkDecoder};
use sitechat_domain::CrawlEvent;
use sitechat_domain::util::truncate_str;
use std::collections::VecDeque;
use std::pin::Pin;
use tracing::debug;

/// One dispatched SSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE line parser.
///
/// Text may arrive split anywhere, including inside a line or between the
/// `\r` and `\n` of a line ending.
#[derive(Debug, Default)]
pub struct SseParser {
    line: String,
    data: Vec<String>,
    event: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed decoded text, returning every message completed by it.
    pub fn feed(&mut self, text: &str) -> Vec<SseMessage> {
        let mut out = Vec::new();
        for c in text.chars() {
            if c == '\n' {
                let line = std::mem::take(&mut self.line);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                if let Some(message) = self.process_line(line) {
                    out.push(message);
                }
            } else {
                self.line.push(c);
            }
        }
        out
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id, retry
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage { event, data })
    }
}

/// Parse one message's payload into a crawl event.
pub fn parse_crawl_event(message: &SseMessage) -> Result<CrawlEvent, SourceError> {
    serde_json::from_str(&message.data).map_err(|e| {
        SourceError::Malformed(format!("{} in {:?}", e, truncate_str(&message.data, 80)))
    })
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, SourceError>> + Send>>;

/// [`EventSource`] of crawl events read from an SSE byte stream.
///
/// A message cut off by the end of the stream is discarded.
pub struct SseEventSource {
    stream: ByteStream,
    decoder: Utf8ChunkDecoder,
    parser: SseParser,
    pending: VecDeque<SseMessage>,
    finished: bool,
}

impl SseEventSource {
    pub fn new(stream: impl Stream<Item = Result<Vec<u8>, SourceError>> + Send + 'static) -> Self {
        Self {
            stream: Box::pin(stream),
            decoder: Utf8ChunkDecoder::new(),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

#[async_trait]
impl EventSource for SseEventSource {
    type Item = CrawlEvent;

    async fn next_event(&mut self) -> Option<Result<CrawlEvent, SourceError>> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                debug!("SSE message ({} bytes)", message.data.len());
                return Some(parse_crawl_event(&message));
            }
            if self.finished {
                return None;
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    let text = self.decoder.decode(&chunk);
                    let messages = self.parser.feed(&text);
                    self.pending.extend(messages);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    let tail = self.decoder.finish();
                    let messages = self.parser.feed(&tail);
                    self.pending.extend(messages);
                }
            }
        }
    }
}

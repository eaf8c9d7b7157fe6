//! Asynchronous event sources.
//!
//! The conversation byte stream (pulled chunk by chunk) and the crawl status
//! channel (pushed event by event) are both consumed through [`EventSource`],
//! so either engine can be driven by a [`ScriptedSource`] or a
//! [`ChannelSource`] in tests and by HTTP-backed sources in production.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use sitechat_domain::CrawlEvent;
use std::collections::VecDeque;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors raised while reading from an event source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed event: {0}")]
    Malformed(String),
}

/// A source of items that arrive over time.
///
/// `None` means the source ended normally. An `Err` item does not by itself
/// close the source; consumers decide whether to keep reading.
#[async_trait]
pub trait EventSource: Send {
    type Item: Send;

    /// Suspend until the next item or end-of-source.
    async fn next_event(&mut self) -> Option<Result<Self::Item, SourceError>>;
}

/// Raw byte chunks of a streamed answer.
pub type ByteSource = Box<dyn EventSource<Item = Vec<u8>>>;

/// Discrete crawl status events.
pub type CrawlEventSource = Box<dyn EventSource<Item = CrawlEvent>>;

/// A pre-recorded sequence of items, replayed in order.
pub struct ScriptedSource<T> {
    items: VecDeque<Result<T, SourceError>>,
}

impl<T: Send + 'static> ScriptedSource<T> {
    pub fn new(items: impl IntoIterator<Item = Result<T, SourceError>>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Script that yields every item successfully, then ends.
    pub fn ok(items: impl IntoIterator<Item = T>) -> Self {
        Self::new(items.into_iter().map(Ok))
    }

    pub fn boxed(self) -> Box<dyn EventSource<Item = T>> {
        Box::new(self)
    }
}

impl ScriptedSource<Vec<u8>> {
    /// Script of text chunks, as the transport would deliver them.
    pub fn chunks<'a>(chunks: impl IntoIterator<Item = &'a str>) -> Self {
        Self::ok(chunks.into_iter().map(|c| c.as_bytes().to_vec()))
    }
}

#[async_trait]
impl<T: Send + 'static> EventSource for ScriptedSource<T> {
    type Item = T;

    async fn next_event(&mut self) -> Option<Result<T, SourceError>> {
        self.items.pop_front()
    }
}

/// Source fed from an unbounded channel; ends when every sender is dropped.
pub struct ChannelSource<T> {
    rx: mpsc::UnboundedReceiver<Result<T, SourceError>>,
}

impl<T: Send + 'static> ChannelSource<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<T, SourceError>>) -> Self {
        Self { rx }
    }

    /// Create a connected sender/source pair.
    pub fn pair() -> (mpsc::UnboundedSender<Result<T, SourceError>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    pub fn boxed(self) -> Box<dyn EventSource<Item = T>> {
        Box::new(self)
    }
}

#[async_trait]
impl<T: Send + 'static> EventSource for ChannelSource<T> {
    type Item = T;

    async fn next_event(&mut self) -> Option<Result<T, SourceError>> {
        self.rx.recv().await
    }
}

/// Adapter from any `futures` stream of results.
pub struct StreamSource<T> {
    stream: Pin<Box<dyn Stream<Item = Result<T, SourceError>> + Send>>,
}

impl<T: Send + 'static> StreamSource<T> {
    pub fn new(stream: impl Stream<Item = Result<T, SourceError>> + Send + 'static) -> Self {
        Self {
            stream: Box::pin(stream),
        }
    }

    pub fn boxed(self) -> Box<dyn EventSource<Item = T>> {
        Box::new(self)
    }
}

#[async_trait]
impl<T: Send + 'static> EventSource for StreamSource<T> {
    type Item = T;

    async fn next_event(&mut self) -> Option<Result<T, SourceError>> {
        self.stream.next().await
    }
}

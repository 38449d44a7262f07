//! Streamed completions
//!
//! A [`StreamingResponse`] is finite and cannot be restarted. Dropping it
//! drops the underlying provider stream, which closes the HTTP body.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};

use crate::error::{Error, Result};

/// One item of a completion stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamingChoice {
    /// Answer text
    Message(String),
    /// Reasoning text some models emit before answering; never part of the answer
    Thought(String),
    /// End of the answer
    Done,
}

type BoxedChoices = Pin<Box<dyn Stream<Item = Result<StreamingChoice>> + Send>>;

/// Completion stream returned by every backend
pub struct StreamingResponse {
    inner: BoxedChoices,
}

impl StreamingResponse {
    /// Wrap any stream of choices
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamingChoice>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Fail with [`Error::StreamTimeout`] if the gap between two items exceeds `limit`.
    ///
    /// The stream ends after reporting the timeout.
    pub fn with_idle_timeout(self, limit: Duration) -> Self {
        let timeout_secs = limit.as_secs();
        let stream = futures::stream::unfold(Some(self.inner), move |state| async move {
            let mut inner = state?;
            match tokio::time::timeout(limit, inner.next()).await {
                Ok(Some(item)) => Some((item, Some(inner))),
                Ok(None) => None,
                Err(_) => Some((Err(Error::StreamTimeout { timeout_secs }), None)),
            }
        });
        Self::from_stream(stream)
    }

    /// Concatenate all answer text up to `Done` or the end of the stream
    pub async fn collect_text(self) -> Result<String> {
        let mut text = String::new();
        self.for_each_text(|chunk| text.push_str(chunk)).await?;
        Ok(text)
    }

    /// Hand each answer chunk to `sink` as it arrives.
    ///
    /// Stops at `Done`; the first error ends the stream and is returned.
    pub async fn for_each_text<F>(mut self, mut sink: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        while let Some(item) = self.inner.next().await {
            match item? {
                StreamingChoice::Message(text) => sink(&text),
                StreamingChoice::Thought(_) => {}
                StreamingChoice::Done => break,
            }
        }
        Ok(())
    }
}

impl Stream for StreamingResponse {
    type Item = Result<StreamingChoice>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Scripted stream for tests and offline backends
#[derive(Default)]
pub struct MockStreamBuilder {
    items: Vec<Result<StreamingChoice>>,
}

impl MockStreamBuilder {
    /// Empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer chunk
    pub fn message(mut self, text: impl Into<String>) -> Self {
        self.items.push(Ok(StreamingChoice::Message(text.into())));
        self
    }

    /// Reasoning chunk
    pub fn thought(mut self, text: impl Into<String>) -> Self {
        self.items.push(Ok(StreamingChoice::Thought(text.into())));
        self
    }

    /// `Done` marker
    pub fn done(mut self) -> Self {
        self.items.push(Ok(StreamingChoice::Done));
        self
    }

    /// Failure at this point of the stream
    pub fn error(mut self, error: Error) -> Self {
        self.items.push(Err(error));
        self
    }

    /// `text` as answer chunks of `size` characters
    pub fn chunked(mut self, text: &str, size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        for piece in chars.chunks(size.max(1)) {
            self = self.message(piece.iter().collect::<String>());
        }
        self
    }

    /// Finish the script
    pub fn build(self) -> StreamingResponse {
        StreamingResponse::from_stream(futures::stream::iter(self.items))
    }
}

//! Chunked response body for composed chapters.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Bytes;
use futures_util::stream::Stream;
use tracing::{debug, warn};

use super::service::{PipelineState, transition};

/// Size of each body frame.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Streams an in-memory image in [`CHUNK_SIZE`] frames.
///
/// Headers are already committed when this runs, so a dropped connection
/// cannot be reported to the client. It is logged when the body is dropped
/// before the last frame was handed out.
#[derive(Debug)]
pub struct ChunkedImage {
    chapter_id: String,
    data: Bytes,
    offset: usize,
}

impl ChunkedImage {
    /// Wraps `data` for streaming.
    #[must_use]
    pub fn new(chapter_id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            chapter_id: chapter_id.into(),
            data: data.into(),
            offset: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.offset >= self.data.len()
    }
}

impl Stream for ChunkedImage {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_complete() {
            return Poll::Ready(None);
        }
        let end = (self.offset + CHUNK_SIZE).min(self.data.len());
        let chunk = self.data.slice(self.offset..end);
        self.offset = end;
        if self.is_complete() {
            debug!(chapter_id = %self.chapter_id, bytes = self.data.len(), "chapter image written");
            transition(&self.chapter_id, PipelineState::Done);
        }
        Poll::Ready(Some(Ok(chunk)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.data.len() - self.offset).div_ceil(CHUNK_SIZE);
        (remaining, Some(remaining))
    }
}

impl Drop for ChunkedImage {
    fn drop(&mut self) {
        if !self.is_complete() {
            warn!(
                chapter_id = %self.chapter_id,
                written = self.offset,
                total = self.data.len(),
                "client went away before the chapter image was fully written"
            );
            transition(&self.chapter_id, PipelineState::Error);
        }
    }
}

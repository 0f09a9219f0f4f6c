//! Async adapter for [`ZipStream`]
//!
//! The encoder does blocking reads, so it runs on Tokio's blocking pool and
//! hands chunks over a bounded channel. The channel capacity bounds how far
//! the producer can run ahead of the consumer; a full channel suspends it.
//! Dropping the [`AsyncZipStream`] closes the channel, the producer stops at
//! its next send, and the encoder (with every source it still holds) is dropped.

use crate::error::Result;
use crate::stream::ZipStream;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Chunks of a [`ZipStream`] delivered as a `futures` stream
pub struct AsyncZipStream {
    rx: mpsc::Receiver<Result<Vec<u8>>>,
}

impl ZipStream {
    /// Move the encoder onto the blocking pool and receive its chunks asynchronously
    ///
    /// At most `capacity` chunks are buffered ahead of the consumer.
    /// Must be called from within a Tokio runtime.
    pub fn into_async(self, capacity: usize) -> AsyncZipStream {
        assert!(capacity > 0, "capacity must be at least 1");
        let (tx, rx) = mpsc::channel(capacity);

        tokio::task::spawn_blocking(move || {
            for chunk in self {
                if tx.blocking_send(chunk).is_err() {
                    // Receiver dropped; `self` goes out of scope with the loop
                    break;
                }
            }
        });

        AsyncZipStream { rx }
    }
}

impl Stream for AsyncZipStream {
    type Item = Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for AsyncZipStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncZipStream").finish_non_exhaustive()
    }
}

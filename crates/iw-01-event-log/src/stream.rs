//! Stream adaptor over the panel push channel.

use shared_types::PanelMessage;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::warn;

/// Pushed panel messages as a `tokio_stream::Stream`.
///
/// A subscriber that falls behind skips the messages it missed and carries
/// on; it never holds up appends.
pub struct EventStream {
    inner: BroadcastStream<PanelMessage>,
}

impl EventStream {
    #[must_use]
    pub fn new(receiver: broadcast::Receiver<PanelMessage>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }
}

impl Stream for EventStream {
    type Item = PanelMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(message))) => return Poll::Ready(Some(message)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "Panel subscriber lagged, skipping events");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

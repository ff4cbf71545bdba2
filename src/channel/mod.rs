//! Event channel - FIFO buffer between the loader and its consumer
//!
//! Thin wrapper over `tokio::sync::mpsc`:
//! - Bounded (capacity > 0): `send` waits while the buffer is full
//! - Unbounded (capacity 0): `send` never waits
//!
//! `recv` waits while the buffer is empty and the sender is alive, and
//! returns `None` (end of stream) once the sender is dropped and every
//! buffered event has been taken.

use tokio::sync::mpsc;

use crate::common::{Event, PipelineError, PipelineResult};

enum SenderInner<P> {
    Bounded(mpsc::Sender<Event<P>>),
    Unbounded(mpsc::UnboundedSender<Event<P>>),
}

enum ReceiverInner<P> {
    Bounded(mpsc::Receiver<Event<P>>),
    Unbounded(mpsc::UnboundedReceiver<Event<P>>),
}

/// Producer half
pub struct EventSender<P> {
    inner: SenderInner<P>,
}

/// Consumer half
pub struct EventReceiver<P> {
    inner: ReceiverInner<P>,
}

/// Create a channel; `capacity == 0` selects an unbounded buffer
pub fn event_channel<P>(capacity: usize) -> (EventSender<P>, EventReceiver<P>) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            EventSender {
                inner: SenderInner::Unbounded(tx),
            },
            EventReceiver {
                inner: ReceiverInner::Unbounded(rx),
            },
        )
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (
            EventSender {
                inner: SenderInner::Bounded(tx),
            },
            EventReceiver {
                inner: ReceiverInner::Bounded(rx),
            },
        )
    }
}

impl<P> EventSender<P> {
    /// Enqueue one event, waiting for space if the buffer is full
    ///
    /// Fails with [`PipelineError::ChannelClosed`] if the consumer is gone.
    pub async fn send(&self, event: Event<P>) -> PipelineResult<()> {
        match &self.inner {
            SenderInner::Bounded(tx) => tx.send(event).await,
            SenderInner::Unbounded(tx) => tx.send(event),
        }
        .map_err(|_| PipelineError::ChannelClosed)
    }

    /// True once the consumer half has been dropped or closed
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Bounded(tx) => tx.is_closed(),
            SenderInner::Unbounded(tx) => tx.is_closed(),
        }
    }
}

impl<P> EventReceiver<P> {
    /// Dequeue the next event; `None` is end of stream
    pub async fn recv(&mut self) -> Option<Event<P>> {
        match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.recv().await,
            ReceiverInner::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Refuse further sends; already buffered events can still be received
    pub fn close(&mut self) {
        match &mut self.inner {
            ReceiverInner::Bounded(rx) => rx.close(),
            ReceiverInner::Unbounded(rx) => rx.close(),
        }
    }
}

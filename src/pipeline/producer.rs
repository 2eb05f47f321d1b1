//! Bridge from synchronous request handlers into the stream.
//!
//! The buffer is a bounded tokio mpsc queue. Admission is fail-fast: when the
//! queue is full, or once the producer has been closed or its subscriber has
//! gone away, `produce` returns an error instead of waiting, dropping or
//! retrying. Callers that prefer to wait for capacity opt in explicitly with
//! `produce_wait` (see `OverflowPolicy::Block`).
//!
//! The output side is unicast: exactly one `TextSubscription` is ever handed
//! out per producer.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::TextEvent;

pub const DEFAULT_BUFFER_CAPACITY: usize = 256;

/// What admission does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the event with `ProduceError::BufferFull`.
    #[default]
    FailFast,
    /// Suspend the caller until the subscriber frees a slot.
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProduceError {
    #[error("producer buffer is full ({capacity} events), event rejected")]
    BufferFull { capacity: usize },

    #[error("producer is closed, event rejected")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    #[error("producer output already has a subscriber")]
    AlreadySubscribed,
}

/// Intake side of the pipeline, called once per incoming text.
pub trait TextProducer: Send + Sync {
    fn produce(&self, event: TextEvent) -> Result<(), ProduceError>;

    /// Like `produce`, but allowed to wait for buffer capacity.
    /// Producers without a notion of capacity just admit immediately.
    fn produce_wait(
        &self,
        event: TextEvent,
    ) -> impl Future<Output = Result<(), ProduceError>> + Send {
        let result = self.produce(event);
        async move { result }
    }
}

pub struct TextStreamProducer {
    capacity: usize,
    sender: Mutex<Option<mpsc::Sender<TextEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<TextEvent>>>,
    closed: CancellationToken,
}

impl TextStreamProducer {
    pub fn new(capacity: usize) -> Self {
        // tokio rejects zero-capacity channels
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity,
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            closed: CancellationToken::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hands out the one and only subscription. Not restartable.
    pub fn subscribe(&self) -> Result<TextSubscription, SubscribeError> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SubscribeError::AlreadySubscribed)?;

        debug!("Text producer subscribed");
        Ok(TextSubscription {
            inner: ReceiverStream::new(receiver),
        })
    }

    /// Stops admission. Events already buffered are still delivered, after
    /// which the subscription ends. Pending `produce_wait` calls fail with
    /// `ProduceError::Closed`.
    pub fn close(&self) {
        self.closed.cancel();
        if self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            info!("Text producer closed");
        }
    }

    /// True once `close` was called or the subscription was dropped.
    pub fn is_closed(&self) -> bool {
        match self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<TextEvent>> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for TextStreamProducer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl TextProducer for TextStreamProducer {
    fn produce(&self, event: TextEvent) -> Result<(), ProduceError> {
        // Lock held across try_send so concurrent callers are admitted one at
        // a time, in the order they acquire the lock.
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(ProduceError::Closed)?;

        sender.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => {
                warn!(capacity = self.capacity, "Text producer buffer full, rejecting event");
                ProduceError::BufferFull {
                    capacity: self.capacity,
                }
            }
            TrySendError::Closed(_) => {
                warn!("Text producer has no subscriber left, rejecting event");
                ProduceError::Closed
            }
        })
    }

    fn produce_wait(
        &self,
        event: TextEvent,
    ) -> impl Future<Output = Result<(), ProduceError>> + Send {
        let sender = self.sender();
        let closed = self.closed.clone();
        async move {
            let Some(tx) = sender else {
                return Err(ProduceError::Closed);
            };
            tokio::select! {
                biased;
                _ = closed.cancelled() => {
                    warn!("Text producer closed while waiting for capacity, rejecting event");
                    Err(ProduceError::Closed)
                }
                sent = tx.send(event) => sent.map_err(|_| ProduceError::Closed),
            }
        }
    }
}

/// Lazy, single-subscriber sequence of produced events, in admission order.
///
/// Dropping it (or calling `close`) releases the buffer and makes further
/// `produce` calls fail with `ProduceError::Closed`.
#[derive(Debug)]
pub struct TextSubscription {
    inner: ReceiverStream<TextEvent>,
}

impl TextSubscription {
    /// Waits for the next event. `None` once the producer is closed and drained.
    pub async fn recv(&mut self) -> Option<TextEvent> {
        self.inner.as_mut().recv().await
    }

    /// Refuses new admissions; already buffered events can still be received.
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl Stream for TextSubscription {
    type Item = TextEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

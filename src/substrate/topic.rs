use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::codec::{CodecError, Message};
use crate::event::Record;

#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("topic '{topic}' has no reader")]
    Closed { topic: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Creates a named, bounded FIFO topic with one reader.
///
/// Publishers wait when the topic is full; the reader sees `None` once every
/// publisher has been dropped and the backlog is drained.
pub fn topic(name: &str, capacity: usize) -> (TopicPublisher, TopicReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let name: Arc<str> = Arc::from(name);
    (
        TopicPublisher {
            name: name.clone(),
            tx,
        },
        TopicReader { name, rx },
    )
}

#[derive(Debug, Clone)]
pub struct TopicPublisher {
    name: Arc<str>,
    tx: mpsc::Sender<Message>,
}

impl TopicPublisher {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn publish(&self, message: Message) -> Result<(), TopicError> {
        self.tx.send(message).await.map_err(|_| TopicError::Closed {
            topic: self.name.to_string(),
        })
    }

    pub async fn publish_record<T: Serialize>(&self, record: &Record<T>) -> Result<(), TopicError> {
        self.publish(Message::encode(record)?).await
    }
}

#[derive(Debug)]
pub struct TopicReader {
    name: Arc<str>,
    rx: mpsc::Receiver<Message>,
}

impl TopicReader {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn read(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

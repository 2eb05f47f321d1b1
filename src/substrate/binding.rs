//! Bindings move records between the pipeline stages and topics.
//! Each one is a long-running task; it returns once its input is exhausted.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::topic::{TopicPublisher, TopicReader};
use crate::event::{LengthEvent, Record};
use crate::pipeline::{LengthConsumer, TextSubscription, Transform};

/// How often the sink binding hands a record to the consumer before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Producer subscription -> topic. Records leave unkeyed.
///
/// Stops when the producer is closed and drained, when the topic loses its
/// reader, or when `cancel` fires. In the last case the subscription is
/// dropped along with whatever it still buffered.
pub async fn run_source(
    mut subscription: TextSubscription,
    output: TopicPublisher,
    cancel: CancellationToken,
) {
    info!(topic = output.name(), "Source binding started");

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Source binding cancelled");
                break;
            }
            next = subscription.recv() => match next {
                Some(event) => event,
                None => break,
            },
        };

        if let Err(e) = output.publish_record(&Record::unkeyed(event)).await {
            error!("Source binding failed to publish: {}", e);
            break;
        }
    }

    info!(topic = output.name(), "Source binding stopped");
}

/// Topic -> transform -> topic. Keys pass through untouched.
///
/// Payloads that fail to decode are logged and skipped; that is a codec
/// problem, not a transform one.
pub async fn run_processor<T>(transform: T, mut input: TopicReader, output: TopicPublisher)
where
    T: Transform,
    T::Input: DeserializeOwned,
    T::Output: Serialize,
{
    info!(from = input.name(), to = output.name(), "Processor binding started");

    while let Some(message) = input.read().await {
        let record: Record<T::Input> = match message.decode() {
            Ok(record) => record,
            Err(e) => {
                error!(message_id = %message.id, topic = input.name(), "Skipping undecodable record: {}", e);
                continue;
            }
        };

        let derived = record.map(|value| transform.apply(&value));
        if let Err(e) = output.publish_record(&derived).await {
            error!("Processor binding failed to publish: {}", e);
            break;
        }
    }

    info!(from = input.name(), to = output.name(), "Processor binding stopped");
}

/// Topic -> consumer, with redelivery on consumer failure.
///
/// After `max_attempts` failed deliveries the record is logged and dropped so
/// the rest of the topic keeps flowing.
pub async fn run_sink<C>(consumer: C, mut input: TopicReader, policy: RedeliveryPolicy)
where
    C: LengthConsumer,
{
    info!(topic = input.name(), "Sink binding started");

    while let Some(message) = input.read().await {
        let record: Record<LengthEvent> = match message.decode() {
            Ok(record) => record,
            Err(e) => {
                error!(message_id = %message.id, topic = input.name(), "Skipping undecodable record: {}", e);
                continue;
            }
        };

        let mut attempt = 1;
        loop {
            match consumer.consume(&record.value) {
                Ok(()) => {
                    debug!(message_id = %message.id, attempt, "Record consumed");
                    break;
                }
                Err(e) if attempt < policy.max_attempts => {
                    warn!(message_id = %message.id, attempt, "Consumer failed, redelivering: {:#}", e);
                    tokio::time::sleep(policy.backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        message_id = %message.id,
                        key = ?record.key,
                        attempts = attempt,
                        "Dropping record after failed redelivery: {:#}",
                        e
                    );
                    break;
                }
            }
        }
    }

    info!(topic = input.name(), "Sink binding stopped");
}

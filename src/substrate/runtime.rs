use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::binding::{run_processor, run_sink, run_source, RedeliveryPolicy};
use super::topic::topic;
use crate::config::BindingsConfig;
use crate::event::{LengthEvent, TextEvent};
use crate::pipeline::{LengthConsumer, SubscribeError, TextStreamProducer, Transform};

/// The running pipeline:
/// producer -> source -> [text topic] -> processor -> [length topic] -> sink -> consumer
pub struct StreamRuntime {
    producer: Arc<TextStreamProducer>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamRuntime {
    /// Subscribes to `producer` (once, for good) and spawns the three bindings.
    /// Must be called from within a tokio runtime.
    pub fn start<T, C>(
        config: &BindingsConfig,
        producer: Arc<TextStreamProducer>,
        transform: T,
        consumer: C,
    ) -> Result<Self, SubscribeError>
    where
        T: Transform<Input = TextEvent, Output = LengthEvent> + 'static,
        C: LengthConsumer + 'static,
    {
        let subscription = producer.subscribe()?;
        let cancel = CancellationToken::new();

        let (text_out, text_in) = topic(&config.text_topic, config.topic_capacity);
        let (length_out, length_in) = topic(&config.length_topic, config.topic_capacity);

        let policy = RedeliveryPolicy {
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        };

        let tasks = vec![
            tokio::spawn(run_source(subscription, text_out, cancel.clone())),
            tokio::spawn(run_processor(transform, text_in, length_out)),
            tokio::spawn(run_sink(consumer, length_in, policy)),
        ];

        info!(
            text_topic = %config.text_topic,
            length_topic = %config.length_topic,
            "Stream runtime started"
        );

        Ok(Self {
            producer,
            cancel,
            tasks,
        })
    }

    /// Graceful stop: closes the producer, lets every admitted event reach the
    /// consumer, then waits for the bindings to finish.
    pub async fn shutdown(self) {
        self.producer.close();
        self.join().await;
    }

    /// Hard stop: drops the producer subscription right away. Events still in
    /// the producer buffer are discarded and later `produce` calls fail.
    /// Records already on a topic are still delivered.
    pub async fn cancel(self) {
        self.cancel.cancel();
        self.join().await;
    }

    async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Binding task ended abnormally: {}", e);
            }
        }
        info!("Stream runtime stopped");
    }
}

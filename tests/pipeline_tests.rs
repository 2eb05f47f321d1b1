use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use multibinder::config::BindingsConfig;
use multibinder::pipeline::{
    LengthProcessor, LengthStreamConsumer, ProduceError, TextLengthTransform, TextProducer,
    TextStreamProducer,
};
use multibinder::substrate::binding::{run_processor, run_sink};
use multibinder::substrate::{topic, Message, RedeliveryPolicy};
use multibinder::{LengthEvent, Record, StreamRuntime, TextEvent};

#[derive(Default)]
struct RecordingProcessor {
    seen: Mutex<Vec<LengthEvent>>,
}

impl RecordingProcessor {
    fn seen(&self) -> Vec<LengthEvent> {
        self.seen.lock().unwrap().clone()
    }
}

impl LengthProcessor for RecordingProcessor {
    fn process(&self, event: &LengthEvent) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(*event);
        Ok(())
    }
}

/// Fails its first `failures` calls, then records like `RecordingProcessor`.
struct FlakyProcessor {
    failures: u32,
    calls: AtomicU32,
    seen: Mutex<Vec<LengthEvent>>,
}

impl FlakyProcessor {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl LengthProcessor for FlakyProcessor {
    fn process(&self, event: &LengthEvent) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(anyhow!("transient failure #{call}"));
        }
        self.seen.lock().unwrap().push(*event);
        Ok(())
    }
}

fn fast_bindings() -> BindingsConfig {
    BindingsConfig {
        retry_backoff_ms: 1,
        ..BindingsConfig::default()
    }
}

fn fast_policy(max_attempts: u32) -> RedeliveryPolicy {
    RedeliveryPolicy {
        max_attempts,
        backoff: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn test_should_process_text_lengths() {
    let producer = Arc::new(TextStreamProducer::new(16));
    let processor = Arc::new(RecordingProcessor::default());

    let runtime = StreamRuntime::start(
        &fast_bindings(),
        producer.clone(),
        TextLengthTransform,
        LengthStreamConsumer::new(processor.clone()),
    )
    .unwrap();

    producer.produce(TextEvent::new("Do")).unwrap();
    producer.produce(TextEvent::new("or do not")).unwrap();
    producer.produce(TextEvent::new("there is no try")).unwrap();

    // Graceful shutdown drains everything already admitted
    runtime.shutdown().await;

    assert_eq!(
        processor.seen(),
        vec![LengthEvent::new(2), LengthEvent::new(9), LengthEvent::new(15)]
    );
}

#[tokio::test]
async fn test_runtime_subscribes_exactly_once() {
    let producer = Arc::new(TextStreamProducer::new(4));
    let _subscription = producer.subscribe().unwrap();

    let result = StreamRuntime::start(
        &fast_bindings(),
        producer,
        TextLengthTransform,
        LengthStreamConsumer::new(Arc::new(RecordingProcessor::default())),
    );
    assert!(result.is_err(), "Runtime must not share an already subscribed producer");
}

#[tokio::test]
async fn test_produce_fails_after_runtime_shutdown() {
    let producer = Arc::new(TextStreamProducer::new(4));
    let runtime = StreamRuntime::start(
        &fast_bindings(),
        producer.clone(),
        TextLengthTransform,
        LengthStreamConsumer::new(Arc::new(RecordingProcessor::default())),
    )
    .unwrap();

    runtime.shutdown().await;

    assert_eq!(producer.produce(TextEvent::new("anyone?")), Err(ProduceError::Closed));
}

#[tokio::test]
async fn test_cancel_releases_producer() {
    let producer = Arc::new(TextStreamProducer::new(4));
    let runtime = StreamRuntime::start(
        &fast_bindings(),
        producer.clone(),
        TextLengthTransform,
        LengthStreamConsumer::new(Arc::new(RecordingProcessor::default())),
    )
    .unwrap();

    runtime.cancel().await;

    assert!(producer.is_closed(), "Cancelled subscription must release the buffer");
    assert_eq!(producer.produce(TextEvent::new("ghost")), Err(ProduceError::Closed));
}

#[tokio::test]
async fn test_should_produce_length_events_from_text_events() {
    let (text_out, text_in) = topic("topic.in", 8);
    let (length_out, mut length_in) = topic("topic.out", 8);
    let processor = tokio::spawn(run_processor(TextLengthTransform, text_in, length_out));

    text_out.publish_record(&Record::keyed("key1", TextEvent::new("Hello!"))).await.unwrap();
    text_out.publish_record(&Record::keyed("key2", TextEvent::new("How are you?"))).await.unwrap();
    text_out.publish_record(&Record::keyed("key3", TextEvent::new("Bye!"))).await.unwrap();
    drop(text_out);
    processor.await.unwrap();

    let mut output = Vec::new();
    while let Some(message) = length_in.read().await {
        output.push(message.decode::<LengthEvent>().unwrap());
    }

    assert_eq!(
        output,
        vec![
            Record::keyed("key1", LengthEvent::new(6)),
            Record::keyed("key2", LengthEvent::new(12)),
            Record::keyed("key3", LengthEvent::new(4)),
        ]
    );
}

#[tokio::test]
async fn test_processor_skips_undecodable_records() {
    let (text_out, text_in) = topic("topic.in", 8);
    let (length_out, mut length_in) = topic("topic.out", 8);
    let processor = tokio::spawn(run_processor(TextLengthTransform, text_in, length_out));

    text_out.publish(Message::new(Some("bad".into()), b"not json".to_vec())).await.unwrap();
    text_out.publish_record(&Record::keyed("good", TextEvent::new("ok"))).await.unwrap();
    drop(text_out);
    processor.await.unwrap();

    let first = length_in.read().await.expect("good record should come through");
    assert_eq!(first.decode::<LengthEvent>().unwrap(), Record::keyed("good", LengthEvent::new(2)));
    assert!(length_in.read().await.is_none());
}

#[tokio::test]
async fn test_sink_redelivers_until_consumer_succeeds() {
    let processor = Arc::new(FlakyProcessor::new(2));
    let (length_out, length_in) = topic("length", 8);
    let sink = tokio::spawn(run_sink(
        LengthStreamConsumer::new(processor.clone()),
        length_in,
        fast_policy(3),
    ));

    length_out.publish_record(&Record::unkeyed(LengthEvent::new(42))).await.unwrap();
    drop(length_out);
    sink.await.unwrap();

    assert_eq!(processor.calls.load(Ordering::SeqCst), 3, "Two failures, then success");
    assert_eq!(*processor.seen.lock().unwrap(), vec![LengthEvent::new(42)]);
}

#[tokio::test]
async fn test_sink_gives_up_after_max_attempts_and_moves_on() {
    // Fails the whole first record (3 attempts), succeeds on the second
    let processor = Arc::new(FlakyProcessor::new(3));
    let (length_out, length_in) = topic("length", 8);
    let sink = tokio::spawn(run_sink(
        LengthStreamConsumer::new(processor.clone()),
        length_in,
        fast_policy(3),
    ));

    length_out.publish_record(&Record::unkeyed(LengthEvent::new(1))).await.unwrap();
    length_out.publish_record(&Record::unkeyed(LengthEvent::new(2))).await.unwrap();
    drop(length_out);
    sink.await.unwrap();

    assert_eq!(processor.calls.load(Ordering::SeqCst), 4);
    assert_eq!(*processor.seen.lock().unwrap(), vec![LengthEvent::new(2)]);
}

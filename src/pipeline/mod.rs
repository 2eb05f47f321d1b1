//! The three pipeline stages: producer, transform, consumer.
//!
//! None of these know about topics, codecs or HTTP; the substrate and the
//! ingress drive them from the outside.

pub mod consumer;
pub mod producer;
pub mod transform;

pub use consumer::{LengthConsoleProcessor, LengthConsumer, LengthProcessor, LengthStreamConsumer};
pub use producer::{
    OverflowPolicy, ProduceError, SubscribeError, TextProducer, TextStreamProducer,
    TextSubscription,
};
pub use transform::{TextLengthTransform, Transform};

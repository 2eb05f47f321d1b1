//! In-process stand-in for the message broker: keyed topics with JSON
//! payloads, and the bindings that connect pipeline stages to them.

pub mod binding;
pub mod codec;
pub mod runtime;
pub mod topic;

pub use binding::RedeliveryPolicy;
pub use codec::{CodecError, JsonCodec, Message};
pub use runtime::StreamRuntime;
pub use topic::{topic, TopicError, TopicPublisher, TopicReader};

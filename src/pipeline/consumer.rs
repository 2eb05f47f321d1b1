use std::sync::Arc;

use tracing::info;

use crate::event::LengthEvent;

/// Side-effecting handler for one length event (logging, persistence,
/// alerting, ...). Errors go back to whoever delivered the event.
pub trait LengthProcessor: Send + Sync {
    fn process(&self, event: &LengthEvent) -> anyhow::Result<()>;
}

impl<P: LengthProcessor + ?Sized> LengthProcessor for Arc<P> {
    fn process(&self, event: &LengthEvent) -> anyhow::Result<()> {
        (**self).process(event)
    }
}

/// Logs every length it sees at INFO.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthConsoleProcessor;

impl LengthProcessor for LengthConsoleProcessor {
    fn process(&self, event: &LengthEvent) -> anyhow::Result<()> {
        info!("Consumed length [{}]", event.length);
        Ok(())
    }
}

/// Terminal stage, invoked once per delivered record.
pub trait LengthConsumer: Send + Sync {
    fn consume(&self, event: &LengthEvent) -> anyhow::Result<()>;
}

/// Hands each event to its processor, once, and returns the processor's
/// result as is. No retry here: redelivery belongs to the sink binding.
#[derive(Debug, Clone)]
pub struct LengthStreamConsumer<P> {
    processor: P,
}

impl<P: LengthProcessor> LengthStreamConsumer<P> {
    pub fn new(processor: P) -> Self {
        Self { processor }
    }
}

impl<P: LengthProcessor> LengthConsumer for LengthStreamConsumer<P> {
    fn consume(&self, event: &LengthEvent) -> anyhow::Result<()> {
        self.processor.process(event)
    }
}

pub mod config;
pub mod event;
pub mod ingress;
pub mod pipeline;
pub mod substrate;

// Re-export specific items for convenient access
pub use event::{LengthEvent, Record, TextEvent};
pub use substrate::StreamRuntime;

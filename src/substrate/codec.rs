use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::event::Record;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// JSON at the topic boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(CodecError::Encode)
    }

    pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}

/// What actually sits on a topic: a key and an encoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Assigned at publish time, only used to correlate log lines.
    pub id: Uuid,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(key: Option<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            payload,
        }
    }

    pub fn encode<T: Serialize>(record: &Record<T>) -> Result<Self, CodecError> {
        Ok(Self::new(record.key.clone(), JsonCodec::encode(&record.value)?))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Record<T>, CodecError> {
        Ok(Record {
            key: self.key.clone(),
            value: JsonCodec::decode(&self.payload)?,
        })
    }
}

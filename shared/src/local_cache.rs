//! Device-side copy of the message list.
//!
//! Two writers share `@messages`: snapshot application overwrites it with the
//! remote list, and offline sends append to it. Neither merges with the other.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::capabilities::KvKey;
use crate::model::Message;
use crate::{CREDENTIALS_KEY, LAST_SYNC_KEY, MESSAGES_KEY};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Messages,
    Credentials,
    LastSync,
}

impl StorageKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => MESSAGES_KEY,
            Self::Credentials => CREDENTIALS_KEY,
            Self::LastSync => LAST_SYNC_KEY,
        }
    }

    #[must_use]
    pub fn kv_key(self) -> KvKey {
        KvKey::from_static(self.as_str())
    }

    /// The key as `crux_kv` takes it.
    #[must_use]
    pub fn raw(self) -> String {
        self.kv_key().into_string()
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode cached messages: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Parses the cached list. Records that fail validation are dropped one by
/// one; a payload that is not a JSON array yields nothing.
#[must_use]
pub fn decode(bytes: &[u8]) -> Vec<Message> {
    let records: Vec<serde_json::Value> = match serde_json::from_slice(bytes) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "cached message list is unreadable");
            return Vec::new();
        }
    };

    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Message>(record) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(error = %e, "dropping invalid cached message");
                None
            }
        })
        .collect()
}

pub fn encode(messages: &[Message]) -> Result<Vec<u8>, CacheError> {
    Ok(serde_json::to_vec(messages)?)
}

/// Payload that overwrites `@messages` with `messages`.
pub fn replace(messages: &[Message]) -> Result<Vec<u8>, CacheError> {
    encode(messages)
}

/// Read-modify-write append of one message to whatever is cached.
pub fn append(cached: Option<&[u8]>, message: &Message) -> Result<Vec<u8>, CacheError> {
    let mut messages = cached.map(decode).unwrap_or_default();
    messages.push(message.clone());
    encode(&messages)
}

#[must_use]
pub fn last_sync_value(now: DateTime<Utc>) -> Vec<u8> {
    now.to_rfc3339_opts(SecondsFormat::Millis, true).into_bytes()
}

#[must_use]
pub fn decode_last_sync(bytes: &[u8]) -> Option<DateTime<Utc>> {
    let text = std::str::from_utf8(bytes).ok()?;
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

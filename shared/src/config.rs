use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_MAX_ATTACHMENT_BYTES, MAX_INLINE_ENCODED_LEN, MESSAGES_COLLECTION, MIN_PASSWORD_LEN,
    USERS_COLLECTION,
};

/// How a picked image travels with its message.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStrategy {
    /// Base64 data URL stored inside the message document.
    #[default]
    Inline,
    /// Blob uploaded to object storage, message carries the download URL.
    Upload,
    /// Inline when the encoded form fits, upload otherwise.
    Hybrid,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    pub messages_collection: String,
    pub users_collection: String,
    pub attachment_strategy: AttachmentStrategy,
    pub max_attachment_bytes: usize,
    pub max_inline_encoded_len: usize,
    pub min_password_len: usize,
    /// Offset applied to UTC when rendering message times.
    pub utc_offset_minutes: i32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            messages_collection: MESSAGES_COLLECTION.to_string(),
            users_collection: USERS_COLLECTION.to_string(),
            attachment_strategy: AttachmentStrategy::default(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            max_inline_encoded_len: MAX_INLINE_ENCODED_LEN,
            min_password_len: MIN_PASSWORD_LEN,
            utc_offset_minutes: 0,
        }
    }
}

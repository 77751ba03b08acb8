use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::attachment::{PendingUpload, StagedAttachment};
use crate::capabilities::{MessageDocument, RemoteMessage};
use crate::chat::ChatRoom;
use crate::config::ChatConfig;
use crate::users::UserDirectory;

const LOCAL_ID_PREFIX: &str = "temp_";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Temporary id for a message that exists only on this device.
    #[must_use]
    pub fn local(now: Timestamp) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{LOCAL_ID_PREFIX}{}_{}", now.as_millis(), &suffix[..8]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Seconds + nanoseconds since the Unix epoch, as the document store
/// reports them.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl Timestamp {
    #[must_use]
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    #[must_use]
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            seconds: at.timestamp(),
            nanoseconds: at.timestamp_subsec_nanos(),
        }
    }

    #[must_use]
    pub fn from_millis(ms: i64) -> Self {
        Self {
            seconds: ms.div_euclid(1000),
            nanoseconds: u32::try_from(ms.rem_euclid(1000) * 1_000_000).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn as_millis(self) -> i64 {
        self.seconds * 1000 + i64::from(self.nanoseconds / 1_000_000)
    }

    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.seconds, self.nanoseconds)
    }
}

/// Image reference carried by a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attachment {
    /// `data:<mime>;base64,...` stored inside the message record.
    Inline { data_url: String },
    /// Download URL of an object-storage blob.
    Remote { url: String },
}

impl Attachment {
    /// Something an image view can load directly.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Inline { data_url } => data_url,
            Self::Remote { url } => url,
        }
    }

    fn from_fields(image_base64: Option<String>, image_url: Option<String>) -> Option<Self> {
        match (image_base64, image_url) {
            (Some(data_url), _) if !data_url.is_empty() => Some(Self::Inline { data_url }),
            (_, Some(url)) if !url.is_empty() => Some(Self::Remote { url }),
            _ => None,
        }
    }

    fn into_fields(attachment: Option<&Self>) -> (Option<String>, Option<String>) {
        match attachment {
            Some(Self::Inline { data_url }) => (Some(data_url.clone()), None),
            Some(Self::Remote { url }) => (None, Some(url.clone())),
            None => (None, None),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message {0} has neither text nor an attachment")]
    Empty(String),
}

/// One chat message. Never mutated after construction; a remote snapshot
/// supersedes the whole list instead.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(try_from = "MessageRecord", into = "MessageRecord")]
pub struct Message {
    id: MessageId,
    text: Option<String>,
    attachment: Option<Attachment>,
    user: String,
    created_at: Option<Timestamp>,
    synced: bool,
}

impl Message {
    /// A message authored on this device, not yet confirmed remotely.
    pub fn compose(
        id: MessageId,
        text: Option<String>,
        attachment: Option<Attachment>,
        user: impl Into<String>,
        created_at: Option<Timestamp>,
    ) -> Result<Self, MessageError> {
        Self::build(id, text, attachment, user.into(), created_at, false)
    }

    fn build(
        id: MessageId,
        text: Option<String>,
        attachment: Option<Attachment>,
        user: String,
        created_at: Option<Timestamp>,
        synced: bool,
    ) -> Result<Self, MessageError> {
        let text = text.filter(|t| !t.is_empty());
        if text.is_none() && attachment.is_none() {
            return Err(MessageError::Empty(id.0));
        }
        Ok(Self {
            id,
            text,
            attachment,
            user,
            created_at,
            synced,
        })
    }

    #[must_use]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    #[must_use]
    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn created_at(&self) -> Option<Timestamp> {
        self.created_at
    }

    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// The document written to the remote collection.
    #[must_use]
    pub fn to_document(&self) -> MessageDocument {
        let (image_base64, image_url) = Attachment::into_fields(self.attachment.as_ref());
        MessageDocument {
            text: self.text.clone().unwrap_or_default(),
            user: self.user.clone(),
            image_base64,
            image_url,
        }
    }
}

impl TryFrom<RemoteMessage> for Message {
    type Error = MessageError;

    fn try_from(doc: RemoteMessage) -> Result<Self, Self::Error> {
        Self::build(
            MessageId::new(doc.id),
            doc.text,
            Attachment::from_fields(doc.image_base64, doc.image_url),
            doc.user.unwrap_or_default(),
            doc.created_at,
            true,
        )
    }
}

/// Cached message as stored on the device.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
struct MessageRecord {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    synced: bool,
}

impl TryFrom<MessageRecord> for Message {
    type Error = MessageError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        Self::build(
            MessageId(record.id),
            Some(record.text),
            Attachment::from_fields(record.image_base64, record.image_url),
            record.user,
            record.created_at,
            record.synced,
        )
    }
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        let (image_base64, image_url) = Attachment::into_fields(message.attachment.as_ref());
        Self {
            id: message.id.0,
            text: message.text.unwrap_or_default(),
            user: message.user,
            image_base64,
            image_url,
            created_at: message.created_at,
            synced: message.synced,
        }
    }
}

/// Sign-in details kept for replay on the next launch.
///
/// The record is written to device storage in clear text; only the
/// in-memory copy is wrapped.
#[derive(Clone)]
pub struct StoredCredentials {
    pub email: String,
    pub password: SecretString,
    pub display_name: String,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("display_name", &self.display_name)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRecord {
    email: String,
    password: String,
    #[serde(default)]
    display_name: String,
}

impl StoredCredentials {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password.into()),
            display_name: display_name.into(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&CredentialRecord {
            email: self.email.clone(),
            password: self.password.expose_secret().clone(),
            display_name: self.display_name.clone(),
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let record: CredentialRecord = serde_json::from_slice(bytes)?;
        Ok(Self::new(record.email, record.password, record.display_name))
    }
}

/// Entry of the user directory. Populated by the backend, read-only here.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_online: Option<bool>,
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Session {
    #[default]
    SignedOut,
    /// Reading cached credentials on launch.
    Restoring,
    SigningIn {
        auto: bool,
    },
    Registering,
    SigningOut(Account),
    SignedIn(Account),
}

impl Session {
    #[must_use]
    pub fn account(&self) -> Option<&Account> {
        match self {
            Self::SignedIn(account) => Some(account),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Restoring | Self::SigningIn { .. } | Self::Registering | Self::SigningOut(_)
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Error,
    Info,
    Success,
}

/// One-shot user-facing notification.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl From<&crate::AppError> for Notice {
    fn from(e: &crate::AppError) -> Self {
        Self {
            kind: NoticeKind::Error,
            title: e.title().to_string(),
            message: e.user_facing_message(),
        }
    }
}

#[derive(Debug)]
pub struct Model {
    pub config: ChatConfig,
    pub session: Session,
    /// Credentials of the sign-in or sign-up currently in flight.
    pub pending_credentials: Option<StoredCredentials>,
    pub network_online: bool,
    pub app_active: bool,
    pub chat: ChatRoom,
    pub directory: UserDirectory,
    pub staged_attachment: Option<StagedAttachment>,
    pub pending_uploads: Vec<PendingUpload>,
    /// Composer text returned by a failed upload, shown until the next send.
    pub draft: Option<String>,
    pub notice: Option<Notice>,
    pub last_sync: Option<DateTime<Utc>>,
    pub next_subscription: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            config: ChatConfig::default(),
            session: Session::default(),
            pending_credentials: None,
            network_online: true,
            app_active: true,
            chat: ChatRoom::default(),
            directory: UserDirectory::default(),
            staged_attachment: None,
            pending_uploads: Vec::new(),
            draft: None,
            notice: None,
            last_sync: None,
            next_subscription: 1,
        }
    }
}

impl Model {
    pub fn next_subscription_id(&mut self) -> crate::capabilities::SubscriptionId {
        let id = crate::capabilities::SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    pub fn notify(&mut self, error: &crate::AppError) {
        if error.kind.is_user_visible() {
            self.notice = Some(Notice::from(error));
        }
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        !self.pending_uploads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_rejects_empty_messages() {
        let id = MessageId::new("temp_1");
        assert!(Message::compose(id.clone(), None, None, "ana", None).is_err());
        assert!(Message::compose(id.clone(), Some(String::new()), None, "ana", None).is_err());

        let msg = Message::compose(id, Some("hi".into()), None, "ana", None).unwrap();
        assert!(!msg.is_synced());
        assert_eq!(msg.text(), Some("hi"));
    }

    #[test]
    fn image_only_message_is_valid() {
        let msg = Message::compose(
            MessageId::new("temp_2"),
            None,
            Some(Attachment::Remote {
                url: "https://cdn.example.com/a.png".into(),
            }),
            "ana",
            None,
        )
        .unwrap();
        assert_eq!(msg.text(), None);
        assert_eq!(msg.to_document().text, "");
    }

    #[test]
    fn local_ids_are_tagged() {
        let id = MessageId::local(Timestamp::from_millis(1_700_000_000_123));
        assert!(id.is_local());
        assert!(id.as_str().starts_with("temp_1700000000123_"));
        assert!(!MessageId::new("AbCdEf").is_local());
    }

    #[test]
    fn remote_documents_are_synced() {
        let doc = RemoteMessage {
            id: "abc".into(),
            text: Some("hello".into()),
            user: Some("budi".into()),
            image_base64: None,
            image_url: None,
            created_at: Some(Timestamp {
                seconds: 10,
                nanoseconds: 5,
            }),
        };
        let msg = Message::try_from(doc).unwrap();
        assert!(msg.is_synced());
        assert_eq!(msg.user(), "budi");
    }

    #[test]
    fn cached_record_roundtrips_wire_names() {
        let json = r#"{"id":"temp_1","text":"","user":"ana","imageBase64":"data:image/png;base64,AA==","createdAt":{"seconds":1,"nanoseconds":0},"synced":false}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.text(), None);
        assert!(matches!(msg.attachment(), Some(Attachment::Inline { .. })));

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["imageBase64"], "data:image/png;base64,AA==");
        assert_eq!(value["createdAt"]["seconds"], 1);
        assert_eq!(value["synced"], false);
    }

    #[test]
    fn cached_record_without_content_is_rejected() {
        let json = r#"{"id":"x","text":"","user":"ana","createdAt":null,"synced":true}"#;
        assert!(serde_json::from_str::<Message>(json).is_err());
    }

    #[test]
    fn timestamp_millis_conversion() {
        let ts = Timestamp::from_millis(1_500);
        assert_eq!(ts.seconds, 1);
        assert_eq!(ts.nanoseconds, 500_000_000);
        assert_eq!(ts.as_millis(), 1_500);
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = StoredCredentials::new("a@b.c", "hunter22", "Ana");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter22"));

        let restored = StoredCredentials::from_bytes(&creds.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.password.expose_secret(), "hunter22");
        assert_eq!(restored.display_name, "Ana");
    }
}

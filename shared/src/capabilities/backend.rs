use crux_core::capability::{Capability, CapabilityContext, Operation};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::{Timestamp, UserEntry};

/// Identifies one live listener so the core can tell a torn-down
/// subscription's late snapshots apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Document written to the messages collection. The shell adds the
/// server-side `createdAt` timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDocument {
    pub text: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A message document as delivered by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendOperation {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
    },
    SignOut,
    SubscribeMessages {
        subscription: SubscriptionId,
        collection: String,
        order_by: String,
    },
    SubscribeUsers {
        subscription: SubscriptionId,
        collection: String,
        exclude_email: String,
    },
    Unsubscribe {
        subscription: SubscriptionId,
    },
    AddMessage {
        collection: String,
        document: MessageDocument,
    },
    UploadImage {
        path: String,
        content_type: String,
        bytes: Vec<u8>,
    },
    UpdatePresence {
        collection: String,
        user_id: String,
        online: bool,
    },
}

// Redact debug output: credentials and image bytes must not reach logs.
impl fmt::Debug for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignIn { email, .. } => f
                .debug_struct("SignIn")
                .field("email", email)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::SignUp { email, .. } => f
                .debug_struct("SignUp")
                .field("email", email)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::SignOut => f.write_str("SignOut"),
            Self::SubscribeMessages {
                subscription,
                collection,
                order_by,
            } => f
                .debug_struct("SubscribeMessages")
                .field("subscription", subscription)
                .field("collection", collection)
                .field("order_by", order_by)
                .finish(),
            Self::SubscribeUsers {
                subscription,
                collection,
                exclude_email,
            } => f
                .debug_struct("SubscribeUsers")
                .field("subscription", subscription)
                .field("collection", collection)
                .field("exclude_email", exclude_email)
                .finish(),
            Self::Unsubscribe { subscription } => f
                .debug_struct("Unsubscribe")
                .field("subscription", subscription)
                .finish(),
            Self::AddMessage {
                collection,
                document,
            } => f
                .debug_struct("AddMessage")
                .field("collection", collection)
                .field("user", &document.user)
                .field("text_len", &document.text.len())
                .field("has_image", &(document.image_base64.is_some() || document.image_url.is_some()))
                .finish(),
            Self::UploadImage {
                path,
                content_type,
                bytes,
            } => f
                .debug_struct("UploadImage")
                .field("path", path)
                .field("content_type", content_type)
                .field("size_bytes", &bytes.len())
                .finish(),
            Self::UpdatePresence {
                collection,
                user_id,
                online,
            } => f
                .debug_struct("UpdatePresence")
                .field("collection", collection)
                .field("user_id", user_id)
                .field("online", online)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendOutput {
    SignedIn { uid: String, email: String },
    SignedUp { uid: String, email: String },
    SignedOut,
    MessagesSnapshot(Vec<RemoteMessage>),
    UsersSnapshot(Vec<UserEntry>),
    Unsubscribed,
    MessageAdded { id: String },
    ImageUploaded { download_url: String },
    PresenceUpdated,
}

/// Raw failure as reported by the backend SDK in the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendErrorKind {
    UserNotFound,
    WrongPassword,
    InvalidEmail,
    InvalidCredential,
    EmailAlreadyInUse,
    WeakPassword,
    InvalidArgument,
    PermissionDenied,
    Unavailable,
    Other,
}

impl BackendErrorKind {
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "auth/user-not-found" => Self::UserNotFound,
            "auth/wrong-password" => Self::WrongPassword,
            "auth/invalid-email" => Self::InvalidEmail,
            "auth/invalid-credential" => Self::InvalidCredential,
            "auth/email-already-in-use" => Self::EmailAlreadyInUse,
            "auth/weak-password" => Self::WeakPassword,
            "invalid-argument" => Self::InvalidArgument,
            "permission-denied" => Self::PermissionDenied,
            "unavailable" | "auth/network-request-failed" => Self::Unavailable,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            kind: BackendErrorKind::from_code(&code),
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_document_too_large(&self) -> bool {
        self.kind == BackendErrorKind::InvalidArgument || self.message.contains("size")
    }
}

impl From<BackendFailure> for BackendError {
    fn from(failure: BackendFailure) -> Self {
        Self::from_code(failure.code, failure.message)
    }
}

/// What the shell sends back for every backend request.
pub type BackendResponse = Result<BackendOutput, BackendFailure>;

/// What the app sees, after error codes were classified.
pub type BackendResult = Result<BackendOutput, BackendError>;

impl Operation for BackendOperation {
    type Output = BackendResponse;
}

/// Hosted document database, authentication and object storage, all
/// executed by the shell's backend SDK.
pub struct Backend<Ev> {
    context: CapabilityContext<BackendOperation, Ev>,
}

impl<Ev> Capability<Ev> for Backend<Ev> {
    type Operation = BackendOperation;
    type MappedSelf<MappedEv> = Backend<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Backend::new(self.context.map_event(f))
    }
}

impl<Ev> Backend<Ev> {
    pub fn new(context: CapabilityContext<BackendOperation, Ev>) -> Self {
        Self { context }
    }
}

impl<Ev> Backend<Ev>
where
    Ev: Send + 'static,
{
    pub fn sign_in<F>(&self, email: String, password: String, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        self.request(BackendOperation::SignIn { email, password }, make_event);
    }

    pub fn sign_up<F>(&self, email: String, password: String, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        self.request(BackendOperation::SignUp { email, password }, make_event);
    }

    pub fn sign_out<F>(&self, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        self.request(BackendOperation::SignOut, make_event);
    }

    /// Opens a live query ordered by `order_by` ascending. Every snapshot (or
    /// listener error) becomes one event.
    pub fn subscribe_messages<F>(
        &self,
        subscription: SubscriptionId,
        collection: String,
        order_by: String,
        make_event: F,
    ) where
        F: Fn(BackendResult) -> Ev + Send + 'static,
    {
        self.stream(
            BackendOperation::SubscribeMessages {
                subscription,
                collection,
                order_by,
            },
            make_event,
        );
    }

    pub fn subscribe_users<F>(
        &self,
        subscription: SubscriptionId,
        collection: String,
        exclude_email: String,
        make_event: F,
    ) where
        F: Fn(BackendResult) -> Ev + Send + 'static,
    {
        self.stream(
            BackendOperation::SubscribeUsers {
                subscription,
                collection,
                exclude_email,
            },
            make_event,
        );
    }

    pub fn unsubscribe<F>(&self, subscription: SubscriptionId, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        self.request(BackendOperation::Unsubscribe { subscription }, make_event);
    }

    pub fn add_message<F>(&self, collection: String, document: MessageDocument, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        self.request(
            BackendOperation::AddMessage {
                collection,
                document,
            },
            make_event,
        );
    }

    pub fn upload_image<F>(&self, path: String, content_type: String, bytes: Vec<u8>, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        self.request(
            BackendOperation::UploadImage {
                path,
                content_type,
                bytes,
            },
            make_event,
        );
    }

    pub fn update_presence<F>(&self, collection: String, user_id: String, online: bool, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        self.request(
            BackendOperation::UpdatePresence {
                collection,
                user_id,
                online,
            },
            make_event,
        );
    }

    fn request<F>(&self, operation: BackendOperation, make_event: F)
    where
        F: FnOnce(BackendResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let response = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(response.map_err(BackendError::from)));
        });
    }

    fn stream<F>(&self, operation: BackendOperation, make_event: F)
    where
        F: Fn(BackendResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let mut responses = ctx.stream_from_shell(operation);
            while let Some(response) = responses.next().await {
                ctx.update_app(make_event(response.map_err(BackendError::from)));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_classified_once() {
        let err = BackendError::from(BackendFailure {
            code: "auth/wrong-password".into(),
            message: "bad".into(),
        });
        assert_eq!(err.kind, BackendErrorKind::WrongPassword);
        assert_eq!(err.code, "auth/wrong-password");

        assert_eq!(
            BackendErrorKind::from_code("auth/network-request-failed"),
            BackendErrorKind::Unavailable
        );
        assert_eq!(BackendErrorKind::from_code("weird"), BackendErrorKind::Other);
    }

    #[test]
    fn debug_redacts_passwords() {
        let op = BackendOperation::SignIn {
            email: "a@b.c".into(),
            password: "hunter22".into(),
        };
        let rendered = format!("{op:?}");
        assert!(rendered.contains("a@b.c"));
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn debug_omits_image_bytes() {
        let op = BackendOperation::UploadImage {
            path: "chat-images/x.png".into(),
            content_type: "image/png".into(),
            bytes: vec![7; 64],
        };
        assert!(format!("{op:?}").contains("size_bytes: 64"));
    }

    #[test]
    fn message_document_uses_wire_field_names() {
        let doc = MessageDocument {
            text: "hi".into(),
            user: "Ana".into(),
            image_base64: None,
            image_url: Some("https://cdn.example.com/a.png".into()),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["imageUrl"], "https://cdn.example.com/a.png");
        assert!(json.get("imageBase64").is_none());
    }

    #[test]
    fn remote_message_tolerates_missing_fields() {
        let msg: RemoteMessage = serde_json::from_str(r#"{"id":"m1","text":"yo"}"#).unwrap();
        assert_eq!(msg.text.as_deref(), Some("yo"));
        assert!(msg.created_at.is_none());
        assert!(msg.user.is_none());
    }
}

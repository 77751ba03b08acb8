use serde::Deserialize;

use crate::auth::{LoginForm, RegisterForm};
use crate::capabilities::{BackendResult, KvResult, SubscriptionId};
use crate::config::ChatConfig;
use crate::local_cache::StorageKey;
use crate::model::{Message, MessageId};

#[derive(Clone, Debug, Deserialize)]
pub enum Event {
    // --- Lifecycle ---
    AppStarted,
    Configure(Box<ChatConfig>),
    AppStateChanged {
        active: bool,
    },
    NetworkStatusChanged {
        online: bool,
    },
    DismissNotice,

    // --- Authentication ---
    LoginRequested(LoginForm),
    RegisterRequested(RegisterForm),
    LogoutRequested,

    // --- User directory ---
    UsersOpened,
    UsersClosed,
    UserSearchChanged {
        query: String,
    },

    // --- Chat room ---
    ChatOpened,
    ChatClosed,
    AttachmentSelected {
        bytes: Vec<u8>,
        file_size: Option<u64>,
    },
    AttachmentCleared,
    SendRequested {
        text: String,
    },

    // --- Capability responses (shell never sends these directly) ---
    #[serde(skip)]
    CredentialsLoaded(Box<KvResult>),
    #[serde(skip)]
    LastSyncLoaded(Box<KvResult>),
    #[serde(skip)]
    SignInCompleted {
        auto: bool,
        result: Box<BackendResult>,
    },
    #[serde(skip)]
    SignUpCompleted(Box<BackendResult>),
    #[serde(skip)]
    SignOutCompleted(Box<BackendResult>),
    #[serde(skip)]
    PresenceUpdated {
        online: bool,
        result: Box<BackendResult>,
    },
    #[serde(skip)]
    UsersSnapshot {
        subscription: SubscriptionId,
        result: Box<BackendResult>,
    },
    #[serde(skip)]
    CacheLoaded(Box<KvResult>),
    #[serde(skip)]
    MessagesSnapshot {
        subscription: SubscriptionId,
        result: Box<BackendResult>,
    },
    #[serde(skip)]
    Unsubscribed {
        subscription: SubscriptionId,
        result: Box<BackendResult>,
    },
    #[serde(skip)]
    MessageWritten {
        local_id: MessageId,
        result: Box<BackendResult>,
    },
    #[serde(skip)]
    ImageUploaded {
        path: String,
        result: Box<BackendResult>,
    },
    #[serde(skip)]
    OfflineAppendLoaded {
        message: Box<Message>,
        result: Box<KvResult>,
    },
    #[serde(skip)]
    StorageWritten {
        key: StorageKey,
        result: Box<KvResult>,
    },
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::Configure(_) => "configure",
            Self::AppStateChanged { .. } => "app_state_changed",
            Self::NetworkStatusChanged { .. } => "network_status_changed",
            Self::DismissNotice => "dismiss_notice",
            Self::LoginRequested(_) => "login_requested",
            Self::RegisterRequested(_) => "register_requested",
            Self::LogoutRequested => "logout_requested",
            Self::UsersOpened => "users_opened",
            Self::UsersClosed => "users_closed",
            Self::UserSearchChanged { .. } => "user_search_changed",
            Self::ChatOpened => "chat_opened",
            Self::ChatClosed => "chat_closed",
            Self::AttachmentSelected { .. } => "attachment_selected",
            Self::AttachmentCleared => "attachment_cleared",
            Self::SendRequested { .. } => "send_requested",
            Self::CredentialsLoaded(_) => "credentials_loaded",
            Self::LastSyncLoaded(_) => "last_sync_loaded",
            Self::SignInCompleted { .. } => "sign_in_completed",
            Self::SignUpCompleted(_) => "sign_up_completed",
            Self::SignOutCompleted(_) => "sign_out_completed",
            Self::PresenceUpdated { .. } => "presence_updated",
            Self::UsersSnapshot { .. } => "users_snapshot",
            Self::CacheLoaded(_) => "cache_loaded",
            Self::MessagesSnapshot { .. } => "messages_snapshot",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::MessageWritten { .. } => "message_written",
            Self::ImageUploaded { .. } => "image_uploaded",
            Self::OfflineAppendLoaded { .. } => "offline_append_loaded",
            Self::StorageWritten { .. } => "storage_written",
        }
    }

    #[must_use]
    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::LoginRequested(_)
                | Self::RegisterRequested(_)
                | Self::LogoutRequested
                | Self::UsersOpened
                | Self::UserSearchChanged { .. }
                | Self::ChatOpened
                | Self::ChatClosed
                | Self::AttachmentSelected { .. }
                | Self::AttachmentCleared
                | Self::SendRequested { .. }
                | Self::DismissNotice
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_events_deserialize() {
        let event: Event = serde_json::from_str(r#"{"SendRequested":{"text":"hi"}}"#).unwrap();
        assert!(matches!(event, Event::SendRequested { ref text } if text == "hi"));
        assert!(event.is_user_initiated());

        let event: Event =
            serde_json::from_str(r#"{"NetworkStatusChanged":{"online":false}}"#).unwrap();
        assert_eq!(event.name(), "network_status_changed");
        assert!(!event.is_user_initiated());
    }

    #[test]
    fn login_form_deserializes_without_leaking() {
        let event: Event = serde_json::from_str(
            r#"{"LoginRequested":{"email":"a@b.c","password":"hunter22","display_name":"Ana"}}"#,
        )
        .unwrap();
        assert!(!format!("{event:?}").contains("hunter22"));
    }
}

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::{Attachment, Message, Model, Notice, Session, Timestamp};
use crate::users::{display_label, format_last_seen};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    SignedOut,
    Working,
    SignedIn,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageView {
    pub id: String,
    pub text: Option<String>,
    pub image: Option<String>,
    pub sender: String,
    pub is_mine: bool,
    pub time_label: String,
    pub pending: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserView {
    pub id: String,
    pub label: String,
    pub email: String,
    pub initial: String,
    pub online: bool,
    pub last_seen: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ChatView {
    pub messages: Vec<MessageView>,
    pub has_staged_image: bool,
    pub processing: bool,
    /// Text handed back to the composer after a failed image upload.
    pub draft: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct UsersView {
    pub loading: bool,
    pub query: String,
    pub items: Vec<UserView>,
    pub empty_text: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ViewModel {
    pub session: SessionStatus,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub online: bool,
    pub notice: Option<Notice>,
    pub chat: ChatView,
    pub users: UsersView,
    pub last_sync: Option<String>,
}

fn time_label(at: Option<Timestamp>, utc_offset_minutes: i32) -> String {
    at.and_then(Timestamp::to_datetime)
        .and_then(|at| at.checked_add_signed(Duration::minutes(i64::from(utc_offset_minutes))))
        .map(|at| at.format("%H:%M").to_string())
        .unwrap_or_default()
}

fn message_view(message: &Message, me: Option<&str>, utc_offset_minutes: i32) -> MessageView {
    MessageView {
        id: message.id().to_string(),
        text: message.text().map(str::to_string),
        image: message.attachment().map(Attachment::source).map(str::to_string),
        sender: message.user().to_string(),
        is_mine: me == Some(message.user()),
        time_label: time_label(message.created_at(), utc_offset_minutes),
        pending: !message.is_synced(),
    }
}

#[must_use]
pub fn build(model: &Model, now: Timestamp) -> ViewModel {
    let account = model.session.account();
    let session = match &model.session {
        Session::SignedIn(_) => SessionStatus::SignedIn,
        s if s.is_busy() => SessionStatus::Working,
        _ => SessionStatus::SignedOut,
    };
    let me = account.map(|a| a.display_name.as_str());
    let offset = model.config.utc_offset_minutes;

    let items: Vec<UserView> = model
        .directory
        .filtered()
        .into_iter()
        .map(|user| {
            let label = display_label(user);
            UserView {
                id: user.id.clone(),
                initial: label
                    .chars()
                    .next()
                    .map(|c| c.to_uppercase().to_string())
                    .unwrap_or_default(),
                label,
                email: user.email.clone(),
                online: user.is_online.unwrap_or(false),
                last_seen: format_last_seen(user.last_seen, now),
            }
        })
        .collect();

    let empty_text = (items.is_empty() && !model.directory.loading).then(|| {
        if model.directory.query.trim().is_empty() {
            "No other users yet".to_string()
        } else {
            "No users found".to_string()
        }
    });

    ViewModel {
        session,
        display_name: account.map(|a| a.display_name.clone()),
        email: account.map(|a| a.email.clone()),
        online: model.network_online,
        notice: model.notice.clone(),
        chat: ChatView {
            messages: model
                .chat
                .messages()
                .iter()
                .map(|m| message_view(m, me, offset))
                .collect(),
            has_staged_image: model.staged_attachment.is_some(),
            processing: model.is_processing(),
            draft: model.draft.clone(),
        },
        users: UsersView {
            loading: model.directory.loading,
            query: model.directory.query.clone(),
            items,
            empty_text,
        },
        last_sync: model
            .last_sync
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, MessageId, UserEntry};

    fn signed_in_model() -> Model {
        Model {
            session: Session::SignedIn(Account {
                uid: "u1".into(),
                email: "ana@example.com".into(),
                display_name: "Ana".into(),
            }),
            ..Model::default()
        }
    }

    #[test]
    fn own_and_pending_messages_are_flagged() {
        let mut model = signed_in_model();
        model.config.utc_offset_minutes = 7 * 60;
        let message = Message::compose(
            MessageId::new("temp_1"),
            Some("hi".into()),
            None,
            "Ana",
            Some(Timestamp::from_millis(0)),
        )
        .unwrap();
        model.chat.push_optimistic(message);

        let view = build(&model, Timestamp::from_millis(0));
        let first = &view.chat.messages[0];
        assert!(first.is_mine);
        assert!(first.pending);
        assert_eq!(first.time_label, "07:00");
        assert_eq!(view.session, SessionStatus::SignedIn);
    }

    #[test]
    fn out_of_range_time_gets_an_empty_label() {
        let mut model = signed_in_model();
        model.config.utc_offset_minutes = 14 * 60;
        let latest = Timestamp {
            seconds: chrono::DateTime::<chrono::Utc>::MAX_UTC.timestamp(),
            nanoseconds: 0,
        };
        let message = Message::compose(
            MessageId::new("m1"),
            Some("far future".into()),
            None,
            "Budi",
            Some(latest),
        )
        .unwrap();
        model.chat.push_optimistic(message);

        let view = build(&model, Timestamp::from_millis(0));
        assert_eq!(view.chat.messages[0].time_label, "");
    }

    #[test]
    fn user_rows_use_labels_and_empty_text() {
        let mut model = signed_in_model();
        model.directory.users.push(UserEntry {
            id: "u2".into(),
            email: "budi@example.com".into(),
            display_name: None,
            is_online: Some(true),
            last_seen: None,
        });

        let view = build(&model, Timestamp::from_millis(0));
        assert_eq!(view.users.items[0].label, "budi");
        assert_eq!(view.users.items[0].initial, "B");
        assert_eq!(view.users.items[0].last_seen, "Never");
        assert_eq!(view.users.empty_text, None);

        model.directory.query = "zzz".into();
        let view = build(&model, Timestamp::from_millis(0));
        assert_eq!(view.users.empty_text.as_deref(), Some("No users found"));
    }
}

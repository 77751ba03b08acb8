//! In-memory message list of the chat room and the rules that change it.

use tracing::{debug, warn};

use crate::capabilities::{RemoteMessage, SubscriptionId};
use crate::model::Message;

#[derive(Debug, Default)]
pub struct ChatRoom {
    pub open: bool,
    pub subscription: Option<SubscriptionId>,
    messages: Vec<Message>,
    /// Set once a remote snapshot arrived; a slower cache read must not
    /// clobber it afterwards.
    snapshot_seen: bool,
}

impl ChatRoom {
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn enter(&mut self) {
        self.open = true;
        self.snapshot_seen = false;
    }

    pub fn leave(&mut self) -> Option<SubscriptionId> {
        self.open = false;
        self.subscription.take()
    }

    #[must_use]
    pub fn is_current(&self, subscription: SubscriptionId) -> bool {
        self.subscription == Some(subscription)
    }

    /// Shows the cached list. Returns whether it was applied.
    pub fn restore_from_cache(&mut self, cached: Vec<Message>) -> bool {
        if cached.is_empty() || self.snapshot_seen {
            return false;
        }
        self.messages = cached;
        true
    }

    /// Replaces the whole list with the remote snapshot. Every entry becomes
    /// synced, unsynced local entries included, since they are gone.
    pub fn apply_snapshot(&mut self, docs: Vec<RemoteMessage>) -> &[Message] {
        let total = docs.len();
        self.messages = docs
            .into_iter()
            .filter_map(|doc| match Message::try_from(doc) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, "dropping remote message");
                    None
                }
            })
            .collect();
        self.snapshot_seen = true;
        debug!(total, kept = self.messages.len(), "snapshot applied");
        &self.messages
    }

    pub fn push_optimistic(&mut self, message: Message) {
        self.messages.push(message);
    }

    #[must_use]
    pub fn unsynced_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_synced()).count()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Trimmed text of an outgoing message, `None` when nothing is left.
#[must_use]
pub fn outgoing_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    (!text.is_empty()).then(|| text.to_string())
}

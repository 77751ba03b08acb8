#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod attachment;
pub mod auth;
pub mod capabilities;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod local_cache;
pub mod model;
pub mod users;
pub mod view;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{AttachmentStrategy, ChatConfig};
pub use error::{AppError, AuthFlow, ErrorKind};
pub use event::Event;
pub use model::Model;
pub use view::ViewModel;

pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 1024 * 1024;
pub const MAX_INLINE_ENCODED_LEN: usize = 1_048_576;
pub const MIN_PASSWORD_LEN: usize = 6;

pub const MESSAGES_COLLECTION: &str = "messages";
pub const USERS_COLLECTION: &str = "users";
pub const MESSAGES_ORDER_BY: &str = "createdAt";
pub const IMAGE_FOLDER: &str = "chat-images";

pub const MESSAGES_KEY: &str = "@messages";
pub const CREDENTIALS_KEY: &str = "@user";
pub const LAST_SYNC_KEY: &str = "@last_sync";

#[must_use]
pub fn get_current_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

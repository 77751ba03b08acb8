mod backend;
mod kv;

pub use self::backend::{
    Backend, BackendError, BackendErrorKind, BackendFailure, BackendOperation, BackendOutput,
    BackendResponse, BackendResult, MessageDocument, RemoteMessage, SubscriptionId,
};
pub use self::kv::{
    checked_value, KeyValue, KeyValueError, KeyValueOperation, KvError, KvKey, KvResult,
    MAX_VALUE_SIZE,
};

// Crux's built-in Render capability covers view updates as-is.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub key_value: KeyValue<Event>,
    pub backend: Backend<Event>,
}

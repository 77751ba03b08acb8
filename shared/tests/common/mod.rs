#![allow(dead_code)]

use std::collections::VecDeque;

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use shared::capabilities::{BackendOperation, KeyValueOperation};
use shared::model::{Account, Session};
use shared::{App, Effect, Event, Model};

pub type Tester = AppTester<App, Effect>;

pub fn account() -> Account {
    Account {
        uid: "uid-ana".into(),
        email: "ana@example.com".into(),
        display_name: "Ana".into(),
    }
}

pub fn signed_in_model() -> Model {
    Model {
        session: Session::SignedIn(account()),
        ..Model::default()
    }
}

/// Feeds every event produced by `update` back into the app until nothing
/// is left, returning all effects seen along the way.
pub fn settle(app: &Tester, update: Update<Effect, Event>, model: &mut Model) -> Vec<Effect> {
    let mut effects = update.effects;
    let mut pending: VecDeque<Event> = update.events.into();
    while let Some(event) = pending.pop_front() {
        let next = app.update(event, model);
        effects.extend(next.effects);
        pending.extend(next.events);
    }
    effects
}

pub fn backend_requests(effects: Vec<Effect>) -> Vec<Request<BackendOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Backend(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn kv_requests(effects: Vec<Effect>) -> Vec<Request<KeyValueOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::KeyValue(request) => Some(request),
            _ => None,
        })
        .collect()
}

/// Backend and storage requests of one update, in emission order.
pub fn split(
    effects: Vec<Effect>,
) -> (Vec<Request<BackendOperation>>, Vec<Request<KeyValueOperation>>) {
    let mut backend = Vec::new();
    let mut kv = Vec::new();
    for effect in effects {
        match effect {
            Effect::Backend(request) => backend.push(request),
            Effect::KeyValue(request) => kv.push(request),
            Effect::Render(_) => {}
        }
    }
    (backend, kv)
}

pub fn renders(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, Effect::Render(_)))
        .count()
}

/// Whether a `Get` for `key` is among the requests.
pub fn reads(requests: &[Request<KeyValueOperation>], key: &str) -> bool {
    requests
        .iter()
        .any(|request| matches!(&request.operation, KeyValueOperation::Get { key: k } if k == key))
}

/// The value of the one `Set` aimed at `key`, if any.
pub fn written(requests: &[Request<KeyValueOperation>], key: &str) -> Option<Vec<u8>> {
    requests.iter().find_map(|request| match &request.operation {
        KeyValueOperation::Set { key: k, value } if k == key => Some(value.clone()),
        _ => None,
    })
}

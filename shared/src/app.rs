use chrono::Utc;
use secrecy::ExposeSecret;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::attachment::{self, AttachmentPlan, PendingUpload, StagedAttachment};
use crate::auth::fallback_display_name;
use crate::capabilities::{checked_value, BackendOutput, Capabilities, SubscriptionId};
use crate::chat::outgoing_text;
use crate::error::{AppError, AuthFlow, ErrorKind};
use crate::event::Event;
use crate::local_cache::{self, StorageKey};
use crate::model::{
    Account, Attachment, Message, MessageId, Model, Notice, Session, StoredCredentials, Timestamp,
};
use crate::view::{self, ViewModel};
use crate::{get_current_time_ms, MESSAGES_ORDER_BY};

#[derive(Default)]
pub struct App;

/// Device storage failures. They are logged, and `Model::notify` keeps them
/// off the screen.
fn local_failure(kind: ErrorKind, key: StorageKey, internal: impl fmt::Display) -> AppError {
    AppError::new(kind, "Unable to save data locally.")
        .with_internal(internal.to_string())
        .with_context("key", key.as_str())
}

impl App {
    fn write_storage(caps: &Capabilities, key: StorageKey, value: Vec<u8>) {
        let value = match checked_value(value) {
            Ok(value) => value,
            Err(e) => {
                let err = local_failure(ErrorKind::Storage, key, e);
                warn!(%err, "skipping local write");
                return;
            }
        };
        caps.key_value.set(key.raw(), value, move |result| Event::StorageWritten {
            key,
            result: Box::new(result),
        });
    }

    fn save_credentials(caps: &Capabilities, creds: &StoredCredentials) {
        match creds.to_bytes() {
            Ok(bytes) => Self::write_storage(caps, StorageKey::Credentials, bytes),
            Err(e) => {
                let err = local_failure(ErrorKind::Serialization, StorageKey::Credentials, e);
                warn!(%err, "failed to encode credentials");
            }
        }
    }

    fn sign_in(caps: &Capabilities, creds: &StoredCredentials, auto: bool) {
        caps.backend.sign_in(
            creds.email.clone(),
            creds.password.expose_secret().clone(),
            move |result| Event::SignInCompleted {
                auto,
                result: Box::new(result),
            },
        );
    }

    fn set_presence(model: &Model, caps: &Capabilities, online: bool) {
        let Some(account) = model.session.account() else {
            return;
        };
        caps.backend.update_presence(
            model.config.users_collection.clone(),
            account.uid.clone(),
            online,
            move |result| Event::PresenceUpdated {
                online,
                result: Box::new(result),
            },
        );
    }

    fn close_subscription(caps: &Capabilities, subscription: SubscriptionId) {
        debug!(%subscription, "closing subscription");
        caps.backend.unsubscribe(subscription, move |result| Event::Unsubscribed {
            subscription,
            result: Box::new(result),
        });
    }

    /// Opens the message listener when the chat is open, the device is online
    /// and no listener is active yet.
    fn open_message_subscription(model: &mut Model, caps: &Capabilities) {
        if !model.chat.open
            || !model.network_online
            || model.chat.subscription.is_some()
            || model.session.account().is_none()
        {
            return;
        }

        let subscription = model.next_subscription_id();
        model.chat.subscription = Some(subscription);
        info!(%subscription, "opening message subscription");

        caps.backend.subscribe_messages(
            subscription,
            model.config.messages_collection.clone(),
            MESSAGES_ORDER_BY.to_string(),
            move |result| Event::MessagesSnapshot {
                subscription,
                result: Box::new(result),
            },
        );
    }

    fn open_user_subscription(model: &mut Model, caps: &Capabilities) {
        if !model.directory.open || model.directory.subscription.is_some() {
            return;
        }
        let Some(email) = model.session.account().map(|a| a.email.clone()) else {
            return;
        };

        let subscription = model.next_subscription_id();
        model.directory.subscription = Some(subscription);
        model.directory.loading = true;

        caps.backend.subscribe_users(
            subscription,
            model.config.users_collection.clone(),
            email,
            move |result| Event::UsersSnapshot {
                subscription,
                result: Box::new(result),
            },
        );
    }

    fn close_all_subscriptions(model: &mut Model, caps: &Capabilities) {
        if let Some(subscription) = model.chat.leave() {
            Self::close_subscription(caps, subscription);
        }
        if let Some(subscription) = model.directory.subscription.take() {
            Self::close_subscription(caps, subscription);
        }
    }

    fn persist_snapshot(model: &mut Model, caps: &Capabilities) {
        match local_cache::replace(model.chat.messages()) {
            Ok(bytes) => Self::write_storage(caps, StorageKey::Messages, bytes),
            Err(e) => {
                let err = local_failure(ErrorKind::Serialization, StorageKey::Messages, e);
                warn!(%err, "failed to encode snapshot for the cache");
                model.notify(&err);
            }
        }

        let now = Utc::now();
        model.last_sync = Some(now);
        Self::write_storage(caps, StorageKey::LastSync, local_cache::last_sync_value(now));
    }

    /// Appends the optimistic entry and routes it by connectivity.
    fn deliver(
        model: &mut Model,
        caps: &Capabilities,
        text: Option<String>,
        attachment: Option<Attachment>,
    ) {
        let Some(user) = model.session.account().map(|a| a.display_name.clone()) else {
            warn!("dropping message composed while signed out");
            return;
        };

        let now = Timestamp::now();
        let message = match Message::compose(MessageId::local(now), text, attachment, user, Some(now))
        {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "refusing to send");
                return;
            }
        };

        let local_id = message.id().clone();
        model.chat.push_optimistic(message.clone());

        if model.network_online {
            info!(%local_id, "sending message");
            caps.backend.add_message(
                model.config.messages_collection.clone(),
                message.to_document(),
                move |result| Event::MessageWritten {
                    local_id,
                    result: Box::new(result),
                },
            );
        } else {
            info!(%local_id, "offline, keeping message on device");
            caps.key_value.get(StorageKey::Messages.raw(), move |result| {
                Event::OfflineAppendLoaded {
                    message: Box::new(message),
                    result: Box::new(result),
                }
            });
            model.notice = Some(Notice::info("Offline mode", "Message saved locally."));
        }
    }

    /// Returns false when there was nothing to send.
    fn handle_send(model: &mut Model, caps: &Capabilities, raw: &str) -> bool {
        let text = outgoing_text(raw);
        if text.is_none() && model.staged_attachment.is_none() {
            debug!("empty send ignored");
            return false;
        }
        if model.session.account().is_none() {
            warn!("send requested while signed out");
            return false;
        }
        model.draft = None;

        let Some(staged) = model.staged_attachment.take() else {
            Self::deliver(model, caps, text, None);
            return true;
        };

        match attachment::plan(
            &staged,
            model.network_online,
            &model.config,
            get_current_time_ms(),
        ) {
            Ok(AttachmentPlan::Ready(attachment)) => {
                Self::deliver(model, caps, text, Some(attachment));
            }
            Ok(AttachmentPlan::Upload {
                path,
                content_type,
                bytes,
            }) => {
                info!(%path, size = bytes.len(), "uploading image");
                model.pending_uploads.push(PendingUpload {
                    path: path.clone(),
                    text,
                    staged,
                });
                let upload_path = path.clone();
                caps.backend
                    .upload_image(path, content_type, bytes, move |result| Event::ImageUploaded {
                        path: upload_path,
                        result: Box::new(result),
                    });
            }
            Err(e) => {
                warn!(error = %e, "staged image cannot be sent");
                model.staged_attachment = Some(staged);
                model.notify(&AppError::from(e));
            }
        }
        true
    }

    /// Hands a failed upload back to the composer: the image is staged again
    /// unless another one was picked meanwhile, and the text becomes the draft.
    fn upload_failed(
        model: &mut Model,
        err: &AppError,
        text: Option<String>,
        staged: StagedAttachment,
    ) {
        error!(%err, "image upload failed");
        if model.staged_attachment.is_none() {
            model.staged_attachment = Some(staged);
        }
        model.draft = text;
        model.notify(err);
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    #[allow(clippy::too_many_lines)]
    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();
        if event.is_user_initiated() {
            info!(event = event_name, "user action");
        } else {
            debug!(event = event_name, "event");
        }

        match event {
            Event::AppStarted => {
                model.session = Session::Restoring;
                caps.key_value.get(StorageKey::Credentials.raw(), |result| {
                    Event::CredentialsLoaded(Box::new(result))
                });
                caps.key_value.get(StorageKey::LastSync.raw(), |result| {
                    Event::LastSyncLoaded(Box::new(result))
                });
                caps.render.render();
            }

            Event::Configure(config) => {
                model.config = *config;
                caps.render.render();
            }

            Event::AppStateChanged { active } => {
                if model.app_active != active {
                    model.app_active = active;
                    Self::set_presence(model, caps, active);
                }
            }

            Event::NetworkStatusChanged { online } => {
                let was_online = model.network_online;
                model.network_online = online;
                info!(online, "network status changed");

                if was_online && !online {
                    if let Some(subscription) = model.chat.subscription.take() {
                        Self::close_subscription(caps, subscription);
                    }
                } else if !was_online && online {
                    // Unsynced entries are not re-sent; the next snapshot replaces them.
                    Self::open_message_subscription(model, caps);
                }
                caps.render.render();
            }

            Event::DismissNotice => {
                model.notice = None;
                caps.render.render();
            }

            Event::LoginRequested(form) => {
                match form.validate() {
                    Ok(creds) => {
                        model.session = Session::SigningIn { auto: false };
                        Self::sign_in(caps, &creds, false);
                        model.pending_credentials = Some(creds);
                    }
                    Err(e) => model.notify(&AppError::from(e)),
                }
                caps.render.render();
            }

            Event::RegisterRequested(form) => {
                match form.validate(model.config.min_password_len) {
                    Ok(creds) => {
                        model.session = Session::Registering;
                        caps.backend.sign_up(
                            creds.email.clone(),
                            creds.password.expose_secret().clone(),
                            |result| Event::SignUpCompleted(Box::new(result)),
                        );
                        model.pending_credentials = Some(creds);
                    }
                    Err(e) => model.notify(&AppError::from(e)),
                }
                caps.render.render();
            }

            Event::LogoutRequested => {
                let Some(account) = model.session.account().cloned() else {
                    warn!("logout requested while signed out");
                    return;
                };
                // Listeners stay open until the backend confirms the sign-out.
                Self::set_presence(model, caps, false);
                model.session = Session::SigningOut(account);
                caps.backend
                    .sign_out(|result| Event::SignOutCompleted(Box::new(result)));
                caps.render.render();
            }

            Event::UsersOpened => {
                model.directory.open = true;
                Self::open_user_subscription(model, caps);
                caps.render.render();
            }

            Event::UsersClosed => {
                model.directory.open = false;
                if let Some(subscription) = model.directory.subscription.take() {
                    Self::close_subscription(caps, subscription);
                }
            }

            Event::UserSearchChanged { query } => {
                model.directory.query = query;
                caps.render.render();
            }

            Event::ChatOpened => {
                model.chat.enter();
                caps.key_value.get(StorageKey::Messages.raw(), |result| {
                    Event::CacheLoaded(Box::new(result))
                });
                Self::open_message_subscription(model, caps);
                caps.render.render();
            }

            Event::ChatClosed => {
                if let Some(subscription) = model.chat.leave() {
                    Self::close_subscription(caps, subscription);
                }
                model.staged_attachment = None;
                model.draft = None;
                caps.render.render();
            }

            Event::AttachmentSelected { bytes, file_size } => {
                match attachment::stage(bytes, file_size, &model.config) {
                    Ok(staged) => {
                        debug!(?staged, "image staged");
                        model.staged_attachment = Some(staged);
                    }
                    Err(e) => {
                        warn!(error = %e, "image rejected");
                        model.notify(&AppError::from(e));
                    }
                }
                caps.render.render();
            }

            Event::AttachmentCleared => {
                model.staged_attachment = None;
                caps.render.render();
            }

            Event::SendRequested { text } => {
                if Self::handle_send(model, caps, &text) {
                    caps.render.render();
                }
            }

            Event::CredentialsLoaded(result) => {
                let stored = match *result {
                    Ok(value) => value.map(|bytes| StoredCredentials::from_bytes(&bytes)),
                    Err(e) => {
                        let err = local_failure(ErrorKind::Storage, StorageKey::Credentials, e);
                        warn!(%err, "failed to read stored credentials");
                        None
                    }
                };

                match stored {
                    Some(Ok(creds)) => {
                        info!("replaying stored sign-in");
                        model.session = Session::SigningIn { auto: true };
                        Self::sign_in(caps, &creds, true);
                        model.pending_credentials = Some(creds);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "stored credentials are unreadable");
                        model.session = Session::SignedOut;
                    }
                    None => model.session = Session::SignedOut,
                }
                caps.render.render();
            }

            Event::LastSyncLoaded(result) => match *result {
                Ok(Some(bytes)) => {
                    // A snapshot that already landed is newer than the stored time.
                    if model.last_sync.is_none() {
                        model.last_sync = local_cache::decode_last_sync(&bytes);
                        caps.render.render();
                    }
                }
                Ok(None) => debug!("no previous sync recorded"),
                Err(e) => {
                    let err = local_failure(ErrorKind::Storage, StorageKey::LastSync, e);
                    warn!(%err, "failed to read last sync time");
                }
            },

            Event::SignInCompleted { auto, result } => {
                let creds = model.pending_credentials.take();
                match *result {
                    Ok(BackendOutput::SignedIn { uid, email }) => {
                        let display_name = creds
                            .as_ref()
                            .map(|c| c.display_name.clone())
                            .filter(|name| !name.is_empty())
                            .unwrap_or_else(|| fallback_display_name(&email));
                        info!(auto, %uid, "signed in");
                        model.session = Session::SignedIn(Account {
                            uid,
                            email,
                            display_name,
                        });
                        if let (false, Some(creds)) = (auto, &creds) {
                            Self::save_credentials(caps, creds);
                        }
                        Self::set_presence(model, caps, true);
                    }
                    Ok(other) => {
                        warn!(?other, "unexpected sign-in output");
                        model.session = Session::SignedOut;
                    }
                    Err(e) if auto => {
                        warn!(error = %e, "stored sign-in failed");
                        model.session = Session::SignedOut;
                    }
                    Err(e) => {
                        let err = AppError::from_auth(AuthFlow::Login, &e);
                        error!(%err, "sign-in failed");
                        model.session = Session::SignedOut;
                        model.notify(&err);
                    }
                }
                caps.render.render();
            }

            Event::SignUpCompleted(result) => {
                let creds = model.pending_credentials.take();
                match *result {
                    // The backend signs new accounts in straight away.
                    Ok(BackendOutput::SignedUp { uid, email }) => {
                        let display_name = creds
                            .as_ref()
                            .map(|c| c.display_name.clone())
                            .filter(|name| !name.is_empty())
                            .unwrap_or_else(|| fallback_display_name(&email));
                        info!(%uid, "registered");
                        model.session = Session::SignedIn(Account {
                            uid,
                            email,
                            display_name,
                        });
                        if let Some(creds) = &creds {
                            Self::save_credentials(caps, creds);
                        }
                        Self::set_presence(model, caps, true);
                        model.notice = Some(Notice::success("Success", "Registration succeeded!"));
                    }
                    Ok(other) => {
                        warn!(?other, "unexpected sign-up output");
                        model.session = Session::SignedOut;
                    }
                    Err(e) => {
                        let err = AppError::from_auth(AuthFlow::Register, &e);
                        error!(%err, "registration failed");
                        model.session = Session::SignedOut;
                        model.notify(&err);
                    }
                }
                caps.render.render();
            }

            Event::SignOutCompleted(result) => {
                match *result {
                    Ok(_) => {
                        info!("signed out");
                        Self::close_all_subscriptions(model, caps);
                        caps.key_value
                            .delete(StorageKey::Credentials.raw(), |result| {
                                Event::StorageWritten {
                                    key: StorageKey::Credentials,
                                    result: Box::new(result),
                                }
                            });
                        model.session = Session::SignedOut;
                        model.chat.reset();
                        model.directory.reset();
                        model.staged_attachment = None;
                        model.pending_uploads.clear();
                        model.draft = None;
                    }
                    Err(e) => {
                        let err = AppError::new(ErrorKind::SignOut, "Failed to log out")
                            .with_internal(e.to_string());
                        error!(%err, "sign-out failed");
                        if let Session::SigningOut(account) = &model.session {
                            model.session = Session::SignedIn(account.clone());
                            Self::set_presence(model, caps, true);
                        }
                        model.notify(&err);
                    }
                }
                caps.render.render();
            }

            Event::PresenceUpdated { online, result } => match *result {
                Ok(_) => debug!(online, "presence updated"),
                Err(e) => warn!(online, error = %e, "presence update failed"),
            },

            Event::UsersSnapshot {
                subscription,
                result,
            } => {
                if model.directory.subscription != Some(subscription) {
                    debug!(%subscription, "ignoring stale users snapshot");
                    return;
                }
                model.directory.loading = false;
                match *result {
                    Ok(BackendOutput::UsersSnapshot(users)) => {
                        debug!(count = users.len(), "users snapshot");
                        model.directory.users = users;
                    }
                    Ok(other) => warn!(?other, "unexpected users output"),
                    Err(e) => {
                        let err = AppError::new(
                            ErrorKind::RemoteRead,
                            "Failed to load users. Please try again.",
                        )
                        .with_internal(e.to_string());
                        error!(%err, "users listener failed");
                        model.notify(&err);
                    }
                }
                caps.render.render();
            }

            Event::CacheLoaded(result) => {
                match *result {
                    Ok(Some(bytes)) => {
                        let cached = local_cache::decode(&bytes);
                        let count = cached.len();
                        if model.chat.open && model.chat.restore_from_cache(cached) {
                            info!(count, "showing cached messages");
                        }
                    }
                    Ok(None) => debug!("no cached messages"),
                    Err(e) => {
                        let err = local_failure(ErrorKind::Storage, StorageKey::Messages, e);
                        warn!(%err, "failed to read cached messages");
                        model.notify(&err);
                    }
                }
                caps.render.render();
            }

            Event::MessagesSnapshot {
                subscription,
                result,
            } => {
                if !model.chat.is_current(subscription) {
                    debug!(%subscription, "ignoring stale message snapshot");
                    return;
                }
                match *result {
                    Ok(BackendOutput::MessagesSnapshot(docs)) => {
                        let count = model.chat.apply_snapshot(docs).len();
                        info!(count, "messages synced");
                        Self::persist_snapshot(model, caps);
                    }
                    Ok(other) => warn!(?other, "unexpected messages output"),
                    Err(e) => {
                        let err = AppError::new(
                            ErrorKind::RemoteRead,
                            format!("Failed to load messages: {}", e.message),
                        )
                        .with_internal(e.to_string());
                        error!(%err, "message listener failed");
                        model.notify(&err);
                    }
                }
                caps.render.render();
            }

            Event::Unsubscribed {
                subscription,
                result,
            } => match *result {
                Ok(_) => debug!(%subscription, "subscription closed"),
                Err(e) => warn!(%subscription, error = %e, "failed to close subscription"),
            },

            Event::MessageWritten { local_id, result } => match *result {
                Ok(BackendOutput::MessageAdded { id }) => {
                    info!(%local_id, remote_id = %id, "message accepted");
                }
                Ok(other) => warn!(?other, "unexpected write output"),
                Err(e) => {
                    let err = AppError::from_write(&e).with_context("local_id", local_id.as_str());
                    error!(%err, "message write failed");
                    model.notify(&err);
                    caps.render.render();
                }
            },

            Event::ImageUploaded { path, result } => {
                let Some(index) = model.pending_uploads.iter().position(|u| u.path == path) else {
                    warn!(%path, "upload finished without a pending send");
                    return;
                };
                let PendingUpload { text, staged, .. } = model.pending_uploads.remove(index);

                match *result {
                    Ok(BackendOutput::ImageUploaded { download_url }) => {
                        match attachment::remote(&download_url) {
                            Ok(attachment) => {
                                Self::deliver(model, caps, text, Some(attachment));
                            }
                            Err(e) => {
                                let err = AppError::from(e).with_context("path", path);
                                Self::upload_failed(model, &err, text, staged);
                            }
                        }
                    }
                    Ok(other) => {
                        let err = AppError::new(
                            ErrorKind::AttachmentProcessing,
                            "Failed to upload image. Please try again.",
                        )
                        .with_internal(format!("unexpected upload output: {other:?}"));
                        Self::upload_failed(model, &err, text, staged);
                    }
                    Err(e) => {
                        let err = AppError::new(
                            ErrorKind::RemoteWrite,
                            format!("Failed to upload image: {}", e.message),
                        )
                        .with_internal(e.to_string());
                        Self::upload_failed(model, &err, text, staged);
                    }
                }
                caps.render.render();
            }

            Event::OfflineAppendLoaded { message, result } => {
                let cached = match *result {
                    Ok(value) => value,
                    Err(e) => {
                        let err = local_failure(ErrorKind::Storage, StorageKey::Messages, e);
                        warn!(%err, "failed to read cached messages, starting a new list");
                        None
                    }
                };
                match local_cache::append(cached.as_deref(), &message) {
                    Ok(bytes) => Self::write_storage(caps, StorageKey::Messages, bytes),
                    Err(e) => {
                        let err = local_failure(ErrorKind::Serialization, StorageKey::Messages, e);
                        warn!(%err, "failed to cache offline message");
                        model.notify(&err);
                    }
                }
            }

            Event::StorageWritten { key, result } => {
                if let Err(e) = *result {
                    let err = local_failure(ErrorKind::Storage, key, e);
                    warn!(%err, "local storage write failed");
                    model.notify(&err);
                }
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::build(model, Timestamp::now())
    }
}

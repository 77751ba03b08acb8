use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capabilities::{BackendError, BackendErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Authentication,
    Validation,
    RemoteRead,
    RemoteWrite,
    AttachmentTooLarge,
    AttachmentEncodedTooLarge,
    AttachmentProcessing,
    AttachmentNeedsConnection,
    SignOut,
    Storage,
    Serialization,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Authentication => "AUTH_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::RemoteRead => "REMOTE_READ_ERROR",
            Self::RemoteWrite => "REMOTE_WRITE_ERROR",
            Self::AttachmentTooLarge => "ATTACHMENT_TOO_LARGE",
            Self::AttachmentEncodedTooLarge => "ATTACHMENT_ENCODED_TOO_LARGE",
            Self::AttachmentProcessing => "ATTACHMENT_PROCESSING_ERROR",
            Self::AttachmentNeedsConnection => "ATTACHMENT_NEEDS_CONNECTION",
            Self::SignOut => "SIGN_OUT_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
        }
    }

    /// Local persistence failures are logged and swallowed, never shown.
    #[must_use]
    pub const fn is_user_visible(self) -> bool {
        !matches!(self, Self::Storage | Self::Serialization)
    }
}

/// Which screen an authentication failure happened on. The same backend code
/// maps to a different fallback message for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthFlow {
    Login,
    Register,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Maps an authentication failure through the fixed per-flow table.
    #[must_use]
    pub fn from_auth(flow: AuthFlow, error: &BackendError) -> Self {
        let message = match (flow, error.kind) {
            (AuthFlow::Login, BackendErrorKind::UserNotFound) => {
                "Email is not registered. Please register first."
            }
            (AuthFlow::Login, BackendErrorKind::WrongPassword) => "Wrong password!",
            (AuthFlow::Login, BackendErrorKind::InvalidCredential) => {
                "Wrong email or password!"
            }
            (AuthFlow::Register, BackendErrorKind::EmailAlreadyInUse) => {
                "Email is already registered!"
            }
            (AuthFlow::Register, BackendErrorKind::WeakPassword) => "Password is too weak!",
            (_, BackendErrorKind::InvalidEmail) => "Invalid email format!",
            (AuthFlow::Login, _) => "An error occurred while logging in.",
            (AuthFlow::Register, _) => "An error occurred during registration.",
        };

        Self::new(ErrorKind::Authentication, message)
            .with_internal(error.to_string())
            .with_context("flow", format!("{flow:?}"))
    }

    /// Remote write failures. Oversized documents get their own message.
    #[must_use]
    pub fn from_write(error: &BackendError) -> Self {
        if error.is_document_too_large() {
            return Self::new(
                ErrorKind::AttachmentEncodedTooLarge,
                "The image is too large to store. Documents are limited to 1 MB.",
            )
            .with_internal(error.to_string());
        }

        Self::new(
            ErrorKind::RemoteWrite,
            format!("Failed to send message: {}", error.message),
        )
        .with_internal(error.to_string())
    }

    #[must_use]
    pub fn title(&self) -> &'static str {
        match self.kind {
            ErrorKind::Authentication => "Sign-in failed",
            ErrorKind::AttachmentTooLarge => "Image too large",
            ErrorKind::AttachmentEncodedTooLarge => "Image too large",
            ErrorKind::AttachmentNeedsConnection => "Offline",
            _ => "Error",
        }
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Authentication
            | ErrorKind::Validation
            | ErrorKind::RemoteRead
            | ErrorKind::RemoteWrite
            | ErrorKind::AttachmentProcessing
            | ErrorKind::AttachmentTooLarge
            | ErrorKind::SignOut => self.message.clone(),
            ErrorKind::AttachmentEncodedTooLarge => {
                "The image is too large after processing. Please pick a smaller image.".into()
            }
            ErrorKind::AttachmentNeedsConnection => {
                "Images can only be uploaded while online.".into()
            }
            ErrorKind::Storage | ErrorKind::Serialization => {
                "Unable to save data locally.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(code: &str) -> BackendError {
        BackendError::from_code(code, "boom")
    }

    #[test]
    fn login_codes_map_to_fixed_messages() {
        let cases = [
            ("auth/user-not-found", "Email is not registered. Please register first."),
            ("auth/wrong-password", "Wrong password!"),
            ("auth/invalid-email", "Invalid email format!"),
            ("auth/invalid-credential", "Wrong email or password!"),
            ("auth/something-new", "An error occurred while logging in."),
        ];

        for (code, expected) in cases {
            let err = AppError::from_auth(AuthFlow::Login, &backend(code));
            assert_eq!(err.kind, ErrorKind::Authentication);
            assert_eq!(err.user_facing_message(), expected, "code {code}");
        }
    }

    #[test]
    fn register_codes_map_to_fixed_messages() {
        let err = AppError::from_auth(AuthFlow::Register, &backend("auth/email-already-in-use"));
        assert_eq!(err.message, "Email is already registered!");

        let err = AppError::from_auth(AuthFlow::Register, &backend("auth/weak-password"));
        assert_eq!(err.message, "Password is too weak!");

        // Login-only codes fall back to the register default.
        let err = AppError::from_auth(AuthFlow::Register, &backend("auth/wrong-password"));
        assert_eq!(err.message, "An error occurred during registration.");
    }

    #[test]
    fn oversized_write_gets_specific_message() {
        let err = AppError::from_write(&backend("invalid-argument"));
        assert_eq!(err.kind, ErrorKind::AttachmentEncodedTooLarge);

        let err = AppError::from_write(&BackendError::from_code("unknown", "document size exceeds"));
        assert_eq!(err.kind, ErrorKind::AttachmentEncodedTooLarge);

        let err = AppError::from_write(&backend("unavailable"));
        assert_eq!(err.kind, ErrorKind::RemoteWrite);
        assert_eq!(err.user_facing_message(), "Failed to send message: boom");
    }

    #[test]
    fn storage_errors_are_not_user_visible() {
        assert!(!ErrorKind::Storage.is_user_visible());
        assert!(!ErrorKind::Serialization.is_user_visible());
        assert!(ErrorKind::RemoteWrite.is_user_visible());
    }

    #[test]
    fn display_includes_code_and_internal() {
        let err = AppError::new(ErrorKind::RemoteRead, "failed").with_internal("listener closed");
        assert_eq!(err.to_string(), "[REMOTE_READ_ERROR] failed (internal: listener closed)");
    }
}

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::error::{AppError, ErrorKind};
use crate::model::StoredCredentials;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("All fields are required!")]
    MissingFields,

    #[error("Password and confirmation do not match!")]
    PasswordMismatch,

    #[error("Password must be at least {min} characters!")]
    PasswordTooShort { min: usize },
}

impl From<CredentialError> for AppError {
    fn from(e: CredentialError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
    pub display_name: String,
}

impl LoginForm {
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

    /// All three fields are required; surrounding whitespace is dropped.
    pub fn validate(&self) -> Result<StoredCredentials, CredentialError> {
        let email = self.email.trim();
        let password = self.password.expose_secret().trim();
        let display_name = self.display_name.trim();

        if email.is_empty() || password.is_empty() || display_name.is_empty() {
            return Err(CredentialError::MissingFields);
        }

        Ok(StoredCredentials::new(email, password, display_name))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub display_name: String,
}

impl RegisterForm {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: SecretString::new(password.into()),
            confirm_password: SecretString::new(confirm_password.into()),
            display_name: display_name.into(),
        }
    }

    /// Confirmation and length are checked on the password as typed; the
    /// trimmed password is what gets registered and stored.
    pub fn validate(&self, min_password_len: usize) -> Result<StoredCredentials, CredentialError> {
        let email = self.email.trim();
        let password = self.password.expose_secret();
        let confirm = self.confirm_password.expose_secret();
        let display_name = self.display_name.trim();

        if email.is_empty() || password.trim().is_empty() || display_name.is_empty() {
            return Err(CredentialError::MissingFields);
        }
        if password != confirm {
            return Err(CredentialError::PasswordMismatch);
        }
        if password.chars().count() < min_password_len {
            return Err(CredentialError::PasswordTooShort {
                min: min_password_len,
            });
        }

        Ok(StoredCredentials::new(email, password.trim(), display_name))
    }
}

/// Name shown for the signed-in account when none was stored.
#[must_use]
pub fn fallback_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_every_field() {
        assert_eq!(
            LoginForm::new("  ", "secret", "Ana").validate().unwrap_err(),
            CredentialError::MissingFields
        );
        assert_eq!(
            LoginForm::new("a@b.c", "", "Ana").validate().unwrap_err(),
            CredentialError::MissingFields
        );
        assert_eq!(
            LoginForm::new("a@b.c", "secret", " ").validate().unwrap_err(),
            CredentialError::MissingFields
        );
    }

    #[test]
    fn login_trims_fields() {
        let creds = LoginForm::new(" a@b.c ", " secret ", " Ana ").validate().unwrap();
        assert_eq!(creds.email, "a@b.c");
        assert_eq!(creds.password.expose_secret(), "secret");
        assert_eq!(creds.display_name, "Ana");
    }

    #[test]
    fn register_checks_confirmation_then_length() {
        let form = RegisterForm::new("a@b.c", "abc", "abd", "Ana");
        assert_eq!(form.validate(6).unwrap_err(), CredentialError::PasswordMismatch);

        let form = RegisterForm::new("a@b.c", "abc", "abc", "Ana");
        assert_eq!(
            form.validate(6).unwrap_err(),
            CredentialError::PasswordTooShort { min: 6 }
        );

        let form = RegisterForm::new("a@b.c", "abcdef", "abcdef", "Ana");
        assert_eq!(form.validate(6).unwrap().email, "a@b.c");
    }

    #[test]
    fn registered_password_matches_a_later_login() {
        let registered = RegisterForm::new("a@b.c", " secret1 ", " secret1 ", "Ana")
            .validate(6)
            .unwrap();
        let login = LoginForm::new("a@b.c", " secret1 ", "Ana").validate().unwrap();

        assert_eq!(registered.password.expose_secret(), "secret1");
        assert_eq!(
            registered.password.expose_secret(),
            login.password.expose_secret()
        );
    }

    #[test]
    fn validation_messages_are_user_facing() {
        let err: AppError = CredentialError::PasswordTooShort { min: 6 }.into();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(
            err.user_facing_message(),
            "Password must be at least 6 characters!"
        );
    }

    #[test]
    fn fallback_name_is_local_part() {
        assert_eq!(fallback_display_name("ana@example.com"), "ana");
        assert_eq!(fallback_display_name("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn form_debug_hides_password() {
        let form = LoginForm::new("a@b.c", "hunter22", "Ana");
        assert!(!format!("{form:?}").contains("hunter22"));
    }
}

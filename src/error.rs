//! Unified error model for the access core.
//! Domain failures are typed so callers can branch on them; `AuthOutcome` flattens
//! them into the `{success, message}` shape that page-level collaborators render inline.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no user registered with email '{email}'")]
    UserNotFound { email: String },
    #[error("a user with email '{email}' already exists")]
    EmailAlreadyExists { email: String },
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email '{email}' has not been verified")]
    EmailNotVerified { email: String },
    #[error("persisted entry '{key}' is corrupt: {detail}")]
    PersistenceCorrupt { key: String, detail: String },
    #[error("cannot update role: no user with id '{id}'")]
    RoleUpdateTargetMissing { id: String },
    #[error("role '{id}' is reserved and cannot be deleted")]
    ReservedRoleDeletion { id: String },
    #[error("role '{id}' not found")]
    RoleNotFound { id: String },
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("storage unavailable: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound { .. } => "user_not_found",
            AuthError::EmailAlreadyExists { .. } => "email_already_exists",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::EmailNotVerified { .. } => "email_not_verified",
            AuthError::PersistenceCorrupt { .. } => "persistence_corrupt",
            AuthError::RoleUpdateTargetMissing { .. } => "role_update_target_missing",
            AuthError::ReservedRoleDeletion { .. } => "reserved_role_deletion",
            AuthError::RoleNotFound { .. } => "role_not_found",
            AuthError::InvalidInput { .. } => "invalid_input",
            AuthError::Storage(_) => "storage_error",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Message suitable for showing next to a login or registration form.
    /// Internal details never leak here; use `Display` for logs.
    pub fn message(&self) -> String {
        match self {
            AuthError::UserNotFound { .. } => "No user with this email was found".to_string(),
            AuthError::EmailAlreadyExists { .. } => "A user with this email already exists".to_string(),
            AuthError::InvalidCredentials => "Incorrect password".to_string(),
            AuthError::EmailNotVerified { .. } => "Email is not verified. Check your inbox.".to_string(),
            AuthError::RoleUpdateTargetMissing { .. } => "The user no longer exists".to_string(),
            AuthError::ReservedRoleDeletion { .. } => "Built-in roles cannot be deleted".to_string(),
            AuthError::RoleNotFound { .. } => "Role not found".to_string(),
            AuthError::InvalidInput { field, reason } => format!("Invalid {}: {}", field, reason),
            AuthError::PersistenceCorrupt { .. }
            | AuthError::Storage(_)
            | AuthError::Internal(_) => "Something went wrong, please try again".to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::PersistenceCorrupt { .. } | AuthError::Storage(_) | AuthError::Internal(_))
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Internal(format!("serialization: {}", err))
    }
}

/// Flattened `{success, message}` result handed to UI collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl AuthOutcome {
    pub fn ok() -> Self { Self { success: true, message: None, code: None } }

    pub fn ok_with<S: Into<String>>(message: S) -> Self {
        Self { success: true, message: Some(message.into()), code: None }
    }

    pub fn failed(err: &AuthError) -> Self {
        Self { success: false, message: Some(err.message()), code: Some(err.code().to_string()) }
    }
}

impl<T> From<&AuthResult<T>> for AuthOutcome {
    fn from(res: &AuthResult<T>) -> Self {
        match res {
            Ok(_) => AuthOutcome::ok(),
            Err(e) => AuthOutcome::failed(e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;

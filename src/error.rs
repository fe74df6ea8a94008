//! Operation errors reported back to the console.
//!
//! Every variant is recoverable: the operation is aborted (or, for
//! persistence failures, the in-memory change stands) and the message is
//! shown to whoever initiated it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("All fields must be filled in (missing: {0})")]
    MissingField(&'static str),

    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Username '{0}' already exists or is reserved")]
    UsernameTaken(String),

    #[error("Site '{0}' already exists")]
    SiteExists(String),

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("Site '{0}' not found")]
    SiteNotFound(String),

    #[error("The administrator account cannot be modified or removed")]
    AdminProtected,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Already logged in as {0}; log out first")]
    AlreadyLoggedIn(String),

    #[error("No user logged in")]
    NotLoggedIn,

    #[error("Administrator access required")]
    AdminRequired,

    #[error("Failed to save data: {0}")]
    Persist(#[source] anyhow::Error),
}

impl RegistryError {
    pub fn invalid_number(field: &'static str, value: &str) -> Self {
        Self::InvalidNumber {
            field,
            value: value.to_string(),
        }
    }

    /// Short machine-readable code, used in the audit log
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::UsernameTaken(_) | Self::SiteExists(_) => "duplicate",
            Self::UserNotFound(_) | Self::SiteNotFound(_) => "not_found",
            Self::AdminProtected => "admin_protected",
            Self::PasswordMismatch => "password_mismatch",
            Self::InvalidCredentials => "invalid_credentials",
            Self::AlreadyLoggedIn(_) => "already_logged_in",
            Self::NotLoggedIn => "not_logged_in",
            Self::AdminRequired => "admin_required",
            Self::Persist(_) => "persist_failed",
        }
    }
}

pub type OpResult<T = String> = std::result::Result<T, RegistryError>;

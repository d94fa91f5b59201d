//! Client error taxonomy.
//!
//! Every failure is caught at the operation boundary and turned into a
//! [`ClientError`]; [`ClientError::user_message`] is what a portal shows.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, timeout, or a 5xx from the backend.
    #[error("network error: {0}")]
    Network(String),

    /// The backend already holds a submission for this assignment.
    #[error("already submitted")]
    AlreadySubmitted,

    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// Rejected input, either locally before any request or by the server.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Maps an HTTP status + body message onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 409 || message.to_lowercase().contains("already submitted") {
            return ClientError::AlreadySubmitted;
        }
        match status {
            401 | 403 => ClientError::Unauthorized(message),
            400 | 422 => ClientError::Validation(message),
            404 => ClientError::NotFound(message),
            500..=599 => ClientError::Network(format!("server error {status}: {message}")),
            _ => ClientError::Backend { status, message },
        }
    }

    /// Failures worth retrying later without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    /// Soft success: the state the user asked for already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::AlreadySubmitted)
    }

    /// Dismissable, user-facing text.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => {
                "Could not reach the server. Please check your connection and try again.".into()
            }
            ClientError::AlreadySubmitted => "This assignment has already been submitted.".into(),
            ClientError::Unauthorized(_) => {
                "Your session does not allow this action. Please sign in again.".into()
            }
            ClientError::Validation(msg) => msg.clone(),
            ClientError::NotFound(_) => "The requested item no longer exists.".into(),
            ClientError::Backend { message, .. } if !message.is_empty() => message.clone(),
            ClientError::Backend { .. } | ClientError::Decode(_) => {
                "Something went wrong. Please try again.".into()
            }
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => ClientError::from_status(status.as_u16(), err.to_string()),
            None => ClientError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errs: validator::ValidationErrors) -> Self {
        ClientError::Validation(common::format_validation_errors(&errs))
    }
}

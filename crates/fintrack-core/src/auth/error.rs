use std::sync::Arc;

use thiserror::Error;

/// Failures while obtaining a token.
///
/// `Clone` so one refresh result can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("Identity provider unreachable: {0}")]
    Transport(Arc<reqwest::Error>),

    #[error("Invalid identity provider response: {0}")]
    InvalidResponse(String),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Transport(Arc::new(e))
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Store(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt token entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Token store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Maximum length for response bodies carried in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

impl AuthError {
    /// Build an error from a rejected identity provider response.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated)", &body[..end])
        };
        AuthError::AuthenticationFailure(format!("status {}: {}", status, body))
    }

    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, AuthError::AuthenticationFailure(_))
    }
}

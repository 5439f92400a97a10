use thiserror::Error;

use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Could not obtain a session token: {0}")]
    Authentication(#[from] AuthError),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - backend rejected the token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// True when the failure happened before any backend request was sent.
    pub fn is_token_failure(&self) -> bool {
        matches!(self, ApiError::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        let cases = [
            (StatusCode::UNAUTHORIZED, ""),
            (StatusCode::FORBIDDEN, "no"),
            (StatusCode::NOT_FOUND, ""),
            (StatusCode::TOO_MANY_REQUESTS, ""),
            (StatusCode::BAD_GATEWAY, ""),
            (StatusCode::IM_A_TEAPOT, ""),
        ];
        let [unauthorized, forbidden, not_found, rate_limited, bad_gateway, teapot] =
            cases.map(|(status, body)| ApiError::from_status(status, body));

        assert!(matches!(unauthorized, ApiError::Unauthorized));
        assert!(matches!(forbidden, ApiError::AccessDenied(_)));
        assert!(matches!(not_found, ApiError::NotFound(_)));
        assert!(matches!(rate_limited, ApiError::RateLimited));
        assert!(matches!(bad_gateway, ApiError::ServerError(_)));
        assert!(matches!(teapot, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_body() {
        let body = "é".repeat(400);
        let msg = ApiError::truncate_body(&body);
        assert!(msg.contains("truncated, 800 total bytes"));
    }
}

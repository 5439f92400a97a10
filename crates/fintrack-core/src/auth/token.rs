use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Stable identifier of the logged-in account (the identity provider's `$id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A serialized bearer JWT.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

// Tokens end up in logs through `?token`; only show a prefix.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(12).collect();
        write!(f, "Token({}...)", prefix)
    }
}

/// Claims we care about from the JWT payload. Everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub exp: Option<i64>,
    #[serde(default, alias = "userId")]
    pub sub: Option<String>,
}

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the payload segment without verifying the signature.
    /// Verification is the backend's job; the client only needs `exp`.
    pub fn claims(&self) -> Result<TokenClaims, AuthError> {
        let mut parts = self.0.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) => payload,
            _ => {
                return Err(AuthError::MalformedToken(
                    "expected three dot-separated segments".to_string(),
                ))
            }
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::MalformedToken(format!("payload is not JSON claims: {}", e)))
    }

    /// The embedded expiration instant.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, AuthError> {
        let exp = self
            .claims()?
            .exp
            .ok_or_else(|| AuthError::MalformedToken("missing exp claim".to_string()))?;
        DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::MalformedToken(format!("exp {} out of range", exp)))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decides whether a stored token is still usable.
///
/// A token is expired when `exp - leeway <= now`. Missing tokens and tokens
/// that fail to decode are always expired, so the caller re-issues instead
/// of surfacing a decode error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenValidator {
    leeway: Duration,
}

impl TokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat tokens as expired this long before their `exp`.
    pub fn with_leeway(leeway: Duration) -> Self {
        Self { leeway }
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    pub fn is_expired(&self, token: Option<&Token>) -> bool {
        self.is_expired_at(token, Utc::now())
    }

    pub fn is_expired_at(&self, token: Option<&Token>, now: DateTime<Utc>) -> bool {
        let Some(token) = token else {
            return true;
        };
        match token.expires_at() {
            // An instant before the representable range is long past.
            Ok(expiry) => expiry.checked_sub_signed(self.leeway).map_or(true, |t| t <= now),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    "Stored token could not be decoded, treating as expired"
                );
                true
            }
        }
    }
}

/// Build an unsigned JWT with the given `exp` (seconds since the epoch).
#[cfg(test)]
pub(crate) fn test_token(exp: i64) -> Token {
    test_token_with_payload(&serde_json::json!({ "exp": exp, "userId": "user1" }))
}

#[cfg(test)]
pub(crate) fn test_token_with_payload(payload: &serde_json::Value) -> Token {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    Token::new(format!("{}.{}.c2lnbmF0dXJl", header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_token_is_expired() {
        assert!(TokenValidator::new().is_expired(None));
    }

    #[test]
    fn test_future_expiry_is_valid() {
        let token = test_token(Utc::now().timestamp() + 3600);
        assert!(!TokenValidator::new().is_expired(Some(&token)));
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let token = test_token(Utc::now().timestamp() - 1);
        assert!(TokenValidator::new().is_expired(Some(&token)));
    }

    #[test]
    fn test_expiry_equal_to_now_is_expired() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = test_token(1_700_000_000);
        assert!(TokenValidator::new().is_expired_at(Some(&token), now));

        let later = test_token(1_700_000_001);
        assert!(!TokenValidator::new().is_expired_at(Some(&later), now));
    }

    #[test]
    fn test_leeway_expires_early() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = test_token(1_700_000_000 + 60);
        let validator = TokenValidator::with_leeway(Duration::minutes(5));
        assert!(validator.is_expired_at(Some(&token), now));
        assert!(!TokenValidator::new().is_expired_at(Some(&token), now));
    }

    #[test]
    fn test_leeway_past_earliest_instant_is_expired() {
        let token = test_token(DateTime::<Utc>::MIN_UTC.timestamp());
        let validator = TokenValidator::with_leeway(Duration::seconds(60));
        assert!(validator.is_expired(Some(&token)));

        let far = TokenValidator::with_leeway(Duration::days(365 * 1000));
        let soon = test_token(Utc::now().timestamp() + 3600);
        assert!(far.is_expired(Some(&soon)));
    }

    #[test]
    fn test_malformed_tokens_are_expired() {
        let validator = TokenValidator::new();
        for raw in ["", "not-a-jwt", "a.b", "a.!!!.c", "a.b.c.d"] {
            assert!(validator.is_expired(Some(&Token::new(raw))), "{:?}", raw);
        }
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let token = test_token_with_payload(&serde_json::json!({ "userId": "user1" }));
        assert!(matches!(token.expires_at(), Err(AuthError::MalformedToken(_))));
        assert!(TokenValidator::new().is_expired(Some(&token)));
    }

    #[test]
    fn test_claims_user_id_alias() {
        let token = test_token(1_700_000_000);
        let claims = token.claims().unwrap();
        assert_eq!(claims.exp, Some(1_700_000_000));
        assert_eq!(claims.sub.as_deref(), Some("user1"));
    }

    #[test]
    fn test_debug_hides_token() {
        let token = test_token(1_700_000_000);
        let shown = format!("{:?}", token);
        assert!(shown.len() < token.as_str().len());
        assert!(shown.starts_with("Token("));
    }
}

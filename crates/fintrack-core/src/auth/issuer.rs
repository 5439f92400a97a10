use async_trait::async_trait;

use super::{AuthError, Token};

/// Requests fresh tokens from the identity provider.
///
/// Implementations authenticate with the ambient session (cookies already
/// held by their HTTP client) and never persist what they issue. Persisting is
/// the [`SessionCoordinator`](super::SessionCoordinator)'s job.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self) -> Result<Token, AuthError>;
}

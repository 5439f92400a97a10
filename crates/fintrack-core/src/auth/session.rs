//! Hands out currently-valid tokens, refreshing them when needed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{AuthError, CredentialStore, SessionIdentity, Token, TokenIssuer, TokenValidator};

type RefreshFuture = Shared<BoxFuture<'static, Result<Token, AuthError>>>;

/// Guarantees callers a token that was valid when handed over.
///
/// Build one per process and pass it (usually as `Arc<SessionCoordinator>`)
/// to everything that talks to the backend. At most one refresh is in flight
/// per identity; concurrent callers for the same identity share its result.
pub struct SessionCoordinator {
    store: Arc<dyn CredentialStore>,
    issuer: Arc<dyn TokenIssuer>,
    validator: TokenValidator,
    in_flight: Arc<Mutex<HashMap<SessionIdentity, RefreshFuture>>>,
}

impl SessionCoordinator {
    pub fn new(store: Arc<dyn CredentialStore>, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            store,
            issuer,
            validator: TokenValidator::new(),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_validator(mut self, validator: TokenValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Return a token for `identity` that has not expired, issuing and storing
    /// a new one when the stored token is missing, expired or undecodable.
    ///
    /// Issuance failures are returned as-is. The store is only written after
    /// a successful issuance, and is never rolled back to a stale token.
    pub async fn get_valid_token(&self, identity: &SessionIdentity) -> Result<Token, AuthError> {
        let stored = self.store.read(identity)?;
        if let Some(token) = stored.filter(|t| !self.validator.is_expired(Some(t))) {
            debug!(%identity, "Using stored token");
            return Ok(token);
        }

        let refresh = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(identity) {
                Some(pending) => {
                    debug!(%identity, "Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let refresh = self.refresh(identity.clone()).boxed().shared();
                    in_flight.insert(identity.clone(), refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Drop the stored token for `identity` (logout).
    pub fn forget(&self, identity: &SessionIdentity) -> Result<(), AuthError> {
        self.store.remove(identity)?;
        Ok(())
    }

    fn refresh(
        &self,
        identity: SessionIdentity,
    ) -> impl Future<Output = Result<Token, AuthError>> + Send + 'static {
        let store = Arc::clone(&self.store);
        let issuer = Arc::clone(&self.issuer);
        let validator = self.validator;
        let in_flight = Arc::clone(&self.in_flight);

        async move {
            let result = refresh_token(store.as_ref(), issuer.as_ref(), validator, &identity).await;
            in_flight.lock().await.remove(&identity);
            result
        }
    }
}

async fn refresh_token(
    store: &dyn CredentialStore,
    issuer: &dyn TokenIssuer,
    validator: TokenValidator,
    identity: &SessionIdentity,
) -> Result<Token, AuthError> {
    // A previous refresh may have landed between the caller's read and now.
    if let Some(token) = store.read(identity)?.filter(|t| !validator.is_expired(Some(t))) {
        debug!(%identity, "Token was refreshed by an earlier caller");
        return Ok(token);
    }

    info!(%identity, "Token expired or absent, requesting a new one");
    let issued = issuer.issue().await.inspect_err(|e| {
        warn!(%identity, error = %e, "Token issuance failed");
    })?;

    if TokenValidator::new().is_expired(Some(&issued)) {
        return Err(AuthError::InvalidResponse(
            "identity provider issued an expired or undecodable token".to_string(),
        ));
    }
    if validator.is_expired(Some(&issued)) {
        // Every call will re-issue until the leeway is lowered.
        warn!(
            %identity,
            leeway_secs = validator.leeway().num_seconds(),
            "Issued token lives shorter than the refresh leeway"
        );
    }

    store.write(identity, &issued)?;

    // Re-read rather than returning `issued`, so callers always get what the
    // store holds.
    store.read(identity)?.ok_or_else(|| {
        AuthError::Store(format!("token for {} missing right after write", identity))
    })
}

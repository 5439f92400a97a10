//! API client for the transaction backend.
//!
//! Every request asks the [`SessionCoordinator`] for a valid token first and
//! sends it as a bearer token. Requests go through the identity client's
//! HTTP client so the session cookie rides along too.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{SessionCoordinator, SessionIdentity, Token};
use crate::models::{Account, DashboardSnapshot, Transaction, TransactionRow, TransactionSummary};

use super::ApiError;

/// Default backend base URL (local development server)
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Backend client. Clone is cheap: the HTTP client and coordinator are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    sessions: Arc<SessionCoordinator>,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str, sessions: Arc<SessionCoordinator>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            sessions,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request, backing off on 429. The same token is reused across
    /// retries; a rejected token is reported, never refreshed here.
    async fn execute<T, F>(&self, token: &Token, what: &str, build: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().bearer_auth(token.as_str()).send().await?;

            if response.status().is_success() {
                return response
                    .json()
                    .await
                    .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", what, e)));
            }

            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(what, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body));
        }
    }

    /// Upload parsed statement rows. Nothing is sent if no token can be obtained.
    pub async fn upload_transactions(
        &self,
        identity: &SessionIdentity,
        rows: &[TransactionRow],
    ) -> Result<Value, ApiError> {
        let token = self.sessions.get_valid_token(identity).await?;
        let url = self.url("/transactions/");
        let response: Value = self
            .execute(&token, "upload transactions", || self.client.post(&url).json(rows))
            .await?;
        debug!(%identity, rows = rows.len(), "Transactions uploaded");
        Ok(response)
    }

    pub async fn fetch_transactions(
        &self,
        identity: &SessionIdentity,
    ) -> Result<Vec<Transaction>, ApiError> {
        let token = self.sessions.get_valid_token(identity).await?;
        self.fetch_transactions_with(&token).await
    }

    pub async fn fetch_summary(
        &self,
        identity: &SessionIdentity,
    ) -> Result<TransactionSummary, ApiError> {
        let token = self.sessions.get_valid_token(identity).await?;
        self.fetch_summary_with(&token).await
    }

    async fn fetch_transactions_with(&self, token: &Token) -> Result<Vec<Transaction>, ApiError> {
        let url = self.url("/transactions/");
        self.execute(token, "transactions", || self.client.get(&url))
            .await
    }

    async fn fetch_summary_with(&self, token: &Token) -> Result<TransactionSummary, ApiError> {
        let url = self.url("/summary/");
        self.execute(token, "summary", || self.client.get(&url)).await
    }

    /// Everything the landing page needs, using a single token.
    /// The transaction list is required; a failed summary degrades to zeros.
    pub async fn load_dashboard(&self, account: Account) -> Result<DashboardSnapshot, ApiError> {
        let token = self.sessions.get_valid_token(&account.identity()).await?;

        let (transactions, summary) = futures::join!(
            self.fetch_transactions_with(&token),
            self.fetch_summary_with(&token),
        );

        let summary = match summary {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Failed to load summary");
                None
            }
        };

        Ok(DashboardSnapshot {
            account,
            transactions: transactions?,
            summary,
        })
    }
}

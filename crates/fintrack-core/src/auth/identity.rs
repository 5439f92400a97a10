//! Client for the identity provider (Appwrite-style account API).
//!
//! The provider authenticates with a session cookie set at login. That
//! cookie lives in a jar shared with every request made through
//! [`IdentityClient::http_client`], so backend calls carry it as well.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use super::{AuthError, Token, TokenIssuer};
use crate::models::Account;

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header naming the provider project on every identity request
const PROJECT_HEADER: &str = "X-Appwrite-Project";

/// Session cookies are named `a_session_<project>`
const SESSION_COOKIE_PREFIX: &str = "a_session_";

#[derive(Debug, Deserialize)]
struct JwtResponse {
    jwt: String,
}

#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    jar: Arc<Jar>,
    endpoint: Url,
    project_id: String,
}

impl IdentityClient {
    pub fn new(endpoint: &str, project_id: &str) -> Result<Self, AuthError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            AuthError::InvalidResponse(format!("invalid identity endpoint {}: {}", endpoint, e))
        })?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            client,
            jar,
            endpoint,
            project_id: project_id.to_string(),
        })
    }

    /// The HTTP client holding the ambient session cookies.
    /// Clone is cheap and shares the connection pool and cookie jar.
    pub fn http_client(&self) -> Client {
        self.client.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.as_str().trim_end_matches('/'), path)
    }

    /// Put a previously saved session cookie (`name=value`) back into the jar.
    pub fn restore_session(&self, cookie: &str) {
        self.jar.add_cookie_str(cookie, &self.endpoint);
    }

    /// Create an email/password session. Returns the session cookie so the
    /// caller can persist it.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(self.url("/account/sessions/email"))
            .header(PROJECT_HEADER, &self.project_id)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_status(status, &body));
        }

        let cookie = response
            .cookies()
            .find(|c| c.name().starts_with(SESSION_COOKIE_PREFIX) && !c.name().ends_with("_legacy"))
            .map(|c| format!("{}={}", c.name(), c.value()))
            .ok_or_else(|| {
                AuthError::InvalidResponse("login response carried no session cookie".to_string())
            })?;

        info!(email, "Identity provider session created");
        Ok(cookie)
    }

    /// Look up the account behind the ambient session.
    pub async fn current_account(&self) -> Result<Account, AuthError> {
        let response = self
            .client
            .get(self.url("/account"))
            .header(PROJECT_HEADER, &self.project_id)
            .send()
            .await?;
        let response = check_response(response).await?;

        let account: Account = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("account: {}", e)))?;
        debug!(account_id = %account.id, "Resolved current account");
        Ok(account)
    }

    /// End the provider session.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let response = self
            .client
            .delete(self.url("/account/sessions/current"))
            .header(PROJECT_HEADER, &self.project_id)
            .send()
            .await?;
        check_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenIssuer for IdentityClient {
    async fn issue(&self) -> Result<Token, AuthError> {
        let response = self
            .client
            .post(self.url("/account/jwts"))
            .header(PROJECT_HEADER, &self.project_id)
            .send()
            .await?;
        let response = check_response(response).await?;

        let body: JwtResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("jwt: {}", e)))?;
        debug!("Identity provider issued a new token");
        Ok(Token::new(body.jwt))
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AuthError::from_status(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::test_token;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use serde_json::json;

    fn client_for(server: &Server) -> IdentityClient {
        IdentityClient::new(&server.url_str("/v1"), "proj").unwrap()
    }

    #[tokio::test]
    async fn test_issue_returns_jwt() {
        let server = Server::run();
        let jwt = test_token(1_900_000_000);
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/account/jwts"),
                request::headers(contains(("x-appwrite-project", "proj"))),
            ])
            .respond_with(json_encoded(json!({ "jwt": jwt.as_str() }))),
        );

        let token = client_for(&server).issue().await.unwrap();
        assert_eq!(token, jwt);
    }

    #[tokio::test]
    async fn test_issue_rejected_is_authentication_failure() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/account/jwts"))
                .respond_with(
                    status_code(401)
                        .body(r#"{"message":"User (role: guests) missing scope (account)"}"#),
                ),
        );

        let err = client_for(&server).issue().await.unwrap_err();
        assert!(err.is_authentication_failure());
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_issue_bad_body_is_invalid_response() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/account/jwts"))
                .respond_with(json_encoded(json!({ "token": "nope" }))),
        );

        let err = client_for(&server).issue().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_login_cookie_is_sent_on_later_requests() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/v1/account/sessions/email"),
                request::body(json_decoded(eq(json!({
                    "email": "ana@example.com",
                    "password": "hunter22",
                })))),
            ])
            .respond_with(
                status_code(201)
                    .append_header("Set-Cookie", "a_session_proj=secret; Path=/; HttpOnly")
                    .append_header("Set-Cookie", "a_session_proj_legacy=secret; Path=/; HttpOnly")
                    .body(r#"{"$id":"sess1"}"#),
            ),
        );
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/v1/account"),
                request::headers(contains(key("cookie"))),
            ])
            .respond_with(json_encoded(json!({
                "$id": "user1",
                "name": "Ana Lopez",
                "email": "ana@example.com",
                "prefs": { "currency": "EUR" },
            }))),
        );

        let client = client_for(&server);
        let cookie = client.login("ana@example.com", "hunter22").await.unwrap();
        assert_eq!(cookie, "a_session_proj=secret");

        let account = client.current_account().await.unwrap();
        assert_eq!(account.id, "user1");
        assert_eq!(account.currency(), "EUR");
    }

    #[tokio::test]
    async fn test_restored_session_cookie_is_sent() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("DELETE", "/v1/account/sessions/current"),
                request::headers(contains(("cookie", "a_session_proj=restored"))),
            ])
            .respond_with(status_code(204)),
        );

        let client = client_for(&server);
        client.restore_session("a_session_proj=restored");
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/v1/account/sessions/email"))
                .respond_with(status_code(401)),
        );

        let err = client_for(&server)
            .login("ana@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(IdentityClient::new("not a url", "proj").is_err());
    }
}

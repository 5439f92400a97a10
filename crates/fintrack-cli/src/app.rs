//! Wiring for the command line front end.
//!
//! `App` builds the identity client, token store, session coordinator and
//! backend client once, and owns the login/logout flow.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use fintrack_core::auth::{IdentityClient, SessionCookieVault, SessionCoordinator};
use fintrack_core::models::Account;
use fintrack_core::{ApiClient, Config};

pub struct App {
    pub config: Config,
    identity: IdentityClient,
    sessions: Arc<SessionCoordinator>,
    api: ApiClient,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let identity = IdentityClient::new(&config.identity_endpoint, config.project_id()?)
            .context("Failed to create identity provider client")?;

        if let Some(ref email) = config.last_email {
            match SessionCookieVault::load(email) {
                Ok(Some(cookie)) => {
                    identity.restore_session(&cookie);
                    debug!(email = %email, "Restored identity provider session");
                }
                Ok(None) => debug!(email = %email, "No saved session cookie"),
                Err(e) => warn!(error = %e, "Failed to load saved session cookie"),
            }
        }

        let store = config.token_store()?;
        let sessions = Arc::new(
            SessionCoordinator::new(store, Arc::new(identity.clone()))
                .with_validator(config.validator()),
        );
        let api = ApiClient::new(
            identity.http_client(),
            &config.api_base_url,
            Arc::clone(&sessions),
        );

        Ok(Self {
            config,
            identity,
            sessions,
            api,
        })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn sessions(&self) -> &SessionCoordinator {
        &self.sessions
    }

    /// Look up the logged-in account.
    pub async fn account(&self) -> Result<Account> {
        match self.identity.current_account().await {
            Ok(account) => Ok(account),
            Err(e) if e.is_authentication_failure() => Err(anyhow::anyhow!(
                "Not logged in ({}). Run `fintrack login` first.",
                e
            )),
            Err(e) => Err(e).context("Failed to look up the current account"),
        }
    }

    /// Interactive login. Prompts for anything not given.
    pub async fn login(&mut self, email: Option<String>) -> Result<Account> {
        let email = match email {
            Some(email) => email,
            None => Self::prompt_email(self.config.last_email.as_deref())?,
        };
        if email.is_empty() {
            return Err(anyhow::anyhow!("Email required"));
        }
        let password = rpassword::prompt_password("Password: ")?;

        let cookie = self
            .identity
            .login(&email, &password)
            .await
            .context("Login failed")?;

        if let Err(e) = SessionCookieVault::store(&email, &cookie) {
            warn!(
                error = %e,
                "Failed to save session cookie; you will need to log in again next time"
            );
        }

        let account = self.identity.current_account().await?;
        self.config.last_email = Some(email);
        self.config.last_account_id = Some(account.id.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.sessions.get_valid_token(&account.identity()).await?;
        info!(account_id = %account.id, "Login successful");
        Ok(account)
    }

    /// End the provider session and forget everything stored for it.
    pub async fn logout(&mut self) -> Result<()> {
        // An expired provider session can't name its account, so fall back
        // to the one recorded at login.
        let identity = match self.identity.current_account().await {
            Ok(account) => Some(account.identity()),
            Err(e) => {
                debug!(error = %e, "Could not resolve account, using last login");
                self.config.last_identity()
            }
        };
        match identity {
            Some(identity) => self.sessions.forget(&identity)?,
            None => warn!("No known account; stored token left in place"),
        }

        if let Err(e) = self.identity.logout().await {
            warn!(error = %e, "Identity provider logout failed");
        }

        if let Some(email) = self.config.last_email.take() {
            SessionCookieVault::delete(&email)?;
        }
        self.config.last_account_id = None;
        self.config.save()?;
        info!("Logged out");
        Ok(())
    }

    fn prompt_email(last: Option<&str>) -> Result<String> {
        match last {
            Some(last) => print!("Email [{}]: ", last),
            None => print!("Email: "),
        }
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim();

        Ok(match (input.is_empty(), last) {
            (true, Some(last)) => last.to_string(),
            _ => input.to_string(),
        })
    }
}

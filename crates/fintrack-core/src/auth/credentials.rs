use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use keyring::Entry;

use super::{CredentialStore, SessionIdentity, StoreError, Token};

/// Keychain service holding bearer tokens, one entry per identity
const TOKEN_SERVICE: &str = "fintrack-token";

/// Keychain service holding the identity provider session cookie
const SESSION_SERVICE: &str = "fintrack-session";

/// Token store backed by the OS keychain.
///
/// Entry handles are kept per identity; the secret itself is always read
/// from the keychain.
#[derive(Default)]
pub struct KeyringStore {
    entries: Mutex<HashMap<SessionIdentity, Arc<Entry>>>,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, identity: &SessionIdentity) -> Result<Arc<Entry>, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(entry) = entries.get(identity) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(Entry::new(TOKEN_SERVICE, identity.as_str())?);
        entries.insert(identity.clone(), Arc::clone(&entry));
        Ok(entry)
    }
}

impl CredentialStore for KeyringStore {
    fn read(&self, identity: &SessionIdentity) -> Result<Option<Token>, StoreError> {
        match self.entry(identity)?.get_password() {
            Ok(raw) => Ok(Some(Token::new(raw))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, identity: &SessionIdentity, token: &Token) -> Result<(), StoreError> {
        self.entry(identity)?.set_password(token.as_str())?;
        Ok(())
    }

    fn remove(&self, identity: &SessionIdentity) -> Result<(), StoreError> {
        match self.entry(identity)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Persists the identity provider's session cookie (`name=value`) so the
/// ambient session survives between runs.
pub struct SessionCookieVault;

impl SessionCookieVault {
    /// Store the session cookie for a login email
    pub fn store(email: &str, cookie: &str) -> Result<()> {
        let entry = Entry::new(SESSION_SERVICE, email)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(cookie)
            .context("Failed to store session cookie in keychain")?;
        Ok(())
    }

    /// Load the session cookie for a login email, if one was saved
    pub fn load(email: &str) -> Result<Option<String>> {
        let entry = Entry::new(SESSION_SERVICE, email)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(cookie) => Ok(Some(cookie)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session cookie from keychain"),
        }
    }

    /// Delete the saved session cookie for a login email
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SESSION_SERVICE, email)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session cookie from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::check_store_contract;

    #[test]
    fn test_keyring_store_contract() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        check_store_contract(&KeyringStore::new());
    }
}

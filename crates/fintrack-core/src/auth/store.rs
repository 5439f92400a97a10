//! Client-side token storage, one entry per session identity.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SessionIdentity, StoreError, Token};

/// Subdirectory of the cache directory holding token files
const TOKEN_DIR: &str = "tokens";

/// Durable storage for the current token of each identity.
///
/// Reads and writes are synchronous. A `read` right after a `write` for the
/// same identity observes the written value.
pub trait CredentialStore: Send + Sync {
    /// Returns `Ok(None)` when no token is stored for `identity`.
    fn read(&self, identity: &SessionIdentity) -> Result<Option<Token>, StoreError>;

    /// Store `token`, replacing any previous value for `identity`.
    fn write(&self, identity: &SessionIdentity, token: &Token) -> Result<(), StoreError>;

    /// Forget the token for `identity`. Removing a missing entry succeeds.
    fn remove(&self, identity: &SessionIdentity) -> Result<(), StoreError>;
}

/// In-process store. Tokens live as long as the process does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: RwLock<HashMap<SessionIdentity, Token>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn read(&self, identity: &SessionIdentity) -> Result<Option<Token>, StoreError> {
        let tokens = self.tokens.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tokens.get(identity).cloned())
    }

    fn write(&self, identity: &SessionIdentity, token: &Token) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().map_err(|_| StoreError::Poisoned)?;
        tokens.insert(identity.clone(), token.clone());
        Ok(())
    }

    fn remove(&self, identity: &SessionIdentity) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().map_err(|_| StoreError::Poisoned)?;
        tokens.remove(identity);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    token: Token,
    stored_at: DateTime<Utc>,
}

/// JSON file per identity under `<cache_dir>/tokens/`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            dir: cache_dir.join(TOKEN_DIR),
        }
    }

    // Identities are opaque, so encode them rather than trusting them as file names.
    fn token_path(&self, identity: &SessionIdentity) -> PathBuf {
        let name = URL_SAFE_NO_PAD.encode(identity.as_str());
        self.dir.join(format!("{}.json", name))
    }
}

impl CredentialStore for FileStore {
    fn read(&self, identity: &SessionIdentity) -> Result<Option<Token>, StoreError> {
        let path = self.token_path(identity);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        // An unreadable entry is as good as none; the next write replaces it.
        let stored: StoredToken = match serde_json::from_str(&contents) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(%identity, error = %e, "Discarding unreadable token file");
                return Ok(None);
            }
        };
        debug!(%identity, stored_at = %stored.stored_at, "Read token from file store");
        Ok(Some(stored.token))
    }

    fn write(&self, identity: &SessionIdentity, token: &Token) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let path = self.token_path(identity);
        let stored = StoredToken {
            token: token.clone(),
            stored_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;

        // Write-then-rename so a concurrent read never sees a half-written file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;
        Ok(())
    }

    fn remove(&self, identity: &SessionIdentity) -> Result<(), StoreError> {
        let path = self.token_path(identity);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

/// Behavior every `CredentialStore` must show, starting from an empty store.
#[cfg(test)]
pub(crate) fn check_store_contract(store: &dyn CredentialStore) {
    use crate::auth::token::test_token;

    let alice = SessionIdentity::new("alice");
    let bob = SessionIdentity::new("bob");
    let t1 = test_token(1_700_000_000);
    let t2 = test_token(1_700_003_600);

    assert!(store.read(&alice).unwrap().is_none());

    store.write(&alice, &t1).unwrap();
    assert_eq!(store.read(&alice).unwrap(), Some(t1.clone()));

    // Overwrite is visible immediately.
    store.write(&alice, &t2).unwrap();
    assert_eq!(store.read(&alice).unwrap(), Some(t2.clone()));

    // Identities are isolated.
    assert!(store.read(&bob).unwrap().is_none());
    store.write(&bob, &t1).unwrap();
    assert_eq!(store.read(&alice).unwrap(), Some(t2));

    store.remove(&alice).unwrap();
    assert!(store.read(&alice).unwrap().is_none());
    assert_eq!(store.read(&bob).unwrap(), Some(t1));

    // Removing twice is fine.
    store.remove(&alice).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::test_token;

    #[test]
    fn test_memory_store_contract() {
        check_store_contract(&MemoryStore::new());
    }

    #[test]
    fn test_file_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        check_store_contract(&FileStore::new(dir.path().to_path_buf()));
    }

    #[test]
    fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let identity = SessionIdentity::new("65a1f0c2e4b7d9a3c1e2");
        let token = test_token(1_700_000_000);

        FileStore::new(dir.path().to_path_buf())
            .write(&identity, &token)
            .unwrap();

        let reopened = FileStore::new(dir.path().to_path_buf());
        assert_eq!(reopened.read(&identity).unwrap(), Some(token));
    }

    #[test]
    fn test_file_store_identity_with_path_chars() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let identity = SessionIdentity::new("../../etc/passwd");
        let token = test_token(1_700_000_000);

        store.write(&identity, &token).unwrap();
        assert_eq!(store.read(&identity).unwrap(), Some(token));
        assert!(store.token_path(&identity).starts_with(dir.path().join(TOKEN_DIR)));
    }

    #[test]
    fn test_file_store_corrupt_entry_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        let identity = SessionIdentity::new("alice");
        let token = test_token(1_700_000_000);

        std::fs::create_dir_all(dir.path().join(TOKEN_DIR)).unwrap();
        std::fs::write(store.token_path(&identity), "{not json").unwrap();
        assert!(store.read(&identity).unwrap().is_none());

        store.write(&identity, &token).unwrap();
        assert_eq!(store.read(&identity).unwrap(), Some(token));
    }
}

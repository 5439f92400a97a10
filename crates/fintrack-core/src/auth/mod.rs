//! Authentication module for session tokens and the identity provider.
//!
//! This module provides:
//! - `Token`, `TokenValidator`: JWTs and their expiry check
//! - `CredentialStore`: per-identity token storage (memory, file, keychain)
//! - `TokenIssuer`, `IdentityClient`: obtaining new tokens for the ambient session
//! - `SessionCoordinator`: hands out valid tokens, refreshing at most once
//!   per identity at a time

pub mod credentials;
pub mod error;
pub mod identity;
pub mod issuer;
pub mod session;
pub mod store;
pub mod token;

pub use credentials::{KeyringStore, SessionCookieVault};
pub use error::{AuthError, StoreError};
pub use identity::IdentityClient;
pub use issuer::TokenIssuer;
pub use session::SessionCoordinator;
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use token::{SessionIdentity, Token, TokenClaims, TokenValidator};

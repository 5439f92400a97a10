//! Core library for fintrack.
//!
//! Obtains, caches, validates and refreshes the bearer tokens the dashboard
//! backend requires, and provides the backend client that attaches them.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, SessionCoordinator, SessionIdentity, Token};
pub use config::Config;

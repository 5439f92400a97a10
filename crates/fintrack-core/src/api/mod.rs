//! REST API client module for the transaction backend.
//!
//! This module provides the `ApiClient` for uploading statement rows and
//! fetching the transaction list and monthly summary.
//!
//! Every request carries a JWT bearer token obtained from the
//! `SessionCoordinator`, plus the identity provider session cookie.

pub mod client;
pub mod error;

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;

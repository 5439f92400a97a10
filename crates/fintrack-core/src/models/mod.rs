//! Data models for dashboard entities.
//!
//! - `Account`: the identity provider's view of the logged-in user
//! - `Transaction`, `TransactionRow`: stored and to-be-uploaded transactions
//! - `TransactionSummary`: monthly balance/expense/savings figures
//! - `DashboardSnapshot`: everything the landing page shows

pub mod account;
pub mod transaction;

pub use account::{Account, AccountPrefs};
pub use transaction::{DashboardSnapshot, Transaction, TransactionRow, TransactionSummary};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::Account;

/// One uploaded row. Columns vary by bank export, so rows stay untyped.
pub type TransactionRow = Map<String, Value>;

/// A stored transaction as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub amount: f64,
    #[serde(default)]
    pub category: Option<String>,
    /// Any other columns the backend returns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Monthly figures for the landing page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    #[serde(default, deserialize_with = "number_or_string")]
    pub monthly_balance: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub monthly_expenses: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub monthly_savings: f64,
}

/// What the dashboard shows after a page load.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub account: Account,
    pub transactions: Vec<Transaction>,
    /// `None` when the summary endpoint failed; the page shows zeros.
    pub summary: Option<TransactionSummary>,
}

impl DashboardSnapshot {
    pub fn summary_or_default(&self) -> TransactionSummary {
        self.summary.clone().unwrap_or_default()
    }
}

/// The backend serializes decimals either as JSON numbers or as strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("not a number: {:?}", s))),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "expected number or string, got {}",
            other
        ))),
    }
}

use serde::{Deserialize, Serialize};

use crate::auth::SessionIdentity;

/// Currency shown when the account has none configured
const DEFAULT_CURRENCY: &str = "USD";

/// The logged-in user as reported by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub prefs: AccountPrefs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPrefs {
    pub currency: Option<String>,
}

impl Account {
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::new(self.id.clone())
    }

    /// First word of the display name, or "Guest".
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("Guest")
    }

    pub fn currency(&self) -> &str {
        self.prefs
            .currency
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
    }
}

//! Account identity and credentials.

use serde::{Deserialize, Serialize};

/// One account in the pool.
///
/// Identity is `index`, used for logging and launch ordering only. Accounts
/// are otherwise independent; the only shared mutable state between them is
/// the shared store, keyed by `address`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    /// Position of the account in the source list (1-based in logs).
    pub index: usize,
    /// The account address; keys the shared store entry.
    pub address: String,
    /// Opaque credential material. Never logged.
    pub credentials: String,
    /// Optional proxy URL for this account's network session.
    pub proxy: Option<String>,
}

impl Account {
    /// Creates a new account.
    #[must_use]
    pub fn new(
        index: usize,
        address: impl Into<String>,
        credentials: impl Into<String>,
    ) -> Self {
        Self {
            index,
            address: address.into(),
            credentials: credentials.into(),
            proxy: None,
        }
    }

    /// Sets the proxy URL.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// A short label for log lines.
    #[must_use]
    pub fn label(&self) -> String {
        format!("account #{} ({})", self.index, self.address)
    }
}

// Credentials are redacted; accounts end up in report structures and logs.
impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("address", &self.address)
            .field("credentials", &"<redacted>")
            .field("proxy", &self.proxy)
            .finish()
    }
}

//! Adapters to the hosted backend.
//!
//! [`SupabaseClient`] speaks the hosted REST and object-storage APIs and
//! implements every storage trait. [`HttpDownloader`] saves resolved URLs
//! to a local directory. Both use blocking `ureq` inside
//! `tokio::task::spawn_blocking`.

mod download;
mod supabase;

pub use download::HttpDownloader;
pub use supabase::SupabaseClient;

use serde::{Deserialize, Serialize};

pub const ENV_SERVICE_URL: &str = "BOOKSTALL_SERVICE_URL";
pub const ENV_ANON_KEY: &str = "BOOKSTALL_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "BOOKSTALL_ACCESS_TOKEN";

/// Connection settings for the hosted service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Project base URL, e.g. `https://x.supabase.co`.
    #[serde(default)]
    pub url: String,
    /// Public (anon) API key, sent as `apikey` on every request.
    #[serde(default)]
    pub anon_key: String,
    /// The signed-in user's token. Requests fall back to the anon key.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Overall per-request timeout. `None` keeps the client default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ServiceConfig {
    /// Apply `BOOKSTALL_SERVICE_URL`, `BOOKSTALL_ANON_KEY` and
    /// `BOOKSTALL_ACCESS_TOKEN` on top of the file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        if let Some(url) = set(lookup(ENV_SERVICE_URL)) {
            self.url = url;
        }
        if let Some(key) = set(lookup(ENV_ANON_KEY)) {
            self.anon_key = key;
        }
        if let Some(token) = set(lookup(ENV_ACCESS_TOKEN)) {
            self.access_token = Some(token);
        }
        self
    }

    /// The first missing required setting, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.url.trim().is_empty() {
            Some("service.url")
        } else if self.anon_key.trim().is_empty() {
            Some("service.anon_key")
        } else {
            None
        }
    }
}

/// Table and function names on the hosted service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub purchases: String,
    pub content: String,
    pub products: String,
    pub purchase_rpc: String,
}

impl Default for TableNames {
    fn default() -> Self {
        TableNames {
            purchases: "book_purchases".to_string(),
            content: "books".to_string(),
            products: "products".to_string(),
            purchase_rpc: "purchase_product".to_string(),
        }
    }
}

//! `bookstall.toml` loading.
//!
//! ```toml
//! [service]
//! url = "https://x.supabase.co"
//! anon_key = "..."
//! access_token = "..."   # optional, the signed-in user's token
//! timeout_secs = 30      # optional
//!
//! [tables]               # optional, defaults shown
//! purchases = "book_purchases"
//! content = "books"
//! products = "products"
//! purchase_rpc = "purchase_product"
//!
//! [download]
//! dir = "./downloads"
//! ```
//!
//! `BOOKSTALL_SERVICE_URL`, `BOOKSTALL_ANON_KEY` and `BOOKSTALL_ACCESS_TOKEN`
//! override the file.

use std::path::{Path, PathBuf};

use bookstall_resolve::adapter::{ServiceConfig, TableNames};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "bookstall.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookstallConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub tables: TableNames,
    #[serde(default)]
    pub download: DownloadSettings,
}

/// `[download]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub dir: PathBuf,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        DownloadSettings {
            dir: PathBuf::from("./downloads"),
        }
    }
}

/// Load configuration from `explicit`, else `./bookstall.toml` if present,
/// else defaults; then apply environment overrides.
///
/// An explicit path that cannot be read is an error; a missing default
/// file is not.
pub fn load_config(explicit: Option<&Path>) -> Result<BookstallConfig, String> {
    let config = match explicit {
        Some(path) => read_config(path)?,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read_config(default)?
            } else {
                BookstallConfig::default()
            }
        }
    };
    tracing::debug!(path = ?explicit, "configuration loaded");
    Ok(BookstallConfig {
        service: config.service.with_env_overrides(),
        ..config
    })
}

fn read_config(path: &Path) -> Result<BookstallConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

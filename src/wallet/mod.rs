//! Wallet links: bot user id -> wallet address
//!
//! Links are created by the web app's connect callback and read by the bots.
//! Addresses are stored exactly as received.

pub mod sqlite;

use crate::config::{WalletConfig, WalletStoreKind};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub use sqlite::SqliteWalletLinks;

/// Storage for wallet links
#[async_trait]
pub trait WalletLinkStore: Send + Sync {
    /// Associate `address` with `user_id`, replacing any previous link
    async fn link(&self, user_id: &str, address: &str) -> Result<()>;

    /// Linked address for `user_id`
    async fn lookup(&self, user_id: &str) -> Result<Option<String>>;

    /// Remove the link, returning the address that was linked
    async fn unlink(&self, user_id: &str) -> Result<Option<String>>;
}

/// Process-memory store. Links do not survive a restart.
#[derive(Default)]
pub struct InMemoryWalletLinks {
    links: RwLock<HashMap<String, String>>,
}

impl InMemoryWalletLinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.read().is_empty()
    }
}

#[async_trait]
impl WalletLinkStore for InMemoryWalletLinks {
    async fn link(&self, user_id: &str, address: &str) -> Result<()> {
        self.links
            .write()
            .insert(user_id.to_string(), address.to_string());
        Ok(())
    }

    async fn lookup(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.links.read().get(user_id).cloned())
    }

    async fn unlink(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.links.write().remove(user_id))
    }
}

/// Open the store selected in config
pub async fn open_store(config: &WalletConfig) -> Result<Arc<dyn WalletLinkStore>> {
    match config.store {
        WalletStoreKind::Memory => {
            tracing::warn!("Using in-memory wallet links; links are lost on restart");
            Ok(Arc::new(InMemoryWalletLinks::new()))
        }
        WalletStoreKind::Sqlite => {
            let store = SqliteWalletLinks::connect(&config.database_path).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Shorten an address for display: `0x1234...cdef`
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Deep link into the web app, e.g. `https://app/connect?user=42`
pub fn app_link(app_url: &str, path: &str, params: &[(&str, &str)]) -> String {
    let base = format!(
        "{}/{}",
        app_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    match reqwest::Url::parse(&base) {
        Ok(mut url) => {
            if !params.is_empty() {
                url.query_pairs_mut().extend_pairs(params.iter());
            }
            url.to_string()
        }
        Err(e) => {
            tracing::warn!("Invalid app URL {}: {}", base, e);
            base
        }
    }
}

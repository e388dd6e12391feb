//! Wallet, wallet set, and the `WalletStore` persistence collaborator.
//!
//! Wallet file format and persistence mechanics are out of scope for the
//! core (see spec §1); this module only defines the shape the core needs
//! and the trait boundary to whatever store the caller provides.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single wallet: a parent or a child, depending on where it appears in
/// a [`WalletSet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub secret_key_bs58: Option<String>,
    pub name: String,
    pub index: usize,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(address: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret_key_bs58: None,
            name: name.into(),
            index,
            created_at: Utc::now(),
        }
    }

    pub fn with_secret(mut self, secret_key_bs58: impl Into<String>) -> Self {
        self.secret_key_bs58 = Some(secret_key_bs58.into());
        self
    }
}

/// Ordered child wallets plus a distinguished parent. The parent is never a
/// member of `children`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSet {
    pub parent: Wallet,
    pub children: Vec<Wallet>,
}

impl WalletSet {
    pub fn new(parent: Wallet, children: Vec<Wallet>) -> Self {
        Self { parent, children }
    }

    /// Addresses of all children, in stable order.
    pub fn child_addresses(&self) -> Vec<String> {
        self.children.iter().map(|w| w.address.clone()).collect()
    }
}

/// External persistence collaborator for wallets (out of core per spec §6.2).
/// The core only ever reads through this trait; it never reads back its own
/// writes within a run.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn load_parent(&self, user_id: &str, address: Option<&str>) -> anyhow::Result<Option<Wallet>>;
    async fn load_children(&self, parent_address: &str, user_id: &str) -> anyhow::Result<Vec<Wallet>>;
    async fn save_parent(&self, wallet: &Wallet, user_id: &str) -> anyhow::Result<()>;
    async fn save_children(&self, parent_address: &str, wallets: &[Wallet], user_id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct WalletFile {
    wallets: Vec<Wallet>,
}

/// Reference `WalletStore` backed by two JSON files, `parent.json` and
/// `children.json`, each shaped `{ "wallets": [...] }`, under a directory.
/// Single-tenant: `user_id` is accepted for trait compatibility but does
/// not namespace storage, since this reference implementation has no
/// concept of separate tenants.
pub struct JsonFileWalletStore {
    dir: PathBuf,
}

impl JsonFileWalletStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_file(&self, name: &str) -> anyhow::Result<WalletFile> {
        let path = self.dir.join(name);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_file(&self, name: &str, wallets: &[Wallet]) -> anyhow::Result<()> {
        let path = self.dir.join(name);
        let body = serde_json::to_string_pretty(&WalletFile {
            wallets: wallets.to_vec(),
        })?;
        std::fs::write(&path, body).with_context(|| format!("writing {}", path.display()))
    }

    /// Load a full `WalletSet`: the single parent wallet in `parent.json`
    /// plus every child in `children.json`.
    pub async fn load_wallet_set(&self, user_id: &str) -> anyhow::Result<WalletSet> {
        let parent = self
            .load_parent(user_id, None)
            .await?
            .context("parent.json must contain exactly one wallet")?;
        let children = self.load_children(&parent.address, user_id).await?;
        Ok(WalletSet::new(parent, children))
    }
}

#[async_trait]
impl WalletStore for JsonFileWalletStore {
    async fn load_parent(
        &self,
        _user_id: &str,
        address: Option<&str>,
    ) -> anyhow::Result<Option<Wallet>> {
        let file = self.read_file("parent.json")?;
        Ok(match address {
            Some(addr) => file.wallets.into_iter().find(|w| w.address == addr),
            None => file.wallets.into_iter().next(),
        })
    }

    async fn load_children(&self, _parent_address: &str, _user_id: &str) -> anyhow::Result<Vec<Wallet>> {
        Ok(self.read_file("children.json")?.wallets)
    }

    async fn save_parent(&self, wallet: &Wallet, _user_id: &str) -> anyhow::Result<()> {
        self.write_file("parent.json", std::slice::from_ref(wallet))
    }

    async fn save_children(
        &self,
        _parent_address: &str,
        wallets: &[Wallet],
        _user_id: &str,
    ) -> anyhow::Result<()> {
        self.write_file("children.json", wallets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_addresses_preserve_order() {
        let parent = Wallet::new("PARENT111111111111111111111111111111111111", 0, "parent");
        let children = vec![
            Wallet::new("CHILD0000000000000000000000000000000000000", 0, "c0"),
            Wallet::new("CHILD1111111111111111111111111111111111111", 1, "c1"),
        ];
        let set = WalletSet::new(parent, children);
        assert_eq!(
            set.child_addresses(),
            vec![
                "CHILD0000000000000000000000000000000000000".to_string(),
                "CHILD1111111111111111111111111111111111111".to_string(),
            ]
        );
    }
}

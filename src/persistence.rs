//! File-backed subscription store.
//!
//! Subscriptions are kept in a single JSON file. Every mutation rewrites the
//! whole file through a temporary sibling and a rename, so a crash never
//! leaves a half-written table behind.
//!
//! # Storage structure
//!
//! ```text
//! ~/.config/pushwire/
//!     config.json                # PushConfig (see config.rs)
//!     subscriptions.json         # SubscriptionTable, mode 0600
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

use crate::notifications::push::{PushSubscription, SubscriptionStore, SubscriptionTable};

/// Subscription table persisted as JSON on disk.
#[derive(Debug)]
pub struct FileSubscriptionStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileSubscriptionStore {
    /// Use `path` as the backing file. It is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Load the table; a missing file is an empty table.
    pub async fn load(&self) -> Result<SubscriptionTable> {
        let exists = fs::try_exists(&self.path)
            .await
            .with_context(|| format!("Failed to access subscriptions file {}", self.path.display()))?;
        if !exists {
            return Ok(SubscriptionTable::default());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read subscriptions file {}", self.path.display()))?;
        let table: SubscriptionTable =
            serde_json::from_str(&content).context("Failed to parse subscriptions file")?;

        log::debug!("[WebPush] Loaded {} subscription(s) from {:?}", table.len(), self.path);
        Ok(table)
    }

    async fn save(&self, table: &SubscriptionTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create subscriptions directory")?;
        }

        let content =
            serde_json::to_string_pretty(table).context("Failed to serialize subscriptions")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .context("Failed to write subscriptions file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp_path, perms)
                .await
                .context("Failed to set subscriptions file permissions")?;
        }

        fs::rename(&tmp_path, &self.path)
            .await
            .context("Failed to replace subscriptions file")?;

        log::debug!("[WebPush] Saved {} subscription(s) to {:?}", table.len(), self.path);
        Ok(())
    }

    /// Remove every subscription for `owner`. Returns how many were removed.
    pub async fn remove_owner(&self, owner: &str) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let endpoints: Vec<String> = table.for_owner(owner).into_iter().map(|s| s.endpoint).collect();
        let removed = table.remove_all(&endpoints);
        if removed > 0 {
            self.save(&table).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn list_for_owner(&self, owner: &str) -> Result<Vec<PushSubscription>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.for_owner(owner))
    }

    async fn delete_endpoints(&self, endpoints: &[String]) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        let removed = table.remove_all(endpoints);
        if removed > 0 {
            self.save(&table).await?;
        }
        Ok(removed)
    }

    async fn upsert(&self, subscription: PushSubscription) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut table = self.load().await?;
        table.upsert(subscription);
        self.save(&table).await
    }
}

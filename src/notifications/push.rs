//! Push subscriptions and the store they live in.
//!
//! Subscription rows are owned by an external store: the dispatcher reads a
//! user's rows once before delivery and deletes stale rows in one batch
//! afterwards. [`SubscriptionStore`] is that boundary; the in-memory and
//! file-backed implementations serve tests and the CLI.

// Rust guideline compliant 2026-02

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{PushError, Result};

/// One device/browser registration at a push service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL; unique per registration.
    pub endpoint: String,
    /// Device's P-256 ECDH public key (base64url, 65 bytes decoded).
    pub p256dh: String,
    /// Shared auth secret (base64url, 16 bytes decoded).
    pub auth: String,
    /// User this subscription belongs to.
    pub owner: String,
}

/// `PushSubscription.toJSON()` shape as sent by browsers.
#[derive(Deserialize)]
struct BrowserSubscription {
    endpoint: String,
    keys: BrowserKeys,
}

#[derive(Deserialize)]
struct BrowserKeys {
    p256dh: String,
    auth: String,
}

impl PushSubscription {
    /// Parse the JSON a browser produces for its subscription.
    pub fn from_browser_json(owner: impl Into<String>, json: &str) -> Result<Self> {
        let parsed: BrowserSubscription = serde_json::from_str(json)
            .map_err(|e| PushError::Validation(format!("invalid subscription JSON: {e}")))?;
        Ok(Self {
            endpoint: parsed.endpoint,
            p256dh: parsed.keys.p256dh,
            auth: parsed.keys.auth,
            owner: owner.into(),
        })
    }
}

/// Storage boundary for subscription rows, keyed by endpoint.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// All subscriptions registered by `owner`.
    async fn list_for_owner(&self, owner: &str) -> anyhow::Result<Vec<PushSubscription>>;

    /// Delete every listed endpoint in one batch. Returns how many rows went away.
    async fn delete_endpoints(&self, endpoints: &[String]) -> anyhow::Result<usize>;

    /// Add or replace the subscription for its endpoint.
    async fn upsert(&self, subscription: PushSubscription) -> anyhow::Result<()>;
}

/// Subscriptions keyed by endpoint.
///
/// Re-registering an endpoint (for example under a new owner after a
/// browser account switch) replaces the old row, so one endpoint never
/// receives duplicate notifications.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SubscriptionTable {
    subscriptions: BTreeMap<String, PushSubscription>,
}

impl SubscriptionTable {
    /// Add or update a subscription.
    pub fn upsert(&mut self, subscription: PushSubscription) {
        if let Some(previous) = self.subscriptions.get(&subscription.endpoint) {
            if previous.owner != subscription.owner {
                log::info!(
                    "[WebPush] Endpoint re-registered from owner {} to {}",
                    previous.owner,
                    subscription.owner
                );
            }
        }
        self.subscriptions.insert(subscription.endpoint.clone(), subscription);
    }

    /// Remove the listed endpoints, returning how many existed.
    pub fn remove_all(&mut self, endpoints: &[String]) -> usize {
        let unique: HashSet<&String> = endpoints.iter().collect();
        unique
            .into_iter()
            .filter(|endpoint| self.subscriptions.remove(*endpoint).is_some())
            .count()
    }

    /// Subscriptions belonging to `owner`.
    pub fn for_owner(&self, owner: &str) -> Vec<PushSubscription> {
        self.subscriptions
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect()
    }

    /// Get all subscriptions.
    pub fn all(&self) -> impl Iterator<Item = &PushSubscription> {
        self.subscriptions.values()
    }

    /// Number of stored subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Check if an endpoint is registered.
    pub fn contains(&self, endpoint: &str) -> bool {
        self.subscriptions.contains_key(endpoint)
    }
}

/// In-memory [`SubscriptionStore`]. Each instance is isolated.
#[derive(Debug, Default, Clone)]
pub struct MemorySubscriptionStore {
    table: Arc<RwLock<SubscriptionTable>>,
}

impl MemorySubscriptionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `subscriptions`.
    pub fn with_subscriptions(subscriptions: impl IntoIterator<Item = PushSubscription>) -> Self {
        let mut table = SubscriptionTable::default();
        for subscription in subscriptions {
            table.upsert(subscription);
        }
        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    /// Snapshot of the current rows.
    pub async fn snapshot(&self) -> SubscriptionTable {
        self.table.read().await.clone()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn list_for_owner(&self, owner: &str) -> anyhow::Result<Vec<PushSubscription>> {
        Ok(self.table.read().await.for_owner(owner))
    }

    async fn delete_endpoints(&self, endpoints: &[String]) -> anyhow::Result<usize> {
        Ok(self.table.write().await.remove_all(endpoints))
    }

    async fn upsert(&self, subscription: PushSubscription) -> anyhow::Result<()> {
        self.table.write().await.upsert(subscription);
        Ok(())
    }
}

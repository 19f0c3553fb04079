//! The `deliver` entry point: store read, dispatch, batch cleanup.

use serde::Serialize;
use std::sync::Arc;

use super::dispatch::{DispatchReport, PushDispatcher};
use super::payload::NotificationRequest;
use super::push::SubscriptionStore;
use crate::error::{PushError, Result};

/// Counts returned to the caller of [`PushService::deliver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    /// Subscriptions the push service accepted.
    pub sent: usize,
    /// Subscriptions attempted.
    pub total: usize,
    /// Subscriptions found expired or invalid (and deleted).
    pub expired: usize,
}

impl From<&DispatchReport> for DeliverySummary {
    fn from(report: &DispatchReport) -> Self {
        Self {
            sent: report.sent,
            total: report.total,
            expired: report.expired_or_invalid,
        }
    }
}

/// Delivers notifications to a user's devices and purges stale subscriptions.
///
/// The store is read once before dispatch and written once after every
/// attempt completes, so concurrent sends to the same user never interleave
/// partial updates.
#[derive(Clone)]
pub struct PushService {
    dispatcher: PushDispatcher,
    store: Arc<dyn SubscriptionStore>,
}

impl std::fmt::Debug for PushService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushService")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl PushService {
    /// Create a service over `store`.
    pub fn new(dispatcher: PushDispatcher, store: Arc<dyn SubscriptionStore>) -> Self {
        Self { dispatcher, store }
    }

    /// Send `request` to every subscription of `request.target_owner`.
    ///
    /// Returns an error only for an invalid request or an unreadable store.
    /// A failed cleanup is logged and does not fail the call; the stale
    /// endpoints will be reported again on the next send.
    pub async fn deliver(&self, request: &NotificationRequest) -> Result<DeliverySummary> {
        Ok(DeliverySummary::from(&self.deliver_with_report(request).await?))
    }

    /// Like [`deliver`](Self::deliver) but returns per-subscription outcomes.
    pub async fn deliver_with_report(&self, request: &NotificationRequest) -> Result<DispatchReport> {
        request.validate()?;

        let subscriptions = self
            .store
            .list_for_owner(&request.target_owner)
            .await
            .map_err(|e| PushError::Store(format!("{e:#}")))?;

        let report = self.dispatcher.dispatch(request, &subscriptions).await?;

        if !report.to_delete.is_empty() {
            match self.store.delete_endpoints(&report.to_delete).await {
                Ok(removed) => log::info!(
                    "[WebPush] Removed {removed} stale subscription(s) for {}",
                    request.target_owner
                ),
                Err(e) => log::error!(
                    "[WebPush] Failed to remove {} stale subscription(s): {e:#}",
                    report.to_delete.len()
                ),
            }
        }

        Ok(report)
    }
}

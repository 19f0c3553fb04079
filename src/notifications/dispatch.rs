//! Fan-out delivery of one notification to every subscription of a user.
//!
//! Each subscription is attempted independently: a fresh VAPID token, a
//! fresh encryption, one POST. Attempts run concurrently and the report is
//! built only after all of them finish. Nothing is retried here; the push
//! service holds undelivered messages for the `TTL` we send.
//!
//! The dispatcher never touches the store. Endpoints that the push service
//! reports as gone (404/410) or as signed with the wrong key (403) come
//! back in [`DispatchReport::to_delete`] for the caller to purge in one batch.

// Rust guideline compliant 2026-02

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use super::encrypt;
use super::payload::NotificationRequest;
use super::push::PushSubscription;
use super::vapid::{self, VapidKeyPair};
use crate::constants::{CONTENT_ENCODING, CONTENT_TYPE, DEFAULT_TTL_SECS, HTTP_REQUEST_TIMEOUT};
use crate::error::{PushError, Result};

/// Why a single delivery attempt ended the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReason {
    /// Push service accepted the message (2xx).
    Ok,
    /// Endpoint no longer exists (404 or 410).
    Expired,
    /// Push service rejected our VAPID key for this subscription (403).
    AuthMismatch,
    /// Any other non-2xx status.
    HttpError(u16),
    /// Timeout, DNS or connection failure.
    TransportError(String),
    /// The request could not be built (bad subscription keys, bad endpoint, signing failure).
    PrepareError(String),
}

impl DeliveryReason {
    /// Whether the subscription should be purged from the store.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Expired | Self::AuthMismatch)
    }
}

impl std::fmt::Display for DeliveryReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Expired => write!(f, "expired"),
            Self::AuthMismatch => write!(f, "auth_mismatch"),
            Self::HttpError(code) => write!(f, "http_error({code})"),
            Self::TransportError(msg) => write!(f, "transport_error: {msg}"),
            Self::PrepareError(msg) => write!(f, "prepare_error: {msg}"),
        }
    }
}

/// Map a push service status code to a delivery reason.
pub fn classify_status(status: u16) -> DeliveryReason {
    match status {
        200..=299 => DeliveryReason::Ok,
        404 | 410 => DeliveryReason::Expired,
        403 => DeliveryReason::AuthMismatch,
        other => DeliveryReason::HttpError(other),
    }
}

/// Result of one attempt against one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Endpoint the attempt targeted.
    pub endpoint: String,
    /// Whether the push service accepted the message.
    pub success: bool,
    /// Classified reason.
    pub reason: DeliveryReason,
}

impl DeliveryOutcome {
    fn new(endpoint: &str, reason: DeliveryReason) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            success: reason == DeliveryReason::Ok,
            reason,
        }
    }
}

/// Aggregate result of a dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Attempts the push service accepted.
    pub sent: usize,
    /// Subscriptions attempted.
    pub total: usize,
    /// Attempts classified as expired or auth mismatch.
    pub expired_or_invalid: usize,
    /// Endpoints the caller should delete, in one batch.
    pub to_delete: Vec<String>,
    /// Per-subscription outcomes, in input order.
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    fn from_outcomes(outcomes: Vec<DeliveryOutcome>) -> Self {
        let to_delete: Vec<String> = outcomes
            .iter()
            .filter(|o| o.reason.is_stale())
            .map(|o| o.endpoint.clone())
            .collect();

        Self {
            sent: outcomes.iter().filter(|o| o.success).count(),
            total: outcomes.len(),
            expired_or_invalid: to_delete.len(),
            to_delete,
            outcomes,
        }
    }
}

/// Short, key-free label for log lines: origin plus the endpoint's tail.
fn endpoint_label(endpoint: &str) -> String {
    let origin = vapid::audience_for(endpoint).unwrap_or_else(|_| "<invalid>".to_string());
    let tail: String = endpoint
        .chars()
        .rev()
        .take(8)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{origin}/…{tail}")
}

/// A request ready to be sent to one endpoint.
struct PreparedPush {
    authorization: String,
    body: Vec<u8>,
}

/// Sends notifications to push services.
///
/// Holds one HTTP client (connection pooling across endpoints) and the
/// process-wide VAPID keys. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PushDispatcher {
    client: reqwest::Client,
    keys: Arc<VapidKeyPair>,
    ttl_secs: u32,
}

impl PushDispatcher {
    /// Create a dispatcher with the default request timeout.
    pub fn new(keys: Arc<VapidKeyPair>) -> Result<Self> {
        Self::with_timeout(keys, HTTP_REQUEST_TIMEOUT)
    }

    /// Create a dispatcher whose POSTs give up after `timeout`.
    ///
    /// Redirects are not followed: a 3xx from a push service is reported
    /// as an HTTP error, never replayed elsewhere.
    pub fn with_timeout(keys: Arc<VapidKeyPair>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PushError::Configuration(format!("HTTP client setup failed: {e}")))?;
        Ok(Self::with_client(client, keys))
    }

    fn with_client(client: reqwest::Client, keys: Arc<VapidKeyPair>) -> Self {
        Self {
            client,
            keys,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    /// Override the `TTL` header value.
    pub fn with_ttl(mut self, ttl_secs: u32) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// VAPID keys used for signing.
    pub fn keys(&self) -> &VapidKeyPair {
        &self.keys
    }

    /// Deliver `request` to every subscription and report the outcome.
    ///
    /// Fails only when the request itself is invalid; per-subscription
    /// failures are reported as data. Dropping the returned future aborts
    /// any in-flight POSTs.
    pub async fn dispatch(
        &self,
        request: &NotificationRequest,
        subscriptions: &[PushSubscription],
    ) -> Result<DispatchReport> {
        request.validate()?;

        if subscriptions.is_empty() {
            log::debug!("[WebPush] No subscriptions for {}", request.target_owner);
            return Ok(DispatchReport::default());
        }

        let payload = request.to_payload()?;
        let attempts = subscriptions
            .iter()
            .map(|subscription| self.deliver_one(subscription, request, &payload));
        let outcomes = join_all(attempts).await;

        let report = DispatchReport::from_outcomes(outcomes);
        log::info!(
            "[WebPush] Delivered to {}/{} subscription(s) for {} ({} stale)",
            report.sent,
            report.total,
            request.target_owner,
            report.expired_or_invalid
        );
        Ok(report)
    }

    fn prepare(&self, subscription: &PushSubscription, payload: &[u8]) -> Result<PreparedPush> {
        let audience = vapid::audience_for(&subscription.endpoint)?;
        let token = vapid::issue_token(&audience, &self.keys)?;
        let message = encrypt::encrypt(subscription, payload)?;

        Ok(PreparedPush {
            authorization: token.authorization_header(),
            body: message.to_body(),
        })
    }

    async fn deliver_one(
        &self,
        subscription: &PushSubscription,
        request: &NotificationRequest,
        payload: &[u8],
    ) -> DeliveryOutcome {
        let label = endpoint_label(&subscription.endpoint);

        let prepared = match self.prepare(subscription, payload) {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("[WebPush] Could not build push for {label}: {e}");
                return DeliveryOutcome::new(
                    &subscription.endpoint,
                    DeliveryReason::PrepareError(e.to_string()),
                );
            }
        };

        let mut http = self
            .client
            .post(&subscription.endpoint)
            .header("Authorization", prepared.authorization)
            .header("Content-Type", CONTENT_TYPE)
            .header("Content-Encoding", CONTENT_ENCODING)
            .header("TTL", self.ttl_secs.to_string());

        if let Some(urgency) = request.urgency {
            http = http.header("Urgency", urgency.as_str());
        }

        if let Some(topic) = &request.topic {
            http = http.header("Topic", topic.as_str());
        }

        let response = match http.body(prepared.body).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_timeout() { "timed out" } else { "failed" };
                log::warn!("[WebPush] Request to {label} {kind}: {e}");
                return DeliveryOutcome::new(
                    &subscription.endpoint,
                    DeliveryReason::TransportError(e.to_string()),
                );
            }
        };

        let status = response.status().as_u16();
        let reason = classify_status(status);
        match &reason {
            DeliveryReason::Ok => log::debug!("[WebPush] Delivered to {label} ({status})"),
            DeliveryReason::Expired => {
                log::info!("[WebPush] Subscription expired ({status}), scheduling removal: {label}");
            }
            DeliveryReason::AuthMismatch => {
                log::info!("[WebPush] VAPID key mismatch (403), scheduling removal: {label}");
            }
            DeliveryReason::HttpError(429) => log::warn!("[WebPush] Rate limited (429): {label}"),
            _ => {
                let body = response.text().await.unwrap_or_default();
                let body: String = body.chars().take(200).collect();
                log::warn!("[WebPush] Push failed (HTTP {status}) for {label}: {body}");
            }
        }

        DeliveryOutcome::new(&subscription.endpoint, reason)
    }
}

//! Web push notification delivery.
//!
//! Encrypts notifications per RFC 8291 and authenticates the sender per
//! RFC 8292 (VAPID), then POSTs them to each device's push service.
//!
//! # Architecture
//!
//! ```text
//! PushService::deliver(request)
//!     ↓ store.list_for_owner
//! PushDispatcher::dispatch  ── per subscription, concurrently ──┐
//!     ├─ vapid::issue_token(audience)                          │
//!     ├─ encrypt::encrypt(subscription, payload) → body         │
//!     └─ POST endpoint → classify status                        │
//!     ↓ join all ◄──────────────────────────────────────────────┘
//! store.delete_endpoints(to_delete)   (one batch)
//! ```
//!
//! # Layers
//!
//! - [`codec`]: base64url ↔ bytes
//! - [`vapid`]: key handling and JWT issuance
//! - [`hkdf`] + [`encrypt`]: key schedule and `aes128gcm` body
//! - [`dispatch`]: per-subscription delivery and outcome classification
//! - [`service`]: store read, dispatch, cleanup

// Rust guideline compliant 2026-02

pub mod codec;
pub mod dispatch;
pub mod encrypt;
pub mod hkdf;
pub mod payload;
pub mod push;
pub mod service;
pub mod vapid;

//! Pushwire - encrypted Web Push delivery.
//!
//! This crate delivers notifications to browser and device push endpoints:
//! RFC 8291 message encryption, RFC 8292 VAPID sender authentication, and
//! outcome handling that tells the caller which subscriptions to purge.
//!
//! # Architecture
//!
//! Four layers, each depending only on the ones below it:
//!
//! - **Codec** - base64url key material ([`notifications::codec`])
//! - **VAPID** - signed sender assertions ([`notifications::vapid`])
//! - **Encryptor** - ECDH + HKDF + AES-128-GCM body ([`notifications::encrypt`])
//! - **Dispatcher** - per-subscription fan-out and classification
//!   ([`notifications::dispatch`], [`notifications::service`])
//!
//! # Modules
//!
//! - [`notifications`] - The push pipeline
//! - [`config`] - Configuration loading/saving
//! - [`persistence`] - File-backed subscription store
//! - [`constants`] - Wire format and timeout constants
//! - [`error`] - Error taxonomy

pub mod config;
pub mod constants;
pub mod error;
pub mod notifications;
pub mod persistence;

// Re-export commonly used types
pub use config::PushConfig;
pub use error::PushError;
pub use notifications::dispatch::{DeliveryOutcome, DeliveryReason, DispatchReport, PushDispatcher};
pub use notifications::payload::{NotificationRequest, Urgency};
pub use notifications::push::{MemorySubscriptionStore, PushSubscription, SubscriptionStore};
pub use notifications::service::{DeliverySummary, PushService};
pub use notifications::vapid::VapidKeyPair;
pub use persistence::FileSubscriptionStore;

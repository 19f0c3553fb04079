//! Protocol and transport constants for push delivery.
//!
//! This module centralizes the magic numbers of the Web Push wire format
//! and delivery policy. Constants are grouped by domain.
//!
//! # Categories
//!
//! - **Timeouts**: Network timeouts and token lifetimes
//! - **Wire format**: RFC 8291 `aes128gcm` framing sizes
//! - **Headers**: Fixed HTTP header values

use std::time::Duration;

// ============================================================================
// Timeouts
// ============================================================================

/// HTTP request timeout for a single push service POST.
///
/// One unreachable endpoint must not stall delivery to a user's other
/// devices, so every request is bounded.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// VAPID token lifetime in seconds (12 hours).
///
/// RFC 8292 caps `exp` at 24 hours; push services reject tokens outside
/// their accepted window. A fresh token is issued on every call.
pub const VAPID_TOKEN_LIFETIME_SECS: i64 = 12 * 60 * 60;

/// Default push message TTL in seconds (24 hours).
///
/// Tells the push service how long to hold a message for an offline device.
pub const DEFAULT_TTL_SECS: u32 = 86_400;

// ============================================================================
// Wire format
// ============================================================================

/// Salt length for each encrypted message.
pub const SALT_LEN: usize = 16;

/// Record size advertised in the `aes128gcm` header.
///
/// Every message is a single record, so the value is fixed.
pub const RECORD_SIZE: u32 = 4096;

/// Uncompressed P-256 point length (0x04 || X || Y).
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

/// Raw P-256 private scalar length.
pub const PRIVATE_SCALAR_LEN: usize = 32;

/// Auth secret length shared at subscription time.
pub const AUTH_SECRET_LEN: usize = 16;

/// Padding delimiter appended to the final (only) record.
pub const RECORD_DELIMITER: u8 = 0x02;

/// Fixed `aes128gcm` header length excluding the key id:
/// salt (16) + record size (4) + key id length (1).
pub const HEADER_LEN: usize = SALT_LEN + 4 + 1;

// ============================================================================
// Headers
// ============================================================================

/// `Content-Encoding` header value for RFC 8291 bodies.
pub const CONTENT_ENCODING: &str = "aes128gcm";

/// `Content-Type` header value for encrypted bodies.
pub const CONTENT_TYPE: &str = "application/octet-stream";

//! Notification requests and the JSON payload delivered to devices.
//!
//! The service worker on the receiving side reads `title`, `body`, `icon`,
//! `badge` and `tag` directly; `url` and caller-supplied extras are folded
//! into a nested `data` object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PushError, Result};

/// RFC 8030 message urgency, sent as the `Urgency` header when set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    /// Only deliver when on power and Wi-Fi.
    VeryLow,
    /// Deliver on power or Wi-Fi.
    Low,
    /// Deliver on neither power nor Wi-Fi.
    Normal,
    /// Deliver even on low battery.
    High,
}

impl Urgency {
    /// Header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Urgency {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "very-low" => Ok(Self::VeryLow),
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => Err(PushError::Validation(format!("unknown urgency: {other}"))),
        }
    }
}

/// A fully-formed notification for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Owner whose subscriptions receive the notification.
    pub target_owner: String,
    /// Notification title (required).
    pub title: String,
    /// Notification body (required).
    pub body: String,
    /// Click-through URL, placed in `data.url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Badge URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    /// Replaces an earlier notification with the same tag on the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Arbitrary extra data, merged into `data`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra_data: Map<String, Value>,
    /// Optional `Urgency` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    /// Optional `Topic` header (replaces pending messages with the same topic).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl NotificationRequest {
    /// Create a request with the three required fields.
    pub fn new(
        target_owner: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            target_owner: target_owner.into(),
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Check required fields before any delivery is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.target_owner.trim().is_empty() {
            return Err(PushError::Validation("target_owner must not be empty".to_string()));
        }
        if self.title.trim().is_empty() {
            return Err(PushError::Validation("title must not be empty".to_string()));
        }
        if self.body.trim().is_empty() {
            return Err(PushError::Validation("body must not be empty".to_string()));
        }
        if let Some(topic) = &self.topic {
            // RFC 8030 5.4: at most 32 characters from the base64url alphabet
            let valid = topic.len() <= 32
                && topic
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
            if !valid {
                return Err(PushError::Validation(format!("invalid topic: {topic}")));
            }
        }
        Ok(())
    }

    /// Compact JSON payload that gets encrypted for each device.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let mut data = self.extra_data.clone();
        if let Some(url) = &self.url {
            data.insert("url".to_string(), Value::String(url.clone()));
        }

        let payload = PushPayload {
            title: &self.title,
            body: &self.body,
            icon: self.icon.as_deref(),
            badge: self.badge.as_deref(),
            tag: self.tag.as_deref(),
            data,
        };

        serde_json::to_vec(&payload)
            .map_err(|e| PushError::Encryption(format!("payload serialization failed: {e}")))
    }
}

#[derive(Serialize)]
struct PushPayload<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    data: Map<String, Value>,
}

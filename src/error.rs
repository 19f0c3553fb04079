//! Error taxonomy for push delivery.
//!
//! Only the fatal classes live here: a `PushError` aborts the whole
//! `deliver` call (configuration, validation, store) or a single subscription's
//! attempt (decode, key, encryption). Push-service outcomes such as an
//! expired endpoint are reported as data via
//! [`DeliveryReason`](crate::notifications::dispatch::DeliveryReason).

/// Errors produced by the push pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// VAPID key material is missing or malformed.
    Configuration(String),
    /// The notification request is missing required fields.
    Validation(String),
    /// Text was not valid base64url.
    Decode(String),
    /// A key could not be parsed, reconstructed or used for signing.
    Key(String),
    /// Payload serialization or AEAD encryption failed.
    Encryption(String),
    /// The subscription store could not be read.
    Store(String),
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::Decode(msg) => write!(f, "Decode error: {msg}"),
            Self::Key(msg) => write!(f, "Key error: {msg}"),
            Self::Encryption(msg) => write!(f, "Encryption error: {msg}"),
            Self::Store(msg) => write!(f, "Store error: {msg}"),
        }
    }
}

impl std::error::Error for PushError {}

/// Result alias for the push pipeline.
pub type Result<T> = std::result::Result<T, PushError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_class_and_detail() {
        let err = PushError::Configuration("VAPID subject missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: VAPID subject missing");

        let err = PushError::Validation("title must not be empty".to_string());
        assert!(err.to_string().starts_with("Validation error"));
    }

    #[test]
    fn test_converts_into_anyhow() {
        fn fails() -> anyhow::Result<()> {
            Err(PushError::Key("bad scalar".to_string()))?;
            Ok(())
        }
        let err = fails().expect_err("should propagate");
        assert!(err.to_string().contains("bad scalar"));
    }
}

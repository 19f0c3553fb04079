//! Configuration loading and persistence.
//!
//! VAPID key material and delivery settings are read once at startup from
//! `config.json` in the config directory, then overridden by environment
//! variables. Delivery refuses to start unless all three VAPID values are
//! present.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{fs, path::PathBuf};

use crate::constants::{DEFAULT_TTL_SECS, HTTP_REQUEST_TIMEOUT};
use crate::error::PushError;
use crate::notifications::vapid::VapidKeyPair;

/// Configuration for push delivery.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct PushConfig {
    /// VAPID public key (base64url, 65-byte uncompressed point).
    pub vapid_public_key: Option<String>,
    /// VAPID private key (base64url raw 32-byte scalar).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vapid_private_key: Option<String>,
    /// Contact URI asserted in every VAPID token (`mailto:` or `https:`).
    pub vapid_subject: Option<String>,
    /// `TTL` header in seconds.
    pub ttl_secs: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Subscription file for the file-backed store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriptions_path: Option<PathBuf>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            vapid_public_key: None,
            vapid_private_key: None,
            vapid_subject: None,
            ttl_secs: DEFAULT_TTL_SECS,
            request_timeout_secs: HTTP_REQUEST_TIMEOUT.as_secs(),
            subscriptions_path: None,
        }
    }
}

impl PushConfig {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `PUSHWIRE_CONFIG_DIR` overrides the platform config directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(custom_dir) = std::env::var("PUSHWIRE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("pushwire")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::load_from_file()? {
            Some(config) => config,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_from_file() -> Result<Option<Self>> {
        let config_path = Self::config_dir()?.join("config.json");
        if !config_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(Some(config))
    }

    /// Apply overrides from `lookup` (the process environment in production).
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(public_key) = lookup("VAPID_PUBLIC_KEY") {
            self.vapid_public_key = Some(public_key);
        }

        if let Some(private_key) = lookup("VAPID_PRIVATE_KEY") {
            self.vapid_private_key = Some(private_key);
        }

        if let Some(subject) = lookup("VAPID_SUBJECT") {
            self.vapid_subject = Some(subject);
        }

        if let Some(ttl) = lookup("PUSH_TTL") {
            match ttl.parse::<u32>() {
                Ok(ttl) => self.ttl_secs = ttl,
                Err(_) => log::warn!("Ignoring invalid PUSH_TTL: {ttl}"),
            }
        }

        if let Some(timeout) = lookup("PUSH_REQUEST_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(timeout) if timeout > 0 => self.request_timeout_secs = timeout,
                _ => log::warn!("Ignoring invalid PUSH_REQUEST_TIMEOUT: {timeout}"),
            }
        }

        if let Some(path) = lookup("PUSHWIRE_SUBSCRIPTIONS") {
            self.subscriptions_path = Some(PathBuf::from(path));
        }
    }

    /// Decode the VAPID keypair.
    ///
    /// A missing or malformed value is a configuration error; no delivery
    /// may be attempted without a complete keypair.
    pub fn vapid_keys(&self) -> std::result::Result<VapidKeyPair, PushError> {
        fn required<'a>(value: Option<&'a String>, name: &str) -> std::result::Result<&'a str, PushError> {
            value
                .map(String::as_str)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PushError::Configuration(format!("{name} is not configured")))
        }

        let public_key = required(self.vapid_public_key.as_ref(), "VAPID public key")?;
        let private_key = required(self.vapid_private_key.as_ref(), "VAPID private key")?;
        let subject = required(self.vapid_subject.as_ref(), "VAPID subject")?;

        VapidKeyPair::from_base64url(public_key, private_key, subject)
    }

    /// Subscription file, defaulting to `subscriptions.json` in the config dir.
    pub fn subscriptions_path(&self) -> Result<PathBuf> {
        match &self.subscriptions_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("subscriptions.json")),
        }
    }

    /// Persists the current configuration to disk, owner read/write only.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .context("Failed to write config file")?;

        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }
}

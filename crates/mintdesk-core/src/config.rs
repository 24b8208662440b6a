//! Runtime configuration.
//!
//! Defaults target devnet. Values can be overlaid from environment variables
//! or loaded from a JSON document; either way the result is validated before
//! use.

use std::time::Duration;

use serde::Deserialize;

use crate::error::DeskError;

pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
pub const PINATA_API_BASE: &str = "https://api.pinata.cloud";
pub const PINATA_GATEWAY_BASE: &str = "https://gateway.pinata.cloud";

/// Compressed NFTs minted per group by the batch minter.
pub const DEFAULT_BATCH_SIZE: usize = 5;

pub const ENV_RPC_URL: &str = "MINTDESK_RPC_URL";
pub const ENV_HELIUS_API_KEY: &str = "HELIUS_API_KEY";
pub const ENV_PINATA_API_KEY: &str = "PINATA_API_KEY";
pub const ENV_PINATA_SECRET_API_KEY: &str = "PINATA_SECRET_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }

    /// Whether a signature at `status` satisfies this commitment.
    pub fn is_reached_by(self, status: &str) -> bool {
        let rank = |s: &str| match s {
            "processed" => 0,
            "confirmed" => 1,
            "finalized" => 2,
            _ => -1,
        };
        rank(status) >= rank(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PinataConfig {
    pub api_base: String,
    pub gateway_base: String,
    pub api_key: String,
    pub secret_api_key: String,
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            api_base: PINATA_API_BASE.into(),
            gateway_base: PINATA_GATEWAY_BASE.into(),
            api_key: String::new(),
            secret_api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Solana JSON-RPC endpoint.
    pub rpc_url: String,
    /// DAS indexer endpoint (asset search, proofs). Usually the same
    /// provider as `rpc_url`.
    pub das_url: String,
    pub commitment: Commitment,
    pub confirm_poll_interval_ms: u64,
    pub confirm_max_attempts: u32,
    pub batch_size: usize,
    pub pinata: PinataConfig,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

impl DeskConfig {
    pub fn devnet() -> Self {
        Self {
            rpc_url: DEVNET_RPC_URL.into(),
            das_url: DEVNET_RPC_URL.into(),
            commitment: Commitment::Confirmed,
            confirm_poll_interval_ms: 500,
            confirm_max_attempts: 60,
            batch_size: DEFAULT_BATCH_SIZE,
            pinata: PinataConfig::default(),
        }
    }

    /// Devnet defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, DeskError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Devnet defaults overlaid with values from `lookup`.
    ///
    /// A Helius key points both endpoints at Helius devnet, since the public
    /// RPC does not serve the DAS methods. An explicit RPC URL still wins.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DeskError> {
        let mut config = Self::devnet();

        if let Some(key) = lookup(ENV_HELIUS_API_KEY).filter(|k| !k.is_empty()) {
            let url = format!("https://devnet.helius-rpc.com/?api-key={key}");
            config.rpc_url = url.clone();
            config.das_url = url;
        }
        if let Some(url) = lookup(ENV_RPC_URL).filter(|u| !u.is_empty()) {
            config.rpc_url = url;
        }
        if let Some(key) = lookup(ENV_PINATA_API_KEY) {
            config.pinata.api_key = key;
        }
        if let Some(secret) = lookup(ENV_PINATA_SECRET_API_KEY) {
            config.pinata.secret_api_key = secret;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, DeskError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DeskError::Config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DeskError> {
        for (field, url) in [
            ("rpc_url", &self.rpc_url),
            ("das_url", &self.das_url),
            ("pinata.api_base", &self.pinata.api_base),
            ("pinata.gateway_base", &self.pinata.gateway_base),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DeskError::Config(format!(
                    "{field} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        if self.batch_size == 0 {
            return Err(DeskError::Config("batch_size must be at least 1".into()));
        }
        if self.confirm_max_attempts == 0 {
            return Err(DeskError::Config(
                "confirm_max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_interval_ms)
    }

    pub fn has_pinata_credentials(&self) -> bool {
        !self.pinata.api_key.is_empty() && !self.pinata.secret_api_key.is_empty()
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use triage_ledger::LedgerConfig;

use crate::error::{SdkError, SdkResult};

/// Settings for a [`Session`](crate::Session).
///
/// Every field is optional in TOML; missing ones take their defaults.
///
/// ```toml
/// default_actor_role = "assistant"
///
/// [ledger]
/// strict_entity_types = true
/// max_reasoning_items = 32
/// max_text_len = 4096
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ledger: LedgerConfig,
    /// Role recorded on work events when the caller does not name one.
    pub default_actor_role: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            default_actor_role: "assistant".into(),
        }
    }
}

impl SessionConfig {
    pub fn from_toml_str(raw: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| SdkError::Config(e.to_string()))?;
        if config.default_actor_role.trim().is_empty() {
            return Err(SdkError::Config("default_actor_role must not be blank".into()));
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SdkResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }
}

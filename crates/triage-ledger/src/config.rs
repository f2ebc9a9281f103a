use serde::{Deserialize, Serialize};

/// Tunables for the ledger and its emitters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Reject appends whose entity type differs from the one the stream was
    /// opened with.
    pub strict_entity_types: bool,
    /// Upper bound on `CLASSIFIED` reasoning lines.
    pub max_reasoning_items: usize,
    /// Upper bound, in bytes, on any single text field (reasoning line,
    /// actor role, reply subject).
    pub max_text_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            strict_entity_types: true,
            max_reasoning_items: 32,
            max_text_len: 4096,
        }
    }
}

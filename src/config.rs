use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::sequence::SequenceId;

pub const DEFAULT_INTERVAL_MS: u64 = 100;
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Attributes a view is bound with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub sequence: Option<String>,
    pub interval_ms: u64,
    pub auto_start: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            sequence: None,
            interval_ms: DEFAULT_INTERVAL_MS,
            auto_start: false,
        }
    }
}

impl ViewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms > MAX_INTERVAL_MS {
            return Err(anyhow!(
                "Frame interval {}ms exceeds the {}ms limit",
                self.interval_ms,
                MAX_INTERVAL_MS
            ));
        }
        Ok(())
    }

    /// Empty names count as no sequence at all.
    pub fn sequence_id(&self) -> Option<SequenceId> {
        self.sequence
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(SequenceId::from)
    }
}

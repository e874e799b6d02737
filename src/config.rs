//! Database configuration.

use serde::{Deserialize, Serialize};

use crate::model::TimeStamp;
use crate::{Error, Result};

/// Settings for one `Database` instance.
///
/// ```json
/// { "name": "session-12", "ticks_per_second": 1000, "temporal_ordering": true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub name: String,
    pub description: Option<String>,
    /// Tick rate used for the default onset/offset of new cells.
    pub ticks_per_second: u32,
    /// Keep each data column's cells sorted by onset.
    pub temporal_ordering: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "untitled".into(),
            description: None,
            ticks_per_second: TimeStamp::DEFAULT_TPS,
            temporal_ordering: false,
        }
    }
}

impl DatabaseConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("database name must not be empty".into()));
        }
        if self.ticks_per_second == 0 {
            return Err(Error::Config("ticks_per_second must be positive".into()));
        }
        Ok(())
    }
}

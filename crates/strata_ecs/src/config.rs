//! World configuration
//!
//! ```toml
//! max_entities_per_archetype = 1048576
//! commit_increment = 65536
//! initial_directory_capacity = 1024
//! ```

use crate::error::{EcsError, Result};
use serde::{Deserialize, Serialize};

/// Sizing knobs for a [`World`](crate::World)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Upper bound on entities in one archetype. Every column reserves
    /// address space for this many elements up front.
    pub max_entities_per_archetype: usize,
    /// Bytes committed at a time as a column grows. Rounded up to the
    /// arena page size.
    pub commit_increment: usize,
    /// Directory entries allocated up front
    pub initial_directory_capacity: usize,
}

impl EcsConfig {
    /// Default archetype capacity
    pub const DEFAULT_MAX_ENTITIES: usize = 1 << 20;
    /// Default commit increment
    pub const DEFAULT_COMMIT_INCREMENT: usize = 64 * 1024;

    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EcsConfig =
            toml::from_str(content).map_err(|e| EcsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| EcsError::Config(e.to_string()))
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_entities_per_archetype == 0 {
            return Err(EcsError::Config(
                "max_entities_per_archetype must be greater than zero".into(),
            ));
        }
        if self.max_entities_per_archetype > u32::MAX as usize {
            return Err(EcsError::Config(format!(
                "max_entities_per_archetype must not exceed {}",
                u32::MAX
            )));
        }
        if self.initial_directory_capacity > u32::MAX as usize {
            return Err(EcsError::Config(format!(
                "initial_directory_capacity must not exceed {}",
                u32::MAX
            )));
        }
        if self.commit_increment == 0 {
            return Err(EcsError::Config(
                "commit_increment must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            max_entities_per_archetype: Self::DEFAULT_MAX_ENTITIES,
            commit_increment: Self::DEFAULT_COMMIT_INCREMENT,
            initial_directory_capacity: 1024,
        }
    }
}

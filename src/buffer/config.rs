use std::path::Path;

use serde::{Deserialize, Serialize};

use super::DEFAULT_POOL_SIZE;
use super::error::{BufferError, BufferResult};
use super::replacer::ReplacementStrategy;

/// Parameters fixed at pool creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of frames; never changes after creation
    pub capacity: usize,
    pub strategy: ReplacementStrategy,
}

impl PoolConfig {
    pub fn new(capacity: usize, strategy: ReplacementStrategy) -> Self {
        Self { capacity, strategy }
    }

    /// Parse a configuration from JSON, e.g. `{"capacity": 8, "strategy": "clock"}`
    pub fn from_json(json: &str) -> BufferResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BufferError::Config(format!("malformed pool config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> BufferResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BufferError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> BufferResult<()> {
        if self.capacity == 0 {
            return Err(BufferError::Config(
                "capacity must be at least 1 frame".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_SIZE,
            strategy: ReplacementStrategy::Lru,
        }
    }
}

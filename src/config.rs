use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub committer: OffsetCommitterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsetCommitterConfig {
    /// Delay between the end of one commit tick and the start of the next, in seconds.
    /// Also used as the initial delay after start.
    pub commit_period_secs: u64,
    /// Capacity of the queue of subscriptions whose uncommitted offsets should be dropped
    pub cleanup_queue_capacity: usize,
}

impl Default for OffsetCommitterConfig {
    fn default() -> Self {
        Self {
            commit_period_secs: 60,
            cleanup_queue_capacity: 1000,
        }
    }
}

impl OffsetCommitterConfig {
    pub fn commit_period(&self) -> Duration {
        Duration::from_secs(self.commit_period_secs)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.commit_period_secs == 0 {
            return Err(crate::error::RustMqError::InvalidConfig(
                "committer.commit_period_secs must be greater than 0".to_string(),
            ));
        }

        if self.cleanup_queue_capacity == 0 {
            return Err(crate::error::RustMqError::InvalidConfig(
                "committer.cleanup_queue_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            committer: OffsetCommitterConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::error::RustMqError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.committer.validate()
    }
}

//! Pipeline configuration.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Parallelism and buffering of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of shards, and therefore shard workers.
    #[serde(default = "default_num_shards")]
    pub num_shards: usize,
    /// Concurrent batch-fetching producers.
    #[serde(default = "default_num_producers")]
    pub num_producers: usize,
    /// Capacity of each shard queue (in batches).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Window reference start in seconds. If None, the first event of the
    /// first batch anchors the windows.
    #[serde(default)]
    pub reference_secs: Option<i64>,
}

fn default_num_shards() -> usize {
    4
}

fn default_num_producers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_shards: default_num_shards(),
            num_producers: default_num_producers(),
            queue_capacity: default_queue_capacity(),
            reference_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.num_shards == 0 {
            return Err(PipelineError::Config("num_shards must be at least 1".to_string()));
        }
        if self.num_producers == 0 {
            return Err(PipelineError::Config(
                "num_producers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PipelineError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

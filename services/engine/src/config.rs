//! Engine configuration
//!
//! Injected at construction; no process-wide state.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for the engine and its market workers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of each market's inbox queue.
    pub inbox_capacity: usize,
    /// How long a caller waits for a market's reply before giving up.
    pub reply_timeout_ms: u64,
    /// Topic durable trade/market events are emitted on.
    pub sink_topic: String,
    /// Channel live snapshots are published on.
    pub stream_channel: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 100,
            reply_timeout_ms: 5_000,
            sink_topic: "process_db".to_string(),
            stream_channel: "stream:data".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

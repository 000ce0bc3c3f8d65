use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Process-wide tunables for the engine, loaded from a JSON config file or
/// defaulted. Mirrors the knobs each façade operation otherwise takes as
/// explicit arguments, so a long-running daemon can set sane defaults once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Chunk size used by `Add` (bytes).
    pub chunk_size: usize,
    /// Default fan-out concurrency for traversal and CAR batching.
    pub concurrency: usize,
    /// Default BlockSource fetch timeout (seconds).
    pub fetch_timeout_secs: u64,
    /// Default `sssize` snapshot-slice flush threshold (bytes).
    pub sssize: u64,
    /// Progress sampling cadence (milliseconds).
    pub progress_cadence_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            chunk_size: dagkit_chunker::DEFAULT_CHUNK_SIZE,
            concurrency: 32,
            fetch_timeout_secs: 30,
            sssize: 32 << 20,
            progress_cadence_ms: 50,
        }
    }
}

impl NodeConfig {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn progress_cadence(&self) -> Duration {
        Duration::from_millis(self.progress_cadence_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_defaults() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.concurrency, 32);
        assert_eq!(cfg.chunk_size, 1 << 20);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let cfg = NodeConfig::from_json(br#"{"concurrency": 4}"#).unwrap();
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.chunk_size, NodeConfig::default().chunk_size);
    }
}

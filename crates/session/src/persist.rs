//! Persisted-layout shapes and the write-behind scheduler seam.
//!
//! The scheduler itself lives outside this workspace; the core only supplies
//! the snapshot shape and the contract: throttled, coalesced,
//! last-write-wins, and never blocking the mutation path.

use std::collections::HashMap;

use crate::cache::SessionRecord;

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Per-feature assist configuration, persisted globally.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct AssistConfig {
    pub prompt: String,
    pub batch_size: usize,
    #[serde(default)]
    pub confidence_threshold: Option<f32>,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            confidence_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize, specta::Type)]
pub struct GlobalConfig {
    pub speaker: AssistConfig,
    pub revision: AssistConfig,
    pub chapter: AssistConfig,
    pub merge: AssistConfig,
}

pub type SessionCacheSnapshot = HashMap<String, SessionRecord>;

/// Fire-and-forget write-behind of derived snapshots. Implementations must
/// return immediately; throttling and coalescing are their concern.
pub trait PersistScheduler: Send + Sync {
    fn schedule(&self, sessions: SessionCacheSnapshot, config: GlobalConfig);
}

/// Discards every snapshot. Default for tests and headless use.
pub struct NullScheduler;

impl PersistScheduler for NullScheduler {
    fn schedule(&self, _sessions: SessionCacheSnapshot, _config: GlobalConfig) {}
}

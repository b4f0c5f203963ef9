//! Shared data structures for pingboard.

use serde::{Deserialize, Serialize};

/// Placeholder shown while a host has no successful probe in the current run.
pub const UNKNOWN_ADDRESS: &str = "Unknown";

/// Identifies one refresh cycle. Strictly increasing for the lifetime of a coordinator.
pub type RunId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostRecord {
    pub host_name: String,
    pub index: usize,
    pub click_target: u32,
}

impl HostRecord {
    pub fn new(host_name: impl Into<String>, index: usize, click_target: u32) -> Self {
        Self {
            host_name: host_name.into(),
            index,
            click_target,
        }
    }

    /// Builds records for `names`, using list position as the stable index.
    pub fn from_names<I, S>(names: I, click_target: u32) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(index, name)| Self::new(name, index, click_target))
            .collect()
    }
}

/// Result of a single echo probe. Every failure cause collapses into `Failure`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success { ip: String, ttl: u32, rtt_ms: u64 },
    Failure,
}

/// Display-ready summary of one host's series. Empty strings mean "nothing to show".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSnapshot {
    pub address: String,
    pub latency: String,
    pub ttl: String,
    pub progress: String,
    pub failed: String,
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub run_id: RunId,
    pub host_index: usize,
    pub snapshot: RunSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardFile {
    pub version: u32,
    pub finished_at_utc: String,
    pub click_target: u32,
    pub complete: bool,
    pub rows: Vec<BoardRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardRow {
    pub host_name: String,
    pub index: usize,
    pub snapshot: Option<RunSnapshot>,
}

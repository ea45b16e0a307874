//! Machine configuration.

use crate::core::TerminalPolicy;
use serde::{Deserialize, Serialize};

/// How a machine finds the transition entry for its current state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode")]
pub enum Lookup {
    /// Only the entry keyed by the current state.
    #[default]
    Exact,
    /// The current state first, then each ancestor path obtained by
    /// stripping the last `delimiter`-separated segment.
    Ancestors { delimiter: String },
}

/// What happens to follow-up events produced by a transition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FollowUpPolicy {
    /// Process them before `send` returns.
    #[default]
    Drain,
    /// Keep them pending until `flush` or `cancel_pending`.
    Queue,
}

/// Configuration for a single machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MachineConfig {
    /// Transition lookup strategy.
    pub lookup: Lookup,

    /// Emit a `ChildExit` follow-up when entering a terminal state whose key
    /// is qualified by the lookup delimiter.
    pub auto_exit: bool,

    /// Follow-up processing.
    pub follow_ups: FollowUpPolicy,

    /// Maximum follow-ups processed by one flush.
    pub max_follow_ups: usize,

    /// Terminal state detection.
    pub terminal: TerminalPolicy,

    /// Number of changes kept in the history (0 disables it).
    pub history_limit: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            lookup: Lookup::Exact,
            auto_exit: false,
            follow_ups: FollowUpPolicy::Drain,
            max_follow_ups: 256,
            terminal: TerminalPolicy::Explicit,
            history_limit: 64,
        }
    }
}

impl MachineConfig {
    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

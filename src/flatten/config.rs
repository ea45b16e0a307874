//! Flattening configuration.

use crate::core::TerminalPolicy;
use crate::machine::FollowUpPolicy;
use serde::{Deserialize, Serialize};

/// What to do when a composite and one of its descendants handle the same
/// domain event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventCollision {
    /// Refuse to flatten.
    #[default]
    Error,
    /// Keep both; the innermost handler wins for its own states.
    Namespaced,
    /// The composite's handler wins for every state below it.
    AllowShadow,
}

/// Configuration for [`super::flatten`] and [`super::FlatMachine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlattenConfig {
    pub event_collision: EventCollision,

    /// Separator between path segments.
    pub delimiter: String,

    /// Terminal detection used for automatic exits.
    pub terminal: TerminalPolicy,

    /// Handling of automatic exits.
    pub follow_ups: FollowUpPolicy,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            event_collision: EventCollision::Error,
            delimiter: ".".to_string(),
            terminal: TerminalPolicy::Explicit,
            follow_ups: FollowUpPolicy::Drain,
        }
    }
}

impl FlattenConfig {
    pub fn with_collision(mut self, event_collision: EventCollision) -> Self {
        self.event_collision = event_collision;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

//! Hierarchy configuration.

use crate::core::TerminalPolicy;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HierarchyConfig {
    /// When a child counts as finished.
    pub terminal: TerminalPolicy,

    /// Deepest child level routing descends to.
    pub max_depth: usize,

    /// Separator used by active paths and shape keys.
    pub delimiter: String,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            terminal: TerminalPolicy::Explicit,
            max_depth: 64,
            delimiter: ".".to_string(),
        }
    }
}

impl HierarchyConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = HierarchyConfig::from_json(r#"{"terminal": "explicitOrDeadEnd"}"#).unwrap();
        assert_eq!(config.terminal, TerminalPolicy::ExplicitOrDeadEnd);
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.delimiter, ".");
    }

    #[test]
    fn max_depth_parses() {
        let config = HierarchyConfig::from_json(r#"{"maxDepth": 3}"#).unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.terminal, TerminalPolicy::Explicit);
    }
}

//! Problems found in nested definitions.

use thiserror::Error;

/// A single problem in a nested definition.
///
/// Validation accumulates every problem it finds, so these usually arrive
/// as a list.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("Definition at {scope} has no initial state")]
    MissingInitial { scope: String },

    #[error("Initial state '{key}' is not declared at {scope}")]
    UnknownInitial { scope: String, key: String },

    #[error("State '{key}' is declared twice at {scope}")]
    DuplicateState { scope: String, key: String },

    #[error("State name '{key}' at {scope} is empty, starts with '^' or contains the delimiter")]
    InvalidStateName { scope: String, key: String },

    #[error("Transition source '{state}' is not declared at {scope}")]
    UnknownSource { scope: String, state: String },

    #[error("Event name '{event}' on '{state}' is in the reserved 'child.' namespace")]
    ReservedEventName { state: String, event: String },

    #[error("'{state}' declares event '{event}' twice")]
    DuplicateTransition { state: String, event: String },

    #[error("Composite '{path}' declares no states")]
    EmptyComposite { path: String },

    #[error("Target '{target}' of '{from}' --{event}--> does not name a state")]
    UnresolvedTarget {
        from: String,
        event: String,
        target: String,
    },

    #[error("Target '{target}' of '{from}' escapes beyond the root")]
    EscapeBeyondRoot { from: String, target: String },

    #[error("Target '{target}' of '{from}' is not a state of the same level")]
    CrossLevelTarget { from: String, target: String },
}

/// Label used for a scope in messages.
pub(crate) fn scope_label(scope: Option<&str>) -> String {
    match scope {
        Some(path) => format!("'{path}'"),
        None => "the root".to_string(),
    }
}

/// All messages of a list of problems, separated by `; `.
pub(crate) fn describe_all(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

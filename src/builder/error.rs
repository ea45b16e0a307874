//! Build errors for machine builders.

use thiserror::Error;

/// Errors that can occur when building machines.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) or .initial_key(key) before .build()")]
    MissingInitialState,

    #[error("Initial state '{0}' is not registered in the state factory")]
    UnknownInitialState(String),

    #[error("Event name '{event}' is in the reserved 'child.' namespace")]
    ReservedEventName { event: String },

    #[error("State '{state}' already handles event '{event}'")]
    DuplicateTransition { state: String, event: String },

    #[error("Transition source '{state}' is not a known state")]
    UnknownSourceState { state: String },

    #[error("Transition '{state}' --{event}--> targets unknown state '{target}'")]
    UnknownTargetState {
        state: String,
        event: String,
        target: String,
    },
}

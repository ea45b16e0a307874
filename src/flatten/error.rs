//! Flattening errors.

use crate::builder::BuildError;
use crate::definition::{describe_all, DefinitionError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FlattenError {
    #[error("Definition has {} problem(s): {}", .0.len(), describe_all(.0))]
    Invalid(Vec<DefinitionError>),

    #[error("Event '{event}' on composite '{composite}' is also handled by '{child}'")]
    EventCollision {
        composite: String,
        event: String,
        child: String,
    },

    #[error(transparent)]
    Build(#[from] BuildError),
}

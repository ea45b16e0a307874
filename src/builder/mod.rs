//! Builder API for ergonomic machine construction.
//!
//! This module provides a fluent builder and macros for creating machines
//! with minimal boilerplate while keeping tables checked against their
//! state factories.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use machine::MachineBuilder;

use crate::core::{State, TransitionSpec};
use serde_json::Value;

/// Literal target: construct `key` through the factory with the event params.
///
/// # Example
///
/// ```
/// use matryoshka::builder::{target, MachineBuilder};
/// use matryoshka::state_enum;
///
/// state_enum! {
///     enum Light {
///         Red,
///         Green,
///     }
/// }
///
/// let machine = MachineBuilder::new()
///     .factory(Light::factory())
///     .initial(Light::Red)
///     .on("Red", "go", target("Green"))
///     .build()
///     .unwrap();
///
/// machine.send("go", vec![]);
/// assert_eq!(*machine.state(), Light::Green);
/// ```
pub fn target<S: State>(key: impl Into<String>) -> TransitionSpec<S> {
    TransitionSpec::target(key)
}

/// Target built from the event params.
pub fn build<S, F>(build: F) -> TransitionSpec<S>
where
    S: State,
    F: Fn(&[Value]) -> Option<S> + 'static,
{
    TransitionSpec::build(build)
}

//! Nested machine definitions.
//!
//! A [`Definition`] is plain data: a list of states, each either a leaf or
//! a nested definition, transitions between them and an initial state. It
//! describes a hierarchy without creating any machine. The flattening engine
//! compiles it into one flat machine; [`crate::propagation::instantiate`]
//! turns it into a tree of live machines.
//!
//! Transition targets name states relative to the scope the transition is
//! declared in. Unknown names are searched in the enclosing scopes, a
//! leading `^` skips one scope, and naming a composite means its initial
//! state.

mod error;
mod paths;
mod validate;

pub use error::DefinitionError;
pub use paths::{PathIndex, ESCAPE};
pub use validate::validate;

pub(crate) use error::{describe_all, scope_label};
pub(crate) use paths::{join, parent, Unresolved};
pub(crate) use validate::into_errors;

use crate::core::EventKey;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Builds the data of a leaf state from event parameters.
pub type LeafConstructor = Rc<dyn Fn(&[Value]) -> Value>;

/// Picks a target name from event parameters at runtime.
pub type Chooser = Rc<dyn Fn(&[Value]) -> Option<String>>;

/// A state without children.
#[derive(Clone, Default)]
pub struct LeafDef {
    pub constructor: Option<LeafConstructor>,
    pub is_final: bool,
}

impl LeafDef {
    /// Data for a fresh instance of this leaf.
    ///
    /// Without a constructor the data is `null`, or the params as an array
    /// when there are any.
    pub fn data(&self, params: &[Value]) -> Value {
        match &self.constructor {
            Some(constructor) => constructor(params),
            None if params.is_empty() => Value::Null,
            None => Value::Array(params.to_vec()),
        }
    }
}

impl fmt::Debug for LeafDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafDef")
            .field("constructor", &self.constructor.is_some())
            .field("is_final", &self.is_final)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum StateDef {
    Leaf(LeafDef),
    Composite(Box<Definition>),
}

/// Where a declared transition goes.
#[derive(Clone)]
pub enum DefTarget {
    /// A state name, resolved when the definition is compiled.
    Key(String),
    /// A state name picked from the event params, resolved when the event
    /// arrives. `None` leaves the event unhandled.
    Choose(Chooser),
}

impl DefTarget {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Choose(_) => None,
        }
    }
}

impl fmt::Debug for DefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
            Self::Choose(_) => f.write_str("Choose(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransitionDef {
    /// Local key of the source state.
    pub from: String,
    pub event: EventKey,
    pub target: DefTarget,
}

/// One level of a hierarchical machine.
///
/// # Example
///
/// ```
/// use matryoshka::definition::Definition;
///
/// let checkout = Definition::new()
///     .state("Cart")
///     .composite(
///         "Payment",
///         Definition::new()
///             .state("MethodEntry")
///             .final_state("Authorized")
///             .initial("MethodEntry")
///             .on("MethodEntry", "authorize", "Authorized"),
///     )
///     .state("Review")
///     .initial("Cart")
///     .on("Cart", "proceed", "Payment")
///     .on_child_exit("Payment", "Review");
///
/// assert_eq!(checkout.initial_key(), Some("Cart"));
/// assert!(checkout.state_def("Payment").is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct Definition {
    states: Vec<(String, StateDef)>,
    transitions: Vec<TransitionDef>,
    initial: Option<String>,
    issues: Vec<DefinitionError>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaf whose data is built from the event params by default.
    pub fn state(self, key: impl Into<String>) -> Self {
        self.leaf(key.into(), LeafDef::default())
    }

    /// Leaf with a data constructor.
    pub fn state_with<F>(self, key: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.leaf(
            key.into(),
            LeafDef {
                constructor: Some(Rc::new(constructor)),
                is_final: false,
            },
        )
    }

    /// Leaf carrying the final marker.
    pub fn final_state(self, key: impl Into<String>) -> Self {
        self.leaf(
            key.into(),
            LeafDef {
                constructor: None,
                is_final: true,
            },
        )
    }

    pub fn composite(mut self, key: impl Into<String>, definition: Definition) -> Self {
        self.states
            .push((key.into(), StateDef::Composite(Box::new(definition))));
        self
    }

    pub fn initial(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(key.into());
        self
    }

    /// Handle domain event `event` in state `from`.
    pub fn on(self, from: impl Into<String>, event: &str, target: impl Into<String>) -> Self {
        self.declare(from.into(), event, DefTarget::Key(target.into()))
    }

    /// Handle `event` in `from` by picking the target name at runtime.
    pub fn choose<F>(self, from: impl Into<String>, event: &str, choose: F) -> Self
    where
        F: Fn(&[Value]) -> Option<String> + 'static,
    {
        self.declare(from.into(), event, DefTarget::Choose(Rc::new(choose)))
    }

    /// Leave composite `from` for `target` once its child is terminal.
    pub fn on_child_exit(mut self, from: impl Into<String>, target: impl Into<String>) -> Self {
        self.transitions.push(TransitionDef {
            from: from.into(),
            event: EventKey::ChildExit,
            target: DefTarget::Key(target.into()),
        });
        self
    }

    fn declare(mut self, from: String, event: &str, target: DefTarget) -> Self {
        match EventKey::from_name(event) {
            Some(EventKey::Domain(name)) => self.transitions.push(TransitionDef {
                from,
                event: EventKey::Domain(name),
                target,
            }),
            _ => self.issues.push(DefinitionError::ReservedEventName {
                state: from,
                event: event.to_string(),
            }),
        }
        self
    }

    fn leaf(mut self, key: String, leaf: LeafDef) -> Self {
        self.states.push((key, StateDef::Leaf(leaf)));
        self
    }

    pub fn states(&self) -> impl Iterator<Item = (&str, &StateDef)> {
        self.states.iter().map(|(key, state)| (key.as_str(), state))
    }

    /// First declaration of `key`.
    pub fn state_def(&self, key: &str) -> Option<&StateDef> {
        self.states
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, state)| state)
    }

    pub fn transitions(&self) -> &[TransitionDef] {
        &self.transitions
    }

    pub fn initial_key(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    /// Problems recorded while building, reported by validation.
    pub fn issues(&self) -> &[DefinitionError] {
        &self.issues
    }
}

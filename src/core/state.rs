//! Tagged states and the factories that construct them.
//!
//! A state is an immutable value with a discriminant key (its name) and
//! whatever data its constructor attached. Machines keep the current state
//! behind an `Rc` and allocate a fresh one on every transition, so observers
//! can detect change with `Rc::ptr_eq`.

use crate::machine::ChildLink;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::rc::Rc;
use thiserror::Error;

/// Trait for state machine states.
///
/// All methods are pure. `name` is the key the transition table is indexed
/// by; `child` exposes an embedded machine when the state is composite.
///
/// # Example
///
/// ```rust
/// use matryoshka::core::State;
///
/// #[derive(Clone, PartialEq, Debug)]
/// enum TaskState {
///     Pending,
///     Running,
///     Complete,
/// }
///
/// impl State for TaskState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Pending => "Pending",
///             Self::Running => "Running",
///             Self::Complete => "Complete",
///         }
///     }
///
///     fn is_final(&self) -> bool {
///         matches!(self, Self::Complete)
///     }
/// }
///
/// assert!(TaskState::Complete.is_final());
/// assert!(TaskState::Running.child().is_none());
/// ```
pub trait State: Clone + Debug + 'static {
    /// The state's key.
    fn name(&self) -> &str;

    /// Explicit final marker.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Hierarchical link to a child machine embedded in this state.
    ///
    /// Default implementation returns `None`.
    fn child(&self) -> Option<&ChildLink> {
        None
    }

    /// Data payload exposed to introspection, if the state carries any.
    fn payload(&self) -> Option<&Value> {
        None
    }
}

/// How a machine decides whether a state is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminalPolicy {
    /// Only states carrying the explicit final marker are terminal.
    #[default]
    Explicit,
    /// States without outgoing transitions are terminal as well.
    ExplicitOrDeadEnd,
}

impl TerminalPolicy {
    pub fn is_terminal(&self, is_final: bool, has_transitions: bool) -> bool {
        match self {
            Self::Explicit => is_final,
            Self::ExplicitOrDeadEnd => is_final || !has_transitions,
        }
    }
}

/// Named constructor producing a state from event parameters.
pub type Constructor<S> = Rc<dyn Fn(&[Value]) -> Option<S>>;

struct FactoryEntry<S> {
    build: Constructor<S>,
    is_final: bool,
}

impl<S> Clone for FactoryEntry<S> {
    fn clone(&self) -> Self {
        Self {
            build: Rc::clone(&self.build),
            is_final: self.is_final,
        }
    }
}

/// Registry of named state constructors.
///
/// Literal transition targets are built through the factory with the
/// parameters of the triggering event.
pub struct StateFactory<S> {
    entries: HashMap<String, FactoryEntry<S>>,
    order: Vec<String>,
}

impl<S: State> StateFactory<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a constructor for a non-final state.
    pub fn state<F>(self, key: impl Into<String>, build: F) -> Self
    where
        F: Fn(&[Value]) -> Option<S> + 'static,
    {
        self.register(key.into(), Rc::new(build), false)
    }

    /// Register a constructor for a final state.
    pub fn final_state<F>(self, key: impl Into<String>, build: F) -> Self
    where
        F: Fn(&[Value]) -> Option<S> + 'static,
    {
        self.register(key.into(), Rc::new(build), true)
    }

    /// Register a constant state, cloned on every construction.
    pub fn unit(self, value: S) -> Self {
        let key = value.name().to_string();
        let is_final = value.is_final();
        self.register(key, Rc::new(move |_: &[Value]| Some(value.clone())), is_final)
    }

    fn register(mut self, key: String, build: Constructor<S>, is_final: bool) -> Self {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, FactoryEntry { build, is_final });
        self
    }

    /// Construct the state registered under `key`.
    pub fn create(&self, key: &str, params: &[Value]) -> Option<S> {
        self.entries.get(key).and_then(|entry| (entry.build)(params))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_final(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.is_final)
    }

    /// Keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<S: State> Default for StateFactory<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for StateFactory<S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            order: self.order.clone(),
        }
    }
}

impl<S> Debug for StateFactory<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateFactory")
            .field("keys", &self.order)
            .finish()
    }
}

/// State with a string key and JSON data.
///
/// Used by definitions, flattened machines and instantiated trees, where
/// state shapes are only known at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct DynState {
    key: String,
    data: Value,
    is_final: bool,
    child: Option<ChildLink>,
}

impl DynState {
    pub fn new(key: impl Into<String>, data: Value) -> Self {
        Self {
            key: key.into(),
            data,
            is_final: false,
            child: None,
        }
    }

    pub fn final_state(key: impl Into<String>, data: Value) -> Self {
        Self {
            is_final: true,
            ..Self::new(key, data)
        }
    }

    pub fn with_child(mut self, child: ChildLink) -> Self {
        self.child = Some(child);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn is(&self, key: &str) -> bool {
        self.key == key
    }
}

impl State for DynState {
    fn name(&self) -> &str {
        &self.key
    }

    fn is_final(&self) -> bool {
        self.is_final
    }

    fn child(&self) -> Option<&ChildLink> {
        self.child.as_ref()
    }

    fn payload(&self) -> Option<&Value> {
        Some(&self.data)
    }
}

/// Errors raised by exhaustive matching.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MatchError {
    #[error("no case covers state keys: {}", .0.join(", "))]
    Uncovered(Vec<String>),

    #[error("state '{0}' has no matching case")]
    Unmatched(String),
}

type Case<'a, T> = (String, Box<dyn FnOnce(&DynState) -> T + 'a>);

/// Pattern matching over [`DynState`] keys.
///
/// Partial matches end in [`Cases::otherwise`]; exhaustive matches are
/// checked against the keys of a factory.
pub struct Cases<'a, T> {
    state: &'a DynState,
    cases: Vec<Case<'a, T>>,
}

impl<'a, T> Cases<'a, T> {
    pub fn new(state: &'a DynState) -> Self {
        Self {
            state,
            cases: Vec::new(),
        }
    }

    pub fn case<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: FnOnce(&DynState) -> T + 'a,
    {
        self.cases.push((key.into(), Box::new(handler)));
        self
    }

    /// Run the matching case, or `fallback` if none matches.
    pub fn otherwise<F>(self, fallback: F) -> T
    where
        F: FnOnce(&DynState) -> T,
    {
        let state = self.state;
        match self.cases.into_iter().find(|(key, _)| key == state.key()) {
            Some((_, handler)) => handler(state),
            None => fallback(state),
        }
    }

    /// Run the matching case after checking every factory key is covered.
    pub fn exhaustive(self, factory: &StateFactory<DynState>) -> Result<T, MatchError> {
        let uncovered: Vec<String> = factory
            .keys()
            .filter(|key| !self.cases.iter().any(|(case, _)| case.as_str() == *key))
            .map(str::to_string)
            .collect();
        if !uncovered.is_empty() {
            return Err(MatchError::Uncovered(uncovered));
        }

        let state = self.state;
        self.cases
            .into_iter()
            .find(|(key, _)| key == state.key())
            .map(|(_, handler)| handler(state))
            .ok_or_else(|| MatchError::Unmatched(state.key().to_string()))
    }
}

//! Transition tables.

use super::event::{Event, EventKey};
use super::guard::Guard;
use super::state::{State, StateFactory};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// What a transition function sees about the event being resolved.
pub struct EventContext<'a, S> {
    event: &'a Event,
    from: &'a Rc<S>,
}

impl<'a, S> EventContext<'a, S> {
    pub fn new(event: &'a Event, from: &'a Rc<S>) -> Self {
        Self { event, from }
    }

    pub fn event(&self) -> &Event {
        self.event
    }

    pub fn event_type(&self) -> &str {
        self.event.name()
    }

    pub fn params(&self) -> &[Value] {
        self.event.params()
    }

    pub fn from(&self) -> &S {
        self.from
    }
}

type BuildFn<S> = Rc<dyn Fn(&[Value]) -> Option<S>>;
type ContextFn<S> = Rc<dyn Fn(&EventContext<'_, S>) -> Option<S>>;

/// How the target of a transition is produced.
pub enum TransitionSpec<S: State> {
    /// Construct the named state through the factory with the event params.
    Target(String),

    /// Build the target from the event params.
    Build(BuildFn<S>),

    /// Build the target from the full event context.
    WithContext(ContextFn<S>),

    /// Only resolve `then` when `guard` passes.
    Guarded {
        guard: Guard<S>,
        then: Box<TransitionSpec<S>>,
    },
}

impl<S: State> TransitionSpec<S> {
    pub fn target(key: impl Into<String>) -> Self {
        Self::Target(key.into())
    }

    pub fn build<F>(build: F) -> Self
    where
        F: Fn(&[Value]) -> Option<S> + 'static,
    {
        Self::Build(Rc::new(build))
    }

    pub fn with_context<F>(build: F) -> Self
    where
        F: Fn(&EventContext<'_, S>) -> Option<S> + 'static,
    {
        Self::WithContext(Rc::new(build))
    }

    pub fn guarded(self, guard: Guard<S>) -> Self {
        Self::Guarded {
            guard,
            then: Box::new(self),
        }
    }

    /// Produce the target state, or `None` if this spec does not resolve.
    pub fn resolve(&self, factory: &StateFactory<S>, context: &EventContext<'_, S>) -> Option<S> {
        match self {
            Self::Target(key) => factory.create(key, context.params()),
            Self::Build(build) => build(context.params()),
            Self::WithContext(build) => build(context),
            Self::Guarded { guard, then } => {
                if guard.check(context) {
                    then.resolve(factory, context)
                } else {
                    None
                }
            }
        }
    }

    /// The target key when it is known without running any code.
    pub fn static_target(&self) -> Option<&str> {
        match self {
            Self::Target(key) => Some(key),
            Self::Guarded { then, .. } => then.static_target(),
            Self::Build(_) | Self::WithContext(_) => None,
        }
    }
}

impl<S: State> From<&str> for TransitionSpec<S> {
    fn from(key: &str) -> Self {
        Self::Target(key.to_string())
    }
}

impl<S: State> From<String> for TransitionSpec<S> {
    fn from(key: String) -> Self {
        Self::Target(key)
    }
}

/// Per-state map from event key to transition spec.
///
/// Each `(state, event)` pair maps to at most one spec.
pub struct TransitionTable<S: State> {
    entries: HashMap<String, HashMap<EventKey, TransitionSpec<S>>>,
}

impl<S: State> TransitionTable<S> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Insert a spec, returning the one it replaced.
    pub fn insert(
        &mut self,
        state: impl Into<String>,
        event: EventKey,
        spec: TransitionSpec<S>,
    ) -> Option<TransitionSpec<S>> {
        self.entries
            .entry(state.into())
            .or_default()
            .insert(event, spec)
    }

    pub fn get(&self, state: &str, event: &EventKey) -> Option<&TransitionSpec<S>> {
        self.entries.get(state).and_then(|events| events.get(event))
    }

    pub fn handles(&self, state: &str, event: &EventKey) -> bool {
        self.get(state, event).is_some()
    }

    /// Whether any event is handled in `state`.
    pub fn has_transitions(&self, state: &str) -> bool {
        self.entries
            .get(state)
            .is_some_and(|events| !events.is_empty())
    }

    /// Events handled in `state`.
    pub fn events(&self, state: &str) -> impl Iterator<Item = (&EventKey, &TransitionSpec<S>)> {
        self.entries.get(state).into_iter().flat_map(|events| events.iter())
    }

    /// States that have at least one entry.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: State> Default for TransitionTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

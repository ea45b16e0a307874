//! Builder for constructing machines.

use crate::builder::error::BuildError;
use crate::core::{EventKey, State, StateFactory, TransitionSpec, TransitionTable};
use crate::machine::{Lookup, Machine, MachineConfig};
use std::rc::Rc;

enum Initial<S> {
    State(S),
    Key(String),
}

/// Builder for constructing machines with a fluent API.
///
/// Table problems found while chaining (reserved names, duplicates) are kept
/// and reported by [`MachineBuilder::build`], so chains stay free of `?`.
pub struct MachineBuilder<S: State> {
    initial: Option<Initial<S>>,
    factory: StateFactory<S>,
    table: TransitionTable<S>,
    config: MachineConfig,
    errors: Vec<BuildError>,
}

impl<S: State> MachineBuilder<S> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            factory: StateFactory::new(),
            table: TransitionTable::new(),
            config: MachineConfig::default(),
            errors: Vec::new(),
        }
    }

    /// Set the state factory used for literal targets.
    pub fn factory(mut self, factory: StateFactory<S>) -> Self {
        self.factory = factory;
        self
    }

    /// Set the initial state.
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(Initial::State(state));
        self
    }

    /// Set the initial state by key; it is constructed through the factory
    /// without params.
    pub fn initial_key(mut self, key: impl Into<String>) -> Self {
        self.initial = Some(Initial::Key(key.into()));
        self
    }

    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle the domain event `event` in `state`.
    pub fn on(
        self,
        state: impl Into<String>,
        event: &str,
        spec: impl Into<TransitionSpec<S>>,
    ) -> Self {
        match EventKey::from_name(event) {
            Some(EventKey::Domain(name)) => self.entry(state.into(), EventKey::Domain(name), spec.into()),
            _ => self.fail(BuildError::ReservedEventName {
                event: event.to_string(),
            }),
        }
    }

    /// Handle a child reaching a terminal state while in `state`.
    pub fn on_child_exit(self, state: impl Into<String>, spec: impl Into<TransitionSpec<S>>) -> Self {
        self.entry(state.into(), EventKey::ChildExit, spec.into())
    }

    /// Add an entry under an explicit key.
    pub fn entry(mut self, state: String, event: EventKey, spec: TransitionSpec<S>) -> Self {
        let name = event.name().to_string();
        if self.table.insert(state.clone(), event, spec).is_some() {
            self.errors.push(BuildError::DuplicateTransition { state, event: name });
        }
        self
    }

    fn fail(mut self, error: BuildError) -> Self {
        self.errors.push(error);
        self
    }

    /// Build the machine.
    /// Returns the first problem found, if any.
    pub fn build(self) -> Result<Rc<Machine<S>>, BuildError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let initial = match self.initial.ok_or(BuildError::MissingInitialState)? {
            Initial::State(state) => state,
            Initial::Key(key) => self
                .factory
                .create(&key, &[])
                .ok_or(BuildError::UnknownInitialState(key))?,
        };

        check_table(&self.table, &self.factory, &self.config)?;

        Ok(Machine::new(initial, self.factory, self.table, self.config))
    }
}

impl<S: State> Default for MachineBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_table<S: State>(
    table: &TransitionTable<S>,
    factory: &StateFactory<S>,
    config: &MachineConfig,
) -> Result<(), BuildError> {
    let mut sources: Vec<&str> = table.states().collect();
    sources.sort_unstable();

    for state in sources {
        // Ancestor lookup allows entries keyed by composite prefixes.
        if config.lookup == Lookup::Exact && !factory.is_empty() && !factory.contains(state) {
            return Err(BuildError::UnknownSourceState {
                state: state.to_string(),
            });
        }
        for (event, spec) in table.events(state) {
            if let Some(target) = spec.static_target() {
                if !factory.contains(target) {
                    return Err(BuildError::UnknownTargetState {
                        state: state.to_string(),
                        event: event.name().to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

//! Machine runtime.
//!
//! A [`Machine`] owns its current state, transition table and state factory.
//! Sending an event resolves the effective transition, applies it, records a
//! changelog entry and notifies subscribers. Events with no matching entry
//! are silent no-ops, which lets composition layers try a child first and a
//! parent afterwards without treating misses as errors.
//!
//! Transitions can produce follow-up events (automatic exits of flattened
//! machines). They are never applied while another transition is being
//! applied: `send` drains them afterwards, or leaves them queued for an
//! explicit `flush` under [`FollowUpPolicy::Queue`].

mod config;
mod listeners;
mod submachine;

pub use config::{FollowUpPolicy, Lookup, MachineConfig};
pub use listeners::{Listeners, Subscription};
pub use submachine::{Attempt, ChildLink, Snapshot, SubMachine, Upstream};
pub(crate) use submachine::Router;

use crate::core::{
    is_reserved_name, Change, ChangeLog, ChildRef, Event, EventContext, MachineId, State,
    StateFactory, TransitionTable,
};
use crate::shape::{EdgeShape, MachineShape, StateShape};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Summary of an applied transition, independent of the machine's state type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Machine that transitioned
    pub machine: MachineId,
    /// Name of the event that was applied
    pub event: String,
    /// Key of the state left
    pub from: String,
    /// Key of the state entered
    pub to: String,
    /// Depth of the machine below the routing root (0 for the root itself)
    pub depth: usize,
}

impl Outcome {
    fn from_change<S: State>(machine: MachineId, change: &Change<S>) -> Self {
        Self {
            machine,
            event: change.event_type().to_string(),
            from: change.from.name().to_string(),
            to: change.to.name().to_string(),
            depth: 0,
        }
    }

    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// A resolved but not yet applied transition.
#[derive(Debug)]
pub struct Resolution<S> {
    pub event: Event,
    pub from: Rc<S>,
    pub to: S,
    /// Table key the matching entry was found under.
    pub matched: String,
}

/// An applied transition and the follow-up events it produced.
#[derive(Debug)]
pub struct Applied<S> {
    pub change: Rc<Change<S>>,
    pub follow_ups: Vec<Event>,
}

/// State machine over states of type `S`.
///
/// Machines are shared through `Rc` and mutate through interior mutability;
/// every method takes `&self`. No borrow is held while subscribers run.
pub struct Machine<S: State> {
    id: MachineId,
    factory: StateFactory<S>,
    table: TransitionTable<S>,
    config: MachineConfig,
    current: RefCell<Rc<S>>,
    change: RefCell<Option<Rc<Change<S>>>>,
    revision: Cell<u64>,
    history: RefCell<ChangeLog>,
    pending: RefCell<VecDeque<Event>>,
    listeners: Listeners<Change<S>>,
    upstream: RefCell<Option<Upstream>>,
}

impl<S: State> Machine<S> {
    /// Create a machine in `initial`. Prefer `MachineBuilder`, which
    /// validates the table against the factory.
    pub fn new(
        initial: S,
        factory: StateFactory<S>,
        table: TransitionTable<S>,
        config: MachineConfig,
    ) -> Rc<Self> {
        let history = ChangeLog::new(config.history_limit);
        Rc::new(Self {
            id: MachineId::new(),
            factory,
            table,
            config,
            current: RefCell::new(Rc::new(initial)),
            change: RefCell::new(None),
            revision: Cell::new(0),
            history: RefCell::new(history),
            pending: RefCell::new(VecDeque::new()),
            listeners: Listeners::new(),
            upstream: RefCell::new(None),
        })
    }

    pub fn id(&self) -> MachineId {
        self.id
    }

    /// Current state. The `Rc` changes identity on every transition.
    pub fn state(&self) -> Rc<S> {
        Rc::clone(&self.current.borrow())
    }

    /// Latest changelog entry, `None` before the first change.
    pub fn change(&self) -> Option<Rc<Change<S>>> {
        self.change.borrow().clone()
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn table(&self) -> &TransitionTable<S> {
        &self.table
    }

    pub fn factory(&self) -> &StateFactory<S> {
        &self.factory
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Recent transitions of this machine. Reports of changes below it are
    /// only visible through [`Machine::change`] and subscribers.
    pub fn history(&self) -> Ref<'_, ChangeLog> {
        self.history.borrow()
    }

    /// Check if the current state is terminal under the configured policy.
    pub fn is_final(&self) -> bool {
        self.is_terminal(&self.state())
    }

    pub fn is_terminal(&self, state: &S) -> bool {
        self.config
            .terminal
            .is_terminal(state.is_final(), self.table.has_transitions(state.name()))
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change<S>) + 'static,
    {
        self.listeners.subscribe(callback)
    }

    /// Send a domain event.
    ///
    /// Names in the reserved `child.` namespace are rejected; engine signals
    /// go through [`Machine::dispatch`].
    pub fn send(&self, name: &str, params: Vec<Value>) -> Option<Outcome> {
        if is_reserved_name(name) {
            warn!(machine = %self.id, event = name, "reserved event name sent as domain event");
            return None;
        }
        self.dispatch(Event::domain(name, params))
    }

    /// Deliver any event.
    ///
    /// Domain events go through the routing engine this machine is attached
    /// to, if any. Engine signals are always handled here. Domain events
    /// named in the reserved namespace never match.
    pub fn dispatch(&self, event: Event) -> Option<Outcome> {
        if !event.is_reserved() {
            if let Some(router) = self.router() {
                if router.owns(self.id) {
                    return router.route(event);
                }
                debug!(machine = %self.id, "left routed tree, handling locally");
                self.detach_upstream();
            }
        }
        self.dispatch_local(event)
    }

    /// Deliver an event to this machine only, bypassing any routing.
    pub fn dispatch_local(&self, event: Event) -> Option<Outcome> {
        let applied = self.step(event)?;
        let outcome = Outcome::from_change(self.id, &applied.change);
        self.settle(applied.follow_ups);
        Some(outcome)
    }

    /// Resolve `event` against the current state without applying it.
    pub fn resolve(&self, event: &Event) -> Option<Resolution<S>> {
        if event.is_misnamed() {
            warn!(machine = %self.id, event = event.name(), "reserved event name used as domain event");
            return None;
        }
        let from = self.state();
        let context = EventContext::new(event, &from);
        let key = event.key();

        for candidate in self.lookup_keys(event, from.name()) {
            let Some(spec) = self.table.get(&candidate, &key) else {
                continue;
            };
            if let Some(to) = spec.resolve(&self.factory, &context) {
                return Some(Resolution {
                    event: event.clone(),
                    from: Rc::clone(&from),
                    to,
                    matched: candidate,
                });
            }
        }
        None
    }

    /// Apply a resolution: allocate the new state, record the change and
    /// notify subscribers.
    pub fn transition(&self, resolution: Resolution<S>) -> Applied<S> {
        let to = Rc::new(resolution.to);
        let change = Rc::new(Change {
            event: resolution.event,
            from: resolution.from,
            to: Rc::clone(&to),
            timestamp: Utc::now(),
            revision: self.bump_revision(),
        });

        *self.current.borrow_mut() = Rc::clone(&to);
        self.commit(Rc::clone(&change));

        debug!(
            machine = %self.id,
            event = change.event_type(),
            from = change.from.name(),
            to = to.name(),
            matched = %resolution.matched,
            "transition applied"
        );

        let follow_ups = self.follow_ups_for(&to);
        self.listeners.notify(&change);
        Applied { change, follow_ups }
    }

    /// Record that something below this machine changed.
    ///
    /// The state keeps its identity; only the changelog moves, which is what
    /// subscribers bound to this machine observe.
    pub fn notify_child_change(&self, child: ChildRef, inner: Event) {
        let state = self.state();
        let change = Rc::new(Change {
            event: Event::ChildChange {
                child,
                inner: Box::new(inner),
            },
            from: Rc::clone(&state),
            to: state,
            timestamp: Utc::now(),
            revision: self.bump_revision(),
        });
        self.commit(Rc::clone(&change));
        self.listeners.notify(&change);
    }

    /// Process queued follow-up events. Returns how many were applied.
    pub fn flush(&self) -> usize {
        let mut applied = 0;
        let mut processed = 0;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            processed += 1;
            if processed > self.config.max_follow_ups {
                let dropped = self.cancel_pending() + 1;
                warn!(machine = %self.id, dropped, "follow-up limit reached");
                break;
            }
            if let Some(step) = self.step(event) {
                applied += 1;
                self.pending.borrow_mut().extend(step.follow_ups);
            }
        }
        applied
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Drop queued follow-ups. Returns how many were dropped.
    pub fn cancel_pending(&self) -> usize {
        let mut pending = self.pending.borrow_mut();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    fn step(&self, event: Event) -> Option<Applied<S>> {
        match self.resolve(&event) {
            Some(resolution) => Some(self.transition(resolution)),
            None => {
                trace!(machine = %self.id, event = event.name(), "event not handled");
                None
            }
        }
    }

    fn settle(&self, follow_ups: Vec<Event>) {
        if follow_ups.is_empty() {
            return;
        }
        self.pending.borrow_mut().extend(follow_ups);
        if self.config.follow_ups == FollowUpPolicy::Drain {
            self.flush();
        }
    }

    fn lookup_keys(&self, event: &Event, key: &str) -> Vec<String> {
        match &self.config.lookup {
            Lookup::Exact => vec![key.to_string()],
            Lookup::Ancestors { delimiter } => {
                // Exits are only offered to the composite directly containing
                // the terminal state, and only while that state is current.
                if let Event::ChildExit {
                    child: ChildRef::Path(path),
                } = event
                {
                    if path != key {
                        trace!(machine = %self.id, exit = %path, current = key, "stale exit dropped");
                        return Vec::new();
                    }
                    return path
                        .rsplit_once(delimiter.as_str())
                        .map(|(parent, _)| vec![parent.to_string()])
                        .unwrap_or_default();
                }
                let mut keys = vec![key.to_string()];
                let mut current = key;
                while let Some((parent, _)) = current.rsplit_once(delimiter.as_str()) {
                    keys.push(parent.to_string());
                    current = parent;
                }
                keys
            }
        }
    }

    fn follow_ups_for(&self, state: &S) -> Vec<Event> {
        let Lookup::Ancestors { delimiter } = &self.config.lookup else {
            return Vec::new();
        };
        if self.config.auto_exit && state.name().contains(delimiter.as_str()) && self.is_terminal(state) {
            vec![Event::child_exit(ChildRef::Path(state.name().to_string()))]
        } else {
            Vec::new()
        }
    }

    fn bump_revision(&self) -> u64 {
        let revision = self.revision.get() + 1;
        self.revision.set(revision);
        revision
    }

    fn commit(&self, change: Rc<Change<S>>) {
        self.history.borrow_mut().record(&change);
        *self.change.borrow_mut() = Some(change);
    }

    fn router(&self) -> Option<Rc<dyn Router>> {
        let upstream = self.upstream.borrow().clone();
        upstream.and_then(|upstream| upstream.router())
    }

    fn detach_upstream(&self) {
        self.upstream.borrow_mut().take();
    }

    /// Whether an engine has adopted this machine.
    pub fn is_attached(&self) -> bool {
        self.router().is_some()
    }
}

impl<S: State> SubMachine for Machine<S> {
    fn id(&self) -> MachineId {
        self.id
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let state = self.state();
        Some(Snapshot {
            key: state.name().to_string(),
            revision: self.revision(),
            is_final: state.is_final(),
            dead_end: !self.table.has_transitions(state.name()),
            child: state.child().cloned(),
            payload: state.payload().cloned(),
        })
    }

    fn send(&self, event: &Event) -> Option<Outcome> {
        self.dispatch(event.clone())
    }

    fn try_transition(&self, event: &Event) -> Attempt {
        match self.dispatch_local(event.clone()) {
            Some(outcome) => Attempt::Applied(outcome),
            None => Attempt::Unhandled,
        }
    }

    fn attach(&self, upstream: Upstream) {
        *self.upstream.borrow_mut() = Some(upstream);
    }

    fn detach(&self) {
        self.detach_upstream();
    }

    fn describe(&self) -> Option<MachineShape> {
        let current = self.state();
        let mut keys: Vec<String> = self.factory.keys().map(str::to_string).collect();
        if !keys.iter().any(|key| key == current.name()) {
            keys.push(current.name().to_string());
        }

        let states = keys
            .iter()
            .map(|key| StateShape {
                key: key.clone(),
                is_final: self.factory.is_final(key)
                    || (key == current.name() && current.is_final()),
            })
            .collect();

        let mut edges: Vec<EdgeShape> = self
            .table
            .states()
            .flat_map(|from| {
                self.table.events(from).filter_map(move |(event, spec)| {
                    spec.static_target().map(|to| EdgeShape {
                        from: from.to_string(),
                        event: event.name().to_string(),
                        to: to.to_string(),
                    })
                })
            })
            .collect();
        edges.sort_by(|a, b| (&a.from, &a.event).cmp(&(&b.from, &b.event)));

        Some(MachineShape { states, edges })
    }
}

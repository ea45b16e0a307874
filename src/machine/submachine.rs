//! Capability interface for machines embedded in other machines' states.

use super::Outcome;
use crate::core::{Event, MachineId};
use crate::shape::MachineShape;
use std::fmt;
use std::rc::{Rc, Weak};

/// What a parent needs to know about an embedded machine right now.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Key of the current state.
    pub key: String,
    /// Bumped on every applied transition.
    pub revision: u64,
    /// Explicit final marker of the current state.
    pub is_final: bool,
    /// The current state has no outgoing transitions.
    pub dead_end: bool,
    /// Link to the next machine down, if the current state embeds one.
    pub child: Option<ChildLink>,
    /// Data of the current state, for introspection.
    pub payload: Option<serde_json::Value>,
}

/// Result of a non-destructive transition attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Attempt {
    /// The event resolved and the transition was applied.
    Applied(Outcome),
    /// The event does not resolve here; nothing changed.
    Unhandled,
    /// The machine cannot be probed and only accepts `send`.
    Unsupported,
}

/// A machine that can be embedded in another machine's state.
///
/// Implementations that can resolve an event without side effects override
/// [`SubMachine::try_transition`]; send-only machines keep the default and
/// are driven through [`SubMachine::send`].
pub trait SubMachine {
    fn id(&self) -> MachineId;

    /// Current state summary, or `None` if the machine cannot report one.
    /// Routing treats a `None` snapshot as "no child here".
    fn snapshot(&self) -> Option<Snapshot>;

    /// Deliver an event the way an outside caller would.
    fn send(&self, event: &Event) -> Option<Outcome>;

    /// Resolve and, only if resolved, apply the event locally.
    fn try_transition(&self, _event: &Event) -> Attempt {
        Attempt::Unsupported
    }

    /// Register the engine that direct sends should be routed through.
    fn attach(&self, _upstream: Upstream) {}

    /// Drop any routing registration.
    fn detach(&self) {}

    /// Static structure for introspection.
    fn describe(&self) -> Option<MachineShape> {
        None
    }
}

/// Shared handle to a child machine stored in a parent's state.
///
/// The parent does not manage the child's lifecycle: a transition to a state
/// without the link simply drops it.
#[derive(Clone)]
pub struct ChildLink(Rc<dyn SubMachine>);

impl ChildLink {
    pub fn new<M: SubMachine + 'static>(machine: Rc<M>) -> Self {
        Self(machine)
    }

    pub fn from_dyn(machine: Rc<dyn SubMachine>) -> Self {
        Self(machine)
    }

    pub fn id(&self) -> MachineId {
        self.0.id()
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.0.snapshot()
    }

    pub fn machine(&self) -> &Rc<dyn SubMachine> {
        &self.0
    }
}

impl PartialEq for ChildLink {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ChildLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChildLink").field(&self.id()).finish()
    }
}

/// Engine side of a routing registration.
pub(crate) trait Router {
    /// Whether `origin` is still part of the routed tree.
    fn owns(&self, origin: MachineId) -> bool;

    /// Process a domain event as if it had been sent to the root.
    fn route(&self, event: Event) -> Option<Outcome>;
}

/// Registration handed to a machine when an engine adopts it.
///
/// Holds the engine weakly; once the engine is gone the machine handles
/// sends locally again.
#[derive(Clone)]
pub struct Upstream {
    router: Weak<dyn Router>,
}

impl Upstream {
    pub(crate) fn new(router: Weak<dyn Router>) -> Self {
        Self { router }
    }

    pub(crate) fn router(&self) -> Option<Rc<dyn Router>> {
        self.router.upgrade()
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upstream")
            .field("alive", &(self.router.strong_count() > 0))
            .finish()
    }
}

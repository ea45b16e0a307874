//! Core state machine types.
//!
//! This module contains the building blocks every machine is made of:
//! - States via the `State` trait and named constructors in `StateFactory`
//! - Events, with the reserved `child.` namespace as dedicated variants
//! - Transition tables mapping `(state, event)` to a target spec
//! - Guard predicates and changelog records
//!
//! Nothing in here mutates a machine; the runtime lives in `machine`.

mod event;
mod guard;
mod history;
mod id;
mod state;
mod table;

pub use event::{
    is_reserved_name, ChildRef, Event, EventKey, Params, CHILD_CHANGE, CHILD_EXIT,
    RESERVED_PREFIX,
};
pub use guard::Guard;
pub use history::{Change, ChangeLog, ChangeSummary};
pub use id::MachineId;
pub use state::{Cases, Constructor, DynState, MatchError, State, StateFactory, TerminalPolicy};
pub use table::{EventContext, TransitionSpec, TransitionTable};

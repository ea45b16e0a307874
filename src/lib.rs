//! Matryoshka: hierarchical state machines in two flavours.
//!
//! Nested states can be modelled at runtime or at definition time:
//!
//! - **Propagation** ([`propagation`]): live machines embed child machines in
//!   their states. A [`Hierarchy`] routes every event to the deepest active
//!   child first, falls back to ancestors, bubbles `ChildExit` when a child
//!   finishes and keeps the root's changelog moving for changes at any depth.
//! - **Flattening** ([`flatten`]): a nested [`Definition`] is compiled into one
//!   machine whose state keys are paths such as `Payment.Authorized`, with
//!   ancestor fallback and automatic exits built into lookup.
//!
//! Both are built on the same [`Machine`] runtime: states from a
//! [`StateFactory`], transitions from a [`TransitionTable`], a changelog
//! entry per applied transition and a subscriber list. Events without a
//! matching transition are silent no-ops.
//!
//! # Core Concepts
//!
//! - **State**: any type implementing [`State`]; every transition allocates
//!   a fresh `Rc`, so `Rc::ptr_eq` tells observers whether anything changed
//! - **Events**: domain events by name, plus the reserved `child.` signals
//!   modelled as [`Event::ChildExit`] and [`Event::ChildChange`]
//! - **Shape**: a serializable [`ShapeGraph`] of either flavour for
//!   visualization tools
//!
//! # Example
//!
//! ```rust
//! use matryoshka::definition::Definition;
//! use matryoshka::flatten::{FlatMachine, FlattenConfig};
//! use matryoshka::propagation::instantiate;
//!
//! let checkout = Definition::new()
//!     .state("Cart")
//!     .composite(
//!         "Payment",
//!         Definition::new()
//!             .state("MethodEntry")
//!             .final_state("Authorized")
//!             .initial("MethodEntry")
//!             .on("MethodEntry", "authorize", "Authorized"),
//!     )
//!     .state("Review")
//!     .initial("Cart")
//!     .on("Cart", "proceed", "Payment")
//!     .on_child_exit("Payment", "Review");
//!
//! let flat = FlatMachine::new(&checkout, FlattenConfig::default()).unwrap();
//! let tree = instantiate(&checkout).unwrap();
//!
//! for event in ["proceed", "authorize"] {
//!     flat.send(event, vec![]);
//!     tree.send(event, vec![]);
//! }
//!
//! assert_eq!(flat.state().key(), "Review");
//! assert_eq!(tree.active_path(), "Review");
//! ```

pub mod builder;
pub mod core;
pub mod definition;
pub mod flatten;
pub mod machine;
pub mod propagation;
pub mod shape;

// Re-export commonly used types
pub use builder::{BuildError, MachineBuilder};
pub use crate::core::{
    Change, ChildRef, DynState, Event, EventKey, Guard, State, StateFactory, TerminalPolicy,
    TransitionSpec, TransitionTable,
};
pub use definition::{Definition, DefinitionError};
pub use flatten::{flatten, EventCollision, FlatMachine, FlattenConfig, FlattenError};
pub use machine::{ChildLink, Machine, MachineConfig, Outcome, SubMachine, Subscription};
pub use propagation::{instantiate, Hierarchy, HierarchyConfig, InstantiateError};
pub use shape::{ShapeGraph, ShapeSource};

//! Runtime composition of live machines.
//!
//! A [`Hierarchy`] wraps a root machine whose states may embed child
//! machines through [`ChildLink`]s. Events are offered to the deepest child
//! of the active chain first and then to each ancestor; the first machine
//! that handles the event wins. When a child reaches a terminal state its
//! parent receives `ChildExit`, which can cascade up several levels in one
//! send.
//!
//! Every machine on the active chain is registered with the hierarchy, so
//! sending a domain event directly to a child has the same effect as sending
//! it to the root. After a change below the root, the root records a
//! `ChildChange` entry so subscribers bound to the root see it.

mod config;
mod engine;
mod instantiate;

pub use config::HierarchyConfig;
pub use instantiate::{instantiate, instantiate_with, InstantiateError};

use crate::core::{is_reserved_name, Change, Event, State};
use crate::machine::{ChildLink, Machine, Outcome, Snapshot, SubMachine, Subscription};
use crate::shape::{ShapeGraph, ShapeSource};
use engine::Engine;
use serde_json::Value;
use std::rc::Rc;
use tracing::warn;

/// A root machine and the tree of child machines reachable from it.
///
/// Dropping the hierarchy releases the registrations; machines then handle
/// their own sends again.
pub struct Hierarchy<S: State> {
    engine: Rc<Engine<S>>,
}

impl<S: State> Hierarchy<S> {
    pub fn new(root: Rc<Machine<S>>) -> Self {
        Self::with_config(root, HierarchyConfig::default())
    }

    pub fn with_config(root: Rc<Machine<S>>, config: HierarchyConfig) -> Self {
        Self {
            engine: Engine::new(root, config),
        }
    }

    pub fn root(&self) -> &Rc<Machine<S>> {
        self.engine.root()
    }

    pub fn config(&self) -> &HierarchyConfig {
        self.engine.config()
    }

    /// Send a domain event through child-first routing.
    pub fn send(&self, name: &str, params: Vec<Value>) -> Option<Outcome> {
        if is_reserved_name(name) {
            warn!(event = name, "reserved event name sent as domain event");
            return None;
        }
        self.engine.handle(Event::domain(name, params))
    }

    /// Deliver any event. Engine signals are handled by the root itself;
    /// domain events carrying a reserved name are refused as in `send`.
    pub fn dispatch(&self, event: Event) -> Option<Outcome> {
        self.engine.handle(event)
    }

    /// State of the root machine.
    pub fn state(&self) -> Rc<S> {
        self.root().state()
    }

    /// Latest change of the root, which moves on changes at any depth.
    pub fn change(&self) -> Option<Rc<Change<S>>> {
        self.root().change()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change<S>) + 'static,
    {
        self.root().subscribe(callback)
    }

    /// Child machines of the active chain, outermost first.
    pub fn active_chain(&self) -> Vec<ChildLink> {
        self.engine
            .descend()
            .into_iter()
            .map(|level| level.link)
            .collect()
    }

    /// Number of child levels below the root.
    pub fn depth(&self) -> usize {
        self.engine.descend().len()
    }

    /// Child machine at `depth` (1 is the root's child).
    pub fn child_at(&self, depth: usize) -> Option<ChildLink> {
        let index = depth.checked_sub(1)?;
        self.engine
            .descend()
            .into_iter()
            .nth(index)
            .map(|level| level.link)
    }

    /// State keys from the root down, joined with the configured delimiter.
    pub fn active_path(&self) -> String {
        let mut keys = vec![self.state().name().to_string()];
        keys.extend(
            self.engine
                .descend()
                .into_iter()
                .map(|level| level.snapshot.key),
        );
        keys.join(&self.config().delimiter)
    }

    /// Snapshot of the deepest machine of the active chain.
    pub fn leaf(&self) -> Option<Snapshot> {
        match self.engine.descend().pop() {
            Some(level) => Some(level.snapshot),
            None => self.root().snapshot(),
        }
    }
}

impl<S: State> ShapeSource for Hierarchy<S> {
    /// Built on first access and rebuilt only after a child machine joins
    /// or leaves the active chain.
    fn shape(&self) -> Rc<ShapeGraph> {
        self.engine.shape()
    }

    fn subscribe_shape<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ShapeGraph) + 'static,
    {
        self.engine.subscribe_shape(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MachineBuilder;
    use crate::core::StateFactory;
    use crate::state_enum;
    use std::cell::RefCell;

    state_enum! {
        enum Inner {
            Idle,
            Busy,
            Done,
        }
        final: [Done]
    }

    #[derive(Clone, Debug)]
    enum Outer {
        Waiting,
        Running(ChildLink),
        Finished,
    }

    impl State for Outer {
        fn name(&self) -> &str {
            match self {
                Self::Waiting => "Waiting",
                Self::Running(_) => "Running",
                Self::Finished => "Finished",
            }
        }

        fn child(&self) -> Option<&ChildLink> {
            match self {
                Self::Running(link) => Some(link),
                _ => None,
            }
        }
    }

    fn inner() -> Rc<Machine<Inner>> {
        MachineBuilder::new()
            .factory(Inner::factory())
            .initial(Inner::Idle)
            .on("Idle", "work", "Busy")
            .on("Busy", "finish", "Done")
            .build()
            .unwrap()
    }

    fn outer() -> Rc<Machine<Outer>> {
        let factory = StateFactory::new()
            .unit(Outer::Waiting)
            .state("Running", |_: &[Value]| Some(Outer::Running(ChildLink::new(inner()))))
            .unit(Outer::Finished);
        MachineBuilder::new()
            .factory(factory)
            .initial(Outer::Waiting)
            .on("Waiting", "start", "Running")
            .on("Running", "work", "Waiting")
            .on_child_exit("Running", "Finished")
            .build()
            .unwrap()
    }

    #[test]
    fn child_handles_before_parent() {
        let hierarchy = Hierarchy::new(outer());
        hierarchy.send("start", vec![]);

        let outcome = hierarchy.send("work", vec![]).unwrap();
        assert_eq!(outcome.depth, 1);
        assert_eq!(outcome.to, "Busy");
        assert_eq!(hierarchy.active_path(), "Running.Busy");
    }

    #[test]
    fn terminal_child_exits_parent() {
        let hierarchy = Hierarchy::new(outer());
        hierarchy.send("start", vec![]);
        let child = hierarchy.child_at(1).unwrap();

        hierarchy.send("work", vec![]);
        hierarchy.send("finish", vec![]);

        assert_eq!(hierarchy.state().name(), "Finished");
        assert_eq!(child.snapshot().unwrap().key, "Done");
        assert_eq!(hierarchy.depth(), 0);
    }

    #[test]
    fn root_change_moves_on_child_changes() {
        let hierarchy = Hierarchy::new(outer());
        hierarchy.send("start", vec![]);
        let state = hierarchy.state();
        let change = hierarchy.change().unwrap();

        hierarchy.send("work", vec![]);

        assert!(Rc::ptr_eq(&state, &hierarchy.state()));
        assert!(!Rc::ptr_eq(&change, &hierarchy.change().unwrap()));
        assert!(hierarchy.change().unwrap().is_child_change());
    }

    #[test]
    fn unhandled_events_change_nothing() {
        let hierarchy = Hierarchy::new(outer());
        hierarchy.send("start", vec![]);
        let state = hierarchy.state();
        let change = hierarchy.change();

        assert!(hierarchy.send("bogus", vec![]).is_none());
        assert!(Rc::ptr_eq(&state, &hierarchy.state()));
        assert_eq!(
            change.map(|c| c.revision),
            hierarchy.change().map(|c| c.revision)
        );
    }

    #[test]
    fn reserved_names_are_rejected() {
        let hierarchy = Hierarchy::new(outer());
        assert!(hierarchy.send("child.exit", vec![]).is_none());
    }

    #[test]
    fn shape_is_rebuilt_when_chain_changes() {
        let hierarchy = Hierarchy::new(outer());
        let rebuilt = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&rebuilt);
        let _subscription = hierarchy.subscribe_shape(move |_: &ShapeGraph| {
            *counter.borrow_mut() += 1;
        });

        let flat = hierarchy.shape();
        assert!(flat.node("Running.Idle").is_none());

        hierarchy.send("start", vec![]);
        assert_eq!(*rebuilt.borrow(), 1);
        let nested = hierarchy.shape();
        assert!(!Rc::ptr_eq(&flat, &nested));
        assert!(nested.node("Running.Idle").is_some());

        hierarchy.send("work", vec![]);
        assert!(Rc::ptr_eq(&nested, &hierarchy.shape()));
        assert_eq!(*rebuilt.borrow(), 1);
    }
}

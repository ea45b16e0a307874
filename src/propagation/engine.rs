//! Child-first routing over a tree of live machines.

use super::HierarchyConfig;
use crate::core::{ChildRef, Event, MachineId, State};
use crate::machine::{
    Attempt, ChildLink, Listeners, Machine, Outcome, Router, Snapshot, SubMachine, Subscription,
    Upstream,
};
use crate::shape::{LevelShape, MachineShape, ShapeGraph, StateShape};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// One child machine of the active chain with the snapshot taken when the
/// chain was walked.
#[derive(Clone, Debug)]
pub(crate) struct Level {
    pub(crate) link: ChildLink,
    pub(crate) snapshot: Snapshot,
}

pub(crate) struct Engine<S: State> {
    root: Rc<Machine<S>>,
    config: HierarchyConfig,
    this: Weak<Engine<S>>,
    /// Child machines currently registered with this engine, root excluded.
    attached: RefCell<Vec<ChildLink>>,
    shape: RefCell<Option<Rc<ShapeGraph>>>,
    shape_listeners: Listeners<ShapeGraph>,
}

impl<S: State> Engine<S> {
    pub(crate) fn new(root: Rc<Machine<S>>, config: HierarchyConfig) -> Rc<Self> {
        let engine = Rc::new_cyclic(|this| Self {
            root,
            config,
            this: this.clone(),
            attached: RefCell::new(Vec::new()),
            shape: RefCell::new(None),
            shape_listeners: Listeners::new(),
        });
        engine.root.attach(engine.upstream());
        engine.sync();
        engine
    }

    pub(crate) fn root(&self) -> &Rc<Machine<S>> {
        &self.root
    }

    pub(crate) fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    fn upstream(&self) -> Upstream {
        let router: Weak<dyn Router> = self.this.clone();
        Upstream::new(router)
    }

    /// Walk the active chain below the root.
    ///
    /// Stops at the first state without a link, at a child that cannot
    /// report a snapshot, at a machine already visited and at `max_depth`.
    pub(crate) fn descend(&self) -> Vec<Level> {
        let mut levels = Vec::new();
        let mut visited = HashSet::from([self.root.id()]);
        let mut next = self.root.state().child().cloned();

        while let Some(link) = next {
            if levels.len() >= self.config.max_depth {
                warn!(max_depth = self.config.max_depth, "child chain truncated");
                break;
            }
            if !visited.insert(link.id()) {
                warn!(machine = %link.id(), "child link cycle ignored");
                break;
            }
            let Some(snapshot) = link.snapshot() else {
                debug!(machine = %link.id(), "child without snapshot skipped");
                break;
            };
            next = snapshot.child.clone();
            levels.push(Level { link, snapshot });
        }
        levels
    }

    /// Register machines that joined the active chain and release those
    /// that left it.
    pub(crate) fn sync(&self) -> Vec<Level> {
        let levels = self.descend();
        let current: Vec<MachineId> = levels.iter().map(|level| level.link.id()).collect();
        let previous = self
            .attached
            .replace(levels.iter().map(|level| level.link.clone()).collect());
        let previous_ids: Vec<MachineId> = previous.iter().map(ChildLink::id).collect();

        if current == previous_ids {
            return levels;
        }

        for link in previous.iter().filter(|link| !current.contains(&link.id())) {
            debug!(machine = %link.id(), "child left the active chain");
            link.machine().detach();
        }
        for (depth, level) in levels.iter().enumerate() {
            if !previous_ids.contains(&level.link.id()) {
                debug!(machine = %level.link.id(), depth = depth + 1, "child joined the active chain");
                level.link.machine().attach(self.upstream());
            }
        }
        self.invalidate_shape();
        levels
    }

    /// Deliver an event as if it arrived at the root.
    pub(crate) fn handle(&self, event: Event) -> Option<Outcome> {
        if event.is_misnamed() {
            warn!(event = event.name(), "reserved event name used as domain event");
            return None;
        }
        if event.is_reserved() {
            return self.root.dispatch_local(event);
        }

        let levels = self.sync();
        let before: Vec<MachineId> = levels.iter().map(|level| level.link.id()).collect();

        let Some((handled, outcome)) = self.attempt(&levels, &event) else {
            trace!(event = event.name(), depth = levels.len(), "event not handled at any level");
            return None;
        };
        debug!(
            machine = %outcome.machine,
            event = event.name(),
            from = %outcome.from,
            to = %outcome.to,
            depth = handled,
            "event handled"
        );

        self.bubble_exits(handled, &before);
        if handled > 0 {
            self.root
                .notify_child_change(ChildRef::Machine(outcome.machine), event);
        }
        self.sync();
        Some(outcome)
    }

    /// Try the deepest level first and walk up; the first level that
    /// applies the event wins.
    fn attempt(&self, levels: &[Level], event: &Event) -> Option<(usize, Outcome)> {
        for depth in (1..=levels.len()).rev() {
            if let Some(outcome) = self.try_level(&levels[depth - 1], event) {
                return Some((depth, outcome.at_depth(depth)));
            }
        }
        self.root
            .dispatch_local(event.clone())
            .map(|outcome| (0, outcome))
    }

    fn try_level(&self, level: &Level, event: &Event) -> Option<Outcome> {
        match level.link.machine().try_transition(event) {
            Attempt::Applied(outcome) => Some(outcome),
            Attempt::Unhandled => None,
            Attempt::Unsupported => delegate(level, event),
        }
    }

    /// Offer `ChildExit` to the parent of every machine that finished,
    /// starting from the deepest machine entered by this send.
    fn bubble_exits(&self, handled: usize, before: &[MachineId]) {
        let levels = self.descend();

        // Levels below the handled one that were not there before were
        // entered by the transition itself.
        let mut changed = handled;
        while let Some(level) = levels.get(changed) {
            if before.contains(&level.link.id()) {
                break;
            }
            changed += 1;
        }

        while changed > 0 {
            let levels = self.descend();
            let Some(child) = levels.get(changed - 1) else {
                break;
            };
            if !self.is_terminal(&child.snapshot) {
                break;
            }

            let parent = changed - 1;
            let exit = Event::child_exit(ChildRef::Machine(child.link.id()));
            let applied = if parent == 0 {
                self.root.dispatch_local(exit).is_some()
            } else {
                self.try_level(&levels[parent - 1], &exit).is_some()
            };
            if !applied {
                trace!(child = %child.link.id(), depth = parent, "child exit not handled");
                break;
            }
            debug!(child = %child.link.id(), depth = parent, "child exit applied");
            changed = parent;
        }
    }

    fn is_terminal(&self, snapshot: &Snapshot) -> bool {
        self.config
            .terminal
            .is_terminal(snapshot.is_final, !snapshot.dead_end)
    }

    /// Whether `origin` is the root or part of the active chain.
    fn contains(&self, origin: MachineId) -> bool {
        origin == self.root.id() || self.descend().iter().any(|level| level.link.id() == origin)
    }

    pub(crate) fn shape(&self) -> Rc<ShapeGraph> {
        if let Some(shape) = self.shape.borrow().as_ref() {
            return Rc::clone(shape);
        }

        let shape = Rc::new(self.build_shape());
        *self.shape.borrow_mut() = Some(Rc::clone(&shape));
        shape
    }

    pub(crate) fn subscribe_shape<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ShapeGraph) + 'static,
    {
        self.shape_listeners.subscribe(callback)
    }

    fn invalidate_shape(&self) {
        self.shape.borrow_mut().take();
        if !self.shape_listeners.is_empty() {
            let shape = self.shape();
            self.shape_listeners.notify(&shape);
        }
    }

    fn build_shape(&self) -> ShapeGraph {
        let mut levels = Vec::new();
        if let Some(snapshot) = self.root.snapshot() {
            levels.push(level_shape(self.root.describe(), &snapshot));
        }
        for level in self.descend() {
            levels.push(level_shape(level.link.machine().describe(), &level.snapshot));
        }
        ShapeGraph::from_levels(&levels, &self.config.delimiter)
    }
}

impl<S: State> Router for Engine<S> {
    fn owns(&self, origin: MachineId) -> bool {
        self.contains(origin)
    }

    fn route(&self, event: Event) -> Option<Outcome> {
        self.handle(event)
    }
}

/// Drive a send-only child and infer from its snapshot whether anything
/// happened.
fn delegate(level: &Level, event: &Event) -> Option<Outcome> {
    let before = &level.snapshot;
    if let Some(outcome) = level.link.machine().send(event) {
        return Some(outcome);
    }

    let after = level.link.snapshot()?;
    if after.key == before.key && after.revision == before.revision {
        return None;
    }
    Some(Outcome {
        machine: level.link.id(),
        event: event.name().to_string(),
        from: before.key.clone(),
        to: after.key,
        depth: 0,
    })
}

/// Shape of one level, falling back to the current state alone for
/// machines that cannot describe themselves.
fn level_shape(shape: Option<MachineShape>, snapshot: &Snapshot) -> LevelShape {
    let shape = shape.unwrap_or_else(|| MachineShape {
        states: vec![StateShape {
            key: snapshot.key.clone(),
            is_final: snapshot.is_final,
        }],
        edges: Vec::new(),
    });
    LevelShape {
        shape,
        active: snapshot.key.clone(),
    }
}

//! Routing, bubbling and redirection across live machine trees.

use matryoshka::core::{Change, ChildRef, DynState, Event, MachineId, State, StateFactory, TerminalPolicy};
use matryoshka::definition::Definition;
use matryoshka::flatten::{EventCollision, FlatMachine, FlattenConfig};
use matryoshka::machine::{ChildLink, Machine, Outcome, Snapshot, SubMachine};
use matryoshka::propagation::{instantiate, instantiate_with, Hierarchy, HierarchyConfig};
use matryoshka::shape::{ShapeGraph, ShapeSource};
use matryoshka::MachineBuilder;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// `Menu{Open, Closed}` where both the child and the root handle `escape`.
fn menu() -> Definition {
    Definition::new()
        .composite(
            "Menu",
            Definition::new()
                .state("Open")
                .state("Closed")
                .initial("Open")
                .on("Open", "escape", "Closed"),
        )
        .state("Home")
        .initial("Menu")
        .on("Menu", "escape", "Home")
        .on("Home", "menu", "Menu")
}

/// Three levels whose innermost final state finishes everything at once.
fn nested() -> Definition {
    Definition::new()
        .composite(
            "Outer",
            Definition::new()
                .composite(
                    "Inner",
                    Definition::new()
                        .state("Work")
                        .state("Half")
                        .final_state("Done")
                        .initial("Work")
                        .on("Work", "step", "Half")
                        .on("Half", "finish", "Done"),
                )
                .final_state("Finished")
                .initial("Inner")
                .on_child_exit("Inner", "Finished"),
        )
        .state("Complete")
        .initial("Outer")
        .on_child_exit("Outer", "Complete")
}

#[test]
fn deepest_handler_wins() {
    let tree = instantiate(&menu()).unwrap();

    let outcome = tree.send("escape", vec![]).unwrap();
    assert_eq!(outcome.depth, 1);
    assert_eq!(tree.active_path(), "Menu.Closed");

    let outcome = tree.send("escape", vec![]).unwrap();
    assert_eq!(outcome.depth, 0);
    assert_eq!(tree.active_path(), "Home");
}

#[test]
fn namespaced_flattening_matches_child_first_routing() {
    let tree = instantiate(&menu()).unwrap();
    let flat = FlatMachine::new(
        &menu(),
        FlattenConfig::default().with_collision(EventCollision::Namespaced),
    )
    .unwrap();

    for event in ["escape", "escape", "menu", "escape"] {
        tree.send(event, vec![]);
        flat.send(event, vec![]);
        assert_eq!(flat.state().key(), tree.active_path());
    }
}

#[test]
fn exits_cascade_through_every_finished_level() {
    let tree = instantiate(&nested()).unwrap();
    let flat = FlatMachine::new(&nested(), FlattenConfig::default()).unwrap();
    assert_eq!(tree.active_path(), "Outer.Inner.Work");
    assert_eq!(tree.depth(), 2);

    for event in ["step", "finish"] {
        tree.send(event, vec![]);
        flat.send(event, vec![]);
    }

    assert_eq!(tree.active_path(), "Complete");
    assert_eq!(flat.state().key(), "Complete");
    assert_eq!(tree.depth(), 0);
}

#[test]
fn grandchild_changes_move_the_root_changelog() {
    let tree = instantiate(&nested()).unwrap();
    let state = tree.state();
    let before = tree.change();

    tree.send("step", vec![]);

    assert!(Rc::ptr_eq(&state, &tree.state()));
    let after = tree.change().unwrap();
    assert!(before.map_or(true, |before| !Rc::ptr_eq(&before, &after)));
    assert!(after.is_child_change());
    assert_eq!(tree.active_path(), "Outer.Inner.Half");
}

#[test]
fn unhandled_events_leave_every_level_alone() {
    let tree = instantiate(&nested()).unwrap();
    let leaf = tree.leaf().unwrap();
    let state = tree.state();

    assert!(tree.send("bogus", vec![]).is_none());

    assert!(Rc::ptr_eq(&state, &tree.state()));
    assert!(tree.change().is_none());
    assert_eq!(tree.leaf().unwrap().revision, leaf.revision);
}

#[test]
fn direct_sends_to_a_child_are_routed_from_the_root() {
    let tree = instantiate(&menu()).unwrap();
    let child = tree.child_at(1).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _subscription = tree.subscribe(move |change: &Change<DynState>| {
        sink.borrow_mut().push(change.event_type().to_string());
    });

    // Closed has no `escape`, so the second one is handled by the root.
    child.machine().send(&Event::domain("escape", vec![]));
    child.machine().send(&Event::domain("escape", vec![]));

    assert_eq!(tree.active_path(), "Home");
    assert_eq!(*seen.borrow(), vec!["child.change", "escape"]);
}

#[test]
fn children_that_left_the_tree_handle_sends_themselves() {
    let definition = Definition::new()
        .composite(
            "Running",
            Definition::new()
                .state("Idle")
                .state("Busy")
                .initial("Idle")
                .on("Idle", "work", "Busy"),
        )
        .state("Waiting")
        .initial("Running")
        .on("Running", "abort", "Waiting");
    let tree = instantiate(&definition).unwrap();
    let child = tree.child_at(1).unwrap();

    child.machine().send(&Event::domain("abort", vec![]));
    assert_eq!(tree.active_path(), "Waiting");

    let state = tree.state();
    let outcome = child.machine().send(&Event::domain("work", vec![])).unwrap();
    assert_eq!(outcome.to, "Busy");
    assert!(Rc::ptr_eq(&state, &tree.state()));
}

#[test]
fn reserved_events_stay_with_the_receiving_child() {
    let tree = instantiate(&nested()).unwrap();
    let child = tree.child_at(2).unwrap();

    let exit = Event::child_exit(ChildRef::Path("Elsewhere.Done".to_string()));
    assert!(child.machine().send(&exit).is_none());
    assert!(tree.change().is_none());
    assert_eq!(tree.active_path(), "Outer.Inner.Work");
}

#[test]
fn reserved_names_are_refused_on_dispatch_too() {
    let tree = instantiate(&nested()).unwrap();
    tree.send("step", vec![]);
    let before = tree.change().unwrap();

    assert!(tree.dispatch(Event::domain("child.exit", vec![])).is_none());
    assert!(tree.dispatch(Event::domain("child.finish", vec![])).is_none());
    assert!(Rc::ptr_eq(&before, &tree.change().unwrap()));
    assert_eq!(tree.active_path(), "Outer.Inner.Half");

    let flat = FlatMachine::new(&nested(), FlattenConfig::default()).unwrap();
    assert!(flat.dispatch(Event::domain("child.exit", vec![])).is_none());
    assert_eq!(flat.state().key(), "Outer.Inner.Work");
}

#[test]
fn routing_stops_at_max_depth() {
    let config = HierarchyConfig {
        max_depth: 1,
        ..HierarchyConfig::default()
    };
    let tree = instantiate_with(&nested(), config).unwrap();

    assert_eq!(tree.depth(), 1);
    assert_eq!(tree.active_path(), "Outer.Inner");
    assert!(tree.send("step", vec![]).is_none());
}

#[test]
fn dead_end_children_finish_only_when_configured() {
    let definition = Definition::new()
        .composite(
            "Job",
            Definition::new()
                .state("Working")
                .state("Stuck")
                .initial("Working")
                .on("Working", "jam", "Stuck"),
        )
        .state("Failed")
        .initial("Job")
        .on_child_exit("Job", "Failed");

    let explicit = instantiate(&definition).unwrap();
    explicit.send("jam", vec![]);
    assert_eq!(explicit.active_path(), "Job.Stuck");

    let lenient = instantiate_with(
        &definition,
        HierarchyConfig {
            terminal: TerminalPolicy::ExplicitOrDeadEnd,
            ..HierarchyConfig::default()
        },
    )
    .unwrap();
    lenient.send("jam", vec![]);
    assert_eq!(lenient.active_path(), "Failed");

    let flat = FlatMachine::new(
        &definition,
        FlattenConfig {
            terminal: TerminalPolicy::ExplicitOrDeadEnd,
            ..FlattenConfig::default()
        },
    )
    .unwrap();
    flat.send("jam", vec![]);
    assert_eq!(flat.state().key(), "Failed");
}

#[test]
fn shape_follows_the_active_chain() {
    let tree = instantiate(&menu()).unwrap();
    let shapes = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&shapes);
    let _subscription = tree.subscribe_shape(move |shape: &ShapeGraph| {
        sink.borrow_mut().push(shape.clone());
    });

    let initial = tree.shape();
    assert!(initial.node("Menu").unwrap().is_compound);
    assert_eq!(initial.children(Some("Menu")), vec!["Menu.Closed", "Menu.Open"]);

    tree.send("escape", vec![]);
    assert!(Rc::ptr_eq(&initial, &tree.shape()));
    assert!(shapes.borrow().is_empty());

    tree.send("escape", vec![]);
    assert_eq!(shapes.borrow().len(), 1);
    let home = shapes.borrow()[0].clone();
    assert!(home.node("Menu.Open").is_none());
    assert!(!home.node("Menu").unwrap().is_compound);
    assert_eq!(home.target("Home", "menu"), Some("Menu"));
}

/// A child that can only be driven through `send` and never reports what
/// happened.
struct Ticker {
    id: MachineId,
    ticks: Cell<u64>,
}

impl Ticker {
    const LIMIT: u64 = 3;

    fn new() -> Self {
        Self {
            id: MachineId::new(),
            ticks: Cell::new(0),
        }
    }
}

impl SubMachine for Ticker {
    fn id(&self) -> MachineId {
        self.id
    }

    fn snapshot(&self) -> Option<Snapshot> {
        let ticks = self.ticks.get();
        let full = ticks >= Self::LIMIT;
        Some(Snapshot {
            key: if full { "Full" } else { "Counting" }.to_string(),
            revision: ticks,
            is_final: full,
            dead_end: full,
            child: None,
            payload: Some(json!(ticks)),
        })
    }

    fn send(&self, event: &Event) -> Option<Outcome> {
        if event.name() == "tick" && self.ticks.get() < Self::LIMIT {
            self.ticks.set(self.ticks.get() + 1);
        }
        None
    }
}

/// A child that cannot report any state.
struct Opaque {
    id: MachineId,
}

impl SubMachine for Opaque {
    fn id(&self) -> MachineId {
        self.id
    }

    fn snapshot(&self) -> Option<Snapshot> {
        None
    }

    fn send(&self, _event: &Event) -> Option<Outcome> {
        None
    }
}

fn root_with<F>(child: F) -> Rc<Machine<DynState>>
where
    F: Fn() -> ChildLink + 'static,
{
    let factory = StateFactory::new()
        .state("Holding", move |_: &[Value]| {
            Some(DynState::new("Holding", Value::Null).with_child(child()))
        })
        .state("Done", |_: &[Value]| Some(DynState::new("Done", Value::Null)))
        .state("Free", |_: &[Value]| Some(DynState::new("Free", Value::Null)));

    MachineBuilder::new()
        .factory(factory)
        .initial_key("Holding")
        .on("Holding", "release", "Free")
        .on_child_exit("Holding", "Done")
        .build()
        .unwrap()
}

#[test]
fn send_only_children_are_judged_by_their_snapshots() {
    let hierarchy = Hierarchy::new(root_with(|| ChildLink::new(Rc::new(Ticker::new()))));
    let ticker = hierarchy.child_at(1).unwrap();

    let outcome = hierarchy.send("tick", vec![]).unwrap();
    assert_eq!(outcome.machine, ticker.id());
    assert_eq!(outcome.depth, 1);
    assert!(hierarchy.change().unwrap().is_child_change());

    hierarchy.send("tick", vec![]);
    assert_eq!(hierarchy.leaf().unwrap().payload, Some(json!(2)));

    hierarchy.send("tick", vec![]);
    assert_eq!(hierarchy.state().key(), "Done");
    assert_eq!(ticker.snapshot().unwrap().key, "Full");
}

#[test]
fn send_only_children_pass_on_what_they_ignore() {
    let hierarchy = Hierarchy::new(root_with(|| ChildLink::new(Rc::new(Ticker::new()))));

    let outcome = hierarchy.send("release", vec![]).unwrap();
    assert_eq!(outcome.depth, 0);
    assert_eq!(hierarchy.state().key(), "Free");
}

#[test]
fn children_without_snapshots_are_skipped() {
    let hierarchy = Hierarchy::new(root_with(|| {
        ChildLink::new(Rc::new(Opaque {
            id: MachineId::new(),
        }))
    }));

    assert_eq!(hierarchy.depth(), 0);
    assert_eq!(hierarchy.active_path(), "Holding");
    assert!(hierarchy.send("tick", vec![]).is_none());

    hierarchy.send("release", vec![]);
    assert_eq!(hierarchy.state().name(), "Free");
}

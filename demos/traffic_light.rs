//! Traffic Light Controller
//!
//! A controller whose `Operating` state embeds a live light machine.
//!
//! Key concepts:
//! - A typed parent state carrying a `ChildLink`
//! - Child-first routing: `tick` is handled by the light, `fault` by the
//!   controller
//! - Root subscribers see the light's changes as `child.change`
//!
//! Run with: RUST_LOG=debug cargo run --example traffic_light

use matryoshka::core::{Change, State, StateFactory};
use matryoshka::machine::{ChildLink, Machine};
use matryoshka::{state_enum, Hierarchy, MachineBuilder, ShapeSource};
use serde_json::Value;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

state_enum! {
    enum Light {
        Red,
        Green,
        Yellow,
    }
}

#[derive(Clone, Debug)]
enum Controller {
    Operating(ChildLink),
    Flashing,
}

impl State for Controller {
    fn name(&self) -> &str {
        match self {
            Self::Operating(_) => "Operating",
            Self::Flashing => "Flashing",
        }
    }

    fn child(&self) -> Option<&ChildLink> {
        match self {
            Self::Operating(link) => Some(link),
            Self::Flashing => None,
        }
    }
}

fn light() -> Rc<Machine<Light>> {
    MachineBuilder::new()
        .factory(Light::factory())
        .initial(Light::Red)
        .on("Red", "tick", "Green")
        .on("Green", "tick", "Yellow")
        .on("Yellow", "tick", "Red")
        .build()
        .unwrap()
}

fn controller() -> Rc<Machine<Controller>> {
    let factory = StateFactory::new()
        .state("Operating", |_: &[Value]| {
            Some(Controller::Operating(ChildLink::new(light())))
        })
        .unit(Controller::Flashing);

    MachineBuilder::new()
        .factory(factory)
        .initial_key("Operating")
        .on("Operating", "fault", "Flashing")
        .on("Flashing", "repair", "Operating")
        .build()
        .unwrap()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Traffic Light Controller ===\n");

    let hierarchy = Hierarchy::new(controller());
    let _subscription = hierarchy.subscribe(|change: &Change<Controller>| {
        println!("  root saw {} ({} -> {})", change.event_type(), change.from.name(), change.to.name());
    });

    println!("Initial: {}\n", hierarchy.active_path());

    for event in ["tick", "tick", "fault", "tick", "repair", "tick"] {
        let handled = hierarchy.send(event, vec![]);
        let depth = handled.as_ref().map(|outcome| outcome.depth);
        println!("{event:>7} -> {:<18} handled at depth {depth:?}", hierarchy.active_path());
    }

    println!("\nRepairing starts a fresh light at Red.");
    println!("Shape of the active tree:");
    match hierarchy.shape().to_json() {
        Ok(json) => println!("{json}"),
        Err(error) => eprintln!("shape could not be serialized: {error}"),
    }

    println!("\n=== Example Complete ===");
}

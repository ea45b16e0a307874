//! Checkout in Both Flavours
//!
//! The same nested definition run as one flattened machine and as a tree of
//! live machines.
//!
//! Key concepts:
//! - Composite states declared with `Definition::composite`
//! - `child.exit` leaving `Payment` once `Authorized` is reached
//! - Identical active paths after every event
//!
//! Run with: RUST_LOG=matryoshka=debug cargo run --example checkout

use matryoshka::definition::Definition;
use matryoshka::flatten::{FlatMachine, FlattenConfig};
use matryoshka::propagation::instantiate;
use matryoshka::ShapeSource;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

fn checkout() -> Definition {
    Definition::new()
        .state("Cart")
        .state("Shipping")
        .composite(
            "Payment",
            Definition::new()
                .state("MethodEntry")
                .state("Authorizing")
                .state("Declined")
                .final_state("Authorized")
                .initial("MethodEntry")
                .on("MethodEntry", "authorize", "Authorizing")
                .on("Authorizing", "authSucceeded", "Authorized")
                .on("Authorizing", "authFailed", "Declined")
                .on("Declined", "retry", "MethodEntry"),
        )
        .state_with("Review", |params: &[Value]| json!({ "confirmedWith": params }))
        .initial("Cart")
        .on("Cart", "proceed", "Shipping")
        .on("Shipping", "proceed", "Payment")
        .on("Payment", "cancel", "Cart")
        .on_child_exit("Payment", "Review")
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Checkout ===\n");

    let definition = checkout();
    let flat = match FlatMachine::new(&definition, FlattenConfig::default()) {
        Ok(machine) => machine,
        Err(error) => {
            eprintln!("flattening failed: {error}");
            return;
        }
    };
    let tree = match instantiate(&definition) {
        Ok(hierarchy) => hierarchy,
        Err(error) => {
            eprintln!("instantiation failed: {error}");
            return;
        }
    };

    println!("{:<14} {:<22} {:<22}", "event", "flat", "tree");
    println!("{:<14} {:<22} {:<22}", "-", flat.state().key(), tree.active_path());

    let events = [
        "proceed",
        "proceed",
        "authorize",
        "authFailed",
        "retry",
        "authorize",
        "authSucceeded",
    ];
    for event in events {
        flat.send(event, vec![]);
        tree.send(event, vec![]);
        println!("{:<14} {:<22} {:<22}", event, flat.state().key(), tree.active_path());
    }

    println!("\nFlattened states:");
    for leaf in flat.definition().leaves() {
        let marker = if leaf.is_final { " (final)" } else { "" };
        println!("  {}{marker}", leaf.path);
    }

    println!("\nShape edges:");
    for (from, events) in &flat.shape().edges {
        for (event, to) in events {
            println!("  {from} --{event}--> {to}");
        }
    }

    println!("\n=== Example Complete ===");
}

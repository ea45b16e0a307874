//! Runnable flat machines.

use super::{flatten, FlatDefinition, FlatTarget, FlattenConfig, FlattenError};
use crate::builder::MachineBuilder;
use crate::core::{Change, DynState, Event, StateFactory, TransitionSpec};
use crate::definition::Definition;
use crate::machine::{Lookup, Machine, MachineConfig, Outcome, Subscription};
use crate::shape::{ShapeGraph, ShapeSource};
use serde_json::Value;
use std::rc::Rc;

/// A flattened definition running on a single [`Machine`].
///
/// Unhandled events fall back to the entries of the enclosing composites,
/// and entering a terminal leaf below the root emits a `ChildExit` for its
/// composite. Exits are processed before `send` returns unless the config
/// asks for them to be queued.
///
/// # Example
///
/// ```
/// use matryoshka::definition::Definition;
/// use matryoshka::flatten::{FlatMachine, FlattenConfig};
///
/// let definition = Definition::new()
///     .composite(
///         "Payment",
///         Definition::new()
///             .state("Entry")
///             .final_state("Authorized")
///             .initial("Entry")
///             .on("Entry", "authorize", "Authorized"),
///     )
///     .state("Review")
///     .initial("Payment")
///     .on_child_exit("Payment", "Review");
///
/// let machine = FlatMachine::new(&definition, FlattenConfig::default()).unwrap();
/// assert_eq!(machine.state().key(), "Payment.Entry");
///
/// machine.send("authorize", vec![]);
/// assert_eq!(machine.state().key(), "Review");
/// ```
pub struct FlatMachine {
    machine: Rc<Machine<DynState>>,
    definition: Rc<FlatDefinition>,
    shape: Rc<ShapeGraph>,
}

impl FlatMachine {
    /// Flatten `definition` and start a machine at its initial leaf.
    pub fn new(definition: &Definition, config: FlattenConfig) -> Result<Self, FlattenError> {
        let flat = flatten(definition, &config)?;
        Self::from_flat(flat, &config)
    }

    pub fn from_flat(definition: FlatDefinition, config: &FlattenConfig) -> Result<Self, FlattenError> {
        let definition = Rc::new(definition);
        let factory = factory_for(&definition);

        let mut builder = MachineBuilder::new()
            .factory(factory.clone())
            .initial_key(definition.initial())
            .config(MachineConfig {
                lookup: Lookup::Ancestors {
                    delimiter: config.delimiter.clone(),
                },
                auto_exit: true,
                follow_ups: config.follow_ups,
                terminal: config.terminal,
                ..MachineConfig::default()
            });

        for (from, event, target) in definition.entries() {
            let spec = match target {
                FlatTarget::Path(path) => TransitionSpec::target(path.clone()),
                FlatTarget::Choose { scope, choose } => {
                    let choose = Rc::clone(choose);
                    let scope = scope.clone();
                    let lookup = Rc::clone(&definition);
                    let factory = factory.clone();
                    TransitionSpec::build(move |params: &[Value]| {
                        let name = choose(params)?;
                        let path = lookup.resolve(scope.as_deref(), &name)?;
                        factory.create(&path, params)
                    })
                }
            };
            builder = builder.entry(from.to_string(), event.clone(), spec);
        }

        let machine = builder.build()?;
        let shape = Rc::new(ShapeGraph::from_flat(&definition));
        Ok(Self {
            machine,
            definition,
            shape,
        })
    }

    pub fn send(&self, name: &str, params: Vec<Value>) -> Option<Outcome> {
        self.machine.send(name, params)
    }

    pub fn dispatch(&self, event: Event) -> Option<Outcome> {
        self.machine.dispatch(event)
    }

    pub fn state(&self) -> Rc<DynState> {
        self.machine.state()
    }

    pub fn change(&self) -> Option<Rc<Change<DynState>>> {
        self.machine.change()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change<DynState>) + 'static,
    {
        self.machine.subscribe(callback)
    }

    /// Process queued exits.
    pub fn flush(&self) -> usize {
        self.machine.flush()
    }

    pub fn pending(&self) -> usize {
        self.machine.pending()
    }

    pub fn cancel_pending(&self) -> usize {
        self.machine.cancel_pending()
    }

    pub fn machine(&self) -> &Rc<Machine<DynState>> {
        &self.machine
    }

    pub fn definition(&self) -> &FlatDefinition {
        &self.definition
    }
}

impl ShapeSource for FlatMachine {
    fn shape(&self) -> Rc<ShapeGraph> {
        Rc::clone(&self.shape)
    }

    /// The definition is immutable, so the shape never changes.
    fn subscribe_shape<F>(&self, _callback: F) -> Subscription
    where
        F: Fn(&ShapeGraph) + 'static,
    {
        Subscription::inert()
    }
}

fn factory_for(definition: &FlatDefinition) -> StateFactory<DynState> {
    definition
        .leaves()
        .iter()
        .fold(StateFactory::new(), |factory, leaf| {
            let entry = leaf.clone();
            if leaf.is_final {
                factory.final_state(leaf.path.clone(), move |params: &[Value]| {
                    Some(DynState::final_state(entry.path.clone(), entry.data(params)))
                })
            } else {
                factory.state(leaf.path.clone(), move |params: &[Value]| {
                    Some(DynState::new(entry.path.clone(), entry.data(params)))
                })
            }
        })
}

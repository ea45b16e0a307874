//! Live hierarchies built from nested definitions.

use super::{Hierarchy, HierarchyConfig};
use crate::builder::{BuildError, MachineBuilder};
use crate::core::{DynState, StateFactory, TransitionSpec};
use crate::definition::{
    describe_all, into_errors, join, validate, DefTarget, Definition, DefinitionError, StateDef, ESCAPE,
};
use crate::machine::{ChildLink, Machine, MachineConfig};
use serde_json::Value;
use std::rc::Rc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InstantiateError {
    #[error("Definition has {} problem(s): {}", .0.len(), describe_all(.0))]
    Invalid(Vec<DefinitionError>),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Build a tree of machines from a nested definition.
///
/// Each level becomes a [`Machine<DynState>`]; entering a composite state
/// starts a fresh child machine at its initial state. Targets must name a
/// state of their own level, since a child machine cannot move its parent.
pub fn instantiate(definition: &Definition) -> Result<Hierarchy<DynState>, InstantiateError> {
    instantiate_with(definition, HierarchyConfig::default())
}

pub fn instantiate_with(
    definition: &Definition,
    config: HierarchyConfig,
) -> Result<Hierarchy<DynState>, InstantiateError> {
    into_errors(validate(definition, &config.delimiter)).map_err(InstantiateError::Invalid)?;

    let mut crossing = Vec::new();
    cross_level_targets(definition, None, &config.delimiter, &mut crossing);
    if !crossing.is_empty() {
        return Err(InstantiateError::Invalid(crossing));
    }

    let root = build_level(Rc::new(definition.clone()), Rc::new(config.clone()))?;
    Ok(Hierarchy::with_config(root, config))
}

fn cross_level_targets(
    definition: &Definition,
    scope: Option<&str>,
    delimiter: &str,
    errors: &mut Vec<DefinitionError>,
) {
    for transition in definition.transitions() {
        if let DefTarget::Key(target) = &transition.target {
            if target.starts_with(ESCAPE) || definition.state_def(target).is_none() {
                errors.push(DefinitionError::CrossLevelTarget {
                    from: join(scope, &transition.from, delimiter),
                    target: target.clone(),
                });
            }
        }
    }
    for (key, state) in definition.states() {
        if let StateDef::Composite(inner) = state {
            let path = join(scope, key, delimiter);
            cross_level_targets(inner, Some(&path), delimiter, errors);
        }
    }
}

fn build_level(
    definition: Rc<Definition>,
    config: Rc<HierarchyConfig>,
) -> Result<Rc<Machine<DynState>>, BuildError> {
    let factory = level_factory(&definition, &config);

    let mut builder = MachineBuilder::new()
        .factory(factory.clone())
        .initial_key(definition.initial_key().unwrap_or_default())
        .config(MachineConfig {
            terminal: config.terminal,
            ..MachineConfig::default()
        });

    for transition in definition.transitions() {
        let spec = match &transition.target {
            DefTarget::Key(target) => TransitionSpec::target(target.clone()),
            DefTarget::Choose(choose) => {
                let choose = Rc::clone(choose);
                let factory = factory.clone();
                TransitionSpec::build(move |params: &[Value]| {
                    let name = choose(params)?;
                    factory.create(&name, params)
                })
            }
        };
        builder = builder.entry(transition.from.clone(), transition.event.clone(), spec);
    }
    builder.build()
}

fn level_factory(definition: &Definition, config: &Rc<HierarchyConfig>) -> StateFactory<DynState> {
    definition
        .states()
        .fold(StateFactory::new(), |factory, (key, state)| match state {
            StateDef::Leaf(leaf) => {
                let key = key.to_string();
                let leaf = leaf.clone();
                if leaf.is_final {
                    factory.final_state(key.clone(), move |params: &[Value]| {
                        Some(DynState::final_state(key.clone(), leaf.data(params)))
                    })
                } else {
                    factory.state(key.clone(), move |params: &[Value]| {
                        Some(DynState::new(key.clone(), leaf.data(params)))
                    })
                }
            }
            StateDef::Composite(inner) => {
                let key = key.to_string();
                let inner = Rc::new((**inner).clone());
                let config = Rc::clone(config);
                factory.state(key.clone(), move |_: &[Value]| {
                    match build_level(Rc::clone(&inner), Rc::clone(&config)) {
                        Ok(child) => {
                            Some(DynState::new(key.clone(), Value::Null).with_child(ChildLink::new(child)))
                        }
                        Err(error) => {
                            warn!(state = %key, %error, "child machine could not be built");
                            None
                        }
                    }
                })
            }
        })
}

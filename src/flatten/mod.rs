//! Definition-time flattening of nested definitions.
//!
//! [`flatten`] turns a nested [`Definition`] into a [`FlatDefinition`]
//! whose state keys are delimiter-joined paths (`Payment.Authorized`).
//! Composites are not states of the flat machine: naming one as a target
//! enters its initial leaf, and transitions declared on one are kept under
//! the composite's path. A [`FlatMachine`] consults those entries when the
//! current leaf does not handle an event, and emits a `ChildExit` follow-up
//! when it enters a terminal leaf below the root.

mod config;
mod error;
mod machine;

pub use config::{EventCollision, FlattenConfig};
pub use error::FlattenError;
pub use machine::FlatMachine;

use crate::core::EventKey;
use crate::definition::{
    into_errors, join, validate, Chooser, DefTarget, Definition, DefinitionError, LeafDef,
    PathIndex, StateDef,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// A leaf of the flattened machine.
#[derive(Clone, Debug)]
pub struct FlatLeaf {
    pub path: String,
    pub is_final: bool,
    leaf: LeafDef,
}

impl FlatLeaf {
    pub fn data(&self, params: &[Value]) -> Value {
        self.leaf.data(params)
    }
}

/// A compiled transition target.
#[derive(Clone)]
pub enum FlatTarget {
    /// Full path of a leaf.
    Path(String),
    /// Resolved from the event params, relative to `scope`.
    Choose {
        scope: Option<String>,
        choose: Chooser,
    },
}

impl fmt::Debug for FlatTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Choose { scope, .. } => f
                .debug_struct("Choose")
                .field("scope", scope)
                .finish_non_exhaustive(),
        }
    }
}

/// Transitions keyed by source path, then event.
pub type FlatTransitions = BTreeMap<String, BTreeMap<EventKey, FlatTarget>>;

/// A nested definition compiled to a single level.
#[derive(Clone, Debug)]
pub struct FlatDefinition {
    leaves: Vec<FlatLeaf>,
    composites: BTreeMap<String, String>,
    transitions: FlatTransitions,
    initial: String,
    index: PathIndex,
}

impl FlatDefinition {
    /// Leaves in declaration order.
    pub fn leaves(&self) -> &[FlatLeaf] {
        &self.leaves
    }

    pub fn leaf(&self, path: &str) -> Option<&FlatLeaf> {
        self.leaves.iter().find(|leaf| leaf.path == path)
    }

    /// Composite paths.
    pub fn composites(&self) -> impl Iterator<Item = &str> {
        self.composites.keys().map(String::as_str)
    }

    /// Leaf entered when `composite` is targeted.
    pub fn composite_initial(&self, composite: &str) -> Option<&str> {
        self.composites.get(composite).map(String::as_str)
    }

    pub fn transitions(&self) -> &FlatTransitions {
        &self.transitions
    }

    /// Every transition as `(source, event, target)`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &EventKey, &FlatTarget)> {
        self.transitions.iter().flat_map(|(from, events)| {
            events
                .iter()
                .map(move |(event, target)| (from.as_str(), event, target))
        })
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn delimiter(&self) -> &str {
        self.index.delimiter()
    }

    /// Resolve a state name from `scope` the way declared targets are.
    pub fn resolve(&self, scope: Option<&str>, name: &str) -> Option<String> {
        self.index.resolve(scope, name)
    }
}

/// Compile a nested definition into a flat one.
///
/// Every problem of the definition is reported at once as
/// [`FlattenError::Invalid`]; collisions are handled per
/// [`FlattenConfig::event_collision`].
pub fn flatten(definition: &Definition, config: &FlattenConfig) -> Result<FlatDefinition, FlattenError> {
    into_errors(validate(definition, &config.delimiter)).map_err(FlattenError::Invalid)?;

    let index = PathIndex::build(definition, &config.delimiter);
    let mut flat = FlatDefinition {
        leaves: Vec::new(),
        composites: BTreeMap::new(),
        transitions: BTreeMap::new(),
        initial: String::new(),
        index,
    };
    collect(definition, None, &mut flat)?;

    flat.initial = definition
        .initial_key()
        .and_then(|initial| flat.index.resolve(None, initial))
        .ok_or_else(|| {
            FlattenError::Invalid(vec![DefinitionError::MissingInitial {
                scope: "the root".to_string(),
            }])
        })?;

    apply_collision_policy(&mut flat, config)?;

    debug!(
        leaves = flat.leaves.len(),
        composites = flat.composites.len(),
        transitions = flat.transitions.values().map(BTreeMap::len).sum::<usize>(),
        initial = %flat.initial,
        "definition flattened"
    );
    Ok(flat)
}

fn collect(definition: &Definition, scope: Option<&str>, flat: &mut FlatDefinition) -> Result<(), FlattenError> {
    let delimiter = flat.index.delimiter().to_string();

    for (key, state) in definition.states() {
        let path = join(scope, key, &delimiter);
        match state {
            StateDef::Leaf(leaf) => flat.leaves.push(FlatLeaf {
                path,
                is_final: leaf.is_final,
                leaf: leaf.clone(),
            }),
            StateDef::Composite(inner) => {
                if let Some(initial) = flat.index.leaf_of(&path) {
                    flat.composites.insert(path.clone(), initial);
                }
                collect(inner, Some(&path), flat)?;
            }
        }
    }

    for transition in definition.transitions() {
        let from = join(scope, &transition.from, &delimiter);
        let target = match &transition.target {
            DefTarget::Key(target) => {
                let path = flat.index.resolve(scope, target).ok_or_else(|| {
                    FlattenError::Invalid(vec![DefinitionError::UnresolvedTarget {
                        from: from.clone(),
                        event: transition.event.name().to_string(),
                        target: target.clone(),
                    }])
                })?;
                FlatTarget::Path(path)
            }
            DefTarget::Choose(choose) => FlatTarget::Choose {
                scope: scope.map(str::to_string),
                choose: choose.clone(),
            },
        };
        flat.transitions
            .entry(from)
            .or_default()
            .insert(transition.event.clone(), target);
    }
    Ok(())
}

struct Collision {
    composite: String,
    event: EventKey,
    child: String,
}

fn collisions(flat: &FlatDefinition) -> Vec<Collision> {
    let delimiter = flat.delimiter();
    let mut found = Vec::new();

    for composite in flat.composites.keys() {
        let Some(events) = flat.transitions.get(composite) else {
            continue;
        };
        let prefix = format!("{composite}{delimiter}");
        for event in events.keys().filter(|event| !event.is_reserved()) {
            for (child, child_events) in flat.transitions.range(prefix.clone()..) {
                if !child.starts_with(&prefix) {
                    break;
                }
                if child_events.contains_key(event) {
                    found.push(Collision {
                        composite: composite.clone(),
                        event: event.clone(),
                        child: child.clone(),
                    });
                }
            }
        }
    }
    found
}

fn apply_collision_policy(flat: &mut FlatDefinition, config: &FlattenConfig) -> Result<(), FlattenError> {
    let found = collisions(flat);

    match config.event_collision {
        EventCollision::Error => match found.into_iter().next() {
            Some(collision) => Err(FlattenError::EventCollision {
                composite: collision.composite,
                event: collision.event.name().to_string(),
                child: collision.child,
            }),
            None => Ok(()),
        },
        EventCollision::Namespaced => {
            for collision in &found {
                debug!(
                    composite = %collision.composite,
                    event = collision.event.name(),
                    child = %collision.child,
                    "innermost handler kept"
                );
            }
            Ok(())
        }
        EventCollision::AllowShadow => {
            for collision in found {
                debug!(
                    composite = %collision.composite,
                    event = collision.event.name(),
                    child = %collision.child,
                    "handler shadowed by composite"
                );
                if let Some(events) = flat.transitions.get_mut(&collision.child) {
                    events.remove(&collision.event);
                    if events.is_empty() {
                        flat.transitions.remove(&collision.child);
                    }
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout() -> Definition {
        Definition::new()
            .state("Cart")
            .state("Shipping")
            .composite(
                "Payment",
                Definition::new()
                    .state("MethodEntry")
                    .state("Authorizing")
                    .final_state("Authorized")
                    .initial("MethodEntry")
                    .on("MethodEntry", "authorize", "Authorizing")
                    .on("Authorizing", "authSucceeded", "Authorized"),
            )
            .state("Review")
            .initial("Cart")
            .on("Cart", "proceed", "Shipping")
            .on("Shipping", "proceed", "Payment")
            .on_child_exit("Payment", "Review")
    }

    fn target<'a>(flat: &'a FlatDefinition, from: &str, event: EventKey) -> Option<&'a str> {
        match flat.transitions().get(from)?.get(&event)? {
            FlatTarget::Path(path) => Some(path),
            FlatTarget::Choose { .. } => None,
        }
    }

    #[test]
    fn leaves_get_qualified_paths() {
        let flat = flatten(&checkout(), &FlattenConfig::default()).unwrap();
        let paths: Vec<&str> = flat.leaves().iter().map(|leaf| leaf.path.as_str()).collect();

        assert_eq!(
            paths,
            vec![
                "Cart",
                "Shipping",
                "Payment.MethodEntry",
                "Payment.Authorizing",
                "Payment.Authorized",
                "Review"
            ]
        );
        assert!(flat.leaf("Payment.Authorized").unwrap().is_final);
        assert_eq!(flat.initial(), "Cart");
    }

    #[test]
    fn composite_targets_enter_initial_leaf() {
        let flat = flatten(&checkout(), &FlattenConfig::default()).unwrap();

        assert_eq!(
            target(&flat, "Shipping", EventKey::Domain("proceed".to_string())),
            Some("Payment.MethodEntry")
        );
        assert_eq!(flat.composite_initial("Payment"), Some("Payment.MethodEntry"));
    }

    #[test]
    fn composite_transitions_are_keyed_by_composite_path() {
        let flat = flatten(&checkout(), &FlattenConfig::default()).unwrap();

        assert_eq!(target(&flat, "Payment", EventKey::ChildExit), Some("Review"));
        assert_eq!(
            target(
                &flat,
                "Payment.Authorizing",
                EventKey::Domain("authSucceeded".to_string())
            ),
            Some("Payment.Authorized")
        );
    }

    #[test]
    fn invalid_definitions_are_rejected() {
        let result = flatten(&Definition::new().state("A"), &FlattenConfig::default());
        assert!(matches!(result, Err(FlattenError::Invalid(errors)) if errors.len() == 1));
    }

    #[test]
    fn composite_and_child_collide() {
        let definition = Definition::new()
            .state("Idle")
            .composite(
                "Busy",
                Definition::new()
                    .state("Working")
                    .state("Paused")
                    .initial("Working")
                    .on("Working", "stop", "Paused"),
            )
            .initial("Busy")
            .on("Busy", "stop", "Idle");

        let error = flatten(&definition, &FlattenConfig::default()).unwrap_err();
        assert_eq!(
            error,
            FlattenError::EventCollision {
                composite: "Busy".to_string(),
                event: "stop".to_string(),
                child: "Busy.Working".to_string(),
            }
        );

        let shadowed = flatten(
            &definition,
            &FlattenConfig::default().with_collision(EventCollision::AllowShadow),
        )
        .unwrap();
        assert!(shadowed.transitions().get("Busy.Working").is_none());

        let namespaced = flatten(
            &definition,
            &FlattenConfig::default().with_collision(EventCollision::Namespaced),
        )
        .unwrap();
        assert_eq!(
            target(&namespaced, "Busy.Working", EventKey::Domain("stop".to_string())),
            Some("Busy.Paused")
        );
    }

    #[test]
    fn child_exit_never_collides() {
        let definition = Definition::new()
            .composite(
                "Outer",
                Definition::new()
                    .composite(
                        "Inner",
                        Definition::new().final_state("Done").initial("Done"),
                    )
                    .final_state("Finished")
                    .initial("Inner")
                    .on_child_exit("Inner", "Finished"),
            )
            .state("After")
            .initial("Outer")
            .on_child_exit("Outer", "After");

        assert!(flatten(&definition, &FlattenConfig::default()).is_ok());
    }

    #[test]
    fn entries_visit_every_transition() {
        let flat = flatten(&checkout(), &FlattenConfig::default()).unwrap();
        assert_eq!(flat.entries().count(), 5);
    }
}

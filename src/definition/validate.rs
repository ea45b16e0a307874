//! Definition validation.
//!
//! Uses `Validation` to report every problem of a definition at once
//! instead of stopping at the first one.

use super::paths::{join, PathIndex, Unresolved, ESCAPE};
use super::{scope_label, DefTarget, Definition, DefinitionError, StateDef};
use std::collections::HashSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<DefinitionError>>;

/// Check a definition and all nested definitions.
pub fn validate(definition: &Definition, delimiter: &str) -> Check {
    let index = PathIndex::build(definition, delimiter);
    let mut checks: Vec<Check> = Vec::new();
    check_level(definition, None, &index, &mut checks);

    Validation::all_vec(checks).map(|_| ())
}

fn fail(error: DefinitionError) -> Check {
    Validation::fail(error)
}

fn check_level(definition: &Definition, scope: Option<&str>, index: &PathIndex, checks: &mut Vec<Check>) {
    let delimiter = index.delimiter();

    match definition.initial_key() {
        None => checks.push(fail(DefinitionError::MissingInitial {
            scope: scope_label(scope),
        })),
        Some(key) if definition.state_def(key).is_none() => {
            checks.push(fail(DefinitionError::UnknownInitial {
                scope: scope_label(scope),
                key: key.to_string(),
            }))
        }
        Some(_) => checks.push(Validation::success(())),
    }

    let mut seen = HashSet::new();
    for (key, state) in definition.states() {
        if !seen.insert(key) {
            checks.push(fail(DefinitionError::DuplicateState {
                scope: scope_label(scope),
                key: key.to_string(),
            }));
        }
        if key.is_empty() || key.starts_with(ESCAPE) || key.contains(delimiter) {
            checks.push(fail(DefinitionError::InvalidStateName {
                scope: scope_label(scope),
                key: key.to_string(),
            }));
        }
        if let StateDef::Composite(inner) = state {
            let path = join(scope, key, delimiter);
            if inner.states().next().is_none() {
                checks.push(fail(DefinitionError::EmptyComposite { path }));
            } else {
                check_level(inner, Some(&path), index, checks);
            }
        }
    }

    for issue in definition.issues() {
        checks.push(fail(issue.clone()));
    }

    let mut declared = HashSet::new();
    for transition in definition.transitions() {
        let from = join(scope, &transition.from, delimiter);

        if definition.state_def(&transition.from).is_none() {
            checks.push(fail(DefinitionError::UnknownSource {
                scope: scope_label(scope),
                state: transition.from.clone(),
            }));
        }
        if !declared.insert((transition.from.as_str(), &transition.event)) {
            checks.push(fail(DefinitionError::DuplicateTransition {
                state: from.clone(),
                event: transition.event.name().to_string(),
            }));
        }

        if let DefTarget::Key(target) = &transition.target {
            match index.try_resolve(scope, target) {
                Ok(_) => checks.push(Validation::success(())),
                Err(Unresolved::Missing) => checks.push(fail(DefinitionError::UnresolvedTarget {
                    from,
                    event: transition.event.name().to_string(),
                    target: target.clone(),
                })),
                Err(Unresolved::EscapesRoot) => {
                    checks.push(fail(DefinitionError::EscapeBeyondRoot {
                        from,
                        target: target.clone(),
                    }))
                }
            }
        }
    }
}

/// Collect the failures of a validation result into a list.
pub(crate) fn into_errors(validation: Check) -> Result<(), Vec<DefinitionError>> {
    match validation {
        Validation::Success(_) => Ok(()),
        Validation::Failure(errors) => Err(errors.iter().cloned().collect()),
    }
}

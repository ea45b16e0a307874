//! Path arithmetic and target resolution over a nested definition.

use super::{Definition, StateDef};
use std::collections::BTreeMap;

/// Leading marker that moves target resolution one scope up.
pub const ESCAPE: char = '^';

pub(crate) fn join(scope: Option<&str>, key: &str, delimiter: &str) -> String {
    match scope {
        Some(scope) => format!("{scope}{delimiter}{key}"),
        None => key.to_string(),
    }
}

pub(crate) fn parent<'a>(path: &'a str, delimiter: &str) -> Option<&'a str> {
    path.rsplit_once(delimiter).map(|(parent, _)| parent)
}

/// Why a target did not resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Unresolved {
    Missing,
    EscapesRoot,
}

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Leaf,
    Composite { initial: Option<String> },
}

/// Every state of a nested definition, keyed by its full path.
#[derive(Clone, Debug)]
pub struct PathIndex {
    nodes: BTreeMap<String, Node>,
    delimiter: String,
}

impl PathIndex {
    pub fn build(definition: &Definition, delimiter: &str) -> Self {
        let mut index = Self {
            nodes: BTreeMap::new(),
            delimiter: delimiter.to_string(),
        };
        index.insert(definition, None);
        index
    }

    fn insert(&mut self, definition: &Definition, scope: Option<&str>) {
        for (key, state) in definition.states() {
            let path = join(scope, key, &self.delimiter);
            match state {
                StateDef::Leaf(_) => {
                    self.nodes.insert(path, Node::Leaf);
                }
                StateDef::Composite(inner) => {
                    let initial = inner
                        .initial_key()
                        .map(|initial| join(Some(&path), initial, &self.delimiter));
                    self.nodes.insert(path.clone(), Node::Composite { initial });
                    self.insert(inner, Some(&path));
                }
            }
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn is_leaf(&self, path: &str) -> bool {
        matches!(self.nodes.get(path), Some(Node::Leaf))
    }

    /// Resolve `target` as seen from `scope` to a leaf path.
    pub fn resolve(&self, scope: Option<&str>, target: &str) -> Option<String> {
        self.try_resolve(scope, target).ok()
    }

    pub(crate) fn try_resolve(&self, scope: Option<&str>, target: &str) -> Result<String, Unresolved> {
        let path = self.locate(scope, target)?;
        self.leaf_of(&path).ok_or(Unresolved::Missing)
    }

    /// Find the state `target` names, searching `scope` and then each
    /// enclosing scope. Every leading escape marker skips one scope.
    pub(crate) fn locate(&self, scope: Option<&str>, target: &str) -> Result<String, Unresolved> {
        let escapes = target.chars().take_while(|c| *c == ESCAPE).count();
        let name = &target[escapes * ESCAPE.len_utf8()..];

        let mut current = scope.map(str::to_string);
        for _ in 0..escapes {
            current = match current {
                Some(scope) => parent(&scope, &self.delimiter).map(str::to_string),
                None => return Err(Unresolved::EscapesRoot),
            };
        }

        loop {
            let candidate = join(current.as_deref(), name, &self.delimiter);
            if self.nodes.contains_key(&candidate) {
                return Ok(candidate);
            }
            current = match current {
                Some(scope) => parent(&scope, &self.delimiter).map(str::to_string),
                None => return Err(Unresolved::Missing),
            };
        }
    }

    /// Follow composite initial states down to a leaf.
    pub fn leaf_of(&self, path: &str) -> Option<String> {
        let mut current = path.to_string();
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(&current)? {
                Node::Leaf => return Some(current),
                Node::Composite { initial } => current = initial.clone()?,
            }
        }
        None
    }
}

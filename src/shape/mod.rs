//! Structural description of machines for visualization tools.
//!
//! A [`ShapeGraph`] is derived data: flattened machines compute it once from
//! their definition, hierarchies compute it lazily and rebuild it only when
//! the active tree gains or loses a child machine.

use crate::flatten::{FlatDefinition, FlatTarget};
use crate::machine::Subscription;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// One state in a shape graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeNode {
    /// Local key within its parent.
    pub key: String,
    /// Delimiter-joined path from the root.
    pub full_key: String,
    pub is_final: bool,
    /// The node contains child states.
    pub is_compound: bool,
}

/// Nodes, edges and parent relation of a machine, keyed by full key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeGraph {
    pub nodes: BTreeMap<String, ShapeNode>,
    /// Source full key -> event name -> target full key.
    pub edges: BTreeMap<String, BTreeMap<String, String>>,
    /// Full key -> parent full key.
    pub hierarchy: BTreeMap<String, Option<String>>,
}

impl ShapeGraph {
    pub fn node(&self, full_key: &str) -> Option<&ShapeNode> {
        self.nodes.get(full_key)
    }

    /// Direct children of `parent` (`None` for top-level nodes).
    pub fn children(&self, parent: Option<&str>) -> Vec<&str> {
        self.hierarchy
            .iter()
            .filter(|(_, p)| p.as_deref() == parent)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn target(&self, from: &str, event: &str) -> Option<&str> {
        self.edges
            .get(from)
            .and_then(|events| events.get(event))
            .map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn add_node(&mut self, node: ShapeNode, parent: Option<String>) {
        self.hierarchy.insert(node.full_key.clone(), parent);
        self.nodes.insert(node.full_key.clone(), node);
    }

    fn add_edge(&mut self, from: String, event: String, to: String) {
        self.edges.entry(from).or_default().insert(event, to);
    }

    /// Build the graph of a flattened definition.
    pub fn from_flat(definition: &FlatDefinition) -> Self {
        let delimiter = definition.delimiter();
        let mut graph = Self::default();

        for composite in definition.composites() {
            graph.add_node(
                ShapeNode {
                    key: last_segment(composite, delimiter).to_string(),
                    full_key: composite.to_string(),
                    is_final: false,
                    is_compound: true,
                },
                parent_of(composite, delimiter),
            );
        }
        for leaf in definition.leaves() {
            graph.add_node(
                ShapeNode {
                    key: last_segment(&leaf.path, delimiter).to_string(),
                    full_key: leaf.path.clone(),
                    is_final: leaf.is_final,
                    is_compound: false,
                },
                parent_of(&leaf.path, delimiter),
            );
        }
        for (from, event, target) in definition.entries() {
            if let FlatTarget::Path(to) = target {
                graph.add_edge(from.to_string(), event.name().to_string(), to.clone());
            }
        }
        graph
    }

    /// Build the graph of an active chain of machines, root first.
    pub fn from_levels(levels: &[LevelShape], delimiter: &str) -> Self {
        let mut graph = Self::default();
        let mut prefix: Option<String> = None;

        for (depth, level) in levels.iter().enumerate() {
            let holds_child = depth + 1 < levels.len();
            for state in &level.shape.states {
                graph.add_node(
                    ShapeNode {
                        key: state.key.clone(),
                        full_key: join(prefix.as_deref(), &state.key, delimiter),
                        is_final: state.is_final,
                        is_compound: holds_child && state.key == level.active,
                    },
                    prefix.clone(),
                );
            }
            for edge in &level.shape.edges {
                graph.add_edge(
                    join(prefix.as_deref(), &edge.from, delimiter),
                    edge.event.clone(),
                    join(prefix.as_deref(), &edge.to, delimiter),
                );
            }
            prefix = Some(join(prefix.as_deref(), &level.active, delimiter));
        }
        graph
    }
}

/// States and statically known edges of a single machine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineShape {
    pub states: Vec<StateShape>,
    pub edges: Vec<EdgeShape>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateShape {
    pub key: String,
    pub is_final: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeShape {
    pub from: String,
    pub event: String,
    pub to: String,
}

/// One machine of an active chain together with its current state key.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelShape {
    pub shape: MachineShape,
    pub active: String,
}

/// Read-only shape feed consumed by visualization tooling.
pub trait ShapeSource {
    fn shape(&self) -> Rc<ShapeGraph>;

    /// Be told when the shape is rebuilt.
    fn subscribe_shape<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ShapeGraph) + 'static;
}

fn join(prefix: Option<&str>, key: &str, delimiter: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}{delimiter}{key}"),
        None => key.to_string(),
    }
}

fn parent_of(path: &str, delimiter: &str) -> Option<String> {
    path.rsplit_once(delimiter).map(|(parent, _)| parent.to_string())
}

fn last_segment<'a>(path: &'a str, delimiter: &str) -> &'a str {
    path.rsplit_once(delimiter).map_or(path, |(_, last)| last)
}

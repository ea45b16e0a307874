//! Events delivered to machines.
//!
//! Domain events carry a name and positional parameters. The `child.`
//! namespace is reserved for engine signalling and is modelled as dedicated
//! variants rather than magic strings, so routing code matches on them
//! exhaustively.

use super::id::MachineId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Prefix of the reserved event namespace.
pub const RESERVED_PREFIX: &str = "child.";

/// Name under which [`Event::ChildExit`] appears in tables and logs.
pub const CHILD_EXIT: &str = "child.exit";

/// Name under which [`Event::ChildChange`] appears in tables and logs.
pub const CHILD_CHANGE: &str = "child.change";

/// Positional event parameters.
pub type Params = Vec<Value>;

/// Check whether an event name falls into the reserved namespace.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Which child an engine signal refers to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildRef {
    /// A live child machine in a propagated tree.
    Machine(MachineId),
    /// A dot-qualified state inside a flattened machine.
    Path(String),
}

impl fmt::Display for ChildRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Machine(id) => write!(f, "machine:{id}"),
            Self::Path(path) => write!(f, "path:{path}"),
        }
    }
}

/// An event sent to a machine.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Ordinary event declared by a machine author.
    Domain { name: String, params: Params },

    /// A child reached a terminal state.
    ChildExit { child: ChildRef },

    /// Something below the receiving machine changed.
    ChildChange { child: ChildRef, inner: Box<Event> },
}

impl Event {
    pub fn domain(name: impl Into<String>, params: Params) -> Self {
        Self::Domain {
            name: name.into(),
            params,
        }
    }

    pub fn child_exit(child: ChildRef) -> Self {
        Self::ChildExit { child }
    }

    /// The key this event is looked up under in a transition table.
    pub fn key(&self) -> EventKey {
        match self {
            Self::Domain { name, .. } => EventKey::Domain(name.clone()),
            Self::ChildExit { .. } => EventKey::ChildExit,
            Self::ChildChange { .. } => EventKey::ChildChange,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Domain { name, .. } => name,
            Self::ChildExit { .. } => CHILD_EXIT,
            Self::ChildChange { .. } => CHILD_CHANGE,
        }
    }

    /// Positional parameters. A child change exposes the parameters of the
    /// event that caused it.
    pub fn params(&self) -> &[Value] {
        match self {
            Self::Domain { params, .. } => params,
            Self::ChildExit { .. } => &[],
            Self::ChildChange { inner, .. } => inner.params(),
        }
    }

    /// Reserved events are always handled by the machine that receives them.
    pub fn is_reserved(&self) -> bool {
        !matches!(self, Self::Domain { .. })
    }

    /// A domain event whose name falls into the reserved namespace. Such
    /// events are refused everywhere.
    pub fn is_misnamed(&self) -> bool {
        matches!(self, Self::Domain { name, .. } if is_reserved_name(name))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transition table key for an event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKey {
    Domain(String),
    ChildExit,
    ChildChange,
}

impl EventKey {
    /// Map a table name to its key. Reserved names that are not engine
    /// signals are rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            CHILD_EXIT => Some(Self::ChildExit),
            CHILD_CHANGE => Some(Self::ChildChange),
            other if is_reserved_name(other) => None,
            other => Some(Self::Domain(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Domain(name) => name,
            Self::ChildExit => CHILD_EXIT,
            Self::ChildChange => CHILD_CHANGE,
        }
    }

    pub fn is_reserved(&self) -> bool {
        !matches!(self, Self::Domain(_))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn domain_event_exposes_name_and_params() {
        let event = Event::domain("pay", vec![json!(42)]);
        assert_eq!(event.name(), "pay");
        assert_eq!(event.params(), &[json!(42)]);
        assert_eq!(event.key(), EventKey::Domain("pay".to_string()));
        assert!(!event.is_reserved());
    }

    #[test]
    fn reserved_names_on_domain_events_are_misnamed() {
        assert!(Event::domain("child.exit", vec![]).is_misnamed());
        assert!(Event::domain("child.anything", vec![]).is_misnamed());
        assert!(!Event::domain("children", vec![]).is_misnamed());
        assert!(!Event::child_exit(ChildRef::Path("A.B".into())).is_misnamed());
    }

    #[test]
    fn engine_signals_are_reserved() {
        let exit = Event::child_exit(ChildRef::Path("A.B".into()));
        assert!(exit.is_reserved());
        assert_eq!(exit.name(), CHILD_EXIT);
        assert_eq!(exit.key(), EventKey::ChildExit);

        let change = Event::ChildChange {
            child: ChildRef::Machine(MachineId::new()),
            inner: Box::new(Event::domain("tick", vec![json!("x")])),
        };
        assert!(change.is_reserved());
        assert_eq!(change.params(), &[json!("x")]);
    }

    #[test]
    fn from_name_maps_reserved_names() {
        assert_eq!(EventKey::from_name("child.exit"), Some(EventKey::ChildExit));
        assert_eq!(
            EventKey::from_name("child.change"),
            Some(EventKey::ChildChange)
        );
        assert_eq!(EventKey::from_name("child.other"), None);
        assert_eq!(
            EventKey::from_name("go"),
            Some(EventKey::Domain("go".to_string()))
        );
    }

    #[test]
    fn reserved_prefix_detection() {
        assert!(is_reserved_name("child.exit"));
        assert!(is_reserved_name("child.anything"));
        assert!(!is_reserved_name("children"));
    }
}

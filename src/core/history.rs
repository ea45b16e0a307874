//! Changelog records and bounded transition history.

use super::event::Event;
use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Record of one applied transition.
///
/// A new record is allocated for every transition, including self loops, so
/// the `Rc` identity of a machine's latest change serves as its version.
#[derive(Debug)]
pub struct Change<S> {
    /// The event that caused the change
    pub event: Event,
    /// The state being transitioned from
    pub from: Rc<S>,
    /// The state being transitioned to
    pub to: Rc<S>,
    /// When the transition occurred
    pub timestamp: DateTime<Utc>,
    /// Per-machine revision counter after this change
    pub revision: u64,
}

impl<S: State> Change<S> {
    pub fn event_type(&self) -> &str {
        self.event.name()
    }

    pub fn params(&self) -> &[Value] {
        self.event.params()
    }

    /// True when the record only reports a change below this machine.
    pub fn is_child_change(&self) -> bool {
        matches!(self.event, Event::ChildChange { .. })
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            event: self.event.name().to_string(),
            from: self.from.name().to_string(),
            to: self.to.name().to_string(),
            timestamp: self.timestamp,
            revision: self.revision,
        }
    }
}

/// Serializable view of a [`Change`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub event: String,
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub revision: u64,
}

/// Ordered history of recent changes, bounded by `limit`.
///
/// Entries are kept as [`ChangeSummary`] values, so the log never holds
/// states (or the child machines linked from them) alive. Reports of changes
/// below the machine are not recorded. A limit of zero disables recording.
#[derive(Debug, Default)]
pub struct ChangeLog {
    changes: VecDeque<ChangeSummary>,
    limit: usize,
}

impl ChangeLog {
    pub fn new(limit: usize) -> Self {
        Self {
            changes: VecDeque::new(),
            limit,
        }
    }

    /// Record a change, evicting the oldest one when full.
    pub fn record<S: State>(&mut self, change: &Change<S>) {
        if self.limit == 0 || change.is_child_change() {
            return;
        }
        if self.changes.len() == self.limit {
            self.changes.pop_front();
        }
        self.changes.push_back(change.summary());
    }

    /// Keys of the states traversed, oldest first.
    ///
    /// Returns the `from` key of the first retained change followed by the
    /// `to` key of each change.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.changes.front() {
            path.push(first.from.as_str());
        }
        for change in &self.changes {
            path.push(change.to.as_str());
        }
        path
    }

    /// Time between the first and last retained change.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.changes.front(), self.changes.back()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn changes(&self) -> impl Iterator<Item = &ChangeSummary> {
        self.changes.iter()
    }

    pub fn summaries(&self) -> Vec<ChangeSummary> {
        self.changes.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

//! Guard predicates for controlling state transitions.
//!
//! Guards are pure boolean functions evaluated against the event context
//! before a transition target is constructed. A guard that rejects leaves the
//! event unresolved at that level, so an ancestor may still handle it.

use super::state::State;
use super::table::EventContext;
use std::rc::Rc;

/// Pure predicate that determines if a transition can execute.
///
/// # Example
///
/// ```rust
/// use matryoshka::core::{DynState, Event, EventContext, Guard};
/// use serde_json::{json, Value};
/// use std::rc::Rc;
///
/// let positive = Guard::new(|ctx: &EventContext<'_, DynState>| {
///     ctx.params().first().and_then(Value::as_i64).is_some_and(|n| n > 0)
/// });
///
/// let from = Rc::new(DynState::new("Idle", Value::Null));
/// let event = Event::domain("charge", vec![json!(5)]);
/// assert!(positive.check(&EventContext::new(&event, &from)));
/// ```
pub struct Guard<S: State> {
    predicate: Rc<dyn Fn(&EventContext<'_, S>) -> bool>,
}

impl<S: State> Guard<S> {
    /// Create a guard from a pure predicate function.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&EventContext<'_, S>) -> bool + 'static,
    {
        Guard {
            predicate: Rc::new(predicate),
        }
    }

    /// Guard that only looks at the source state.
    pub fn from_state<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> bool + 'static,
    {
        Self::new(move |ctx: &EventContext<'_, S>| predicate(ctx.from()))
    }

    /// Check if the guard allows the transition.
    pub fn check(&self, context: &EventContext<'_, S>) -> bool {
        (self.predicate)(context)
    }
}

impl<S: State> Clone for Guard<S> {
    fn clone(&self) -> Self {
        Self {
            predicate: Rc::clone(&self.predicate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Event;
    use serde_json::json;

    #[derive(Clone, PartialEq, Debug)]
    enum TestState {
        Initial,
        Processing,
        Complete,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Initial => "Initial",
                Self::Processing => "Processing",
                Self::Complete => "Complete",
            }
        }

        fn is_final(&self) -> bool {
            matches!(self, Self::Complete)
        }
    }

    fn check(guard: &Guard<TestState>, from: TestState, event: &Event) -> bool {
        let from = Rc::new(from);
        guard.check(&EventContext::new(event, &from))
    }

    #[test]
    fn guard_allows_matching_states() {
        let guard = Guard::from_state(|s: &TestState| matches!(s, TestState::Initial));
        let event = Event::domain("go", vec![]);

        assert!(check(&guard, TestState::Initial, &event));
        assert!(!check(&guard, TestState::Processing, &event));
    }

    #[test]
    fn guard_checks_non_final_states() {
        let guard = Guard::from_state(|s: &TestState| !s.is_final());
        let event = Event::domain("go", vec![]);

        assert!(check(&guard, TestState::Initial, &event));
        assert!(!check(&guard, TestState::Complete, &event));
    }

    #[test]
    fn guard_sees_event_params() {
        let guard = Guard::new(|ctx: &EventContext<'_, TestState>| {
            ctx.params() == [json!("ok")]
        });

        assert!(check(&guard, TestState::Initial, &Event::domain("go", vec![json!("ok")])));
        assert!(!check(&guard, TestState::Initial, &Event::domain("go", vec![])));
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::from_state(|s: &TestState| !s.is_final());
        let event = Event::domain("go", vec![]);

        let result1 = check(&guard, TestState::Processing, &event);
        let result2 = check(&guard, TestState::Processing, &event);

        assert_eq!(result1, result2);
    }
}

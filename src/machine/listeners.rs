//! Observer lists.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<dyn Fn(&T)>;

struct ListenerSet<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// List of subscribers notified with a shared value.
///
/// Callbacks run after the list borrow is released, so they may subscribe,
/// unsubscribe or trigger further notifications.
pub struct Listeners<T> {
    inner: Rc<RefCell<ListenerSet<T>>>,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListenerSet {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = {
            let mut set = self.inner.borrow_mut();
            let id = set.next_id;
            set.next_id += 1;
            set.entries.push((id, Rc::new(callback)));
            id
        };

        let weak: Weak<RefCell<ListenerSet<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            detach: Box::new(move || {
                if let Some(set) = weak.upgrade() {
                    set.borrow_mut().entries.retain(|(entry, _)| *entry != id);
                }
            }),
        }
    }

    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping it keeps the subscription alive; call
/// [`Subscription::unsubscribe`] to remove it. Unsubscribing twice is a
/// no-op.
pub struct Subscription {
    detach: Box<dyn Fn()>,
}

impl Subscription {
    /// A subscription that never receives anything.
    pub fn inert() -> Self {
        Self {
            detach: Box::new(|| {}),
        }
    }

    pub fn unsubscribe(&self) {
        (self.detach)();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Subscription")
    }
}

#![forbid(unsafe_code)]

//! Ordered listener registry shared by stores and subscription nodes.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. A notification pass iterates a snapshot taken when the pass starts, so
//!    listeners added during the pass are first called on the next pass.
//! 3. A listener removed during a pass is skipped if it has not been reached
//!    yet. Its siblings are neither skipped nor revisited.
//! 4. No borrow of the registry is held while a listener runs, or while a
//!    removed listener is dropped.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Change callback.
pub type Listener = Rc<dyn Fn()>;

/// Handle that removes a registration when run.
///
/// Dropping the handle without running it leaves the registration in place;
/// owners that must not leak hold it and run it on drop (see
/// [`Subscription`](crate::Subscription)).
pub struct Unsubscribe(Option<Box<dyn FnOnce()>>);

impl Unsubscribe {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A handle that does nothing.
    #[must_use]
    pub fn noop() -> Self {
        Self(None)
    }

    pub fn run(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unsubscribe")
            .field(&if self.0.is_some() { "armed" } else { "noop" })
            .finish()
    }
}

struct Entry {
    id: u64,
    callback: Listener,
    live: Rc<Cell<bool>>,
}

#[derive(Default)]
pub(crate) struct ListenerCollection {
    next_id: u64,
    entries: Vec<Entry>,
}

impl ListenerCollection {
    pub(crate) fn add(&mut self, callback: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            callback,
            live: Rc::new(Cell::new(true)),
        });
        id
    }

    /// Remove one entry and hand its callback back, so the caller can drop
    /// it after releasing the registry borrow.
    #[must_use]
    pub(crate) fn remove(&mut self, id: u64) -> Option<Listener> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(idx);
        entry.live.set(false);
        Some(entry.callback)
    }

    /// Remove every entry. Same contract as [`remove`](Self::remove).
    #[must_use]
    pub(crate) fn clear(&mut self) -> Vec<Listener> {
        self.entries
            .drain(..)
            .map(|entry| {
                entry.live.set(false);
                entry.callback
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn snapshot(&self) -> Vec<(Listener, Rc<Cell<bool>>)> {
        self.entries
            .iter()
            .map(|e| (Rc::clone(&e.callback), Rc::clone(&e.live)))
            .collect()
    }
}

/// Register `callback` and return a handle that removes it again.
///
/// The handle holds only a weak reference, so running it after the registry
/// is gone is a no-op.
pub(crate) fn register(
    registry: &Rc<RefCell<ListenerCollection>>,
    callback: Listener,
) -> Unsubscribe {
    let id = registry.borrow_mut().add(callback);
    let weak: Weak<RefCell<ListenerCollection>> = Rc::downgrade(registry);
    Unsubscribe::new(move || {
        if let Some(registry) = weak.upgrade() {
            let removed = registry.borrow_mut().remove(id);
            drop(removed);
        }
    })
}

/// Run one notification pass. Returns how many listeners were invoked.
pub(crate) fn notify(registry: &RefCell<ListenerCollection>) -> usize {
    let snapshot = registry.borrow().snapshot();
    let mut invoked = 0;
    for (callback, live) in snapshot {
        if live.get() {
            callback();
            invoked += 1;
        }
    }
    invoked
}

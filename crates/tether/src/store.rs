#![forbid(unsafe_code)]

//! The store contract and a minimal in-memory reducer store.
//!
//! The store is an external collaborator: the connection core only reads
//! snapshots, forwards actions, and registers change listeners through the
//! [`Store`] trait. [`BasicStore`] is a small synchronous implementation for
//! tests, benches and applications that do not bring their own.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::listeners::{self, Listener, ListenerCollection, Unsubscribe};

/// A single mutable store of application state.
pub trait Store<S, A> {
    /// Current snapshot. Snapshots are immutable; a change replaces the `Rc`.
    fn get_state(&self) -> Rc<S>;

    /// Apply `action` and notify listeners. Returns the action.
    fn dispatch(&self, action: A) -> A;

    /// Register a change listener.
    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

/// Anything a subscription node can register a listener with.
pub trait Subscribable {
    fn subscribe(&self, listener: Listener) -> Unsubscribe;
}

/// Adapts a typed store to the untyped [`Subscribable`] interface.
pub(crate) struct StoreNotifier<S, A>(pub(crate) Rc<dyn Store<S, A>>);

impl<S, A> Subscribable for StoreNotifier<S, A> {
    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.0.subscribe(listener)
    }
}

/// Cloneable dispatch function handed to the dispatch derivation stage.
pub struct Dispatch<A>(Rc<dyn Fn(A) -> A>);

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A: 'static> Dispatch<A> {
    pub fn new(f: impl Fn(A) -> A + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Dispatch into `store`.
    pub fn from_store<S: 'static>(store: Rc<dyn Store<S, A>>) -> Self {
        Self::new(move |action| store.dispatch(action))
    }

    pub fn call(&self, action: A) -> A {
        (self.0)(action)
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatch({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

type Reducer<S, A> = Box<dyn Fn(&S, &A) -> S>;

/// In-memory store driven by a reducer.
///
/// Listeners run synchronously at the end of every dispatch, in registration
/// order. No borrow is held while the reducer or a listener runs, so both may
/// read the store or dispatch again.
pub struct BasicStore<S, A> {
    state: RefCell<Rc<S>>,
    reducer: Reducer<S, A>,
    listeners: Rc<RefCell<ListenerCollection>>,
}

impl<S: 'static, A: 'static> BasicStore<S, A> {
    pub fn new(initial: S, reducer: impl Fn(&S, &A) -> S + 'static) -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(Rc::new(initial)),
            reducer: Box::new(reducer),
            listeners: Rc::new(RefCell::new(ListenerCollection::default())),
        })
    }

    /// Replace the state wholesale and notify listeners.
    pub fn replace_state(&self, state: S) {
        *self.state.borrow_mut() = Rc::new(state);
        self.notify();
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Upcast for APIs taking `Rc<dyn Store<S, A>>`.
    #[must_use]
    pub fn handle(self: &Rc<Self>) -> Rc<dyn Store<S, A>> {
        Rc::clone(self) as Rc<dyn Store<S, A>>
    }

    fn notify(&self) {
        let invoked = listeners::notify(&self.listeners);
        trace!(listeners = invoked, "store notified listeners");
    }
}

impl<S: 'static, A: 'static> Store<S, A> for BasicStore<S, A> {
    fn get_state(&self) -> Rc<S> {
        Rc::clone(&self.state.borrow())
    }

    fn dispatch(&self, action: A) -> A {
        let current = self.get_state();
        let next = (self.reducer)(&current, &action);
        *self.state.borrow_mut() = Rc::new(next);
        self.notify();
        action
    }

    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        listeners::register(&self.listeners, listener)
    }
}

impl<S: fmt::Debug, A> fmt::Debug for BasicStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicStore")
            .field("state", &self.state.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> Rc<BasicStore<i64, i64>> {
        BasicStore::new(0, |s, a| s + a)
    }

    #[test]
    fn dispatch_reduces_and_returns_action() {
        let store = counter();
        assert_eq!(store.dispatch(5), 5);
        assert_eq!(*store.get_state(), 5);
    }

    #[test]
    fn dispatch_replaces_snapshot() {
        let store = counter();
        let before = store.get_state();
        store.dispatch(1);
        assert!(!Rc::ptr_eq(&before, &store.get_state()));
        assert_eq!(*before, 0);
    }

    #[test]
    fn listeners_see_new_state() {
        let store = counter();
        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        let reader = Rc::clone(&store);
        let _unsub = store.subscribe(Rc::new(move || seen_clone.set(*reader.get_state())));

        store.dispatch(3);
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let store = counter();
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let unsub = store.subscribe(Rc::new(move || calls_clone.set(calls_clone.get() + 1)));

        store.dispatch(1);
        unsub.run();
        store.dispatch(1);
        assert_eq!(calls.get(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn listener_may_dispatch_again() {
        let store = counter();
        let inner = Rc::clone(&store);
        let _unsub = store.subscribe(Rc::new(move || {
            if *inner.get_state() < 3 {
                inner.dispatch(1);
            }
        }));
        store.dispatch(1);
        assert_eq!(*store.get_state(), 3);
    }

    #[test]
    fn dispatch_handle_forwards() {
        let store = counter();
        let dispatch = Dispatch::from_store(store.handle());
        assert_eq!(dispatch.call(4), 4);
        assert_eq!(*store.get_state(), 4);
        assert!(dispatch.ptr_eq(&dispatch.clone()));
    }

    #[test]
    fn replace_state_notifies() {
        let store = counter();
        let calls = Rc::new(Cell::new(0u32));
        let calls_clone = Rc::clone(&calls);
        let _unsub = store.subscribe(Rc::new(move || calls_clone.set(calls_clone.get() + 1)));
        store.replace_state(10);
        assert_eq!(calls.get(), 1);
        assert_eq!(*store.get_state(), 10);
    }
}

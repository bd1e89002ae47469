#![forbid(unsafe_code)]

//! Hierarchical subscription nodes.
//!
//! A [`Subscription`] mirrors one connected point of the component tree. Root
//! nodes register with the store; every other node registers with its nearest
//! ancestor node. A store change therefore reaches each node through its
//! parent, and the parent's owner decides when the children hear about it.
//!
//! # Invariants
//!
//! 1. A node has exactly one upstream: the store or a parent node.
//! 2. Upstream registration is lazy: it happens on the first
//!    [`try_subscribe`](Subscription::try_subscribe) or on the first nested
//!    registration, never at construction.
//! 3. Children are notified in registration order, from a snapshot taken at
//!    the start of the pass. A child removed mid-pass is skipped.
//! 4. [`try_unsubscribe`](Subscription::try_unsubscribe) and
//!    [`close`](Subscription::close) are terminal: the node drops its
//!    children, refuses new ones, and never subscribes again.
//! 5. Every operation on a detached node is a no-op.
//! 6. Dropping the last handle to a subscribed node removes its upstream
//!    entry, so registries never hold entries for nodes that are gone.
//!
//! # Failure Modes
//!
//! - **Parent dropped before the child subscribes**: the child stays
//!   unsubscribed and a warning is logged.
//! - **Unsubscribe during the node's own notification pass**: the pass keeps
//!   its snapshot but every remaining child was marked dead by the clear, so
//!   nothing further runs.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::listeners::{self, Listener, ListenerCollection, Unsubscribe};
use crate::store::Subscribable;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_subscription_id() -> u64 {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    /// Never subscribed upstream.
    Idle,
    Subscribed,
    /// Terminal.
    Detached,
}

enum Upstream {
    Store(Rc<dyn Subscribable>),
    Parent(Weak<SubscriptionInner>),
}

struct SubscriptionInner {
    id: u64,
    upstream: Upstream,
    on_change: RefCell<Option<Listener>>,
    children: Rc<RefCell<ListenerCollection>>,
    unsubscribe: RefCell<Option<Unsubscribe>>,
    state: Cell<NodeState>,
}

/// One node of the notification tree. Cloning yields another handle to the
/// same node.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl Subscription {
    /// A node whose upstream is the store itself.
    pub fn root(store: Rc<dyn Subscribable>) -> Self {
        Self::with_upstream(Upstream::Store(store))
    }

    /// A node whose upstream is `parent`.
    pub fn nested(parent: &Subscription) -> Self {
        Self::with_upstream(Upstream::Parent(Rc::downgrade(&parent.inner)))
    }

    fn with_upstream(upstream: Upstream) -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                id: next_subscription_id(),
                upstream,
                on_change: RefCell::new(None),
                children: Rc::new(RefCell::new(ListenerCollection::default())),
                unsubscribe: RefCell::new(None),
                state: Cell::new(NodeState::Idle),
            }),
        }
    }

    /// Process-unique id, used in log fields.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Install the callback run when upstream reports a change.
    ///
    /// Without one the node is a pass-through and forwards straight to its
    /// children.
    pub fn set_on_change(&self, listener: Listener) {
        *self.inner.on_change.borrow_mut() = Some(listener);
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.inner.state.get() == NodeState::Subscribed
    }

    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.inner.state.get() == NodeState::Detached
    }

    /// Number of registered children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Register with upstream if not already registered.
    pub fn try_subscribe(&self) {
        if self.inner.state.get() != NodeState::Idle {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let entry: Listener = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                SubscriptionInner::handle_change(&inner);
            }
        });

        let handle = match &self.inner.upstream {
            Upstream::Store(store) => store.subscribe(entry),
            Upstream::Parent(parent) => match parent.upgrade() {
                Some(parent) => Subscription { inner: parent }.add_nested_sub(entry),
                None => {
                    warn!(subscription = self.inner.id, "parent subscription dropped; not subscribing");
                    return;
                }
            },
        };
        // Registering with a detached parent yields a noop handle and leaves
        // this node unreachable; it still counts as subscribed so teardown
        // stays symmetric.
        *self.inner.unsubscribe.borrow_mut() = Some(handle);
        self.inner.state.set(NodeState::Subscribed);
        debug!(subscription = self.inner.id, "subscribed upstream");
    }

    /// Leave upstream and drop all children. Terminal.
    ///
    /// A node that never subscribed is left untouched.
    pub fn try_unsubscribe(&self) {
        if self.inner.state.get() != NodeState::Subscribed {
            return;
        }
        self.shut_down();
        debug!(subscription = self.inner.id, "unsubscribed");
    }

    /// Make the node terminal whatever its state: leave upstream if
    /// subscribed, drop all children, and refuse every later registration.
    ///
    /// Owners call this on teardown so that a node which never subscribed
    /// cannot be pulled upstream later by a late child.
    pub fn close(&self) {
        match self.inner.state.get() {
            NodeState::Detached => {}
            NodeState::Subscribed => self.try_unsubscribe(),
            NodeState::Idle => {
                self.shut_down();
                debug!(subscription = self.inner.id, "closed before subscribing");
            }
        }
    }

    fn shut_down(&self) {
        self.inner.state.set(NodeState::Detached);
        let handle = self.inner.unsubscribe.borrow_mut().take();
        if let Some(handle) = handle {
            handle.run();
        }
        let children = self.inner.children.borrow_mut().clear();
        drop(children);
        let on_change = self.inner.on_change.borrow_mut().take();
        drop(on_change);
    }

    /// Register a child listener, subscribing this node upstream first.
    ///
    /// Returns a handle that removes the child. A detached node accepts
    /// nothing and returns a noop handle.
    pub fn add_nested_sub(&self, listener: Listener) -> Unsubscribe {
        if self.is_detached() {
            warn!(subscription = self.inner.id, "nested registration on detached subscription ignored");
            return Unsubscribe::noop();
        }
        self.try_subscribe();
        listeners::register(&self.inner.children, listener)
    }

    /// Synchronously notify every child, in registration order.
    pub fn notify_nested_subs(&self) {
        if self.is_detached() {
            return;
        }
        let invoked = listeners::notify(&self.inner.children);
        trace!(subscription = self.inner.id, children = invoked, "notified nested subscriptions");
    }
}

impl SubscriptionInner {
    fn handle_change(inner: &Rc<Self>) {
        if inner.state.get() == NodeState::Detached {
            return;
        }
        let on_change = inner.on_change.borrow().clone();
        match on_change {
            Some(callback) => callback(),
            None => {
                listeners::notify(&inner.children);
            }
        }
    }
}

impl Drop for SubscriptionInner {
    /// A node dropped while subscribed takes its registration with it.
    fn drop(&mut self) {
        if let Some(handle) = self.unsubscribe.get_mut().take() {
            handle.run();
            trace!(subscription = self.id, "dropped while subscribed; upstream entry removed");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state.get())
            .field("children", &self.child_count())
            .finish()
    }
}

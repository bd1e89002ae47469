#![forbid(unsafe_code)]

//! Ambient value passed from a view node to its descendants.
//!
//! The root provides the store. Every connected node that subscribes shadows
//! the subscription slot with its own node, so descendants attach beneath the
//! nearest connected ancestor.

use std::fmt;
use std::rc::Rc;

use crate::store::Store;
use crate::subscription::Subscription;

pub struct TreeContext<S, A> {
    store: Option<Rc<dyn Store<S, A>>>,
    subscription: Option<Subscription>,
}

impl<S, A> Clone for TreeContext<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            subscription: self.subscription.clone(),
        }
    }
}

impl<S, A> Default for TreeContext<S, A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S, A> TreeContext<S, A> {
    /// No store and no subscription.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            store: None,
            subscription: None,
        }
    }

    /// The root context: `store` and no parent subscription.
    #[must_use]
    pub fn provide(store: Rc<dyn Store<S, A>>) -> Self {
        Self {
            store: Some(store),
            subscription: None,
        }
    }

    #[must_use]
    pub fn store(&self) -> Option<&Rc<dyn Store<S, A>>> {
        self.store.as_ref()
    }

    /// Nearest subscribing ancestor, if any.
    #[must_use]
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Same store, `subscription` as the parent for descendants.
    #[must_use]
    pub fn shadowed(&self, subscription: Subscription) -> Self {
        Self {
            store: self.store.clone(),
            subscription: Some(subscription),
        }
    }
}

impl<S, A> fmt::Debug for TreeContext<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeContext")
            .field("has_store", &self.store.is_some())
            .field("subscription", &self.subscription.as_ref().map(Subscription::id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BasicStore, StoreNotifier};

    #[test]
    fn provide_then_shadow_keeps_store() {
        let store = BasicStore::new(0u8, |s: &u8, _: &()| *s);
        let root = TreeContext::provide(store.handle());
        assert!(root.store().is_some());
        assert!(root.subscription().is_none());

        let sub = Subscription::root(Rc::new(StoreNotifier(store.handle())));
        let child = root.shadowed(sub.clone());
        assert!(child.store().is_some_and(|s| Rc::ptr_eq(s, &store.handle())));
        assert_eq!(child.subscription().map(Subscription::id), Some(sub.id()));
        // The parent context is untouched.
        assert!(root.subscription().is_none());
    }

    #[test]
    fn empty_has_nothing() {
        let cx: TreeContext<u8, ()> = TreeContext::empty();
        assert!(cx.store().is_none());
        assert!(cx.subscription().is_none());
    }
}

#![forbid(unsafe_code)]

//! Lifecycle driver for one connected component.
//!
//! A [`Controller`] owns one [`StatefulSelector`] and, when the component
//! reads store state, one [`Subscription`] node. The host view tree drives it
//! through [`attach`](Controller::attach),
//! [`receive_props`](Controller::receive_props),
//! [`render`](Controller::render), [`commit`](Controller::commit) and
//! [`detach`](Controller::detach), and supplies a scheduler callback that the
//! controller invokes to request a visual update.
//!
//! # Phases
//!
//! ```text
//! Unattached ──attach──▶ Attached ◀──commit── Updating
//!      │                    │  └──request_update──▶ │
//!      └──────detach────────┴───────────detach──────┴──▶ Detached
//! ```
//!
//! # Invariants
//!
//! 1. When a store change produces new props, descendants are notified only
//!    after this component's update commits (`pending_notify_after_commit`).
//! 2. When a store change produces no new props, descendants are notified
//!    immediately.
//! 3. `Detached` is terminal. Every entry point checks it first.
//! 4. No `RefCell` borrow is held across the scheduler or a call into
//!    another controller.
//!
//! # Failure Modes
//!
//! - **Notification while the selector is running** (a derivation dispatched
//!   an action): the notification is recorded and replayed once, after the
//!   running pass returns.
//! - **Derivation failure**: captured by the selector and returned from
//!   [`render`](Controller::render) until a later run succeeds.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::context::TreeContext;
use crate::error::{ConnectError, DeriveError, Result};
use crate::options::ConnectOptions;
use crate::props::{Prop, Props};
use crate::selector::{PropsSelector, StatefulSelector};
use crate::stages::ResolvedStages;
use crate::store::{Dispatch, Store, StoreNotifier};
use crate::subscription::Subscription;

/// Callback used to request a visual update from the host.
pub type Scheduler = Rc<dyn Fn()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created and rendered once; not yet attached to the tree.
    Unattached,
    Attached,
    /// A visual update was requested and has not committed yet.
    Updating,
    /// Terminal.
    Detached,
}

/// Everything shared by the instances of one wrapped component.
pub(crate) struct ConnectConfig<S, A> {
    pub(crate) display_name: String,
    pub(crate) stages: ResolvedStages<S, A>,
    pub(crate) options: ConnectOptions<S, A>,
}

impl<S, A> ConnectConfig<S, A> {
    pub(crate) fn new(
        display_name: String,
        stages: ResolvedStages<S, A>,
        options: ConnectOptions<S, A>,
    ) -> Self {
        Self {
            display_name,
            stages,
            options,
        }
    }
}

struct ControllerInner<S, A> {
    config: Rc<ConnectConfig<S, A>>,
    store: Rc<dyn Store<S, A>>,
    /// The store was passed at mount time rather than found in the context.
    props_mode: bool,
    ambient: TreeContext<S, A>,
    subscription: Option<Subscription>,
    selector: RefCell<StatefulSelector<S, A>>,
    own_props: RefCell<Props>,
    phase: Cell<Phase>,
    pending_notify_after_commit: Cell<bool>,
    missed_notification: Cell<bool>,
    render_count: Cell<u64>,
    scheduler: Scheduler,
}

/// Drives one connected component. Cloning yields another handle to the
/// same controller.
pub struct Controller<S, A> {
    inner: Rc<ControllerInner<S, A>>,
}

impl<S, A> Clone for Controller<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: 'static, A: 'static> Controller<S, A> {
    /// Build the controller and run its selector once.
    ///
    /// The store is `explicit_store` when given, otherwise the context's.
    pub(crate) fn new(
        config: Rc<ConnectConfig<S, A>>,
        cx: &TreeContext<S, A>,
        explicit_store: Option<Rc<dyn Store<S, A>>>,
        own_props: Props,
        scheduler: Scheduler,
    ) -> Result<Self> {
        let props_mode = explicit_store.is_some();
        let Some(store) = explicit_store.or_else(|| cx.store().cloned()) else {
            return Err(ConnectError::MissingStore {
                component: config.display_name.clone(),
            });
        };

        let dispatch = Dispatch::from_store(Rc::clone(&store));
        let source = PropsSelector::new(&config.stages, &config.options, dispatch);
        let mut selector = StatefulSelector::new(source);
        selector.run(&store.get_state(), &own_props);

        let subscription = config.stages.handles_state_changes.then(|| {
            match cx.subscription().filter(|_| !props_mode) {
                Some(parent) => Subscription::nested(parent),
                None => Subscription::root(Rc::new(StoreNotifier(Rc::clone(&store)))),
            }
        });

        let inner = Rc::new(ControllerInner {
            config,
            store,
            props_mode,
            ambient: cx.clone(),
            subscription,
            selector: RefCell::new(selector),
            own_props: RefCell::new(own_props),
            phase: Cell::new(Phase::Unattached),
            pending_notify_after_commit: Cell::new(false),
            missed_notification: Cell::new(false),
            render_count: Cell::new(0),
            scheduler,
        });

        if let Some(subscription) = &inner.subscription {
            let weak = Rc::downgrade(&inner);
            subscription.set_on_change(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_state_change();
                }
            }));
        }

        debug!(
            component = %inner.config.display_name,
            subscription = inner.subscription.as_ref().map(Subscription::id),
            props_mode,
            "controller created"
        );
        Ok(Self { inner })
    }
}

impl<S, A> Controller<S, A> {
    /// The component is now part of the tree: subscribe and catch up on any
    /// change that happened since the initial run.
    pub fn attach(&self) {
        let inner = &self.inner;
        if inner.phase.get() != Phase::Unattached {
            return;
        }
        inner.phase.set(Phase::Attached);
        debug!(component = %inner.config.display_name, "attached");

        let Some(subscription) = &inner.subscription else {
            return;
        };
        subscription.try_subscribe();
        if inner.run_selector() && inner.should_update() {
            inner.request_update();
        }
        inner.drain_missed();
    }

    /// New own props from the parent.
    ///
    /// Re-runs the selector; the host reads [`should_update`](Self::should_update)
    /// to decide whether to re-render.
    pub fn receive_props(&self, own_props: Props) {
        let inner = &self.inner;
        if inner.phase.get() == Phase::Detached {
            return;
        }
        *inner.own_props.borrow_mut() = own_props;
        inner.run_selector();
        inner.drain_missed();
    }

    #[must_use]
    pub fn should_update(&self) -> bool {
        self.inner.phase.get() != Phase::Detached && self.inner.should_update()
    }

    /// Props to render, or the error captured by the last run.
    pub fn render(&self) -> std::result::Result<Props, DeriveError> {
        let inner = &self.inner;
        let props = {
            let Ok(selector) = inner.selector.try_borrow() else {
                return Err(DeriveError::new(format!(
                    "{} rendered while its selector was running",
                    inner.config.display_name
                )));
            };
            if let Some(err) = selector.error() {
                return Err(err.clone());
            }
            selector.props().cloned().unwrap_or_default()
        };

        let index = inner.render_count.get();
        inner.render_count.set(index + 1);
        trace!(component = %inner.config.display_name, render = index, "render");
        match inner.config.options.render_count_prop() {
            Some(key) => Ok(props.with(key, Prop::value(index))),
            None => Ok(props),
        }
    }

    /// The host committed a render of this component.
    ///
    /// Clears the update flag and, if a store change was held back for this
    /// commit, notifies descendants.
    pub fn commit(&self) {
        let inner = &self.inner;
        if inner.phase.get() == Phase::Detached {
            return;
        }
        if let Ok(mut selector) = inner.selector.try_borrow_mut() {
            selector.consume_update();
        }
        if inner.phase.get() == Phase::Updating {
            inner.phase.set(Phase::Attached);
        }
        if inner.pending_notify_after_commit.replace(false) {
            if let Some(subscription) = &inner.subscription {
                subscription.notify_nested_subs();
            }
        }
    }

    /// Leave the tree. Safe to call during a notification pass; idempotent.
    pub fn detach(&self) {
        let inner = &self.inner;
        if inner.phase.get() == Phase::Detached {
            return;
        }
        inner.phase.set(Phase::Detached);
        // Closing also covers a node that never subscribed, so a child
        // mounted later through an old child context cannot pull it upstream.
        if let Some(subscription) = &inner.subscription {
            subscription.close();
        }
        // A running selector freezes itself when its pass returns.
        if let Ok(mut selector) = inner.selector.try_borrow_mut() {
            selector.freeze();
        }
        inner.pending_notify_after_commit.set(false);
        inner.missed_notification.set(false);
        debug!(component = %inner.config.display_name, "detached");
    }

    /// Context for this component's children: the ambient context with this
    /// controller's subscription as the nearest ancestor.
    ///
    /// A controller given an explicit store passes the ambient context
    /// through unchanged, so its subtree stays ordered by the ambient tree.
    #[must_use]
    pub fn child_context(&self) -> TreeContext<S, A> {
        let inner = &self.inner;
        match &inner.subscription {
            Some(subscription) if !inner.props_mode => inner.ambient.shadowed(subscription.clone()),
            _ => inner.ambient.clone(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.inner.config.display_name
    }

    #[must_use]
    pub fn subscription(&self) -> Option<&Subscription> {
        self.inner.subscription.as_ref()
    }

    #[must_use]
    pub fn handles_state_changes(&self) -> bool {
        self.inner.subscription.is_some()
    }

    #[must_use]
    pub fn store(&self) -> &Rc<dyn Store<S, A>> {
        &self.inner.store
    }

    #[must_use]
    pub fn own_props(&self) -> Props {
        self.inner.own_props.borrow().clone()
    }

    /// Props from the last successful run.
    #[must_use]
    pub fn last_props(&self) -> Option<Props> {
        self.inner
            .selector
            .try_borrow()
            .ok()
            .and_then(|s| s.props().cloned())
    }

    #[must_use]
    pub fn last_error(&self) -> Option<DeriveError> {
        self.inner
            .selector
            .try_borrow()
            .ok()
            .and_then(|s| s.error().cloned())
    }

    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.inner.render_count.get()
    }

    /// Number of selector runs so far.
    #[must_use]
    pub fn selector_runs(&self) -> u64 {
        self.inner.selector.try_borrow().map_or(0, |s| s.runs())
    }

    #[must_use]
    pub fn pending_notify_after_commit(&self) -> bool {
        self.inner.pending_notify_after_commit.get()
    }
}

impl<S, A> ControllerInner<S, A> {
    /// Returns false when the run was skipped.
    fn run_selector(&self) -> bool {
        if self.phase.get() == Phase::Detached {
            return false;
        }
        let state = self.store.get_state();
        let own = self.own_props.borrow().clone();
        let Ok(mut selector) = self.selector.try_borrow_mut() else {
            self.missed_notification.set(true);
            trace!(component = %self.config.display_name, "selector busy; run deferred");
            return false;
        };
        selector.run(&state, &own);
        if self.phase.get() == Phase::Detached {
            selector.freeze();
            return false;
        }
        true
    }

    fn should_update(&self) -> bool {
        self.selector.try_borrow().is_ok_and(|s| s.should_update())
    }

    fn handle_state_change(&self) {
        if self.phase.get() == Phase::Detached {
            return;
        }
        trace!(component = %self.config.display_name, "store change received");
        if self.run_selector() {
            self.forward_or_schedule();
        }
        self.drain_missed();
    }

    fn forward_or_schedule(&self) {
        if self.should_update() {
            self.pending_notify_after_commit.set(true);
            self.request_update();
        } else if let Some(subscription) = &self.subscription {
            subscription.notify_nested_subs();
        }
    }

    /// Replay a notification that arrived while the selector was running.
    ///
    /// A no-op while the selector is still borrowed: the frame that owns the
    /// running pass drains after it returns.
    fn drain_missed(&self) {
        while self.missed_notification.get() && self.selector.try_borrow().is_ok() {
            self.missed_notification.set(false);
            if self.run_selector() {
                self.forward_or_schedule();
            }
        }
    }

    fn request_update(&self) {
        match self.phase.get() {
            Phase::Attached | Phase::Updating => self.phase.set(Phase::Updating),
            Phase::Unattached | Phase::Detached => {
                trace!(component = %self.config.display_name, "update deferred until attach");
                return;
            }
        }
        trace!(component = %self.config.display_name, "update requested");
        let scheduler = Rc::clone(&self.scheduler);
        scheduler();
    }
}

impl<S, A> fmt::Debug for Controller<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("component", &self.inner.config.display_name)
            .field("phase", &self.inner.phase.get())
            .field("subscription", &self.inner.subscription)
            .field("render_count", &self.inner.render_count.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::{MapState, StageInput};
    use crate::store::BasicStore;
    use serde_json::json;
    use std::rc::Weak;

    type In = StageInput<i64, i64>;

    fn counter_store() -> Rc<BasicStore<i64, i64>> {
        BasicStore::new(0, |s, a| s + a)
    }

    fn count_props() -> MapState<i64> {
        MapState::new(|s: &i64| Props::builder().value("count", *s).build())
    }

    fn config(map_state: In, options: ConnectOptions<i64, i64>) -> Rc<ConnectConfig<i64, i64>> {
        let stages = options
            .factories()
            .resolve(&map_state, &In::Absent, &In::Absent, "Connect(Test)")
            .expect("stages resolve");
        Rc::new(ConnectConfig::new("Connect(Test)".into(), stages, options))
    }

    fn recorder() -> (Scheduler, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let sink = Rc::clone(&calls);
        (Rc::new(move || sink.set(sink.get() + 1)), calls)
    }

    /// Create, render, commit and attach, as a host does on mount.
    fn mounted(
        store: &Rc<BasicStore<i64, i64>>,
        map_state: In,
        options: ConnectOptions<i64, i64>,
    ) -> (Controller<i64, i64>, Rc<Cell<u32>>) {
        let (scheduler, calls) = recorder();
        let controller = Controller::new(
            config(map_state, options),
            &TreeContext::provide(store.handle()),
            None,
            Props::new(),
            scheduler,
        )
        .expect("store in context");
        controller.render().expect("initial render");
        controller.commit();
        controller.attach();
        (controller, calls)
    }

    fn count_of(props: &Props) -> Option<i64> {
        props.value("count").and_then(serde_json::Value::as_i64)
    }

    #[test]
    fn missing_store_is_a_setup_error() {
        let (scheduler, _) = recorder();
        let err = Controller::new(
            config(count_props().into(), ConnectOptions::default()),
            &TreeContext::empty(),
            None,
            Props::new(),
            scheduler,
        )
        .err()
        .expect("no store anywhere");
        assert_eq!(
            err,
            ConnectError::MissingStore {
                component: "Connect(Test)".into()
            }
        );
    }

    #[test]
    fn without_map_state_never_subscribes() {
        let store = counter_store();
        let (controller, calls) = mounted(&store, In::Absent, ConnectOptions::default());
        assert!(!controller.handles_state_changes());
        assert_eq!(store.listener_count(), 0);
        store.dispatch(1);
        assert_eq!(calls.get(), 0);
        assert_eq!(controller.selector_runs(), 1);
    }

    #[test]
    fn attach_subscribes_and_detach_unsubscribes() {
        let store = counter_store();
        let (controller, _) = mounted(&store, count_props().into(), ConnectOptions::default());
        assert_eq!(controller.phase(), Phase::Attached);
        assert_eq!(store.listener_count(), 1);
        assert!(controller.subscription().is_some_and(Subscription::is_subscribed));

        controller.detach();
        controller.detach();
        assert_eq!(controller.phase(), Phase::Detached);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn change_defers_child_notification_until_commit() {
        let store = counter_store();
        let (controller, calls) = mounted(&store, count_props().into(), ConnectOptions::default());
        let child_hits = Rc::new(Cell::new(0));
        let hits = Rc::clone(&child_hits);
        let _child = controller
            .subscription()
            .expect("subscribes")
            .add_nested_sub(Rc::new(move || hits.set(hits.get() + 1)));

        store.dispatch(1);
        assert_eq!(calls.get(), 1);
        assert_eq!(controller.phase(), Phase::Updating);
        assert!(controller.pending_notify_after_commit());
        assert!(controller.should_update());
        assert_eq!(child_hits.get(), 0);

        let props = controller.render().expect("render");
        assert_eq!(count_of(&props), Some(1));
        controller.commit();
        assert_eq!(child_hits.get(), 1);
        assert_eq!(controller.phase(), Phase::Attached);
        assert!(!controller.pending_notify_after_commit());
        assert!(!controller.should_update());
    }

    #[test]
    fn no_change_forwards_immediately() {
        let store = counter_store();
        let fixed = Props::builder().value("static", true).build();
        let map = MapState::new(move |_: &i64| fixed.clone());
        let (controller, calls) = mounted(&store, map.into(), ConnectOptions::default());
        let child_hits = Rc::new(Cell::new(0));
        let hits = Rc::clone(&child_hits);
        let _child = controller
            .subscription()
            .expect("subscribes")
            .add_nested_sub(Rc::new(move || hits.set(hits.get() + 1)));

        store.dispatch(5);
        assert_eq!(calls.get(), 0);
        assert_eq!(child_hits.get(), 1);
        assert_eq!(controller.phase(), Phase::Attached);
    }

    #[test]
    fn change_before_attach_forces_update_on_attach() {
        let store = counter_store();
        let (scheduler, calls) = recorder();
        let controller = Controller::new(
            config(count_props().into(), ConnectOptions::default()),
            &TreeContext::provide(store.handle()),
            None,
            Props::new(),
            scheduler,
        )
        .expect("store in context");
        controller.render().expect("initial render");
        controller.commit();

        store.dispatch(2);
        assert_eq!(calls.get(), 0);
        controller.attach();
        assert_eq!(calls.get(), 1);
        assert_eq!(controller.last_props().as_ref().and_then(count_of), Some(2));
    }

    #[test]
    fn detached_controller_is_inert() {
        let store = counter_store();
        let (controller, calls) = mounted(&store, count_props().into(), ConnectOptions::default());
        let sub = controller.subscription().cloned().expect("subscribes");
        controller.detach();

        store.dispatch(1);
        controller.receive_props(Props::builder().value("x", 1).build());
        controller.attach();
        controller.commit();
        assert_eq!(calls.get(), 0);
        assert!(!controller.should_update());
        assert!(sub.is_detached());
        assert_eq!(controller.last_props().as_ref().and_then(count_of), Some(0));
    }

    #[test]
    fn detach_before_attach_closes_the_subscription() {
        let store = counter_store();
        let (scheduler, parent_calls) = recorder();
        let parent = Controller::new(
            config(count_props().into(), ConnectOptions::default()),
            &TreeContext::provide(store.handle()),
            None,
            Props::new(),
            scheduler,
        )
        .expect("store in context");
        let cx = parent.child_context();
        let parent_sub = parent.subscription().cloned().expect("subscribes");
        assert!(!parent_sub.is_subscribed());
        parent.detach();
        assert!(parent_sub.is_detached());

        // A child mounted later under the stale context must not pull the
        // detached parent's node up to the store.
        let (scheduler, child_calls) = recorder();
        let child = Controller::new(
            config(count_props().into(), ConnectOptions::default()),
            &cx,
            None,
            Props::new(),
            scheduler,
        )
        .expect("store in context");
        child.render().expect("initial render");
        child.commit();
        child.attach();
        store.dispatch(1);

        assert!(parent_sub.is_detached());
        assert!(!parent_sub.is_subscribed());
        assert_eq!(parent_sub.child_count(), 0);
        assert_eq!(store.listener_count(), 0);
        assert_eq!(parent_calls.get(), 0);
        assert_eq!(child_calls.get(), 0);
        assert_eq!(parent.phase(), Phase::Detached);
    }

    #[test]
    fn dropped_controller_leaves_no_store_entry() {
        let store = counter_store();
        for _ in 0..10 {
            let (controller, _) = mounted(&store, count_props().into(), ConnectOptions::default());
            assert!(controller.subscription().is_some_and(Subscription::is_subscribed));
            drop(controller);
        }
        store.dispatch(1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn render_surfaces_error_until_recovery() {
        let store = counter_store();
        let map = MapState::try_new(|s: &i64| {
            if *s < 0 {
                Err(DeriveError::new("negative count"))
            } else {
                Ok(Props::builder().value("count", *s).build())
            }
        });
        let (controller, _) = mounted(&store, map.into(), ConnectOptions::default());

        store.dispatch(-3);
        assert_eq!(
            controller.render().err().map(|e| e.message().to_string()),
            Some("negative count".into())
        );
        assert!(controller.last_error().is_some());
        controller.commit();
        // Still failing: no auto-recovery.
        assert!(controller.render().is_err());

        store.dispatch(10);
        let props = controller.render().expect("recovered");
        assert_eq!(count_of(&props), Some(7));
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn render_count_prop_is_zero_based() {
        let store = counter_store();
        let options = ConnectOptions::default().with_render_count_prop("renders");
        let (controller, _) = mounted(&store, count_props().into(), options);
        let second = controller.render().expect("render");
        assert_eq!(second.value("renders"), Some(&json!(1)));
        assert_eq!(controller.render_count(), 2);
    }

    #[test]
    fn receive_props_reruns_with_new_own_props() {
        let store = counter_store();
        let map = MapState::with_own_props(|s: &i64, own: &Props| {
            let step = own.value("step").and_then(serde_json::Value::as_i64).unwrap_or(1);
            Props::builder().value("count", s * step).build()
        });
        store.dispatch(3);
        let (controller, _) = mounted(&store, map.into(), ConnectOptions::default());
        controller.receive_props(Props::builder().value("step", 4).build());
        assert!(controller.should_update());
        assert_eq!(controller.last_props().as_ref().and_then(count_of), Some(12));
        assert_eq!(controller.own_props().value("step"), Some(&json!(4)));
    }

    #[test]
    fn child_context_shadows_with_own_subscription() {
        let store = counter_store();
        let (parent, _) = mounted(&store, count_props().into(), ConnectOptions::default());
        let cx = parent.child_context();
        let parent_sub = parent.subscription().expect("subscribes");
        assert_eq!(cx.subscription().map(Subscription::id), Some(parent_sub.id()));

        let (scheduler, _) = recorder();
        let child = Controller::new(
            config(count_props().into(), ConnectOptions::default()),
            &cx,
            None,
            Props::new(),
            scheduler,
        )
        .expect("store via context");
        child.attach();
        // Nested under the parent, not directly on the store.
        assert_eq!(store.listener_count(), 1);
        assert_eq!(parent_sub.child_count(), 1);
    }

    #[test]
    fn explicit_store_subscribes_directly_and_passes_context_through() {
        let ambient_store = counter_store();
        let (parent, _) = mounted(&ambient_store, count_props().into(), ConnectOptions::default());
        let cx = parent.child_context();

        let own_store = counter_store();
        let (scheduler, _) = recorder();
        let child = Controller::new(
            config(count_props().into(), ConnectOptions::default()),
            &cx,
            Some(own_store.handle()),
            Props::new(),
            scheduler,
        )
        .expect("explicit store");
        child.attach();
        assert_eq!(own_store.listener_count(), 1);
        assert_eq!(parent.subscription().map(Subscription::child_count), Some(0));
        assert_eq!(
            child.child_context().subscription().map(Subscription::id),
            parent.subscription().map(Subscription::id)
        );
        assert!(Rc::ptr_eq(child.store(), &own_store.handle()));
    }

    #[test]
    fn dispatch_from_derivation_is_replayed_once() {
        let store = counter_store();
        let weak: Weak<BasicStore<i64, i64>> = Rc::downgrade(&store);
        let map = MapState::new(move |s: &i64| {
            if *s == 1 {
                if let Some(store) = weak.upgrade() {
                    store.dispatch(1);
                }
            }
            Props::builder().value("count", *s).build()
        });
        let (controller, calls) = mounted(&store, map.into(), ConnectOptions::default());
        assert_eq!(controller.selector_runs(), 2);

        store.dispatch(1);
        assert_eq!(controller.selector_runs(), 4);
        assert_eq!(controller.last_props().as_ref().and_then(count_of), Some(2));
        assert!(calls.get() >= 1);
    }
}

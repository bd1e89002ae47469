#![forbid(unsafe_code)]

//! A synchronous view-tree host.
//!
//! [`ViewTree`] plays the part of a UI runtime: it mounts connected nodes
//! parent-first, attaches them child-first, renders and commits immediately
//! whenever a controller asks for an update, and hands each child the props
//! its parent derives for it. Every host action is appended to an
//! [`EventLog`] so tests can assert on ordering.
//!
//! # Host rules
//!
//! 1. Mount: create the controller, render, mount children, commit, attach.
//! 2. Update request: render, pass new child props to children whose own
//!    props changed (shallow), re-render those that want it, then commit.
//! 3. Unmount: detach top-down, then drop the subtree.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tether::{
    Component, ConnectedComponent, ConnectedInstance, Connector, Controller, Props, Result,
    Scheduler, Store, TreeContext, shallow_equal,
};
use tracing::debug;

/// One host action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    Render(String),
    RenderFailed { label: String, message: String },
    Commit(String),
    Attach(String),
    Detach(String),
    /// Free-form marker pushed by test code, e.g. from a derivation.
    Note(String),
}

impl TreeEvent {
    #[must_use]
    pub fn render(label: &str) -> Self {
        Self::Render(label.to_string())
    }

    #[must_use]
    pub fn commit(label: &str) -> Self {
        Self::Commit(label.to_string())
    }

    #[must_use]
    pub fn note(text: &str) -> Self {
        Self::Note(text.to_string())
    }
}

/// Shared, append-only record of [`TreeEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<TreeEvent>>>);

impl EventLog {
    pub fn push(&self, event: TreeEvent) {
        self.0.borrow_mut().push(event);
    }

    pub fn note(&self, text: impl Into<String>) {
        self.push(TreeEvent::Note(text.into()));
    }

    #[must_use]
    pub fn events(&self) -> Vec<TreeEvent> {
        self.0.borrow().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<TreeEvent> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Index of the first occurrence of `event`.
    #[must_use]
    pub fn position(&self, event: &TreeEvent) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == event)
    }

    #[must_use]
    pub fn count(&self, event: &TreeEvent) -> usize {
        self.0.borrow().iter().filter(|e| *e == event).count()
    }
}

/// The component every harness node wraps: renders its props unchanged.
#[derive(Debug, Clone)]
pub struct Probe {
    name: String,
}

impl Probe {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Component for Probe {
    type Output = Props;

    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, props: &Props) -> Props {
        props.clone()
    }
}

type ChildPropsFn = Rc<dyn Fn(&Props) -> Props>;

/// Description of a node and its subtree, consumed by [`ViewTree::mount`].
pub struct NodeSpec<S, A> {
    label: String,
    component: ConnectedComponent<Probe, S, A>,
    child_props: ChildPropsFn,
    store: Option<Rc<dyn Store<S, A>>>,
    children: Vec<NodeSpec<S, A>>,
}

impl<S: 'static, A: 'static> NodeSpec<S, A> {
    /// Wrap a [`Probe`] named `label` with `connector`.
    ///
    /// # Errors
    ///
    /// Whatever [`Connector::wrap`] reports.
    pub fn connect(label: &str, connector: &Connector<S, A>) -> Result<Self> {
        Ok(Self {
            label: label.to_string(),
            component: connector.wrap(Probe::new(label))?,
            child_props: Rc::new(|_| Props::new()),
            store: None,
            children: Vec::new(),
        })
    }

    #[must_use]
    pub fn child(mut self, child: NodeSpec<S, A>) -> Self {
        self.children.push(child);
        self
    }

    /// Own props this node hands its children, derived from what it
    /// rendered. Defaults to empty props.
    #[must_use]
    pub fn child_props(mut self, f: impl Fn(&Props) -> Props + 'static) -> Self {
        self.child_props = Rc::new(f);
        self
    }

    /// Mount with an explicit store instead of the context's.
    #[must_use]
    pub fn store(mut self, store: Rc<dyn Store<S, A>>) -> Self {
        self.store = Some(store);
        self
    }
}

/// A mounted node.
pub struct ViewNode<S, A> {
    label: String,
    instance: ConnectedInstance<Probe, S, A>,
    child_props: ChildPropsFn,
    children: RefCell<Vec<Rc<ViewNode<S, A>>>>,
    rendered: RefCell<Option<Props>>,
    passed_down: RefCell<Option<Props>>,
    log: EventLog,
}

impl<S, A> ViewNode<S, A> {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn controller(&self) -> &Controller<S, A> {
        self.instance.controller()
    }

    /// Output of the last successful render.
    #[must_use]
    pub fn rendered(&self) -> Option<Props> {
        self.rendered.borrow().clone()
    }

    #[must_use]
    pub fn children(&self) -> Vec<Rc<ViewNode<S, A>>> {
        self.children.borrow().clone()
    }

    fn render_self(&self) -> Props {
        self.log.push(TreeEvent::Render(self.label.clone()));
        match self.instance.render() {
            Ok(props) => {
                *self.rendered.borrow_mut() = Some(props.clone());
                props
            }
            Err(err) => {
                self.log.push(TreeEvent::RenderFailed {
                    label: self.label.clone(),
                    message: err.message().to_string(),
                });
                self.rendered.borrow().clone().unwrap_or_default()
            }
        }
    }

    fn commit(&self) {
        self.log.push(TreeEvent::Commit(self.label.clone()));
        self.controller().commit();
    }

    /// Render, push props down, commit.
    fn rerender(&self) {
        let props = self.render_self();
        let next = (self.child_props)(&props);
        let changed = self
            .passed_down
            .borrow()
            .as_ref()
            .is_none_or(|prev| !shallow_equal(prev, &next));
        if changed {
            *self.passed_down.borrow_mut() = Some(next.clone());
            for child in self.children() {
                child.receive(next.clone());
            }
        }
        self.commit();
    }

    fn receive(&self, own_props: Props) {
        self.controller().receive_props(own_props);
        if self.controller().should_update() {
            self.rerender();
        }
    }

    fn detach_subtree(&self) {
        self.log.push(TreeEvent::Detach(self.label.clone()));
        self.controller().detach();
        for child in self.children() {
            child.detach_subtree();
        }
    }

    fn find(self: &Rc<Self>, label: &str) -> Option<Rc<Self>> {
        if self.label == label {
            return Some(Rc::clone(self));
        }
        self.children().iter().find_map(|c| c.find(label))
    }

    /// Detach and drop the child labelled `label` anywhere below this node.
    fn remove_descendant(&self, label: &str) -> bool {
        let position = self.children.borrow().iter().position(|c| c.label == label);
        if let Some(idx) = position {
            let child = self.children.borrow_mut().remove(idx);
            child.detach_subtree();
            return true;
        }
        self.children().iter().any(|c| c.remove_descendant(label))
    }
}

impl<S, A> fmt::Debug for ViewNode<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewNode")
            .field("label", &self.label)
            .field("controller", self.controller())
            .field("children", &self.children.borrow().len())
            .finish()
    }
}

/// Host for a forest of connected nodes sharing one root context.
pub struct ViewTree<S, A> {
    cx: TreeContext<S, A>,
    roots: RefCell<Vec<Rc<ViewNode<S, A>>>>,
    log: EventLog,
}

impl<S: 'static, A: 'static> ViewTree<S, A> {
    /// A tree whose root context provides `store`.
    #[must_use]
    pub fn new(store: Rc<dyn Store<S, A>>) -> Self {
        Self::with_context(TreeContext::provide(store))
    }

    #[must_use]
    pub fn with_context(cx: TreeContext<S, A>) -> Self {
        Self {
            cx,
            roots: RefCell::new(Vec::new()),
            log: EventLog::default(),
        }
    }

    #[must_use]
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Mount `spec` as a new root with `own_props`.
    ///
    /// # Errors
    ///
    /// The first setup error raised by any node. Every node of the failed
    /// subtree that was already mounted is detached before returning.
    pub fn mount(&self, spec: NodeSpec<S, A>, own_props: Props) -> Result<Rc<ViewNode<S, A>>> {
        let node = mount_node(spec, &self.cx, own_props, &self.log)?;
        self.roots.borrow_mut().push(Rc::clone(&node));
        Ok(node)
    }

    #[must_use]
    pub fn node(&self, label: &str) -> Option<Rc<ViewNode<S, A>>> {
        let roots = self.roots.borrow().clone();
        roots.iter().find_map(|r| r.find(label))
    }

    /// Detach the node labelled `label` and its subtree. Returns whether a
    /// node was found.
    pub fn unmount(&self, label: &str) -> bool {
        let position = self.roots.borrow().iter().position(|r| r.label == label);
        if let Some(idx) = position {
            let root = self.roots.borrow_mut().remove(idx);
            root.detach_subtree();
            debug!(node = label, "unmounted root");
            return true;
        }
        let roots = self.roots.borrow().clone();
        let found = roots.iter().any(|r| r.remove_descendant(label));
        if found {
            debug!(node = label, "unmounted");
        }
        found
    }

    pub fn unmount_all(&self) {
        let roots = std::mem::take(&mut *self.roots.borrow_mut());
        for root in roots {
            root.detach_subtree();
        }
    }
}

impl<S, A> fmt::Debug for ViewTree<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTree")
            .field("roots", &self.roots.borrow().len())
            .field("events", &self.log.0.borrow().len())
            .finish()
    }
}

fn mount_node<S: 'static, A: 'static>(
    spec: NodeSpec<S, A>,
    cx: &TreeContext<S, A>,
    own_props: Props,
    log: &EventLog,
) -> Result<Rc<ViewNode<S, A>>> {
    let NodeSpec {
        label,
        component,
        child_props,
        store,
        children,
    } = spec;

    let slot: Rc<RefCell<Weak<ViewNode<S, A>>>> = Rc::new(RefCell::new(Weak::new()));
    let scheduler: Scheduler = {
        let slot = Rc::clone(&slot);
        Rc::new(move || {
            let node = slot.borrow().upgrade();
            if let Some(node) = node {
                node.rerender();
            }
        })
    };

    let instance = match store {
        Some(store) => component.mount_with_store(store, cx, own_props, scheduler)?,
        None => component.mount(cx, own_props, scheduler)?,
    };
    let node = Rc::new(ViewNode {
        label,
        instance,
        child_props,
        children: RefCell::new(Vec::new()),
        rendered: RefCell::new(None),
        passed_down: RefCell::new(None),
        log: log.clone(),
    });
    *slot.borrow_mut() = Rc::downgrade(&node);
    debug!(node = %node.label, "mounting");

    let props = node.render_self();
    let for_children = (node.child_props)(&props);
    *node.passed_down.borrow_mut() = Some(for_children.clone());
    let child_cx = node.instance.child_context();
    for child in children {
        match mount_node(child, &child_cx, for_children.clone(), log) {
            Ok(mounted) => node.children.borrow_mut().push(mounted),
            Err(err) => {
                // Children already attached must not stay subscribed.
                node.detach_subtree();
                return Err(err);
            }
        }
    }

    node.commit();
    node.log.push(TreeEvent::Attach(node.label.clone()));
    node.controller().attach();
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether::{BasicStore, ConnectError, ConnectOptions, MapState, StageInput, connect};

    type Opts = ConnectOptions<i64, i64>;

    fn counter_store() -> Rc<BasicStore<i64, i64>> {
        BasicStore::new(0, |s, a| s + a)
    }

    fn count_node(label: &str) -> NodeSpec<i64, i64> {
        let connector = connect(
            MapState::new(|s: &i64| Props::builder().value("count", *s).build()),
            StageInput::Absent,
            StageInput::Absent,
            Opts::default(),
        );
        NodeSpec::connect(label, &connector).expect("valid stages")
    }

    #[test]
    fn mount_order_is_render_parent_first_attach_child_first() {
        let store = counter_store();
        let tree = ViewTree::new(store.handle());
        tree.mount(count_node("A").child(count_node("B")), Props::new())
            .expect("mounts");
        assert_eq!(
            tree.log().events(),
            vec![
                TreeEvent::render("A"),
                TreeEvent::render("B"),
                TreeEvent::commit("B"),
                TreeEvent::Attach("B".into()),
                TreeEvent::commit("A"),
                TreeEvent::Attach("A".into()),
            ]
        );
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn unmount_detaches_top_down() {
        let store = counter_store();
        let tree = ViewTree::new(store.handle());
        tree.mount(count_node("A").child(count_node("B")), Props::new())
            .expect("mounts");
        tree.log().clear();
        assert!(tree.unmount("A"));
        assert_eq!(
            tree.log().events(),
            vec![TreeEvent::Detach("A".into()), TreeEvent::Detach("B".into())]
        );
        assert_eq!(store.listener_count(), 0);
        assert!(tree.node("B").is_none());
        assert!(!tree.unmount("A"));
    }

    #[test]
    fn unmount_nested_node_keeps_parent() {
        let store = counter_store();
        let tree = ViewTree::new(store.handle());
        let root = tree
            .mount(count_node("A").child(count_node("B")), Props::new())
            .expect("mounts");
        assert!(tree.unmount("B"));
        assert!(root.children().is_empty());
        assert!(tree.node("A").is_some());
        let sub = root.controller().subscription().expect("subscribes");
        assert_eq!(sub.child_count(), 0);
    }

    #[test]
    fn failed_mount_detaches_nodes_already_mounted() {
        let store = counter_store();
        let tree = ViewTree::with_context(TreeContext::empty());
        // An explicit-store node hands its children the empty ambient
        // context, so "C" has no store to mount with.
        let spec = count_node("A")
            .store(store.handle())
            .child(count_node("B").store(store.handle()))
            .child(count_node("C"));

        let err = tree.mount(spec, Props::new()).expect_err("C has no store");
        assert!(matches!(err, ConnectError::MissingStore { .. }));
        let events = tree.log().events();
        assert_eq!(events.iter().filter(|e| **e == TreeEvent::Attach("B".into())).count(), 1);
        assert!(events.contains(&TreeEvent::Detach("A".into())));
        assert!(events.contains(&TreeEvent::Detach("B".into())));
        assert!(tree.node("A").is_none());

        store.dispatch(1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn event_log_take_drains() {
        let log = EventLog::default();
        log.note("x");
        assert_eq!(log.take(), vec![TreeEvent::note("x")]);
        assert!(log.events().is_empty());
    }
}

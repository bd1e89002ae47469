#![forbid(unsafe_code)]

//! Public setup API.
//!
//! ```text
//! connect(map_state, map_dispatch, merge, options)   -> Connector
//! Connector::wrap(component)                         -> ConnectedComponent
//! ConnectedComponent::mount(cx, own_props, schedule) -> ConnectedInstance
//! ```
//!
//! Stage arguments are resolved when a component is wrapped, so a bad
//! argument fails before anything is mounted. Each mounted instance owns one
//! [`Controller`].

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::context::TreeContext;
use crate::controller::{ConnectConfig, Controller, Scheduler};
use crate::error::{ConnectError, DeriveError, Result};
use crate::options::ConnectOptions;
use crate::props::Props;
use crate::stages::StageInput;
use crate::store::Store;

/// A view component that renders props into some output.
pub trait Component {
    type Output;

    /// Base name, used to build the connected display name.
    fn name(&self) -> &str;

    fn render(&self, props: &Props) -> Self::Output;
}

/// Collect the three stage arguments and the options.
///
/// Pass [`StageInput::Absent`] for any stage that is not needed.
pub fn connect<S: 'static, A: 'static>(
    map_state: impl Into<StageInput<S, A>>,
    map_dispatch: impl Into<StageInput<S, A>>,
    merge: impl Into<StageInput<S, A>>,
    options: ConnectOptions<S, A>,
) -> Connector<S, A> {
    Connector {
        map_state: map_state.into(),
        map_dispatch: map_dispatch.into(),
        merge: merge.into(),
        options,
    }
}

/// Stage arguments and options waiting for a component.
pub struct Connector<S, A> {
    map_state: StageInput<S, A>,
    map_dispatch: StageInput<S, A>,
    merge: StageInput<S, A>,
    options: ConnectOptions<S, A>,
}

impl<S: 'static, A: 'static> Connector<S, A> {
    /// Resolve the stages for `component`.
    ///
    /// # Errors
    ///
    /// [`ConnectError::InvalidStageArgument`] when no strategy accepts one
    /// of the stage arguments.
    pub fn wrap<C: Component>(&self, component: C) -> Result<ConnectedComponent<C, S, A>> {
        let display_name = self.options.format_display_name(component.name());
        let stages = self.options.factories().resolve(
            &self.map_state,
            &self.map_dispatch,
            &self.merge,
            &display_name,
        )?;
        debug!(
            component = %display_name,
            subscribes = stages.handles_state_changes,
            pure = self.options.is_pure(),
            "component wrapped"
        );
        Ok(ConnectedComponent {
            component: Rc::new(component),
            config: Rc::new(ConnectConfig::new(display_name, stages, self.options.clone())),
        })
    }
}

impl<S, A> fmt::Debug for Connector<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("map_state", &self.map_state)
            .field("map_dispatch", &self.map_dispatch)
            .field("merge", &self.merge)
            .field("options", &self.options)
            .finish()
    }
}

/// A component bound to its derivation stages. Mount it once per place it
/// appears in the tree.
pub struct ConnectedComponent<C, S, A> {
    component: Rc<C>,
    config: Rc<ConnectConfig<S, A>>,
}

impl<C, S, A> Clone for ConnectedComponent<C, S, A> {
    fn clone(&self) -> Self {
        Self {
            component: Rc::clone(&self.component),
            config: Rc::clone(&self.config),
        }
    }
}

impl<C: Component, S: 'static, A: 'static> ConnectedComponent<C, S, A> {
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    /// The component passed to [`Connector::wrap`].
    #[must_use]
    pub fn wrapped(&self) -> &C {
        &self.component
    }

    /// Mount beneath `cx`, taking the store from the context.
    ///
    /// # Errors
    ///
    /// [`ConnectError::MissingStore`] when `cx` carries no store.
    pub fn mount(
        &self,
        cx: &TreeContext<S, A>,
        own_props: Props,
        scheduler: Scheduler,
    ) -> Result<ConnectedInstance<C, S, A>> {
        self.instantiate(cx, None, own_props, scheduler)
    }

    /// Mount with an explicit store. The instance subscribes to `store`
    /// directly instead of to the nearest connected ancestor.
    pub fn mount_with_store(
        &self,
        store: Rc<dyn Store<S, A>>,
        cx: &TreeContext<S, A>,
        own_props: Props,
        scheduler: Scheduler,
    ) -> Result<ConnectedInstance<C, S, A>> {
        self.instantiate(cx, Some(store), own_props, scheduler)
    }

    fn instantiate(
        &self,
        cx: &TreeContext<S, A>,
        store: Option<Rc<dyn Store<S, A>>>,
        own_props: Props,
        scheduler: Scheduler,
    ) -> Result<ConnectedInstance<C, S, A>> {
        let controller = Controller::new(Rc::clone(&self.config), cx, store, own_props, scheduler)?;
        Ok(ConnectedInstance {
            component: Rc::clone(&self.component),
            config: Rc::clone(&self.config),
            controller,
        })
    }
}

impl<C, S, A> fmt::Debug for ConnectedComponent<C, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedComponent")
            .field("display_name", &self.config.display_name)
            .finish_non_exhaustive()
    }
}

/// One mounted connected component.
pub struct ConnectedInstance<C, S, A> {
    component: Rc<C>,
    config: Rc<ConnectConfig<S, A>>,
    controller: Controller<S, A>,
}

impl<C: Component, S, A> ConnectedInstance<C, S, A> {
    /// Render the wrapped component with the current derived props.
    ///
    /// # Errors
    ///
    /// The [`DeriveError`] from the last selector run, until a later run
    /// succeeds.
    pub fn render(&self) -> std::result::Result<C::Output, DeriveError> {
        let props = self.controller.render()?;
        Ok(self.component.render(&props))
    }

    #[must_use]
    pub fn controller(&self) -> &Controller<S, A> {
        &self.controller
    }

    /// Context for this instance's children.
    #[must_use]
    pub fn child_context(&self) -> TreeContext<S, A> {
        self.controller.child_context()
    }

    /// The wrapped component.
    ///
    /// # Errors
    ///
    /// [`ConnectError::ForwardRefDisabled`] unless the options enabled
    /// `forward_ref`.
    pub fn wrapped_component(&self) -> Result<&C> {
        if !self.config.options.forward_ref() {
            return Err(ConnectError::ForwardRefDisabled {
                component: self.config.display_name.clone(),
                method: self.config.options.method_name().to_string(),
            });
        }
        Ok(&self.component)
    }
}

impl<C, S, A> fmt::Debug for ConnectedInstance<C, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedInstance")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

#![forbid(unsafe_code)]

//! Connection options.
//!
//! [`ConnectOptions`] is built with `with_*` methods on top of
//! [`Default`]. The plain-data subset lives in [`ConnectFlags`], which can be
//! loaded from JSON and applied with [`ConnectOptions::with_flags`].
//!
//! | Option | Default |
//! |---|---|
//! | `pure` | `true` |
//! | `are_states_equal` | pointer identity |
//! | `are_own_props_equal` | [`shallow_equal`] |
//! | `are_state_props_equal` | [`shallow_equal`] |
//! | `are_merged_props_equal` | [`shallow_equal`] |
//! | `forward_ref` | `false` |
//! | `display_name` | `Connect(<name>)` |
//! | `method_name` | `"connect"` |
//! | `render_count_prop` | none |

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::props::{Props, shallow_equal};
use crate::stages::StageFactories;

pub type StatesEqual<S> = Rc<dyn Fn(&S, &S) -> bool>;
pub type PropsEqual = Rc<dyn Fn(&Props, &Props) -> bool>;
pub type DisplayNameFn = Rc<dyn Fn(&str) -> String>;

/// Options for [`connect`](crate::connect).
pub struct ConnectOptions<S, A> {
    pub(crate) pure: bool,
    pub(crate) are_states_equal: StatesEqual<S>,
    pub(crate) are_own_props_equal: PropsEqual,
    pub(crate) are_state_props_equal: PropsEqual,
    pub(crate) are_merged_props_equal: PropsEqual,
    pub(crate) forward_ref: bool,
    pub(crate) display_name: DisplayNameFn,
    pub(crate) method_name: String,
    pub(crate) render_count_prop: Option<String>,
    pub(crate) factories: StageFactories<S, A>,
}

impl<S, A> Clone for ConnectOptions<S, A> {
    fn clone(&self) -> Self {
        Self {
            pure: self.pure,
            are_states_equal: Rc::clone(&self.are_states_equal),
            are_own_props_equal: Rc::clone(&self.are_own_props_equal),
            are_state_props_equal: Rc::clone(&self.are_state_props_equal),
            are_merged_props_equal: Rc::clone(&self.are_merged_props_equal),
            forward_ref: self.forward_ref,
            display_name: Rc::clone(&self.display_name),
            method_name: self.method_name.clone(),
            render_count_prop: self.render_count_prop.clone(),
            factories: self.factories.clone(),
        }
    }
}

impl<S: 'static, A: 'static> Default for ConnectOptions<S, A> {
    fn default() -> Self {
        Self {
            pure: true,
            are_states_equal: Rc::new(|a: &S, b: &S| std::ptr::eq(a, b)),
            are_own_props_equal: Rc::new(shallow_equal),
            are_state_props_equal: Rc::new(shallow_equal),
            are_merged_props_equal: Rc::new(shallow_equal),
            forward_ref: false,
            display_name: Rc::new(|name: &str| format!("Connect({name})")),
            method_name: "connect".to_string(),
            render_count_prop: None,
            factories: StageFactories::default(),
        }
    }
}

impl<S: 'static, A: 'static> ConnectOptions<S, A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure mode skips derivation work when inputs compare equal. Turn it
    /// off when derivation functions read mutable data outside the store.
    #[must_use]
    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    #[must_use]
    pub fn with_states_equal(mut self, f: impl Fn(&S, &S) -> bool + 'static) -> Self {
        self.are_states_equal = Rc::new(f);
        self
    }

    #[must_use]
    pub fn with_own_props_equal(mut self, f: impl Fn(&Props, &Props) -> bool + 'static) -> Self {
        self.are_own_props_equal = Rc::new(f);
        self
    }

    #[must_use]
    pub fn with_state_props_equal(mut self, f: impl Fn(&Props, &Props) -> bool + 'static) -> Self {
        self.are_state_props_equal = Rc::new(f);
        self
    }

    #[must_use]
    pub fn with_merged_props_equal(mut self, f: impl Fn(&Props, &Props) -> bool + 'static) -> Self {
        self.are_merged_props_equal = Rc::new(f);
        self
    }

    /// Allow access to the wrapped component through the connected instance.
    #[must_use]
    pub fn with_forward_ref(mut self, forward_ref: bool) -> Self {
        self.forward_ref = forward_ref;
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, f: impl Fn(&str) -> String + 'static) -> Self {
        self.display_name = Rc::new(f);
        self
    }

    /// Name of the connecting API, used in error messages.
    #[must_use]
    pub fn with_method_name(mut self, name: impl Into<String>) -> Self {
        self.method_name = name.into();
        self
    }

    /// Add the instance's render count to rendered props under `key`.
    #[must_use]
    pub fn with_render_count_prop(mut self, key: impl Into<String>) -> Self {
        self.render_count_prop = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_factories(mut self, factories: StageFactories<S, A>) -> Self {
        self.factories = factories;
        self
    }

}

impl<S, A> ConnectOptions<S, A> {
    /// Apply every flag that is set.
    #[must_use]
    pub fn with_flags(mut self, flags: &ConnectFlags) -> Self {
        if let Some(pure) = flags.pure {
            self.pure = pure;
        }
        if let Some(forward_ref) = flags.forward_ref {
            self.forward_ref = forward_ref;
        }
        if let Some(method_name) = &flags.method_name {
            self.method_name.clone_from(method_name);
        }
        if let Some(key) = &flags.render_count_prop {
            self.render_count_prop = Some(key.clone());
        }
        self
    }

    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.pure
    }

    #[must_use]
    pub fn forward_ref(&self) -> bool {
        self.forward_ref
    }

    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    #[must_use]
    pub fn render_count_prop(&self) -> Option<&str> {
        self.render_count_prop.as_deref()
    }

    #[must_use]
    pub fn factories(&self) -> &StageFactories<S, A> {
        &self.factories
    }

    #[must_use]
    pub fn format_display_name(&self, component: &str) -> String {
        (self.display_name)(component)
    }
}

impl<S, A> fmt::Debug for ConnectOptions<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("pure", &self.pure)
            .field("forward_ref", &self.forward_ref)
            .field("method_name", &self.method_name)
            .field("render_count_prop", &self.render_count_prop)
            .finish_non_exhaustive()
    }
}

/// Serializable subset of [`ConnectOptions`]. Unset fields keep the
/// builder's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectFlags {
    pub pure: Option<bool>,
    pub forward_ref: Option<bool>,
    pub method_name: Option<String>,
    pub render_count_prop: Option<String>,
}

impl ConnectFlags {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

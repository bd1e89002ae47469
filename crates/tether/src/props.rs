#![forbid(unsafe_code)]

//! Immutable prop maps handed from the derivation pipeline to components.
//!
//! # Identity
//!
//! [`Props`] is a cheaply cloneable handle to a shared map. Two handles are
//! the *same props* when they point at the same allocation
//! ([`Props::ptr_eq`]). Memoization downstream relies on this: a selector run
//! that finds nothing changed hands back the previous handle, and the view
//! layer short-circuits on pointer identity.
//!
//! # Entry equality
//!
//! - [`Prop::Value`]: plain data, compared by value.
//! - [`Prop::Handler`]: a callback, compared by pointer identity.
//! - [`Prop::Shared`]: an opaque shared value, compared by pointer identity.
//!
//! [`shallow_equal`] compares two maps entry by entry with these rules.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::store::Dispatch;

/// Key under which the default dispatch stage exposes the dispatch handle.
pub const DISPATCH_KEY: &str = "dispatch";

/// A callable prop (event handler, bound action creator).
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&[Value])>);

impl Handler {
    pub fn new(f: impl Fn(&[Value]) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) {
        (self.0)(args);
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// One entry of a [`Props`] map.
#[derive(Clone)]
pub enum Prop {
    Value(Value),
    Handler(Handler),
    Shared(Rc<dyn Any>),
}

impl Prop {
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    pub fn shared<T: Any>(v: T) -> Self {
        Self::Shared(Rc::new(v))
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(h) => Some(h),
            _ => None,
        }
    }

    #[must_use]
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Shared(v) => v.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for Prop {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
            (Self::Shared(a), Self::Shared(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Handler(h) => h.fmt(f),
            Self::Shared(v) => write!(f, "Shared({:p})", Rc::as_ptr(v).cast::<()>()),
        }
    }
}

impl From<Value> for Prop {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<Handler> for Prop {
    fn from(h: Handler) -> Self {
        Self::Handler(h)
    }
}

/// Shared, immutable map of props.
#[derive(Clone, Default)]
pub struct Props(Rc<BTreeMap<String, Prop>>);

impl Props {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> PropsBuilder {
        PropsBuilder::default()
    }

    /// Pointer identity: both handles refer to the same map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Prop> {
        self.0.get(key)
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(Prop::as_value)
    }

    #[must_use]
    pub fn handler(&self, key: &str) -> Option<&Handler> {
        self.get(key).and_then(Prop::as_handler)
    }

    /// The dispatch handle injected when no dispatch stage was supplied.
    #[must_use]
    pub fn dispatch<A: 'static>(&self) -> Option<&Dispatch<A>> {
        self.get(DISPATCH_KEY).and_then(Prop::downcast::<Dispatch<A>>)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prop)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A new map with `key` set; `self` is left untouched.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, prop: impl Into<Prop>) -> Self {
        let mut map = (*self.0).clone();
        map.insert(key.into(), prop.into());
        Self(Rc::new(map))
    }

    /// `{ ..first, ..second, ..third }`: later maps win on key collisions.
    #[must_use]
    pub fn merged(first: &Self, second: &Self, third: &Self) -> Self {
        let mut map = (*first.0).clone();
        for layer in [second, third] {
            for (k, v) in layer.0.iter() {
                map.insert(k.clone(), v.clone());
            }
        }
        Self(Rc::new(map))
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Prop)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, Prop)>>(iter: I) -> Self {
        Self(Rc::new(
            iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }
}

/// Incremental construction of a [`Props`] map.
#[derive(Default)]
pub struct PropsBuilder {
    map: BTreeMap<String, Prop>,
}

impl PropsBuilder {
    #[must_use]
    pub fn value(mut self, key: impl Into<String>, v: impl Into<Value>) -> Self {
        self.map.insert(key.into(), Prop::Value(v.into()));
        self
    }

    #[must_use]
    pub fn handler(mut self, key: impl Into<String>, h: Handler) -> Self {
        self.map.insert(key.into(), Prop::Handler(h));
        self
    }

    #[must_use]
    pub fn prop(mut self, key: impl Into<String>, prop: Prop) -> Self {
        self.map.insert(key.into(), prop);
        self
    }

    #[must_use]
    pub fn build(self) -> Props {
        Props(Rc::new(self.map))
    }
}

/// Same keys, and every entry equal under [`Prop`]'s equality.
#[must_use]
pub fn shallow_equal(a: &Props, b: &Props) -> bool {
    if a.ptr_eq(b) {
        return true;
    }
    a.len() == b.len()
        && a
            .0
            .iter()
            .all(|(k, v)| b.0.get(k).is_some_and(|other| v == other))
}

/// Equal only when both handles point at the same map.
#[must_use]
pub fn identical(a: &Props, b: &Props) -> bool {
    a.ptr_eq(b)
}

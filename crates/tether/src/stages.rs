#![forbid(unsafe_code)]

//! The three derivation stages and how connection arguments resolve to them.
//!
//! 1. map-state: `(state, own_props) -> state_props`
//! 2. map-dispatch: `(dispatch, own_props) -> dispatch_props`
//! 3. merge: `(state_props, dispatch_props, own_props) -> final_props`
//!
//! Each argument to [`connect`](crate::connect) is a [`StageInput`]. A
//! [`StrategyTable`] turns the input into a stage. Strategies are tried
//! last-registered first and the first one that claims the input wins, so an
//! application can push its own strategy to override a default or to give
//! meaning to a [`StageInput::Custom`] value.
//!
//! # Per-instance stages
//!
//! A resolved stage is a recipe. Every controller instantiates its own copy,
//! which is where factories run and where action maps are bound to the
//! instance's dispatch.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::error::{ConnectError, DeriveError, Result};
use crate::props::{DISPATCH_KEY, Handler, Prop, Props};
use crate::store::Dispatch;

/// Outcome of one derivation stage.
pub type DeriveResult = std::result::Result<Props, DeriveError>;

type StateFn<S> = Rc<dyn Fn(&S, &Props) -> DeriveResult>;
type DispatchFn<A> = Rc<dyn Fn(&Dispatch<A>, &Props) -> DeriveResult>;
type MergeFn = Rc<dyn Fn(&Props, &Props, &Props) -> DeriveResult>;

// ---------------------------------------------------------------------------
// map-state
// ---------------------------------------------------------------------------

/// Derives state props from a store snapshot.
pub struct MapState<S> {
    kind: MapStateKind<S>,
}

enum MapStateKind<S> {
    Function {
        f: StateFn<S>,
        depends_on_own_props: bool,
    },
    Constant(Props),
    Factory(Rc<dyn Fn() -> MapState<S>>),
}

impl<S> Clone for MapState<S> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            MapStateKind::Function {
                f,
                depends_on_own_props,
            } => MapStateKind::Function {
                f: Rc::clone(f),
                depends_on_own_props: *depends_on_own_props,
            },
            MapStateKind::Constant(p) => MapStateKind::Constant(p.clone()),
            MapStateKind::Factory(f) => MapStateKind::Factory(Rc::clone(f)),
        };
        Self { kind }
    }
}

impl<S: 'static> MapState<S> {
    /// Reads only the state; not re-run when only own props change.
    pub fn new(f: impl Fn(&S) -> Props + 'static) -> Self {
        Self::function(Rc::new(move |s, _| Ok(f(s))), false)
    }

    /// Reads the state and the component's own props.
    pub fn with_own_props(f: impl Fn(&S, &Props) -> Props + 'static) -> Self {
        Self::function(Rc::new(move |s, own| Ok(f(s, own))), true)
    }

    pub fn try_new(f: impl Fn(&S) -> DeriveResult + 'static) -> Self {
        Self::function(Rc::new(move |s, _| f(s)), false)
    }

    pub fn try_with_own_props(f: impl Fn(&S, &Props) -> DeriveResult + 'static) -> Self {
        Self::function(Rc::new(f), true)
    }

    /// Always the same props, computed up front.
    #[must_use]
    pub fn constant(props: Props) -> Self {
        Self {
            kind: MapStateKind::Constant(props),
        }
    }

    /// Builds a fresh mapper for every connected instance, so the mapper can
    /// keep private memoization state.
    pub fn factory(f: impl Fn() -> MapState<S> + 'static) -> Self {
        Self {
            kind: MapStateKind::Factory(Rc::new(f)),
        }
    }

    fn function(f: StateFn<S>, depends_on_own_props: bool) -> Self {
        Self {
            kind: MapStateKind::Function {
                f,
                depends_on_own_props,
            },
        }
    }

    pub(crate) fn instantiate(&self) -> StateStage<S> {
        match &self.kind {
            MapStateKind::Function {
                f,
                depends_on_own_props,
            } => StateStage {
                f: Rc::clone(f),
                depends_on_own_props: *depends_on_own_props,
            },
            MapStateKind::Constant(props) => {
                let props = props.clone();
                StateStage {
                    f: Rc::new(move |_, _| Ok(props.clone())),
                    depends_on_own_props: false,
                }
            }
            MapStateKind::Factory(make) => make().instantiate(),
        }
    }
}

/// A map-state stage bound to one instance.
pub(crate) struct StateStage<S> {
    f: StateFn<S>,
    pub(crate) depends_on_own_props: bool,
}

impl<S> StateStage<S> {
    pub(crate) fn call(&self, state: &S, own: &Props) -> DeriveResult {
        (self.f)(state, own)
    }
}

// ---------------------------------------------------------------------------
// map-dispatch
// ---------------------------------------------------------------------------

/// Derives dispatch props (callbacks) from the dispatch handle.
pub struct MapDispatch<A> {
    kind: MapDispatchKind<A>,
}

enum MapDispatchKind<A> {
    Function {
        f: DispatchFn<A>,
        depends_on_own_props: bool,
    },
    /// Evaluated once per instance.
    Constant(Rc<dyn Fn(&Dispatch<A>) -> Props>),
    Factory(Rc<dyn Fn() -> MapDispatch<A>>),
}

impl<A> Clone for MapDispatch<A> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            MapDispatchKind::Function {
                f,
                depends_on_own_props,
            } => MapDispatchKind::Function {
                f: Rc::clone(f),
                depends_on_own_props: *depends_on_own_props,
            },
            MapDispatchKind::Constant(f) => MapDispatchKind::Constant(Rc::clone(f)),
            MapDispatchKind::Factory(f) => MapDispatchKind::Factory(Rc::clone(f)),
        };
        Self { kind }
    }
}

impl<A: 'static> MapDispatch<A> {
    /// Reads only the dispatch handle; runs on the first selection and is
    /// reused afterwards.
    pub fn new(f: impl Fn(&Dispatch<A>) -> Props + 'static) -> Self {
        Self::function(Rc::new(move |d, _| Ok(f(d))), false)
    }

    pub fn with_own_props(f: impl Fn(&Dispatch<A>, &Props) -> Props + 'static) -> Self {
        Self::function(Rc::new(move |d, own| Ok(f(d, own))), true)
    }

    pub fn try_new(f: impl Fn(&Dispatch<A>) -> DeriveResult + 'static) -> Self {
        Self::function(Rc::new(move |d, _| f(d)), false)
    }

    pub fn try_with_own_props(f: impl Fn(&Dispatch<A>, &Props) -> DeriveResult + 'static) -> Self {
        Self::function(Rc::new(f), true)
    }

    /// Computed once per instance from the dispatch handle.
    pub fn constant(f: impl Fn(&Dispatch<A>) -> Props + 'static) -> Self {
        Self {
            kind: MapDispatchKind::Constant(Rc::new(f)),
        }
    }

    pub fn factory(f: impl Fn() -> MapDispatch<A> + 'static) -> Self {
        Self {
            kind: MapDispatchKind::Factory(Rc::new(f)),
        }
    }

    fn function(f: DispatchFn<A>, depends_on_own_props: bool) -> Self {
        Self {
            kind: MapDispatchKind::Function {
                f,
                depends_on_own_props,
            },
        }
    }

    pub(crate) fn instantiate(&self, dispatch: &Dispatch<A>) -> DispatchStage<A> {
        match &self.kind {
            MapDispatchKind::Function {
                f,
                depends_on_own_props,
            } => DispatchStage {
                f: Rc::clone(f),
                depends_on_own_props: *depends_on_own_props,
            },
            MapDispatchKind::Constant(make) => {
                let props = make(dispatch);
                DispatchStage {
                    f: Rc::new(move |_, _| Ok(props.clone())),
                    depends_on_own_props: false,
                }
            }
            MapDispatchKind::Factory(make) => make().instantiate(dispatch),
        }
    }
}

pub(crate) struct DispatchStage<A> {
    f: DispatchFn<A>,
    pub(crate) depends_on_own_props: bool,
}

impl<A> DispatchStage<A> {
    pub(crate) fn call(&self, dispatch: &Dispatch<A>, own: &Props) -> DeriveResult {
        (self.f)(dispatch, own)
    }
}

/// Named action creators. Bound to an instance's dispatch, each becomes a
/// [`Handler`] prop that dispatches the created action.
pub struct ActionCreators<A> {
    creators: BTreeMap<String, Rc<dyn Fn(&[Value]) -> A>>,
}

impl<A> Clone for ActionCreators<A> {
    fn clone(&self) -> Self {
        Self {
            creators: self.creators.clone(),
        }
    }
}

impl<A> Default for ActionCreators<A> {
    fn default() -> Self {
        Self {
            creators: BTreeMap::new(),
        }
    }
}

impl<A: 'static> ActionCreators<A> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, creator: impl Fn(&[Value]) -> A + 'static) -> Self {
        self.creators.insert(name.into(), Rc::new(creator));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    /// One handler prop per creator, each dispatching through `dispatch`.
    #[must_use]
    pub fn bind(&self, dispatch: &Dispatch<A>) -> Props {
        self.creators
            .iter()
            .map(|(name, creator)| {
                let creator = Rc::clone(creator);
                let dispatch = dispatch.clone();
                let handler = Handler::new(move |args| {
                    dispatch.call(creator(args));
                });
                (name.clone(), Prop::Handler(handler))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Combines state props, dispatch props and own props.
pub struct MergeProps {
    kind: MergeKind,
}

#[derive(Clone)]
enum MergeKind {
    /// `{ ..own, ..state, ..dispatch }`.
    Default,
    Function(MergeFn),
    Factory(Rc<dyn Fn() -> MergeProps>),
}

impl Clone for MergeProps {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
        }
    }
}

impl MergeProps {
    pub fn new(f: impl Fn(&Props, &Props, &Props) -> Props + 'static) -> Self {
        Self {
            kind: MergeKind::Function(Rc::new(move |s, d, o| Ok(f(s, d, o)))),
        }
    }

    pub fn try_new(f: impl Fn(&Props, &Props, &Props) -> DeriveResult + 'static) -> Self {
        Self {
            kind: MergeKind::Function(Rc::new(f)),
        }
    }

    /// The default merge: own props, overridden by state props, overridden
    /// by dispatch props.
    #[must_use]
    pub fn default_merge() -> Self {
        Self {
            kind: MergeKind::Default,
        }
    }

    pub fn factory(f: impl Fn() -> MergeProps + 'static) -> Self {
        Self {
            kind: MergeKind::Factory(Rc::new(f)),
        }
    }

    pub(crate) fn instantiate(&self) -> MergeStage {
        match &self.kind {
            MergeKind::Default => MergeStage {
                f: Rc::new(|s, d, o| Ok(Props::merged(o, s, d))),
                memoized: false,
            },
            MergeKind::Function(f) => MergeStage {
                f: Rc::clone(f),
                memoized: true,
            },
            MergeKind::Factory(make) => make().instantiate(),
        }
    }
}

pub(crate) struct MergeStage {
    f: MergeFn,
    /// Whether pure mode may hand back the previous result when the merged
    /// props compare equal.
    pub(crate) memoized: bool,
}

impl MergeStage {
    pub(crate) fn call(&self, state: &Props, dispatch: &Props, own: &Props) -> DeriveResult {
        (self.f)(state, dispatch, own)
    }
}

// ---------------------------------------------------------------------------
// Inputs and strategy tables
// ---------------------------------------------------------------------------

/// One argument to [`connect`](crate::connect).
pub enum StageInput<S, A> {
    Absent,
    State(MapState<S>),
    Dispatch(MapDispatch<A>),
    Actions(ActionCreators<A>),
    Merge(MergeProps),
    /// Opaque value for application-defined strategies.
    Custom(Rc<dyn Any>),
}

impl<S, A> StageInput<S, A> {
    /// Short human-readable kind, used in setup errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::State(_) => "state mapper",
            Self::Dispatch(_) => "dispatch mapper",
            Self::Actions(_) => "action map",
            Self::Merge(_) => "merge function",
            Self::Custom(_) => "custom",
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl<S, A> Clone for StageInput<S, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Absent => Self::Absent,
            Self::State(m) => Self::State(m.clone()),
            Self::Dispatch(m) => Self::Dispatch(m.clone()),
            Self::Actions(m) => Self::Actions(m.clone()),
            Self::Merge(m) => Self::Merge(m.clone()),
            Self::Custom(v) => Self::Custom(Rc::clone(v)),
        }
    }
}

impl<S, A> fmt::Debug for StageInput<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageInput({})", self.kind())
    }
}

impl<S, A> From<MapState<S>> for StageInput<S, A> {
    fn from(m: MapState<S>) -> Self {
        Self::State(m)
    }
}

impl<S, A> From<MapDispatch<A>> for StageInput<S, A> {
    fn from(m: MapDispatch<A>) -> Self {
        Self::Dispatch(m)
    }
}

impl<S, A> From<ActionCreators<A>> for StageInput<S, A> {
    fn from(m: ActionCreators<A>) -> Self {
        Self::Actions(m)
    }
}

impl<S, A> From<MergeProps> for StageInput<S, A> {
    fn from(m: MergeProps) -> Self {
        Self::Merge(m)
    }
}

/// A named resolution strategy. It claims an input by returning `Some`.
pub struct Strategy<S, A, T> {
    name: &'static str,
    resolve: Rc<dyn Fn(&StageInput<S, A>) -> Option<T>>,
}

impl<S, A, T> Clone for Strategy<S, A, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            resolve: Rc::clone(&self.resolve),
        }
    }
}

impl<S, A, T> Strategy<S, A, T> {
    pub fn new(name: &'static str, resolve: impl Fn(&StageInput<S, A>) -> Option<T> + 'static) -> Self {
        Self {
            name,
            resolve: Rc::new(resolve),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Ordered strategies, evaluated last to first.
pub struct StrategyTable<S, A, T> {
    entries: Vec<Strategy<S, A, T>>,
}

impl<S, A, T> Clone for StrategyTable<S, A, T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<S, A, T> StrategyTable<S, A, T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a strategy. It takes precedence over everything already present.
    pub fn push(&mut self, strategy: Strategy<S, A, T>) {
        self.entries.push(strategy);
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(Strategy::name).collect()
    }

    #[must_use]
    pub fn resolve(&self, input: &StageInput<S, A>) -> Option<T> {
        self.entries.iter().rev().find_map(|s| (s.resolve)(input))
    }
}

/// The three strategy tables used by [`connect`](crate::connect).
pub struct StageFactories<S, A> {
    pub map_state: StrategyTable<S, A, MapState<S>>,
    pub map_dispatch: StrategyTable<S, A, MapDispatch<A>>,
    pub merge: StrategyTable<S, A, MergeProps>,
}

impl<S, A> Clone for StageFactories<S, A> {
    fn clone(&self) -> Self {
        Self {
            map_state: self.map_state.clone(),
            map_dispatch: self.map_dispatch.clone(),
            merge: self.merge.clone(),
        }
    }
}

impl<S: 'static, A: 'static> Default for StageFactories<S, A> {
    fn default() -> Self {
        let mut map_state = StrategyTable::empty();
        map_state.push(Strategy::new("map_state_is_function", |input| match input {
            StageInput::State(m) => Some(m.clone()),
            _ => None,
        }));
        map_state.push(Strategy::new("map_state_is_missing", |input| {
            input.is_absent().then(|| MapState::constant(Props::new()))
        }));

        let mut map_dispatch = StrategyTable::empty();
        map_dispatch.push(Strategy::new("map_dispatch_is_function", |input| match input {
            StageInput::Dispatch(m) => Some(m.clone()),
            _ => None,
        }));
        map_dispatch.push(Strategy::new("map_dispatch_is_missing", |input| {
            input.is_absent().then(|| {
                MapDispatch::constant(|dispatch: &Dispatch<A>| {
                    Props::builder()
                        .prop(DISPATCH_KEY, Prop::shared(dispatch.clone()))
                        .build()
                })
            })
        }));
        map_dispatch.push(Strategy::new("map_dispatch_is_action_map", |input| match input {
            StageInput::Actions(actions) => {
                let actions = actions.clone();
                Some(MapDispatch::constant(move |dispatch| actions.bind(dispatch)))
            }
            _ => None,
        }));

        let mut merge = StrategyTable::empty();
        merge.push(Strategy::new("merge_is_function", |input| match input {
            StageInput::Merge(m) => Some(m.clone()),
            _ => None,
        }));
        merge.push(Strategy::new("merge_is_omitted", |input| {
            input.is_absent().then(MergeProps::default_merge)
        }));

        Self {
            map_state,
            map_dispatch,
            merge,
        }
    }
}

/// Stages resolved for one wrapped component.
pub(crate) struct ResolvedStages<S, A> {
    pub(crate) map_state: MapState<S>,
    pub(crate) map_dispatch: MapDispatch<A>,
    pub(crate) merge: MergeProps,
    /// False when no map-state was supplied: the component never subscribes.
    pub(crate) handles_state_changes: bool,
}

impl<S, A> StageFactories<S, A> {
    pub(crate) fn resolve(
        &self,
        map_state: &StageInput<S, A>,
        map_dispatch: &StageInput<S, A>,
        merge: &StageInput<S, A>,
        component: &str,
    ) -> Result<ResolvedStages<S, A>> {
        let invalid = |argument: &'static str, input: &StageInput<S, A>| {
            ConnectError::InvalidStageArgument {
                argument,
                kind: input.kind(),
                component: component.to_string(),
            }
        };
        Ok(ResolvedStages {
            map_state: self
                .map_state
                .resolve(map_state)
                .ok_or_else(|| invalid("map_state", map_state))?,
            map_dispatch: self
                .map_dispatch
                .resolve(map_dispatch)
                .ok_or_else(|| invalid("map_dispatch", map_dispatch))?,
            merge: self
                .merge
                .resolve(merge)
                .ok_or_else(|| invalid("merge", merge))?,
            handles_state_changes: !map_state.is_absent(),
        })
    }
}

#![forbid(unsafe_code)]

//! Per-instance props selection.
//!
//! [`PropsSelector`] runs the three derivation stages. In pure mode it
//! remembers its last inputs and outputs and skips every stage whose inputs
//! compare equal; in impure mode it runs everything on every call.
//!
//! [`StatefulSelector`] wraps a `PropsSelector` with the record the
//! controller consults: the last props, the last error, and whether the view
//! needs to update.
//!
//! # Invariants
//!
//! 1. Pure mode with equal state and equal own props returns the previous
//!    props handle (pointer identity preserved).
//! 2. Own-props equality is checked before state equality.
//! 3. The pure memo is updated only after every stage of a call succeeded;
//!    a failing call leaves it exactly as it was.
//! 4. `should_update` is set by a run that yields a new props handle, fails,
//!    or recovers from a failure, and is cleared only by
//!    [`consume_update`](StatefulSelector::consume_update) or
//!    [`freeze`](StatefulSelector::freeze).
//! 5. A frozen selector never runs again.

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::DeriveError;
use crate::options::{ConnectOptions, PropsEqual, StatesEqual};
use crate::props::Props;
use crate::stages::{DeriveResult, DispatchStage, MergeStage, ResolvedStages, StateStage};
use crate::store::Dispatch;

struct Stages<S, A> {
    map_state: StateStage<S>,
    map_dispatch: DispatchStage<A>,
    merge: MergeStage,
    dispatch: Dispatch<A>,
}

struct Equalities<S> {
    states: StatesEqual<S>,
    own_props: PropsEqual,
    state_props: PropsEqual,
    merged_props: PropsEqual,
}

struct Memo<S> {
    state: Rc<S>,
    own: Props,
    state_props: Props,
    dispatch_props: Props,
    merged: Props,
}

enum Mode<S> {
    Pure {
        eq: Equalities<S>,
        memo: Option<Memo<S>>,
    },
    Impure,
}

/// Runs the derivation pipeline for one instance.
pub struct PropsSelector<S, A> {
    stages: Stages<S, A>,
    mode: Mode<S>,
}

impl<S: 'static, A: 'static> PropsSelector<S, A> {
    pub(crate) fn new(
        resolved: &ResolvedStages<S, A>,
        options: &ConnectOptions<S, A>,
        dispatch: Dispatch<A>,
    ) -> Self {
        let stages = Stages {
            map_state: resolved.map_state.instantiate(),
            map_dispatch: resolved.map_dispatch.instantiate(&dispatch),
            merge: resolved.merge.instantiate(),
            dispatch,
        };
        let mode = if options.pure {
            Mode::Pure {
                eq: Equalities {
                    states: Rc::clone(&options.are_states_equal),
                    own_props: Rc::clone(&options.are_own_props_equal),
                    state_props: Rc::clone(&options.are_state_props_equal),
                    merged_props: Rc::clone(&options.are_merged_props_equal),
                },
                memo: None,
            }
        } else {
            Mode::Impure
        };
        Self { stages, mode }
    }
}

impl<S, A> PropsSelector<S, A> {
    /// Final props for `(state, own)`.
    pub fn select(&mut self, state: &Rc<S>, own: &Props) -> DeriveResult {
        let stages = &self.stages;
        match &mut self.mode {
            Mode::Impure => {
                let state_props = stages.map_state.call(state, own)?;
                let dispatch_props = stages.map_dispatch.call(&stages.dispatch, own)?;
                stages.merge.call(&state_props, &dispatch_props, own)
            }
            Mode::Pure { eq, memo } => {
                let next = match memo.as_ref() {
                    None => first_call(stages, state, own)?,
                    Some(prev) => subsequent_call(stages, eq, prev, state, own)?,
                };
                let merged = next.merged.clone();
                *memo = Some(next);
                Ok(merged)
            }
        }
    }

    #[must_use]
    pub fn is_pure(&self) -> bool {
        matches!(self.mode, Mode::Pure { .. })
    }
}

fn first_call<S, A>(stages: &Stages<S, A>, state: &Rc<S>, own: &Props) -> Result<Memo<S>, DeriveError> {
    let state_props = stages.map_state.call(state, own)?;
    let dispatch_props = stages.map_dispatch.call(&stages.dispatch, own)?;
    let merged = stages.merge.call(&state_props, &dispatch_props, own)?;
    Ok(Memo {
        state: Rc::clone(state),
        own: own.clone(),
        state_props,
        dispatch_props,
        merged,
    })
}

fn subsequent_call<S, A>(
    stages: &Stages<S, A>,
    eq: &Equalities<S>,
    prev: &Memo<S>,
    state: &Rc<S>,
    own: &Props,
) -> Result<Memo<S>, DeriveError> {
    let own_changed = !(eq.own_props)(own, &prev.own);
    let state_changed = !(eq.states)(&**state, &*prev.state);

    let (state_props, dispatch_props, merged) = match (own_changed, state_changed) {
        (true, true) => {
            let state_props = stages.map_state.call(state, own)?;
            let dispatch_props = if stages.map_dispatch.depends_on_own_props {
                stages.map_dispatch.call(&stages.dispatch, own)?
            } else {
                prev.dispatch_props.clone()
            };
            let merged = merge(stages, eq, &state_props, &dispatch_props, own, &prev.merged)?;
            (state_props, dispatch_props, merged)
        }
        (true, false) => {
            let state_props = if stages.map_state.depends_on_own_props {
                stages.map_state.call(state, own)?
            } else {
                prev.state_props.clone()
            };
            let dispatch_props = if stages.map_dispatch.depends_on_own_props {
                stages.map_dispatch.call(&stages.dispatch, own)?
            } else {
                prev.dispatch_props.clone()
            };
            let merged = merge(stages, eq, &state_props, &dispatch_props, own, &prev.merged)?;
            (state_props, dispatch_props, merged)
        }
        (false, true) => {
            let next_state_props = stages.map_state.call(state, own)?;
            let state_props_changed = !(eq.state_props)(&next_state_props, &prev.state_props);
            let merged = if state_props_changed {
                merge(stages, eq, &next_state_props, &prev.dispatch_props, own, &prev.merged)?
            } else {
                prev.merged.clone()
            };
            (next_state_props, prev.dispatch_props.clone(), merged)
        }
        (false, false) => (
            prev.state_props.clone(),
            prev.dispatch_props.clone(),
            prev.merged.clone(),
        ),
    };

    Ok(Memo {
        state: Rc::clone(state),
        own: own.clone(),
        state_props,
        dispatch_props,
        merged,
    })
}

fn merge<S, A>(
    stages: &Stages<S, A>,
    eq: &Equalities<S>,
    state_props: &Props,
    dispatch_props: &Props,
    own: &Props,
    previous: &Props,
) -> DeriveResult {
    let next = stages.merge.call(state_props, dispatch_props, own)?;
    if stages.merge.memoized && (eq.merged_props)(&next, previous) {
        return Ok(previous.clone());
    }
    Ok(next)
}

impl<S, A> fmt::Debug for PropsSelector<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let memoized = match &self.mode {
            Mode::Pure { memo, .. } => memo.is_some(),
            Mode::Impure => false,
        };
        f.debug_struct("PropsSelector")
            .field("pure", &self.is_pure())
            .field("memoized", &memoized)
            .finish()
    }
}

/// Memoized props plus the "needs update" flag for one controller.
pub struct StatefulSelector<S, A> {
    source: PropsSelector<S, A>,
    props: Option<Props>,
    error: Option<DeriveError>,
    should_update: bool,
    frozen: bool,
    runs: u64,
}

impl<S, A> StatefulSelector<S, A> {
    pub(crate) fn new(source: PropsSelector<S, A>) -> Self {
        Self {
            source,
            props: None,
            error: None,
            should_update: false,
            frozen: false,
            runs: 0,
        }
    }

    /// Recompute props for `(state, own)`.
    pub fn run(&mut self, state: &Rc<S>, own: &Props) {
        if self.frozen {
            return;
        }
        self.runs += 1;
        match self.source.select(state, own) {
            Ok(next) => {
                let same = self.props.as_ref().is_some_and(|prev| prev.ptr_eq(&next));
                if !same || self.error.is_some() {
                    self.should_update = true;
                    self.props = Some(next);
                    self.error = None;
                }
                trace!(run = self.runs, changed = !same, "selector run");
            }
            Err(err) => {
                trace!(run = self.runs, error = %err, "selector run failed");
                self.should_update = true;
                self.error = Some(err);
            }
        }
    }

    #[must_use]
    pub fn should_update(&self) -> bool {
        self.should_update
    }

    #[must_use]
    pub fn props(&self) -> Option<&Props> {
        self.props.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&DeriveError> {
        self.error.as_ref()
    }

    /// Number of runs that were not skipped by [`freeze`](Self::freeze).
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Clear the update flag once the view has committed.
    pub fn consume_update(&mut self) {
        self.should_update = false;
    }

    /// Turn every later `run` into a no-op and drop the update flag.
    pub fn freeze(&mut self) {
        self.frozen = true;
        self.should_update = false;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

impl<S, A> fmt::Debug for StatefulSelector<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatefulSelector")
            .field("props", &self.props)
            .field("error", &self.error)
            .field("should_update", &self.should_update)
            .field("frozen", &self.frozen)
            .field("runs", &self.runs)
            .finish()
    }
}

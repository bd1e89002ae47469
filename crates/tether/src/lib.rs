#![forbid(unsafe_code)]

//! Connects one mutable store to a tree of view components.
//!
//! Each connected component derives a minimal slice of store state as props,
//! re-renders only when that slice changes, and is told about store changes
//! strictly after its nearest connected ancestor has committed its own
//! update.
//!
//! - [`Subscription`]: a node of the notification tree. Nodes mirror the
//!   component tree and fan store changes out top-down.
//! - [`StatefulSelector`]: per-instance memoized props plus the
//!   "needs update" flag and the last derivation error.
//! - [`Controller`]: the attach / update / detach lifecycle of one instance.
//! - [`connect`]: resolves the three derivation stages and wraps a
//!   [`Component`].
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous (`Rc`, `RefCell`, `Cell`).
//! The host view tree passes a [`TreeContext`] down explicitly; a subscribing
//! controller shadows its subscription slot so descendants nest beneath it.
//!
//! ```text
//! store ─▶ root Subscription ─▶ Controller A ──(commit)──▶ A's children
//!                                    │
//!                                    └── no change ──────▶ A's children
//! ```
//!
//! # Invariants
//!
//! 1. Unchanged inputs never produce a new props handle in pure mode.
//! 2. A child whose parent produced new props is notified only after the
//!    parent's update commits.
//! 3. A parent whose props did not change forwards the notification at once.
//! 4. Subscribe and unsubscribe are idempotent; detach is terminal.
//! 5. Detaching during a notification pass never skips or revisits siblings.

pub mod connect;
pub mod context;
pub mod controller;
pub mod error;
mod listeners;
pub mod options;
pub mod props;
pub mod selector;
pub mod stages;
pub mod store;
pub mod subscription;

pub use connect::{Component, ConnectedComponent, ConnectedInstance, Connector, connect};
pub use context::TreeContext;
pub use controller::{Controller, Phase, Scheduler};
pub use error::{ConnectError, DeriveError, Result};
pub use listeners::{Listener, Unsubscribe};
pub use options::{ConnectFlags, ConnectOptions};
pub use props::{DISPATCH_KEY, Handler, Prop, Props, PropsBuilder, identical, shallow_equal};
pub use selector::{PropsSelector, StatefulSelector};
pub use stages::{
    ActionCreators, DeriveResult, MapDispatch, MapState, MergeProps, StageFactories, StageInput,
    Strategy, StrategyTable,
};
pub use store::{BasicStore, Dispatch, Store, Subscribable};
pub use subscription::Subscription;

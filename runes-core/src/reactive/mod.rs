//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, derived values,
//! effects and batching. These primitives form the foundation of the
//! component layer.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. Reading it inside a derived
//! computation or an effect records a dependency; writing a new value
//! propagates to everything that depends on it.
//!
//! ## Derived Values
//!
//! A Derived value caches a pure computation over other reactive values. It
//! recomputes at most once per propagation pass, and only when a dependency
//! actually changed.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever its
//! dependencies change. It may return a [`Cleanup`] that runs before the
//! next run and on disposal.
//!
//! ## Batches
//!
//! [`Runtime::batch`] defers propagation until the outermost batch exits, so
//! several writes produce one pass.
//!
//! # Implementation Notes
//!
//! Every primitive belongs to a [`Runtime`], which owns the dependency graph
//! and a stack of tracking frames. Propagation is push-based: a write
//! collects every reachable node, orders it topologically and visits each
//! node once, so no computation ever observes a half-updated graph.

mod batch;
mod context;
mod derived;
mod effect;
mod runtime;
mod signal;
mod subscriber;

pub use derived::Derived;
pub use effect::{Cleanup, Effect, EffectOutput};
pub use runtime::Runtime;
pub use signal::Signal;
pub use subscriber::{Observable, Subscription, SubscriptionId};

//! Runes Core
//!
//! This crate provides a fine-grained reactive runtime and the component
//! lifecycle built on top of it. It implements:
//!
//! - Reactive primitives (signals, derived values, effects, batches)
//! - Glitch-free propagation over a dependency graph, with cycle detection
//! - A lifecycle manager that mounts, updates and unmounts components
//! - Component scopes that own every reactive resource an instance creates
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: the runtime, signals, derived values, effects and tracking
//! - `graph`: the dependency graph and topological ordering
//! - `lifecycle`: phases, instance ids and the lifecycle manager
//! - `component`: the component traits, instances and scopes
//! - `config`: runtime tunables
//! - `error`: error types shared by all of the above
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use runes_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//! let count = rt.signal(0);
//!
//! let c = count.clone();
//! let doubled = rt.derived(move || c.get() * 2);
//!
//! let log = Arc::new(Mutex::new(Vec::new()));
//! let (c, d, l) = (count.clone(), doubled.clone(), log.clone());
//! let _effect = rt.effect(move || {
//!     l.lock().unwrap().push(format!("{} x2 = {}", c.get(), d.get()));
//! });
//!
//! count.set(5);
//! assert_eq!(*log.lock().unwrap(), ["0 x2 = 0", "5 x2 = 10"]);
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod reactive;

pub use component::{Component, ComponentInstance, ComponentScope, LifecycleHooks};
pub use config::RuntimeConfig;
pub use error::{BoxError, LifecycleError, ReactiveCycleError, ReactiveError};
pub use lifecycle::{InstanceId, LifecycleManager, LifecyclePhase};
pub use reactive::{Cleanup, Derived, Effect, Runtime, Signal, Subscription};

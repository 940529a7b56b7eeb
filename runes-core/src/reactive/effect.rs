//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever the
//! values it read last time change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs once immediately to establish its
//!    dependencies.
//!
//! 2. During a propagation pass it runs at most once, after every derived
//!    value and subscriber of the pass has settled.
//!
//! 3. Each run replaces the dependency set with whatever that run read.
//!
//! # Cleanup
//!
//! A body may return a [`Cleanup`]. It runs before the next run of the
//! effect and when the effect is disposed, exactly once either way.
//!
//! # Lifetime
//!
//! The runtime keeps an effect alive. Dropping the [`Effect`] handle does
//! not stop it; call [`Effect::dispose`] or tear the runtime down.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::context::Reads;
use super::runtime::{Reactive, Runtime, Slot, WeakRuntime};
use crate::error::{panic_message, ReactiveError};
use crate::graph::{NodeId, NodeKind};

/// Teardown returned from an effect body.
pub struct Cleanup(Box<dyn FnOnce() + Send>);

impl Cleanup {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup(..)")
    }
}

/// What an effect body may return.
pub trait EffectOutput {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl EffectOutput for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl EffectOutput for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl EffectOutput for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

type Body = Box<dyn FnMut() -> Option<Cleanup> + Send>;

/// A side-effecting computation that runs when its dependencies change.
///
/// # Example
///
/// ```rust
/// use runes_core::reactive::{Cleanup, Runtime};
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
/// let c = count.clone();
///
/// let effect = rt.effect(move || {
///     let value = c.get();
///     Cleanup::new(move || println!("leaving {value}"))
/// });
///
/// count.set(5);
/// assert_eq!(effect.run_count(), 2);
/// assert_eq!(effect.cleanup_count(), 1);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    id: NodeId,
    runtime: WeakRuntime,
    /// Taken out while the body runs; `None` afterwards means disposed.
    body: Mutex<Option<Body>>,
    cleanup: Mutex<Option<Cleanup>>,
    disposed: AtomicBool,
    runs: AtomicUsize,
    cleanups: AtomicUsize,
}

impl Effect {
    /// Create an effect and run it once.
    pub fn new<F, R>(runtime: &Runtime, mut body: F) -> Self
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let id = NodeId::new();
        runtime.add_node(id, NodeKind::Effect);

        let body: Body = Box::new(move || body().into_cleanup());
        let inner = Arc::new(EffectInner {
            id,
            runtime: runtime.downgrade(),
            body: Mutex::new(Some(body)),
            cleanup: Mutex::new(None),
            disposed: AtomicBool::new(false),
            runs: AtomicUsize::new(0),
            cleanups: AtomicUsize::new(0),
        });
        runtime.attach(id, Slot::Retained(inner.clone()));
        tracing::trace!(node = %id, "effect created");

        runtime.deferred(|| inner.execute(runtime));
        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Stop the effect and run its pending cleanup.
    ///
    /// Idempotent. A panicking cleanup is reported to the runtime and
    /// returned.
    pub fn dispose(&self) -> Result<(), ReactiveError> {
        self.inner.dispose_effect()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// How many times the body has started.
    pub fn run_count(&self) -> usize {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// How many cleanups have run.
    pub fn cleanup_count(&self) -> usize {
        self.inner.cleanups.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("runs", &self.run_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl EffectInner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn execute(&self, runtime: &Runtime) {
        if self.is_disposed() {
            return;
        }
        let pending = self.cleanup.lock().take();
        if let Some(cleanup) = pending {
            // Already reported.
            let _ = self.run_cleanup(cleanup, Some(runtime));
        }

        let Some(mut body) = self.body.lock().take() else {
            // Re-entered from its own run, or disposed by its cleanup.
            return;
        };
        self.runs.fetch_add(1, Ordering::SeqCst);

        let (result, reads) = runtime.run_tracked(self.id, || body());
        match result {
            Ok(cleanup) => {
                if self.is_disposed() {
                    if let Some(cleanup) = cleanup {
                        let _ = self.run_cleanup(cleanup, Some(runtime));
                    }
                } else {
                    runtime.apply_dependencies(self.id, reads);
                    *self.cleanup.lock() = cleanup;
                }
            }
            Err(payload) => {
                if !self.is_disposed() {
                    let mut deps: Reads = runtime.dependencies_of(self.id);
                    for read in reads {
                        if !deps.contains(&read) {
                            deps.push(read);
                        }
                    }
                    runtime.apply_dependencies(self.id, deps);
                }
                runtime.report(ReactiveError::EffectPanicked {
                    node: self.id,
                    message: panic_message(payload.as_ref()),
                });
            }
        }

        if !self.is_disposed() {
            *self.body.lock() = Some(body);
        }
    }

    fn run_cleanup(&self, cleanup: Cleanup, runtime: Option<&Runtime>) -> Result<(), ReactiveError> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        match panic::catch_unwind(AssertUnwindSafe(|| cleanup.run())) {
            Ok(()) => Ok(()),
            Err(payload) => {
                let error = ReactiveError::CleanupPanicked {
                    node: self.id,
                    message: panic_message(payload.as_ref()),
                };
                match runtime {
                    Some(runtime) => runtime.report(error.clone()),
                    None => tracing::warn!(%error, "cleanup failed outside a runtime"),
                }
                Err(error)
            }
        }
    }

    fn dispose_effect(&self) -> Result<(), ReactiveError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let runtime = self.runtime.upgrade();
        if let Some(runtime) = &runtime {
            runtime.unregister(self.id);
        }
        let body = self.body.lock().take();
        drop(body);
        tracing::trace!(node = %self.id, "effect disposed");

        let pending = self.cleanup.lock().take();
        match pending {
            Some(cleanup) => self.run_cleanup(cleanup, runtime.as_ref()),
            None => Ok(()),
        }
    }
}

impl Reactive for EffectInner {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn refresh(&self, runtime: &Runtime) -> bool {
        self.execute(runtime);
        false
    }

    fn notify_subscribers(&self, _runtime: &Runtime) {}

    fn dispose(&self) -> Result<(), ReactiveError> {
        self.dispose_effect()
    }
}

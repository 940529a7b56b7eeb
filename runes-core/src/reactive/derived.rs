//! Derived Values
//!
//! A derived value caches the result of a pure computation over other
//! reactive values.
//!
//! # How Derived Values Work
//!
//! 1. On creation the computation runs once, tracked, to capture its
//!    initial dependencies and value.
//!
//! 2. During a propagation pass it is recomputed at most once, after every
//!    dependency it has in the pass has settled.
//!
//! 3. If the new value is equal to the cached one, nothing downstream of it
//!    runs for that pass.
//!
//! Reading never recomputes: `get` returns the cached value.

use std::fmt::{self, Debug};
use std::panic;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::Reads;
use super::runtime::{NodeHandle, Reactive, Runtime, Slot};
use super::signal::EqualFn;
use super::subscriber::{self, Observable, SubscriberList, Subscription};
use crate::error::{panic_message, ReactiveError};
use crate::graph::{NodeId, NodeKind};

type ComputeFn<T> = Box<dyn Fn() -> T + Send + Sync>;

/// A cached value computed from other reactive values.
///
/// # Example
///
/// ```rust
/// use runes_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(2);
/// let c = count.clone();
/// let doubled = rt.derived(move || c.get() * 2);
///
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<DerivedInner<T>>,
}

struct DerivedInner<T> {
    handle: NodeHandle,
    compute: ComputeFn<T>,
    value: RwLock<T>,
    equal: EqualFn<T>,
    subscribers: Arc<SubscriberList<T>>,
}

impl<T> Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a derived value whose results are compared with `PartialEq`.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        T: PartialEq,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_equality(runtime, compute, |a: &T, b: &T| a == b)
    }

    /// Create a derived value with a custom equality check.
    ///
    /// # Panics
    ///
    /// A panic in the first run of `compute` is propagated to the caller;
    /// there is no value to fall back to.
    pub fn with_equality<F, E>(runtime: &Runtime, compute: F, equal: E) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let id = NodeId::new();
        runtime.add_node(id, NodeKind::Derived);

        let inner = runtime.deferred(|| {
            let (result, reads) = runtime.run_tracked(id, || compute());
            let value = match result {
                Ok(value) => value,
                Err(payload) => {
                    runtime.unregister(id);
                    panic::resume_unwind(payload);
                }
            };
            runtime.apply_dependencies(id, reads);

            let inner = Arc::new(DerivedInner {
                handle: NodeHandle::new(id, runtime),
                compute: Box::new(compute),
                value: RwLock::new(value),
                equal: Arc::new(equal),
                subscribers: Arc::new(SubscriberList::new()),
            });
            let node: Arc<dyn Reactive> = inner.clone();
            runtime.attach(id, Slot::observe(node));
            inner
        });

        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.handle.id()
    }

    /// Get the cached value, recording it as a dependency when tracked.
    pub fn get(&self) -> T {
        if let Some(runtime) = self.inner.handle.runtime() {
            runtime.track_read(self.id());
        }
        self.get_untracked()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Call `callback` with the current value now and with every changed
    /// value afterwards.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let runtime = self.inner.handle.runtime();
        subscriber::attach(
            self.id(),
            &self.inner.subscribers,
            self.get_untracked(),
            callback,
            runtime.as_ref(),
        )
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        if let Some(runtime) = self.inner.handle.runtime() {
            runtime.unregister(self.id());
        }
        self.inner.subscribers.clear();
    }
}

impl<T> Reactive for DerivedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.handle.id()
    }

    fn refresh(&self, runtime: &Runtime) -> bool {
        let id = self.handle.id();
        let (result, reads) = runtime.run_tracked(id, || (self.compute)());

        match result {
            Ok(next) => {
                runtime.apply_dependencies(id, reads);
                let unchanged = (self.equal)(&self.value.read(), &next);
                if unchanged {
                    return false;
                }
                *self.value.write() = next;
                true
            }
            Err(payload) => {
                // Keep the old edges so the next write upstream retries.
                let mut deps: Reads = runtime.dependencies_of(id);
                for read in reads {
                    if !deps.contains(&read) {
                        deps.push(read);
                    }
                }
                runtime.apply_dependencies(id, deps);
                runtime.report(ReactiveError::DerivedPanicked {
                    node: id,
                    message: panic_message(payload.as_ref()),
                });
                false
            }
        }
    }

    fn notify_subscribers(&self, runtime: &Runtime) {
        let value = self.value.read().clone();
        self.subscribers.notify(self.handle.id(), &value, Some(runtime));
    }
}

impl<T> Observable<T> for Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Derived::subscribe(self, callback)
    }
}

impl<T> Clone for Derived<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Derived<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn derived_computes_initial_value() {
        let rt = Runtime::new();
        let signal = rt.signal(10);
        let s = signal.clone();
        let derived = rt.derived(move || s.get() * 2);

        assert_eq!(derived.get(), 20);
    }

    #[test]
    fn derived_recomputes_on_write() {
        let rt = Runtime::new();
        let signal = rt.signal(1);
        let s = signal.clone();
        let derived = rt.derived(move || s.get() + 100);

        signal.set(2);
        assert_eq!(derived.get(), 102);
    }

    #[test]
    fn derived_reads_do_not_recompute() {
        let rt = Runtime::new();
        let signal = rt.signal(1);
        let runs = Arc::new(AtomicI32::new(0));
        let (s, r) = (signal.clone(), runs.clone());
        let derived = rt.derived(move || {
            r.fetch_add(1, Ordering::SeqCst);
            s.get()
        });

        derived.get();
        derived.get();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn derived_chain_propagates() {
        let rt = Runtime::new();
        let base = rt.signal(1);
        let b = base.clone();
        let plus_one = rt.derived(move || b.get() + 1);
        let p = plus_one.clone();
        let times_ten = rt.derived(move || p.get() * 10);

        base.set(4);
        assert_eq!(times_ten.get(), 50);
    }

    #[test]
    fn unchanged_result_skips_subscribers() {
        let rt = Runtime::new();
        let signal = rt.signal(1);
        let s = signal.clone();
        let parity = rt.derived(move || s.get() % 2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = parity.subscribe(move |v| seen_clone.lock().push(*v));

        signal.set(3);
        signal.set(4);

        assert_eq!(*seen.lock(), vec![1, 0]);
    }

    #[test]
    fn panicking_recompute_keeps_cached_value() {
        let rt = Runtime::new();
        let signal = rt.signal(1);
        let s = signal.clone();
        let derived = rt.derived(move || {
            let v = s.get();
            if v == 2 {
                panic!("bad input");
            }
            v * 10
        });

        signal.set(2);
        assert_eq!(derived.get(), 10);
        assert!(matches!(
            rt.take_errors().as_slice(),
            [ReactiveError::DerivedPanicked { .. }]
        ));

        signal.set(3);
        assert_eq!(derived.get(), 30);
    }

    #[test]
    fn panicking_initial_compute_propagates() {
        let rt = Runtime::new();
        let before = rt.node_count();
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            rt.derived(|| -> i32 { panic!("no initial value") })
        }));

        assert!(result.is_err());
        assert_eq!(rt.node_count(), before);
        assert!(!rt.is_batching());
    }

    #[test]
    fn dispose_stops_recomputing() {
        let rt = Runtime::new();
        let signal = rt.signal(1);
        let s = signal.clone();
        let derived = rt.derived(move || s.get());

        derived.dispose();
        signal.set(2);
        assert_eq!(derived.get(), 1);
    }
}

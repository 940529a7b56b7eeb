//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! is a source node in its runtime's dependency graph.
//!
//! # How Signals Work
//!
//! 1. When a signal is read inside a derived computation or an effect, the
//!    read is recorded in that computation's tracking frame.
//!
//! 2. When a signal is set to a value its equality check considers new, the
//!    runtime runs a propagation pass (or queues one inside a batch).
//!
//! 3. Value subscribers are told about the new value once every derived
//!    node of the pass has settled.
//!
//! # Thread Safety
//!
//! The value sits behind a `parking_lot::RwLock`, so handles are
//! `Send + Sync`. Equality checks run under the value lock and must not
//! read the same signal.

use std::fmt::{self, Debug};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::runtime::{NodeHandle, Reactive, Runtime, Slot};
use super::subscriber::{self, Observable, SubscriberList, Subscription};
use crate::graph::{NodeId, NodeKind};

pub(crate) type EqualFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A reactive signal holding a value of type `T`.
///
/// Clones share the same value and node. The node is removed from the
/// runtime when the last clone is dropped or [`dispose`](Self::dispose) is
/// called.
///
/// # Example
///
/// ```rust
/// use runes_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.signal(0);
///
/// count.set(5);
/// count.update(|n| n + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T> {
    handle: NodeHandle,
    value: RwLock<T>,
    /// Value before the first write still queued in the runtime.
    baseline: Mutex<Option<T>>,
    equal: EqualFn<T>,
    subscribers: Arc<SubscriberList<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a signal whose writes are compared with `PartialEq`.
    pub fn new(runtime: &Runtime, value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equality(runtime, value, |a: &T, b: &T| a == b)
    }

    /// Create a signal with a custom equality check.
    ///
    /// A write `equal` considers unchanged is dropped without notifying
    /// anything.
    pub fn with_equality<E>(runtime: &Runtime, value: T, equal: E) -> Self
    where
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let id = NodeId::new();
        runtime.add_node(id, NodeKind::Source);

        let inner = Arc::new(SignalInner {
            handle: NodeHandle::new(id, runtime),
            value: RwLock::new(value),
            baseline: Mutex::new(None),
            equal: Arc::new(equal),
            subscribers: Arc::new(SubscriberList::new()),
        });
        let node: Arc<dyn Reactive> = inner.clone();
        runtime.attach(id, Slot::observe(node));

        Self { inner }
    }

    pub fn id(&self) -> NodeId {
        self.inner.handle.id()
    }

    /// Get the current value.
    ///
    /// Inside a derived computation or an effect this also records the
    /// signal as a dependency.
    pub fn get(&self) -> T {
        if let Some(runtime) = self.inner.handle.runtime() {
            runtime.track_read(self.id());
        }
        self.get_untracked()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Store a new value and propagate it.
    ///
    /// Inside a batch (or while a pass is running) the write is queued and
    /// this returns immediately. Queued writes that end up back at the
    /// value from before the batch notify nothing.
    pub fn set(&self, value: T) {
        let previous = {
            let mut current = self.inner.value.write();
            if (self.inner.equal)(&current, &value) {
                return;
            }
            std::mem::replace(&mut *current, value)
        };

        let id = self.id();
        match self.inner.handle.runtime() {
            Some(runtime) if runtime.contains(id) => {
                self.inner.baseline.lock().get_or_insert(previous);
                runtime.mark_dirty(id);
            }
            runtime => {
                // Detached from the graph: only plain subscribers are left.
                tracing::trace!(node = %id, "write to detached signal");
                self.inner.notify(runtime.as_ref());
            }
        }
    }

    /// Set the value computed from the current one. The read is untracked.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.get_untracked();
        self.set(f(&current));
    }

    /// Call `callback` with the current value now and with every new value
    /// afterwards.
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

    /// Remove the node from the graph and drop every subscriber.
    ///
    /// The handle keeps working as a plain value cell.
    pub fn dispose(&self) {
        if let Some(runtime) = self.inner.handle.runtime() {
            runtime.unregister(self.id());
        }
        self.inner.subscribers.clear();
    }
}

impl<T> SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn notify(&self, runtime: Option<&Runtime>) {
        let value = self.value.read().clone();
        self.subscribers.notify(self.handle.id(), &value, runtime);
    }
}

impl<T> Reactive for SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.handle.id()
    }

    // Sources are written, never recomputed.
    fn refresh(&self, _runtime: &Runtime) -> bool {
        false
    }

    fn notify_subscribers(&self, runtime: &Runtime) {
        self.notify(Some(runtime));
    }

    fn settle_write(&self) -> bool {
        let Some(baseline) = self.baseline.lock().take() else {
            return true;
        };
        !(self.equal)(&baseline, &self.value.read())
    }
}

impl<T> Observable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Signal::subscribe(self, callback)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

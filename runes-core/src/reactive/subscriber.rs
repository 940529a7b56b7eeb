//! Value subscribers.
//!
//! Signals and derived values keep an ordered list of plain callbacks next to
//! their graph edges. Callbacks are told about new values after a pass has
//! settled every derived node, so they never observe a partial update.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::runtime::Runtime;
use crate::error::{panic_message, ReactiveError};
use crate::graph::NodeId;

/// Unique identifier for a value subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Anything that can push its values to callbacks.
pub trait Observable<T> {
    /// Call `callback` with the current value now, then once per new value.
    fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static;
}

/// Insertion-ordered callback set owned by one node.
pub(crate) struct SubscriberList<T> {
    entries: Mutex<IndexMap<SubscriptionId, Callback<T>>>,
}

impl<T: 'static> SubscriberList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn insert(&self, callback: Callback<T>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.insert_as(id, callback);
        id
    }

    pub(crate) fn insert_as(&self, id: SubscriptionId, callback: Callback<T>) {
        self.entries.lock().insert(id, callback);
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        self.entries.lock().shift_remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn clear(&self) {
        let drained = std::mem::take(&mut *self.entries.lock());
        drop(drained);
    }

    /// Call every subscriber with `value`.
    ///
    /// Iterates a snapshot so callbacks may subscribe or unsubscribe freely;
    /// an entry removed by an earlier callback is skipped.
    pub(crate) fn notify(&self, node: NodeId, value: &T, runtime: Option<&Runtime>) {
        let snapshot: Vec<(SubscriptionId, Callback<T>)> = self
            .entries
            .lock()
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        for (id, callback) in snapshot {
            if !self.contains(id) {
                continue;
            }
            invoke(node, id, &callback, value, runtime);
        }
    }
}

/// Run one callback, isolating a panic.
pub(crate) fn invoke<T>(
    node: NodeId,
    id: SubscriptionId,
    callback: &Callback<T>,
    value: &T,
    runtime: Option<&Runtime>,
) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
        let error = ReactiveError::SubscriberPanicked {
            node,
            subscription: id,
            message: panic_message(payload.as_ref()),
        };
        match runtime {
            Some(runtime) => runtime.report(error),
            None => tracing::warn!(%error, "subscriber failed outside a runtime"),
        }
    }
}

/// Deliver `current` to a new callback, then register it.
///
/// The callback does not see writes it makes during its first call.
pub(crate) fn attach<T, F>(
    node: NodeId,
    list: &Arc<SubscriberList<T>>,
    current: T,
    callback: F,
    runtime: Option<&Runtime>,
) -> Subscription
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Send + Sync + 'static,
{
    let id = SubscriptionId::new();
    let callback: Callback<T> = Arc::new(callback);
    invoke(node, id, &callback, &current, runtime);
    list.insert_as(id, callback);
    Subscription::new(node, id, list)
}

/// Handle returned by `subscribe`.
///
/// Dropping it leaves the callback registered; removal is always explicit
/// through [`unsubscribe`](Self::unsubscribe). Clones share the same
/// registration.
#[derive(Clone)]
#[must_use = "a subscription stays registered until `unsubscribe` is called"]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
    id: SubscriptionId,
    node: NodeId,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub(crate) fn new<T>(node: NodeId, id: SubscriptionId, list: &Arc<SubscriberList<T>>) -> Self
    where
        T: Send + Sync + 'static,
    {
        let list: Weak<SubscriberList<T>> = Arc::downgrade(list);
        let detach = move || {
            if let Some(list) = list.upgrade() {
                list.remove(id);
            }
        };
        Self {
            inner: Arc::new(SubscriptionInner {
                id,
                node,
                detach: Mutex::new(Some(Box::new(detach))),
            }),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    /// The node this subscription listens to.
    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    /// Remove the callback. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        let detach = self.inner.detach.lock().take();
        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.detach.lock().is_some()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("node", &self.inner.node)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn subscription_ids_are_unique() {
        let id1 = SubscriptionId::new();
        let id2 = SubscriptionId::new();
        let id3 = SubscriptionId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn notify_calls_in_insertion_order() {
        let list = SubscriberList::<i32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            list.insert(Arc::new(move |v: &i32| seen.lock().push(format!("{tag}{v}"))));
        }

        list.notify(NodeId::new(), &7, None);
        assert_eq!(*seen.lock(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let list = Arc::new(SubscriberList::<i32>::new());
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let id = list.insert(Arc::new(move |_: &i32| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let subscription = Subscription::new(NodeId::new(), id, &list);

        assert!(subscription.is_active());
        subscription.unsubscribe();
        subscription.unsubscribe();
        assert!(!subscription.is_active());
        assert_eq!(list.len(), 0);

        list.notify(NodeId::new(), &1, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn removal_during_notify_skips_removed_entry() {
        let list = Arc::new(SubscriberList::<i32>::new());
        let calls = Arc::new(AtomicI32::new(0));

        let victim_slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let list_weak = Arc::downgrade(&list);
        let slot = victim_slot.clone();
        list.insert(Arc::new(move |_: &i32| {
            if let (Some(list), Some(id)) = (list_weak.upgrade(), *slot.lock()) {
                list.remove(id);
            }
        }));

        let calls_clone = calls.clone();
        let victim = list.insert(Arc::new(move |_: &i32| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        *victim_slot.lock() = Some(victim);

        list.notify(NodeId::new(), &1, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn panicking_callback_does_not_stop_others() {
        let list = SubscriberList::<i32>::new();
        let calls = Arc::new(AtomicI32::new(0));

        list.insert(Arc::new(|_: &i32| panic!("subscriber failure")));
        let calls_clone = calls.clone();
        list.insert(Arc::new(move |_: &i32| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        list.notify(NodeId::new(), &1, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, derived
//! values and effects. It owns the dependency graph, the tracking stack, the
//! batch frame and the error sink, and it runs propagation passes.
//!
//! # How It Works
//!
//! 1. Every signal, derived value and effect registers a node with the
//!    runtime that created it.
//!
//! 2. When a derived value or effect runs, its reads are collected in a
//!    tracking frame and diffed into the graph afterwards.
//!
//! 3. When a signal's value changes, the runtime either queues it (inside a
//!    batch or a running pass) or flushes immediately. A flush:
//!    a. Collects everything reachable from the written signals
//!    b. Orders it topologically, failing on cycles
//!    c. Recomputes each affected derived value once, in order, settling
//!       first any dependency it picks up that the pass has not reached
//!    d. Notifies value subscribers of every node that changed
//!    e. Runs each affected effect once
//!    Writes made during (d) or (e) start another pass of the same flush.
//!
//! # Locking
//!
//! All state sits behind `parking_lot` locks so handles are `Send + Sync`,
//! but propagation is single-threaded and synchronous. No lock is ever held
//! while user code (computations, effects, callbacks, cleanups) runs, and no
//! two runtime locks are held at once.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};

use super::batch::BatchFrame;
use super::context::{ReactiveContext, Reads, TrackingStack};
use super::derived::Derived;
use super::effect::{Effect, EffectOutput};
use super::signal::Signal;
use crate::config::RuntimeConfig;
use crate::error::{ReactiveCycleError, ReactiveError};
use crate::graph::{Node, NodeId, NodeKind, UpdateScheduler};

/// A node the runtime can drive during a propagation pass.
pub(crate) trait Reactive: Send + Sync {
    /// Get the graph node backing this value.
    fn node_id(&self) -> NodeId;

    /// Re-run the node's computation. Returns whether its value changed.
    fn refresh(&self, runtime: &Runtime) -> bool;

    /// Hand the current value to value subscribers.
    fn notify_subscribers(&self, runtime: &Runtime);

    /// Settle a queued write before a pass picks it up. Returns whether the
    /// value still differs from the one the graph last saw.
    fn settle_write(&self) -> bool {
        true
    }

    /// Release the node during runtime teardown.
    fn dispose(&self) -> Result<(), ReactiveError> {
        Ok(())
    }
}

/// How the registry holds a node.
pub(crate) enum Slot {
    /// Kept alive by the runtime until disposed (effects).
    Retained(Arc<dyn Reactive>),
    /// Alive only while user handles exist (signals, derived values).
    Observed(Weak<dyn Reactive>),
}

impl Slot {
    pub(crate) fn observe(node: Arc<dyn Reactive>) -> Self {
        Slot::Observed(Arc::downgrade(&node))
    }

    fn upgrade(&self) -> Option<Arc<dyn Reactive>> {
        match self {
            Slot::Retained(node) => Some(Arc::clone(node)),
            Slot::Observed(node) => node.upgrade(),
        }
    }
}

type ErrorHandler = Arc<dyn Fn(&ReactiveError) + Send + Sync>;

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    graph: Mutex<UpdateScheduler>,
    registry: Mutex<HashMap<NodeId, Slot>>,
    tracking: Mutex<TrackingStack>,
    batch: Mutex<BatchFrame>,
    errors: Mutex<VecDeque<ReactiveError>>,
    error_handler: RwLock<Option<ErrorHandler>>,
}

/// Handle to a reactive runtime.
///
/// Clones share the same runtime. Every signal, derived value and effect
/// belongs to the runtime it was created on.
///
/// # Example
///
/// ```rust
/// use runes_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let a = rt.signal(1);
/// let b = rt.signal(2);
/// let (a2, b2) = (a.clone(), b.clone());
/// let sum = rt.derived(move || a2.get() + b2.get());
///
/// rt.batch(|| {
///     a.set(10);
///     b.set(20);
/// })
/// .unwrap();
/// assert_eq!(sum.get(), 30);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// Non-owning runtime handle held by nodes.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl WeakRuntime {
    pub(crate) fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

/// Unregisters a signal or derived node once its last handle is dropped.
pub(crate) struct NodeHandle {
    id: NodeId,
    runtime: WeakRuntime,
}

impl NodeHandle {
    pub(crate) fn new(id: NodeId, runtime: &Runtime) -> Self {
        Self {
            id,
            runtime: runtime.downgrade(),
        }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn runtime(&self) -> Option<Runtime> {
        self.runtime.upgrade()
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.unregister(self.id);
        }
    }
}

/// Restores the batch depth even if the batched closure panics.
struct BatchGuard<'a> {
    runtime: &'a Runtime,
    closed: bool,
}

impl<'a> BatchGuard<'a> {
    fn enter(runtime: &'a Runtime) -> Self {
        runtime.inner.batch.lock().enter();
        Self {
            runtime,
            closed: false,
        }
    }

    /// Returns `true` when this was the outermost batch.
    fn exit(mut self) -> bool {
        self.closed = true;
        self.runtime.inner.batch.lock().exit()
    }
}

impl Drop for BatchGuard<'_> {
    // Only reached when the batched closure panicked. Its queued writes are
    // dropped unless a running pass will pick them up.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let discard = {
            let mut batch = self.runtime.inner.batch.lock();
            batch.exit() && !batch.is_deferring()
        };
        if discard {
            self.runtime.discard_writes();
        }
    }
}

/// Bookkeeping for one propagation pass.
struct Pass {
    /// Nodes of the pass not settled yet, in topological order.
    pending: IndexSet<NodeId>,
    /// Nodes being settled right now, innermost last.
    settling: Vec<NodeId>,
    changed: HashSet<NodeId>,
    effects: Vec<NodeId>,
}

/// Clears the propagation flag when a flush ends, however it ends.
struct PropagationGuard<'a>(&'a Runtime);

impl Drop for PropagationGuard<'_> {
    fn drop(&mut self) {
        self.0.inner.batch.lock().set_propagating(false);
    }
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                graph: Mutex::new(UpdateScheduler::new()),
                registry: Mutex::new(HashMap::new()),
                tracking: Mutex::new(TrackingStack::default()),
                batch: Mutex::new(BatchFrame::default()),
                errors: Mutex::new(VecDeque::new()),
                error_handler: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.inner))
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Create a signal compared with `PartialEq`.
    pub fn signal<T>(&self, value: T) -> Signal<T>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        Signal::new(self, value)
    }

    /// Create a signal with a custom equality check.
    pub fn signal_with<T, E>(&self, value: T, equal: E) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Signal::with_equality(self, value, equal)
    }

    /// Create a derived value compared with `PartialEq`.
    pub fn derived<T, F>(&self, compute: F) -> Derived<T>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Derived::new(self, compute)
    }

    /// Create a derived value with a custom equality check.
    pub fn derived_with<T, F, E>(&self, compute: F, equal: E) -> Derived<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Derived::with_equality(self, compute, equal)
    }

    /// Create an effect. It runs once immediately.
    pub fn effect<F, R>(&self, body: F) -> Effect
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        Effect::new(self, body)
    }

    // ------------------------------------------------------------------
    // Batching and tracking
    // ------------------------------------------------------------------

    /// Run `f` with notification deferred, then propagate once.
    ///
    /// Nested calls coalesce into the outermost batch; only its exit
    /// flushes. The error is also reported to the error sink.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> Result<R, ReactiveCycleError> {
        let guard = BatchGuard::enter(self);
        let value = f();
        if guard.exit() {
            self.flush()?;
        }
        Ok(value)
    }

    /// Like [`batch`](Self::batch) for internal callers that only rely on the
    /// error sink.
    pub(crate) fn deferred<R>(&self, f: impl FnOnce() -> R) -> R {
        let guard = BatchGuard::enter(self);
        let value = f();
        if guard.exit() {
            // Failures are already in the error sink.
            let _ = self.flush();
        }
        value
    }

    /// Run `f` without registering any reads as dependencies.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _context = ReactiveContext::enter(&self.inner.tracking, None);
        f()
    }

    pub fn is_batching(&self) -> bool {
        self.inner.batch.lock().depth() > 0
    }

    pub fn is_propagating(&self) -> bool {
        self.inner.batch.lock().is_propagating()
    }

    /// Whether a derived value or effect is currently collecting reads.
    pub fn is_tracking(&self) -> bool {
        self.inner.tracking.lock().current_owner().is_some()
    }

    pub(crate) fn track_read(&self, node: NodeId) {
        self.inner.tracking.lock().record(node);
    }

    /// Run `f` in a tracking frame owned by `owner`, catching panics.
    pub(crate) fn run_tracked<R>(
        &self,
        owner: NodeId,
        f: impl FnOnce() -> R,
    ) -> (std::thread::Result<R>, Reads) {
        let context = ReactiveContext::enter(&self.inner.tracking, Some(owner));
        let result = panic::catch_unwind(AssertUnwindSafe(f));
        (result, context.finish())
    }

    pub(crate) fn apply_dependencies<I>(&self, owner: NodeId, reads: I)
    where
        I: IntoIterator<Item = NodeId>,
    {
        let diff = self.inner.graph.lock().set_dependencies(owner, reads);
        if !diff.is_empty() {
            tracing::trace!(
                node = %owner,
                added = ?diff.added,
                removed = ?diff.removed,
                "dependencies changed"
            );
        }
    }

    pub(crate) fn dependencies_of(&self, node: NodeId) -> Reads {
        self.inner.graph.lock().dependencies_of(node)
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Add a node to the graph without making it reachable for passes yet.
    pub(crate) fn add_node(&self, id: NodeId, kind: NodeKind) {
        self.inner.graph.lock().add_node(Node::with_id(id, kind));
    }

    /// Make a node reachable for propagation.
    pub(crate) fn attach(&self, id: NodeId, slot: Slot) {
        let previous = self.inner.registry.lock().insert(id, slot);
        drop(previous);
    }

    /// Remove a node, its edges and any pending write.
    pub(crate) fn unregister(&self, id: NodeId) {
        let slot = self.inner.registry.lock().remove(&id);
        self.inner.graph.lock().remove_node(id);
        self.inner.batch.lock().forget(id);
        // Dropping a retained node can drop user closures that own other
        // handles; every lock above is already released.
        drop(slot);
    }

    /// Whether a node is still part of the graph.
    pub fn contains(&self, id: NodeId) -> bool {
        self.inner.graph.lock().contains(id)
    }

    fn lookup(&self, id: NodeId) -> Option<Arc<dyn Reactive>> {
        self.inner.registry.lock().get(&id).and_then(Slot::upgrade)
    }

    /// Number of live nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.inner.graph.lock().node_count()
    }

    // ------------------------------------------------------------------
    // Propagation
    // ------------------------------------------------------------------

    /// Record a write to a signal node and flush unless deferred.
    pub(crate) fn mark_dirty(&self, id: NodeId) {
        let flush_now = {
            let mut batch = self.inner.batch.lock();
            batch.mark(id);
            !batch.is_deferring()
        };
        if flush_now {
            // Failures are already in the error sink.
            let _ = self.flush();
        }
    }

    /// Run propagation passes until no writes are pending.
    pub(crate) fn flush(&self) -> Result<(), ReactiveCycleError> {
        {
            let mut batch = self.inner.batch.lock();
            if batch.is_deferring() {
                return Ok(());
            }
            batch.set_propagating(true);
        }
        let _guard = PropagationGuard(self);

        let limit = self.inner.config.max_flush_passes;
        let mut passes = 0;
        loop {
            let dirty = self.take_writes();
            if dirty.is_empty() {
                return Ok(());
            }

            if passes == limit {
                let error = ReactiveCycleError::Unsettled {
                    passes,
                    nodes: dirty.into_iter().collect(),
                };
                self.report(error.clone().into());
                return Err(error);
            }
            passes += 1;

            if let Err(error) = self.propagate(&dirty) {
                self.discard_writes();
                self.report(error.clone().into());
                return Err(error);
            }
        }
    }

    /// Take the queued writes, dropping those that ended up back at the
    /// value the graph last saw.
    fn take_writes(&self) -> IndexSet<NodeId> {
        let mut dirty = self.inner.batch.lock().take_dirty();
        dirty.retain(|id| self.lookup(*id).is_some_and(|node| node.settle_write()));
        dirty
    }

    /// Drop queued writes without propagating them.
    fn discard_writes(&self) {
        let discarded = self.take_writes();
        if !discarded.is_empty() {
            tracing::debug!(writes = discarded.len(), "discarded queued writes");
        }
    }

    /// One ordered pass over everything reachable from `dirty`.
    fn propagate(&self, dirty: &IndexSet<NodeId>) -> Result<(), ReactiveCycleError> {
        let order = {
            let graph = self.inner.graph.lock();
            let closure = graph.reachable_from(dirty);
            graph.topological_order(&closure)?
        };
        tracing::trace!(written = dirty.len(), affected = order.len(), "propagation pass");

        let mut pass = Pass {
            pending: order.iter().copied().filter(|id| !dirty.contains(id)).collect(),
            settling: Vec::new(),
            changed: dirty.iter().copied().collect(),
            effects: Vec::new(),
        };
        for &id in &order {
            self.settle(id, &mut pass)?;
        }

        for &id in order.iter().filter(|id| pass.changed.contains(*id)) {
            if let Some(node) = self.lookup(id) {
                node.notify_subscribers(self);
            }
        }

        for id in pass.effects {
            if let Some(node) = self.lookup(id) {
                node.refresh(self);
            }
        }

        Ok(())
    }

    /// Bring one node of the pass up to date.
    ///
    /// Dependencies still pending are settled first. In topological order
    /// they already are, except for those a derived value picks up while
    /// recomputing; those are settled on demand and the node recomputes.
    fn settle(&self, id: NodeId, pass: &mut Pass) -> Result<(), ReactiveCycleError> {
        if let Some(at) = pass.settling.iter().position(|node| *node == id) {
            let mut nodes = pass.settling[at..].to_vec();
            nodes.sort();
            return Err(ReactiveCycleError::Dependency { nodes });
        }
        if !pass.pending.contains(&id) {
            return Ok(());
        }

        pass.settling.push(id);
        let result = self.settle_node(id, pass);
        pass.settling.pop();
        pass.pending.shift_remove(&id);
        result
    }

    fn settle_node(&self, id: NodeId, pass: &mut Pass) -> Result<(), ReactiveCycleError> {
        let kind = self.inner.graph.lock().kind_of(id);
        let mut deps = self.dependencies_of(id);
        loop {
            for &dep in &deps {
                self.settle(dep, pass)?;
            }
            if !deps.iter().any(|dep| pass.changed.contains(dep)) {
                return Ok(());
            }

            match kind {
                Some(NodeKind::Derived) => {
                    let Some(node) = self.lookup(id) else {
                        return Ok(());
                    };
                    if node.refresh(self) {
                        pass.changed.insert(id);
                    }
                    let next = self.dependencies_of(id);
                    let stale = next
                        .iter()
                        .any(|dep| pass.pending.contains(dep) && !deps.contains(dep));
                    if !stale {
                        return Ok(());
                    }
                    tracing::trace!(node = %id, "new dependency still pending, recomputing");
                    deps = next;
                }
                Some(NodeKind::Effect) => {
                    pass.effects.push(id);
                    return Ok(());
                }
                Some(NodeKind::Source) | None => return Ok(()),
            }
        }
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Install a handler called for every isolated failure.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&ReactiveError) + Send + Sync + 'static,
    {
        *self.inner.error_handler.write() = Some(Arc::new(handler));
    }

    /// Drain the retained isolated failures, oldest first.
    pub fn take_errors(&self) -> Vec<ReactiveError> {
        self.inner.errors.lock().drain(..).collect()
    }

    pub(crate) fn report(&self, error: ReactiveError) {
        match &error {
            ReactiveError::Cycle(_) => tracing::error!(%error, "reactive cycle"),
            _ => tracing::warn!(%error, "isolated reactive failure"),
        }

        let handler = self.inner.error_handler.read().clone();
        if let Some(handler) = handler {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&error))).is_err() {
                tracing::warn!("reactive error handler panicked");
            }
        }

        let capacity = self.inner.config.error_history;
        if capacity == 0 {
            return;
        }
        let mut errors = self.inner.errors.lock();
        while errors.len() >= capacity {
            errors.pop_front();
        }
        errors.push_back(error);
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Dispose every effect and forget every node.
    ///
    /// Effect cleanups run (failures go to the error sink). Signals and
    /// derived values keep their last value but stop propagating.
    pub fn teardown(&self) {
        let retained: Vec<Arc<dyn Reactive>> = self
            .inner
            .registry
            .lock()
            .values()
            .filter_map(|slot| match slot {
                Slot::Retained(node) => Some(Arc::clone(node)),
                Slot::Observed(_) => None,
            })
            .collect();

        let disposed = retained.len();
        for node in &retained {
            tracing::trace!(node = %node.node_id(), "disposing effect");
            // Failures are already in the error sink.
            let _ = node.dispose();
        }
        drop(retained);

        let registry = std::mem::take(&mut *self.inner.registry.lock());
        self.inner.graph.lock().clear();
        self.inner.tracking.lock().clear();
        *self.inner.batch.lock() = BatchFrame::default();
        drop(registry);

        tracing::debug!(effects = disposed, "runtime torn down");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("nodes", &self.node_count())
            .field("batching", &self.is_batching())
            .field("propagating", &self.is_propagating())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct MockReactive {
        id: NodeId,
        refreshes: AtomicI32,
        notifications: AtomicI32,
        changes: bool,
    }

    impl MockReactive {
        fn new(changes: bool) -> Arc<Self> {
            Arc::new(Self {
                id: NodeId::new(),
                refreshes: AtomicI32::new(0),
                notifications: AtomicI32::new(0),
                changes,
            })
        }
    }

    impl Reactive for MockReactive {
        fn node_id(&self) -> NodeId {
            self.id
        }

        fn refresh(&self, _runtime: &Runtime) -> bool {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            self.changes
        }

        fn notify_subscribers(&self, _runtime: &Runtime) {
            self.notifications.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn install(runtime: &Runtime, node: &Arc<MockReactive>, kind: NodeKind) {
        runtime.add_node(node.node_id(), kind);
        let dyn_node: Arc<dyn Reactive> = node.clone();
        runtime.attach(node.node_id(), Slot::observe(dyn_node));
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let runtime = Runtime::new();
        let node = MockReactive::new(false);
        install(&runtime, &node, NodeKind::Source);
        assert!(runtime.contains(node.id));

        runtime.unregister(node.id);
        assert!(!runtime.contains(node.id));
        assert!(runtime.lookup(node.id).is_none());
    }

    #[test]
    fn unchanged_derived_stops_the_cascade() {
        let runtime = Runtime::new();
        let source = MockReactive::new(false);
        let derived = MockReactive::new(false);
        let effect = MockReactive::new(false);
        install(&runtime, &source, NodeKind::Source);
        install(&runtime, &derived, NodeKind::Derived);
        install(&runtime, &effect, NodeKind::Effect);
        runtime.apply_dependencies(derived.id, [source.id]);
        runtime.apply_dependencies(effect.id, [derived.id]);

        runtime.mark_dirty(source.id);

        assert_eq!(derived.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(effect.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(source.notifications.load(Ordering::SeqCst), 1);
        assert_eq!(derived.notifications.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn changed_derived_reaches_effect() {
        let runtime = Runtime::new();
        let source = MockReactive::new(false);
        let derived = MockReactive::new(true);
        let effect = MockReactive::new(false);
        install(&runtime, &source, NodeKind::Source);
        install(&runtime, &derived, NodeKind::Derived);
        install(&runtime, &effect, NodeKind::Effect);
        runtime.apply_dependencies(derived.id, [source.id]);
        runtime.apply_dependencies(effect.id, [derived.id, source.id]);

        runtime.mark_dirty(source.id);

        assert_eq!(derived.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(effect.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(derived.notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn batch_defers_until_outermost_exit() {
        let runtime = Runtime::new();
        let source = MockReactive::new(false);
        install(&runtime, &source, NodeKind::Source);

        runtime
            .batch(|| {
                runtime.mark_dirty(source.id);
                runtime
                    .batch(|| runtime.mark_dirty(source.id))
                    .unwrap();
                assert!(runtime.is_batching());
                assert_eq!(source.notifications.load(Ordering::SeqCst), 0);
            })
            .unwrap();

        assert!(!runtime.is_batching());
        assert_eq!(source.notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_history_is_bounded() {
        let runtime = Runtime::with_config(RuntimeConfig {
            error_history: 2,
            ..RuntimeConfig::default()
        });
        for n in 0..3 {
            runtime.report(ReactiveError::EffectPanicked {
                node: NodeId::new(),
                message: n.to_string(),
            });
        }

        let errors = runtime.take_errors();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            ReactiveError::EffectPanicked { message, .. } if message == "1"
        ));
        assert!(runtime.take_errors().is_empty());
    }

    #[test]
    fn error_handler_sees_reports() {
        let runtime = Runtime::new();
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();
        runtime.on_error(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        runtime.report(ReactiveError::DerivedPanicked {
            node: NodeId::new(),
            message: "x".into(),
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}

//! Per-instance ownership of reactive resources.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{panic_message, TeardownFailure};
use crate::lifecycle::InstanceId;
use crate::reactive::{Derived, Effect, EffectOutput, Observable, Runtime, Signal, Subscription};

type TeardownFn = Box<dyn FnOnce() -> Result<(), String> + Send>;

struct TeardownEntry {
    label: String,
    run: TeardownFn,
}

/// Creates reactive resources on behalf of one component instance and
/// tears all of them down together.
///
/// Everything made through a scope (signals, derived values, effects,
/// subscriptions, plain cleanups) is released by [`destroy`](Self::destroy)
/// in reverse creation order. Dropping a scope that was never destroyed
/// destroys it.
///
/// # Example
///
/// ```rust
/// use runes_core::component::ComponentScope;
/// use runes_core::reactive::Runtime;
///
/// let rt = Runtime::new();
/// let scope = ComponentScope::new(&rt);
/// let count = scope.state(0);
/// let c = count.clone();
/// let doubled = scope.derived(move || c.get() * 2);
///
/// count.set(4);
/// assert_eq!(doubled.get(), 8);
///
/// assert!(scope.destroy().is_empty());
/// assert_eq!(scope.owned_count(), 0);
/// ```
pub struct ComponentScope {
    runtime: Runtime,
    owner: Option<InstanceId>,
    teardown: Mutex<Vec<TeardownEntry>>,
    destroyed: AtomicBool,
}

impl ComponentScope {
    /// Create a scope not tied to any instance.
    pub fn new(runtime: &Runtime) -> Self {
        Self::with_owner(runtime, None)
    }

    pub(crate) fn for_instance(runtime: &Runtime, owner: InstanceId) -> Self {
        Self::with_owner(runtime, Some(owner))
    }

    fn with_owner(runtime: &Runtime, owner: Option<InstanceId>) -> Self {
        Self {
            runtime: runtime.clone(),
            owner,
            teardown: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The instance this scope belongs to, if any.
    pub fn owner(&self) -> Option<InstanceId> {
        self.owner
    }

    /// Create owned state compared with `PartialEq`.
    pub fn state<T>(&self, value: T) -> Signal<T>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
    {
        self.own_signal(self.runtime.signal(value))
    }

    /// Create owned state with a custom equality check.
    pub fn state_with<T, E>(&self, value: T, equal: E) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
        E: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.own_signal(self.runtime.signal_with(value, equal))
    }

    /// Create an owned derived value.
    pub fn derived<T, F>(&self, compute: F) -> Derived<T>
    where
        T: Clone + Send + Sync + PartialEq + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let derived = self.runtime.derived(compute);
        let owned = derived.clone();
        self.register(format!("derived {}", derived.id()), move || {
            owned.dispose();
            Ok(())
        });
        derived
    }

    /// Create an owned effect. It is disposed (running its cleanup) when the
    /// scope is destroyed.
    pub fn effect<F, R>(&self, body: F) -> Effect
    where
        F: FnMut() -> R + Send + 'static,
        R: EffectOutput,
    {
        let effect = self.runtime.effect(body);
        let owned = effect.clone();
        self.register(format!("effect {}", effect.id()), move || {
            owned.dispose().map_err(|error| error.to_string())
        });
        effect
    }

    /// Subscribe to `source` for as long as the scope lives.
    pub fn subscribe<T, O, F>(&self, source: &O, callback: F) -> Subscription
    where
        O: Observable<T>,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let subscription = source.subscribe(callback);
        let owned = subscription.clone();
        self.register(format!("subscription {}", subscription.id()), move || {
            owned.unsubscribe();
            Ok(())
        });
        subscription
    }

    /// Run `f` when the scope is destroyed.
    pub fn on_cleanup<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.register("on_cleanup".to_string(), move || {
            f();
            Ok(())
        });
    }

    /// Number of resources waiting for teardown.
    pub fn owned_count(&self) -> usize {
        self.teardown.lock().len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Tear down everything the scope owns, newest first.
    ///
    /// Every step runs even when earlier ones fail or panic; the failures are
    /// returned. Writes made by cleanups are batched into one pass. Calling
    /// this again does nothing.
    pub fn destroy(&self) -> Vec<TeardownFailure> {
        let entries = {
            let mut teardown = self.teardown.lock();
            if self.destroyed.swap(true, Ordering::SeqCst) {
                return Vec::new();
            }
            std::mem::take(&mut *teardown)
        };
        let owned = entries.len();

        let mut failures = Vec::new();
        let flushed = self.runtime.batch(|| {
            for entry in entries.into_iter().rev() {
                if let Some(failure) = run_entry(entry) {
                    failures.push(failure);
                }
            }
        });
        if let Err(error) = flushed {
            failures.push(TeardownFailure {
                label: "flush".to_string(),
                message: error.to_string(),
            });
        }

        tracing::debug!(
            owner = ?self.owner,
            owned,
            failed = failures.len(),
            "scope destroyed"
        );
        failures
    }

    fn own_signal<T>(&self, signal: Signal<T>) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let owned = signal.clone();
        self.register(format!("signal {}", signal.id()), move || {
            owned.dispose();
            Ok(())
        });
        signal
    }

    fn register<F>(&self, label: String, run: F)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        let entry = TeardownEntry {
            label,
            run: Box::new(run),
        };
        let late = {
            let mut teardown = self.teardown.lock();
            if self.is_destroyed() {
                Some(entry)
            } else {
                teardown.push(entry);
                None
            }
        };

        // Destroyed scopes own nothing.
        if let Some(entry) = late {
            run_entry(entry);
        }
    }
}

fn run_entry(entry: TeardownEntry) -> Option<TeardownFailure> {
    let TeardownEntry { label, run } = entry;
    let message = match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => return None,
        Ok(Err(message)) => message,
        Err(payload) => panic_message(payload.as_ref()),
    };
    let failure = TeardownFailure { label, message };
    tracing::warn!(%failure, "teardown step failed");
    Some(failure)
}

impl Drop for ComponentScope {
    fn drop(&mut self) {
        if !self.is_destroyed() {
            self.destroy();
        }
    }
}

impl fmt::Debug for ComponentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentScope")
            .field("owner", &self.owner)
            .field("owned", &self.owned_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

//! The lifecycle manager.
//!
//! Drives component instances through mount, update and unmount, enforcing
//! the phase table in [`LifecyclePhase`] and keeping one phase record per
//! mounted instance.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::id::{InstanceId, InstanceIdGenerator, SequentialIds};
use super::phase::{LifecycleOperation, LifecyclePhase};
use crate::component::{ComponentInstance, ComponentScope, LifecycleHooks};
use crate::error::{panic_message, BoxError, LifecycleCause, LifecycleError, StateAccessError, TeardownFailure};
use crate::reactive::Runtime;

/// Mounts, updates and unmounts component instances.
///
/// # Example
///
/// ```rust
/// use runes_core::component::{Component, ComponentInstance, ComponentScope, LifecycleHooks};
/// use runes_core::error::BoxError;
/// use runes_core::lifecycle::{LifecycleManager, LifecyclePhase};
/// use runes_core::reactive::Runtime;
///
/// struct Greeting;
///
/// impl Component for Greeting {
///     type Props = String;
///     type State = String;
///     type View = String;
///
///     fn init(&mut self, name: &String, _: &ComponentScope) -> Result<String, BoxError> {
///         Ok(format!("Hello, {name}"))
///     }
///
///     fn update(&mut self, name: &String, _: &String, _: &ComponentScope) -> Result<String, BoxError> {
///         Ok(format!("Hello again, {name}"))
///     }
///
///     fn render(&self, _: &String, text: &String) -> String {
///         text.clone()
///     }
/// }
///
/// impl LifecycleHooks for Greeting {}
///
/// let manager = LifecycleManager::new(&Runtime::new());
/// let mut greeting = ComponentInstance::new(Greeting);
///
/// manager.mount(&mut greeting, "Ada".to_string()).unwrap();
/// assert_eq!(greeting.render().unwrap(), "Hello, Ada");
///
/// manager.unmount(&mut greeting).unwrap();
/// assert_eq!(greeting.phase(), LifecyclePhase::Unmounted);
/// ```
pub struct LifecycleManager {
    runtime: Runtime,
    ids: Box<dyn InstanceIdGenerator>,
    phases: Mutex<IndexMap<InstanceId, LifecyclePhase>>,
}

impl LifecycleManager {
    pub fn new(runtime: &Runtime) -> Self {
        Self::with_id_generator(runtime, SequentialIds::new())
    }

    pub fn with_id_generator<G>(runtime: &Runtime, ids: G) -> Self
    where
        G: InstanceIdGenerator + 'static,
    {
        Self {
            runtime: runtime.clone(),
            ids: Box::new(ids),
            phases: Mutex::new(IndexMap::new()),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The recorded phase of a tracked instance.
    pub fn phase(&self, id: InstanceId) -> Option<LifecyclePhase> {
        self.phases.lock().get(&id).copied()
    }

    /// Every tracked instance and its phase, in mount order.
    pub fn tracked(&self) -> Vec<(InstanceId, LifecyclePhase)> {
        self.phases
            .lock()
            .iter()
            .map(|(id, phase)| (*id, *phase))
            .collect()
    }

    pub fn is_tracking(&self, id: InstanceId) -> bool {
        self.phases.lock().contains_key(&id)
    }

    /// Assign an id, run `init` and `on_mount`, and end in `Mounted`.
    ///
    /// A failing step leaves the instance in `Error`; it can still be
    /// unmounted to release whatever it created.
    pub fn mount<C>(&self, instance: &mut ComponentInstance<C>, props: C::Props) -> Result<(), LifecycleError>
    where
        C: LifecycleHooks,
    {
        const OP: LifecycleOperation = LifecycleOperation::Mount;

        if instance.id.is_some() {
            return Err(self.reject(instance, OP, LifecycleCause::AlreadyMounted));
        }
        let id = self.ids.next_id();
        instance.id = Some(id);
        instance.phase = LifecyclePhase::Initializing;
        self.phases.lock().insert(id, LifecyclePhase::Initializing);

        let span = tracing::debug_span!("mount", instance = %id);
        let _enter = span.enter();

        self.transition(instance, LifecyclePhase::Mounting, OP)?;
        let scope = ComponentScope::for_instance(&self.runtime, id);

        let init = run_hook(|| instance.component.init(&props, &scope));
        let state = match init {
            Ok(state) => state,
            Err(source) => {
                instance.props = Some(props);
                instance.scope = Some(scope);
                return Err(self.fail(instance, OP, LifecycleCause::hook("init", source)));
            }
        };

        let mounted = run_hook(|| instance.component.on_mount(&props, &state, &scope));
        instance.props = Some(props);
        instance.state = Some(state);
        instance.scope = Some(scope);
        if let Err(source) = mounted {
            return Err(self.fail(instance, OP, LifecycleCause::hook("on_mount", source)));
        }

        self.transition(instance, LifecyclePhase::Mounted, OP)
    }

    /// Compute the next state from `props` and run `on_update`.
    ///
    /// On failure the previous props and state stay in place and the
    /// instance moves to `Error`.
    pub fn update<C>(&self, instance: &mut ComponentInstance<C>, props: C::Props) -> Result<(), LifecycleError>
    where
        C: LifecycleHooks,
    {
        const OP: LifecycleOperation = LifecycleOperation::Update;

        let Some(id) = instance.id else {
            return Err(self.reject(instance, OP, LifecycleCause::NotMounted));
        };
        let span = tracing::debug_span!("update", instance = %id);
        let _enter = span.enter();

        let phase = instance.phase;
        match phase {
            LifecyclePhase::Mounted => self.transition(instance, LifecyclePhase::Updating, OP)?,
            LifecyclePhase::Updating => {}
            from => return Err(self.reject(instance, OP, LifecycleCause::InvalidPhase { from })),
        }

        match Self::run_update(instance, &props) {
            Ok(next) => {
                instance.props = Some(props);
                instance.state = Some(next);
                self.transition(instance, LifecyclePhase::Mounted, OP)
            }
            Err(cause) => Err(self.fail(instance, OP, cause)),
        }
    }

    fn run_update<C>(instance: &mut ComponentInstance<C>, props: &C::Props) -> Result<C::State, LifecycleCause>
    where
        C: LifecycleHooks,
    {
        let from = instance.phase;
        let ComponentInstance {
            component,
            state,
            scope,
            ..
        } = instance;
        let (Some(prev), Some(scope)) = (state.as_ref(), scope.as_ref()) else {
            return Err(LifecycleCause::InvalidPhase { from });
        };

        let next = run_hook(|| component.update(props, prev, scope))
            .map_err(|source| LifecycleCause::hook("update", source))?;
        run_hook(|| component.on_update(props, &next, prev, scope))
            .map_err(|source| LifecycleCause::hook("on_update", source))?;
        Ok(next)
    }

    /// Run `on_unmount`, `cleanup` and scope teardown, then forget the
    /// instance.
    ///
    /// Every step runs even if earlier ones fail. Failures are returned
    /// together as [`LifecycleCause::Teardown`] after the instance has
    /// passed through `Error` to `Unmounted`.
    pub fn unmount<C>(&self, instance: &mut ComponentInstance<C>) -> Result<(), LifecycleError>
    where
        C: LifecycleHooks,
    {
        const OP: LifecycleOperation = LifecycleOperation::Unmount;

        let Some(id) = instance.id else {
            return Err(self.reject(instance, OP, LifecycleCause::NotMounted));
        };
        let span = tracing::debug_span!("unmount", instance = %id);
        let _enter = span.enter();

        self.transition(instance, LifecyclePhase::Unmounting, OP)?;

        let mut failures = Vec::new();
        if let Some(state) = instance.state.as_mut() {
            if let Err(source) = run_hook(|| instance.component.on_unmount(state)) {
                failures.push(teardown_failure("on_unmount", &source));
            }
            if let Err(source) = run_hook(|| instance.component.cleanup(state)) {
                failures.push(teardown_failure("cleanup", &source));
            }
        }
        if let Some(scope) = instance.scope.take() {
            failures.extend(scope.destroy());
        }

        if !failures.is_empty() {
            self.transition(instance, LifecyclePhase::Error, OP)?;
        }
        self.transition(instance, LifecyclePhase::Unmounted, OP)?;
        self.phases.lock().shift_remove(&id);
        instance.state = None;
        instance.props = None;

        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            tracing::warn!(instance = %id, %failure, "unmount step failed");
        }
        let error = LifecycleError {
            instance_id: Some(id),
            phase: Some(LifecyclePhase::Unmounting),
            operation: OP,
            cause: LifecycleCause::Teardown { failures },
        };
        instance.last_error = Some(error.clone());
        Err(error)
    }

    /// Render an instance that is mounted or updating.
    pub fn render<C>(&self, instance: &ComponentInstance<C>) -> Result<C::View, StateAccessError>
    where
        C: LifecycleHooks,
    {
        instance.render()
    }

    /// Forget every tracked instance. Returns the ids that were still
    /// tracked; each one is a component that was never unmounted.
    pub fn teardown(&self) -> Vec<InstanceId> {
        let leaked = std::mem::take(&mut *self.phases.lock());
        for (id, phase) in &leaked {
            tracing::warn!(instance = %id, %phase, "instance still tracked at teardown");
        }
        leaked.into_keys().collect()
    }

    fn transition<C>(
        &self,
        instance: &mut ComponentInstance<C>,
        next: LifecyclePhase,
        operation: LifecycleOperation,
    ) -> Result<(), LifecycleError>
    where
        C: LifecycleHooks,
    {
        let from = instance.phase;
        if !from.can_transition_to(next) {
            return Err(self.reject(instance, operation, LifecycleCause::InvalidPhase { from }));
        }
        instance.phase = next;
        if let Some(id) = instance.id {
            self.phases.lock().insert(id, next);
        }
        tracing::debug!(instance = ?instance.id, %from, to = %next, "lifecycle transition");
        Ok(())
    }

    /// Move to `Error` (when the table allows it) and keep the error.
    fn fail<C>(
        &self,
        instance: &mut ComponentInstance<C>,
        operation: LifecycleOperation,
        cause: LifecycleCause,
    ) -> LifecycleError
    where
        C: LifecycleHooks,
    {
        let from = instance.phase;
        if from.can_transition_to(LifecyclePhase::Error) {
            instance.phase = LifecyclePhase::Error;
            if let Some(id) = instance.id {
                self.phases.lock().insert(id, LifecyclePhase::Error);
            }
        }
        let error = LifecycleError {
            instance_id: instance.id,
            phase: Some(from),
            operation,
            cause,
        };
        tracing::warn!(%error, "lifecycle operation failed");
        instance.last_error = Some(error.clone());
        error
    }

    /// Build an error without touching the instance.
    fn reject<C>(
        &self,
        instance: &ComponentInstance<C>,
        operation: LifecycleOperation,
        cause: LifecycleCause,
    ) -> LifecycleError
    where
        C: LifecycleHooks,
    {
        let phase = instance.id.and_then(|id| self.phase(id));
        let error = LifecycleError {
            instance_id: instance.id,
            phase,
            operation,
            cause,
        };
        tracing::debug!(%error, "lifecycle operation rejected");
        error
    }
}

impl fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("tracked", &self.phases.lock().len())
            .finish()
    }
}

/// Run a component body, turning a panic into an error.
fn run_hook<T>(f: impl FnOnce() -> Result<T, BoxError>) -> Result<T, BoxError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(panic_message(payload.as_ref()).into()),
    }
}

fn teardown_failure(label: &str, source: &BoxError) -> TeardownFailure {
    TeardownFailure {
        label: label.to_string(),
        message: source.to_string(),
    }
}

//! Integration Tests for Component Lifecycle
//!
//! These tests drive components through the lifecycle manager and check that
//! their reactive resources live and die with them.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use runes_core::component::{Component, ComponentInstance, ComponentScope, LifecycleHooks};
use runes_core::error::{BoxError, LifecycleCause};
use runes_core::lifecycle::{LifecycleManager, LifecycleOperation, LifecyclePhase};
use runes_core::reactive::{Cleanup, Runtime, Signal};

type Journal = Arc<Mutex<Vec<String>>>;

/// A counter that keeps its count in a signal and logs every render-worthy
/// change through an effect.
struct Counter {
    journal: Journal,
    fail_on_mount: bool,
    fail_on_unmount: bool,
}

impl Counter {
    fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail_on_mount: false,
            fail_on_unmount: false,
        }
    }
}

struct CounterState {
    count: Signal<i32>,
    step: i32,
}

impl Component for Counter {
    type Props = i32;
    type State = CounterState;
    type View = String;

    fn init(&mut self, step: &i32, scope: &ComponentScope) -> Result<CounterState, BoxError> {
        let count = scope.state(0);
        let c = count.clone();
        let journal = self.journal.clone();
        scope.effect(move || {
            let value = c.get();
            journal.lock().push(format!("effect {value}"));
            let journal = journal.clone();
            Cleanup::new(move || journal.lock().push(format!("cleanup {value}")))
        });
        Ok(CounterState { count, step: *step })
    }

    fn update(
        &mut self,
        step: &i32,
        state: &CounterState,
        _scope: &ComponentScope,
    ) -> Result<CounterState, BoxError> {
        if *step == 0 {
            return Err("step must not be zero".into());
        }
        Ok(CounterState {
            count: state.count.clone(),
            step: *step,
        })
    }

    fn render(&self, _step: &i32, state: &CounterState) -> String {
        format!("{} (+{})", state.count.get_untracked(), state.step)
    }

    fn cleanup(&mut self, _state: &mut CounterState) -> Result<(), BoxError> {
        self.journal.lock().push("component cleanup".to_string());
        Ok(())
    }
}

impl LifecycleHooks for Counter {
    fn on_mount(&mut self, _step: &i32, _state: &CounterState, _scope: &ComponentScope) -> Result<(), BoxError> {
        if self.fail_on_mount {
            return Err("mount hook refused".into());
        }
        self.journal.lock().push("mounted".to_string());
        Ok(())
    }

    fn on_update(
        &mut self,
        _step: &i32,
        next: &CounterState,
        prev: &CounterState,
        _scope: &ComponentScope,
    ) -> Result<(), BoxError> {
        self.journal
            .lock()
            .push(format!("step {} -> {}", prev.step, next.step));
        Ok(())
    }

    fn on_unmount(&mut self, _state: &CounterState) -> Result<(), BoxError> {
        if self.fail_on_unmount {
            panic!("unmount hook exploded");
        }
        self.journal.lock().push("unmounting".to_string());
        Ok(())
    }
}

#[test]
fn full_lifecycle_owns_reactive_resources() {
    let rt = Runtime::new();
    let manager = LifecycleManager::new(&rt);
    let journal = Journal::default();
    let mut instance = ComponentInstance::new(Counter::new(&journal));

    manager.mount(&mut instance, 1).unwrap();
    assert_eq!(instance.phase(), LifecyclePhase::Mounted);
    assert_eq!(instance.scope().map(|s| s.owned_count()), Some(2));

    let count = instance.state().unwrap().count.clone();
    count.set(5);
    assert_eq!(manager.render(&instance).unwrap(), "5 (+1)");

    manager.update(&mut instance, 2).unwrap();
    assert_eq!(instance.render().unwrap(), "5 (+2)");

    manager.unmount(&mut instance).unwrap();
    count.set(6);

    assert_eq!(
        *journal.lock(),
        vec![
            "effect 0",
            "mounted",
            "cleanup 0",
            "effect 5",
            "step 1 -> 2",
            "unmounting",
            "component cleanup",
            "cleanup 5",
        ]
    );
    assert!(manager.tracked().is_empty());
}

#[test]
fn instance_id_is_stable_across_calls() {
    let manager = LifecycleManager::new(&Runtime::new());
    let journal = Journal::default();
    let mut instance = ComponentInstance::new(Counter::new(&journal));

    manager.mount(&mut instance, 1).unwrap();
    let id = instance.id().unwrap();
    assert_eq!(instance.scope().and_then(|s| s.owner()), Some(id));

    manager.update(&mut instance, 3).unwrap();
    manager.update(&mut instance, 4).unwrap();
    assert_eq!(instance.id(), Some(id));
    assert_eq!(manager.tracked(), vec![(id, LifecyclePhase::Mounted)]);

    manager.unmount(&mut instance).unwrap();
    assert_eq!(instance.id(), Some(id));
}

#[test]
fn update_before_mount_leaves_no_record() {
    let manager = LifecycleManager::new(&Runtime::new());
    let journal = Journal::default();
    let mut instance = ComponentInstance::new(Counter::new(&journal));

    let err = manager.update(&mut instance, 1).unwrap_err();

    assert!(matches!(err.cause, LifecycleCause::NotMounted));
    assert_eq!(err.operation, LifecycleOperation::Update);
    assert_eq!(err.instance_id, None);
    assert!(manager.tracked().is_empty());
    assert_eq!(instance.phase(), LifecyclePhase::Initializing);
}

#[test]
fn failing_mount_hook_leaves_instance_in_error() {
    let rt = Runtime::new();
    let manager = LifecycleManager::new(&rt);
    let journal = Journal::default();
    let mut counter = Counter::new(&journal);
    counter.fail_on_mount = true;
    let mut instance = ComponentInstance::new(counter);

    let err = manager.mount(&mut instance, 1).unwrap_err();
    assert!(matches!(err.cause, LifecycleCause::Hook { hook: "on_mount", .. }));
    assert_eq!(instance.phase(), LifecyclePhase::Error);
    assert!(instance.state().is_err());
    assert_eq!(manager.phase(instance.id().unwrap()), Some(LifecyclePhase::Error));

    // Unmounting from Error still releases the effect created in init.
    manager.unmount(&mut instance).unwrap();
    assert_eq!(instance.phase(), LifecyclePhase::Unmounted);
    assert!(journal.lock().contains(&"cleanup 0".to_string()));
    assert_eq!(rt.node_count(), 0);
}

#[test]
fn failing_update_keeps_previous_state() {
    let manager = LifecycleManager::new(&Runtime::new());
    let journal = Journal::default();
    let mut instance = ComponentInstance::new(Counter::new(&journal));
    manager.mount(&mut instance, 3).unwrap();

    let err = manager.update(&mut instance, 0).unwrap_err();

    assert!(matches!(err.cause, LifecycleCause::Hook { hook: "update", .. }));
    assert_eq!(err.phase, Some(LifecyclePhase::Updating));
    assert_eq!(instance.phase(), LifecyclePhase::Error);
    assert_eq!(instance.props(), Some(&3));
    assert!(instance.last_error().is_some());
}

#[test]
fn unmount_is_best_effort() {
    let rt = Runtime::new();
    let manager = LifecycleManager::new(&rt);
    let journal = Journal::default();
    let mut counter = Counter::new(&journal);
    counter.fail_on_unmount = true;
    let mut instance = ComponentInstance::new(counter);
    manager.mount(&mut instance, 1).unwrap();

    let scope_cleanups = Arc::new(AtomicI32::new(0));
    let sc = scope_cleanups.clone();
    instance
        .scope()
        .unwrap()
        .on_cleanup(move || {
            sc.fetch_add(1, Ordering::SeqCst);
        });

    let err = manager.unmount(&mut instance).unwrap_err();

    let LifecycleCause::Teardown { failures } = &err.cause else {
        panic!("expected a teardown failure, got {err}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].label, "on_unmount");
    assert_eq!(failures[0].message, "unmount hook exploded");

    assert_eq!(instance.phase(), LifecyclePhase::Unmounted);
    assert!(journal.lock().contains(&"component cleanup".to_string()));
    assert_eq!(scope_cleanups.load(Ordering::SeqCst), 1);
    assert!(manager.tracked().is_empty());
}

#[test]
fn unmount_twice_is_rejected() {
    let manager = LifecycleManager::new(&Runtime::new());
    let journal = Journal::default();
    let mut instance = ComponentInstance::new(Counter::new(&journal));
    manager.mount(&mut instance, 1).unwrap();
    manager.unmount(&mut instance).unwrap();

    let err = manager.unmount(&mut instance).unwrap_err();
    assert!(matches!(
        err.cause,
        LifecycleCause::InvalidPhase { from: LifecyclePhase::Unmounted }
    ));
    assert!(instance.render().is_err());
}

#[test]
fn manager_teardown_lists_leaked_instances() {
    let manager = LifecycleManager::new(&Runtime::new());
    let journal = Journal::default();
    let mut instances: Vec<_> = (0..3)
        .map(|_| ComponentInstance::new(Counter::new(&journal)))
        .collect();
    for instance in &mut instances {
        manager.mount(instance, 1).unwrap();
    }
    manager.unmount(&mut instances[1]).unwrap();

    let leaked = manager.teardown();

    assert_eq!(leaked, vec![instances[0].id().unwrap(), instances[2].id().unwrap()]);
    assert!(manager.tracked().is_empty());
}

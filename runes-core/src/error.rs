//! Error types for the reactive runtime and the component lifecycle.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::graph::NodeId;
use crate::lifecycle::{InstanceId, LifecycleOperation, LifecyclePhase};
use crate::reactive::SubscriptionId;

/// Error type returned by component bodies and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A dependency cycle, or a write loop that never settles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveCycleError {
    /// Topological ordering of a propagation pass found nodes that can never
    /// become ready. The list holds the cycle and anything downstream of it.
    #[error("dependency cycle detected among nodes {nodes:?}")]
    Dependency { nodes: Vec<NodeId> },

    /// Effects or subscribers kept writing signals for more passes than the
    /// runtime allows.
    #[error("propagation did not settle after {passes} passes (last writes: {nodes:?})")]
    Unsettled { passes: usize, nodes: Vec<NodeId> },
}

/// Failures isolated by the runtime during propagation.
///
/// None of these abort a pass; they are logged, handed to the registered
/// error handler and retained until [`Runtime::take_errors`] drains them.
///
/// [`Runtime::take_errors`]: crate::reactive::Runtime::take_errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    #[error(transparent)]
    Cycle(#[from] ReactiveCycleError),

    #[error("effect {node} panicked: {message}")]
    EffectPanicked { node: NodeId, message: String },

    #[error("cleanup of effect {node} panicked: {message}")]
    CleanupPanicked { node: NodeId, message: String },

    #[error("derived {node} panicked during recompute, keeping cached value: {message}")]
    DerivedPanicked { node: NodeId, message: String },

    #[error("subscriber {subscription} of node {node} panicked: {message}")]
    SubscriberPanicked {
        node: NodeId,
        subscription: SubscriptionId,
        message: String,
    },
}

/// Reading or mutating component state outside of a live phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot access state of instance {} in phase {phase}", DisplayId(.instance_id))]
pub struct StateAccessError {
    pub instance_id: Option<InstanceId>,
    pub phase: LifecyclePhase,
}

/// One teardown step that failed during unmount or scope destruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label}: {message}")]
pub struct TeardownFailure {
    /// What was being torn down, e.g. `on_unmount` or `effect #12`.
    pub label: String,
    pub message: String,
}

/// Why a lifecycle operation failed.
#[derive(Debug, Clone, Error)]
pub enum LifecycleCause {
    #[error("instance has never been mounted")]
    NotMounted,

    #[error("instance is already mounted")]
    AlreadyMounted,

    #[error("operation not allowed from phase {from}")]
    InvalidPhase { from: LifecyclePhase },

    #[error("{hook} failed: {source}")]
    Hook {
        hook: &'static str,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("{} teardown step(s) failed", .failures.len())]
    Teardown { failures: Vec<TeardownFailure> },
}

impl LifecycleCause {
    pub(crate) fn hook(hook: &'static str, source: BoxError) -> Self {
        Self::Hook {
            hook,
            source: Arc::from(source),
        }
    }
}

/// A failed `mount`, `update` or `unmount`.
#[derive(Debug, Clone, Error)]
#[error(
    "{operation} failed for instance {} in phase {}: {cause}",
    DisplayId(.instance_id),
    DisplayPhase(.phase)
)]
pub struct LifecycleError {
    pub instance_id: Option<InstanceId>,
    pub phase: Option<LifecyclePhase>,
    pub operation: LifecycleOperation,
    #[source]
    pub cause: LifecycleCause,
}

struct DisplayId<'a>(&'a Option<InstanceId>);

impl fmt::Display for DisplayId<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str("<unassigned>"),
        }
    }
}

struct DisplayPhase<'a>(&'a Option<LifecyclePhase>);

impl fmt::Display for DisplayPhase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(phase) => write!(f, "{phase}"),
            None => f.write_str("<untracked>"),
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 7");
    }

    #[test]
    fn lifecycle_error_message_names_missing_id() {
        let err = LifecycleError {
            instance_id: None,
            phase: None,
            operation: LifecycleOperation::Update,
            cause: LifecycleCause::NotMounted,
        };
        assert_eq!(
            err.to_string(),
            "update failed for instance <unassigned> in phase <untracked>: instance has never been mounted"
        );
    }

    #[test]
    fn cycle_error_converts_into_reactive_error() {
        let cycle = ReactiveCycleError::Dependency { nodes: vec![] };
        let err: ReactiveError = cycle.clone().into();
        assert_eq!(err, ReactiveError::Cycle(cycle));
    }
}

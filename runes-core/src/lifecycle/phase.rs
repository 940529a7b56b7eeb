//! Lifecycle phases and the transitions allowed between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a component instance is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecyclePhase {
    Initializing,
    Mounting,
    Mounted,
    Updating,
    Unmounting,
    Unmounted,
    Error,
}

impl LifecyclePhase {
    /// Phases reachable in one step from `self`.
    pub fn allowed_transitions(self) -> &'static [LifecyclePhase] {
        use LifecyclePhase::*;
        match self {
            Initializing => &[Mounting, Error],
            Mounting => &[Mounted, Error],
            Mounted => &[Updating, Unmounting, Error],
            Updating => &[Mounted, Unmounting, Error],
            Unmounting => &[Unmounted, Error],
            Unmounted => &[],
            Error => &[Unmounting, Unmounted],
        }
    }

    pub fn can_transition_to(self, next: LifecyclePhase) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Whether state may be read or rendered.
    pub fn is_live(self) -> bool {
        matches!(self, LifecyclePhase::Mounted | LifecyclePhase::Updating)
    }

    fn as_str(self) -> &'static str {
        match self {
            LifecyclePhase::Initializing => "initializing",
            LifecyclePhase::Mounting => "mounting",
            LifecyclePhase::Mounted => "mounted",
            LifecyclePhase::Updating => "updating",
            LifecyclePhase::Unmounting => "unmounting",
            LifecyclePhase::Unmounted => "unmounted",
            LifecyclePhase::Error => "error",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The manager operation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleOperation {
    Mount,
    Update,
    Unmount,
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleOperation::Mount => "mount",
            LifecycleOperation::Update => "update",
            LifecycleOperation::Unmount => "unmount",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecyclePhase::*;

    const ALL: [LifecyclePhase; 7] = [
        Initializing,
        Mounting,
        Mounted,
        Updating,
        Unmounting,
        Unmounted,
        Error,
    ];

    #[test]
    fn transition_table() {
        assert!(Initializing.can_transition_to(Mounting));
        assert!(Mounted.can_transition_to(Updating));
        assert!(Updating.can_transition_to(Mounted));
        assert!(Error.can_transition_to(Unmounting));
        assert!(Error.can_transition_to(Unmounted));

        assert!(!Initializing.can_transition_to(Mounted));
        assert!(!Mounted.can_transition_to(Mounting));
        assert!(!Unmounting.can_transition_to(Mounted));
        assert!(!Error.can_transition_to(Mounted));
    }

    #[test]
    fn only_unmounted_is_terminal() {
        for phase in ALL {
            assert_eq!(phase.is_terminal(), phase == Unmounted, "{phase}");
        }
        for phase in ALL {
            assert!(!Unmounted.can_transition_to(phase));
        }
    }

    #[test]
    fn every_non_terminal_phase_can_fail() {
        for phase in ALL {
            if !phase.is_terminal() && phase != Error {
                assert!(phase.can_transition_to(Error), "{phase}");
            }
        }
    }

    #[test]
    fn phases_serialize_in_upper_case() {
        assert_eq!(serde_json::to_string(&Mounted).unwrap(), r#""MOUNTED""#);
        let phase: LifecyclePhase = serde_json::from_str(r#""UNMOUNTING""#).unwrap();
        assert_eq!(phase, Unmounting);
        assert_eq!(
            serde_json::to_string(&LifecycleOperation::Update).unwrap(),
            r#""update""#
        );
    }
}

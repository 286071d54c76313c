//! Per-entry lifecycle state machine

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle state of the entry registered under one key.
///
/// ```text
/// Absent --first borrow--> Creating
/// Creating --create ok--> Ready
/// Creating --create failed--> Absent
/// Ready --last release--> Closing
/// Closing --teardown done--> Absent
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Lifecycle {
    /// No entry is registered for the key
    #[default]
    Absent,
    /// A single `create` call is in flight
    Creating,
    /// The instance is live and may be borrowed
    Ready,
    /// The last lease was released and teardown is running
    Closing,
}

impl Lifecycle {
    /// Whether a new borrow may attach to an entry in this state.
    #[must_use]
    pub fn can_borrow(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the state is waiting on a suspended collaborator call.
    #[must_use]
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Creating | Self::Closing)
    }

    /// Check whether the state machine allows `self -> target`.
    #[must_use]
    pub fn can_transition_to(&self, target: Lifecycle) -> bool {
        use Lifecycle::{Absent, Closing, Creating, Ready};

        matches!(
            (self, target),
            (Absent, Creating)
                | (Creating, Ready)
                | (Creating, Absent)
                | (Ready, Closing)
                | (Closing, Absent)
        )
    }

    /// All states reachable in one step.
    #[must_use]
    pub fn next_states(&self) -> Vec<Lifecycle> {
        match self {
            Self::Absent => vec![Self::Creating],
            Self::Creating => vec![Self::Ready, Self::Absent],
            Self::Ready => vec![Self::Closing],
            Self::Closing => vec![Self::Absent],
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "Absent"),
            Self::Creating => write!(f, "Creating"),
            Self::Ready => write!(f, "Ready"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

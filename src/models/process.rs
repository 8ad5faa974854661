//! Process lifecycle state, origin tags and output policy.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a managed process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "state", content = "code")]
pub enum ProcessState {
    /// Spawn issued, start not yet confirmed.
    Starting,
    /// Start confirmed and no exit observed.
    Running,
    /// The OS process terminated; `None` when killed by a signal.
    Exited(Option<i32>),
    /// The process never reached `Running`.
    Failed,
}

impl ProcessState {
    /// Whether the process may still be alive and needs a stop request.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Running | Self::Failed | Self::Exited(_))
                | (Self::Running, Self::Exited(_))
        )
    }
}

/// Which launch phase a managed process belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The compositor and the fixed session-critical service list.
    System,
    /// Entries discovered from autostart directories or the command file.
    Autostart,
}

/// What happens to a child's stdout and stderr.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputPolicy {
    /// Inherit the supervisor's stdout/stderr.
    #[default]
    Forward,
    /// Discard the child's output.
    Suppress,
}

//! Lifecycle states of the directory watcher

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Created,
    Starting,
    Running,
    Stopped,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

impl WatcherState {
    /// Whether the lifecycle allows moving from `self` to `to`
    pub fn can_transition_to(self, to: WatcherState) -> bool {
        use WatcherState::*;

        match (self, to) {
            (Created, Starting) => true,
            (Created, Stopped) => true,

            (Starting, Running) => true,
            (Starting, Stopped) => true,

            (Running, Stopped) => true,

            // Stopping again is a no-op.
            (Stopped, Stopped) => true,

            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == WatcherState::Stopped
    }
}

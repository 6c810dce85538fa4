//! Lifecycle of one execution session.

use std::fmt;

/// Where the current submission is in the build-and-run pipeline.
///
/// ```text
/// Idle → Preparing → Compiling → {CompileFailed | Compiled}
///      → Spawning → Running → {Completed | Failed | Cancelled} → Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Preparing,
    Compiling,
    CompileFailed,
    Compiled,
    Spawning,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// Any state may be cancelled and any state may fall back to `Idle`.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        if matches!(next, Idle | Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Preparing, Compiling)
                | (Compiling, CompileFailed | Compiled)
                | (Compiled, Spawning | Completed)
                | (Spawning, Running)
                | (Running, Completed | Failed)
        )
    }

    /// Whether the session has ended.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::CompileFailed
                | SessionState::Completed
                | SessionState::Failed
                | SessionState::Cancelled
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Preparing => "preparing",
            SessionState::Compiling => "compiling",
            SessionState::CompileFailed => "compile-failed",
            SessionState::Compiled => "compiled",
            SessionState::Spawning => "spawning",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Tracks the state of the active session.
#[derive(Debug, Default)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to `next`, logging the transition.
    pub fn advance(&mut self, next: SessionState) {
        if !self.state.can_advance_to(next) {
            tracing::warn!(from = %self.state, to = %next, "unexpected session transition");
        }
        tracing::debug!(from = %self.state, to = %next, "session transition");
        self.state = next;
    }

    /// Back to `Idle` once the outcome has been reported.
    pub fn finish(&mut self) {
        self.advance(SessionState::Idle);
    }
}

//! Session state machine

use std::fmt;

/// Lifecycle of one course session
///
/// `Uninitialized → Loading → Ready → (Navigating | Completing) → Ready`,
/// with `Error` reachable from `Loading`. Leaving `Completing` always lands
/// in `Ready`, whatever the persistence outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    Navigating,
    Completing,
    /// The last load failed; a previously loaded tree may still be served
    Error,
}

impl SessionState {
    /// Whether moving to `next` is a legal transition
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        matches!(
            (self, next),
            (Uninitialized | Ready | Error, Loading)
                | (Loading, Ready | Error)
                | (Ready, Navigating | Completing)
                | (Navigating | Completing, Ready)
        )
    }

    /// Whether a course tree is available to navigate
    pub fn is_ready(self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Navigating => "navigating",
            SessionState::Completing => "completing",
            SessionState::Error => "error",
        };
        f.write_str(name)
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one streaming transcription session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    /// Audio source open, connection in progress
    Starting,
    /// Connected and forwarding audio
    Streaming,
    /// Stop requested; waiting for the link to close
    Stopping,
    Terminated,
    Failed,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

impl SessionState {
    /// A new session may be started from this state
    pub fn accepts_start(self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Terminated | SessionState::Failed
        )
    }

    /// A stop request applies to a session in this state
    pub fn accepts_stop(self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Failed)
    }

    /// Resources may be held in this state
    pub fn holds_resources(self) -> bool {
        matches!(
            self,
            SessionState::Starting | SessionState::Streaming | SessionState::Stopping
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Streaming => "streaming",
            SessionState::Stopping => "stopping",
            SessionState::Terminated => "terminated",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionState; 6] = [
        SessionState::Idle,
        SessionState::Starting,
        SessionState::Streaming,
        SessionState::Stopping,
        SessionState::Terminated,
        SessionState::Failed,
    ];

    #[test]
    fn test_start_only_from_rest_states() {
        let startable: Vec<_> = ALL.iter().filter(|s| s.accepts_start()).collect();
        assert_eq!(
            startable,
            [&SessionState::Idle, &SessionState::Terminated, &SessionState::Failed]
        );
    }

    #[test]
    fn test_stop_only_while_live() {
        let stoppable: Vec<_> = ALL.iter().filter(|s| s.accepts_stop()).collect();
        assert_eq!(stoppable, [&SessionState::Starting, &SessionState::Streaming]);
    }

    #[test]
    fn test_start_and_resources_are_exclusive() {
        for state in ALL {
            assert_ne!(state.accepts_start(), state.holds_resources(), "{}", state);
        }
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionState::Streaming).unwrap(),
            "\"streaming\""
        );
    }
}

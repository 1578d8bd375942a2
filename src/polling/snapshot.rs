use std::fmt;

use crate::api::JobStatus;

/// The phases of a polling session.
///
/// A session flows through: IDLE → POLLING → COMPLETE | FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Polling,
    Complete,
    Failed,
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollPhase::Idle => write!(f, "IDLE"),
            PollPhase::Polling => write!(f, "POLLING"),
            PollPhase::Complete => write!(f, "COMPLETE"),
            PollPhase::Failed => write!(f, "FAILED"),
        }
    }
}

/// What observers of a poller can see.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    pub phase: PollPhase,
    /// Polling was requested and has not been stopped or finished.
    pub armed: bool,
    /// Last status returned by the backend, kept for display.
    pub status: Option<JobStatus>,
    /// Number of status requests issued in the current session.
    pub attempts: u32,
}

impl Default for PollSnapshot {
    fn default() -> Self {
        Self {
            phase: PollPhase::Idle,
            armed: false,
            status: None,
            attempts: 0,
        }
    }
}

impl PollSnapshot {
    /// The stage label of the last status, if any.
    pub fn current_stage(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.current_stage.as_deref())
    }

    /// Terminal outcome, if this snapshot has reached one.
    pub fn outcome(&self) -> Option<PollOutcome> {
        match self.phase {
            PollPhase::Complete => self.status.clone().map(PollOutcome::Complete),
            PollPhase::Failed => Some(PollOutcome::Failed(error_message(self.status.as_ref()))),
            PollPhase::Idle | PollPhase::Polling => None,
        }
    }
}

/// How a polling session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Complete(JobStatus),
    Failed(String),
}

pub const UNKNOWN_ERROR: &str = "Unknown error";

/// The error carried by a failed status, or a fallback when the backend sent none.
pub fn error_message(status: Option<&JobStatus>) -> String {
    status
        .and_then(|s| s.error.as_deref())
        .filter(|e| !e.is_empty())
        .unwrap_or(UNKNOWN_ERROR)
        .to_string()
}

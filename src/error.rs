use thiserror::Error;

use crate::api::ApiError;
use crate::wizard::Step;

#[derive(Debug, Error)]
pub enum NocomelonError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("No user id configured. Set NOCOMELON_USER_ID or pass --user.")]
    MissingUser,

    /// An earlier wizard step has not produced what this step needs.
    #[error("Finish the {0} step first.")]
    Redirect(Step),

    /// The backend reported the job as failed. The step can be retried.
    #[error("{step} failed: {message}")]
    JobFailed { step: Step, message: String },

    #[error("{step} job finished without a result")]
    MissingResult { step: Step },

    /// A job followed with `watch` ended in failure.
    #[error("Job {run_id} failed: {message}")]
    WatchFailed { run_id: String, message: String },

    #[error("Polling stopped before the {0} job finished")]
    PollingStopped(Step),

    #[error("Child age must be between 3 and 7, got {age}")]
    InvalidAge { age: u8 },

    #[error("Scene {number} does not exist")]
    NoSuchScene { number: usize },

    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl NocomelonError {
    /// The step to send the user back to, for precondition failures.
    pub fn redirect(&self) -> Option<Step> {
        match self {
            NocomelonError::Redirect(step) => Some(*step),
            _ => None,
        }
    }

    /// Job-reported failures that a plain retry may fix.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NocomelonError::JobFailed { .. }
                | NocomelonError::MissingResult { .. }
                | NocomelonError::Api(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_failed_display() {
        let err = NocomelonError::JobFailed {
            step: Step::Script,
            message: "model overloaded".into(),
        };
        assert_eq!(err.to_string(), "Script failed: model overloaded");
        assert!(err.is_retryable());
        assert!(err.redirect().is_none());
    }

    #[test]
    fn redirect_carries_step() {
        let err = NocomelonError::Redirect(Step::Upload);
        assert_eq!(err.redirect(), Some(Step::Upload));
        assert_eq!(err.to_string(), "Finish the Upload step first.");
        assert!(!err.is_retryable());
    }

    #[test]
    fn watch_failure_names_the_job() {
        let err = NocomelonError::WatchFailed {
            run_id: "run123".into(),
            message: "Unknown error".into(),
        };
        assert_eq!(err.to_string(), "Job run123 failed: Unknown error");
        assert!(!err.is_retryable());
        assert!(err.redirect().is_none());
    }

    #[test]
    fn invalid_age_display() {
        let err = NocomelonError::InvalidAge { age: 9 };
        assert_eq!(err.to_string(), "Child age must be between 3 and 7, got 9");
    }
}

use thiserror::Error;

/// Every way a workflow operation can fail.
///
/// Lower layers return these through `?`; the engine converts them to the
/// `error` string of an [`OperationResult`](crate::result::OperationResult).
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("No workflow state found. Run `phasekeep init` first.")]
    NotFound,

    #[error("Workflow already exists. Use reset to start over.")]
    AlreadyExists,

    #[error("Phase not found: {0}")]
    PhaseNotFound(String),

    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Goal not found: {0}")]
    GoalNotFound(String),

    #[error("Goal {0} is closed and no longer accepts progress")]
    GoalClosed(String),

    #[error("Iteration not found: {0}")]
    IterationNotFound(String),

    #[error("Invalid iteration: {0}")]
    InvalidIteration(String),

    #[error("Decision not found: {0}")]
    DecisionNotFound(String),

    #[error("Invalid decision: {0}")]
    InvalidDecision(String),

    #[error("Improvement not found: {0}")]
    ImprovementNotFound(String),

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] std::io::Error),

    #[error("Malformed workflow document: {0}")]
    MalformedDocument(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::MalformedDocument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_errors_name_the_missing_id() {
        assert_eq!(
            WorkflowError::PhaseNotFound("design".into()).to_string(),
            "Phase not found: design"
        );
        assert_eq!(
            WorkflowError::StepNotFound("s9".into()).to_string(),
            "Step not found: s9"
        );
    }

    #[test]
    fn json_errors_become_malformed_document() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: WorkflowError = err.into();
        assert!(matches!(err, WorkflowError::MalformedDocument(_)));
    }

    #[test]
    fn io_errors_become_storage_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WorkflowError = io.into();
        assert!(err.to_string().starts_with("Storage failure"));
    }
}

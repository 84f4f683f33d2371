use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// The uniform outcome every engine operation returns.
///
/// Callers branch on `success`; on failure `error` carries the message of the
/// underlying [`WorkflowError`] and `data` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Back to a `Result` for callers that prefer `?`.
    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self.error.unwrap_or_else(|| "operation failed".to_string())),
        }
    }
}

impl<T> From<Result<T, WorkflowError>> for OperationResult<T> {
    fn from(result: Result<T, WorkflowError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::fail(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_serializes_without_error_field() {
        let json = serde_json::to_value(OperationResult::ok(3)).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "data": 3}));
    }

    #[test]
    fn from_err_carries_message() {
        let result: OperationResult<()> = Err(WorkflowError::AlreadyExists).into();
        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("already exists"));
    }

    #[test]
    fn into_result_round_trips_both_arms() {
        assert_eq!(OperationResult::ok("x").into_result(), Ok("x"));
        let failed: OperationResult<u8> = OperationResult::fail("boom");
        assert_eq!(failed.into_result(), Err("boom".to_string()));
    }
}

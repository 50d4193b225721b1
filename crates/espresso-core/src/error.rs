//! Job-level errors and the boundary that erases them

use crate::job::ExecutionResult;
use espresso_sandbox::{FailureKind, SandboxError};

/// Anything that can stop a job from producing its own result
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("Invalid job request: {0}")]
    Protocol(String),
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::Sandbox(e) => e.kind(),
            JobError::Protocol(_) => FailureKind::Protocol,
        }
    }

    /// Erase the error into the result shape callers always receive
    pub fn into_result(self) -> ExecutionResult {
        ExecutionResult::failure(self.to_string())
    }
}

/// Errors talking to a worker rather than running a job
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker is no longer accepting jobs")]
    Stopped,

    #[error("Worker dropped the job without replying")]
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_survive_until_boundary() {
        let fetch: JobError = SandboxError::Fetch {
            module_ref: "espresso.wasm".into(),
            reason: "404".into(),
        }
        .into();
        assert_eq!(fetch.kind(), FailureKind::Resolution);

        let setup: JobError = SandboxError::Setup("no engine".into()).into();
        assert_eq!(setup.kind(), FailureKind::Setup);

        let trap: JobError = SandboxError::Execution("unreachable".into()).into();
        assert_eq!(trap.kind(), FailureKind::Execution);

        assert_eq!(JobError::Protocol("eof".into()).kind(), FailureKind::Protocol);
    }

    #[test]
    fn test_boundary_shape() {
        let result = JobError::from(SandboxError::Fetch {
            module_ref: "missing.wasm".into(),
            reason: "not found".into(),
        })
        .into_result();

        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stdout, "");
        assert!(result.stderr.contains("missing.wasm"));
        assert!(result.stderr.contains("not found"));
    }
}

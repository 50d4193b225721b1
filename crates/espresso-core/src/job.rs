//! Job requests, jobs and their results
//!
//! Requests arrive as loosely-typed JSON. Every field is optional and a field
//! of the wrong shape falls back to its default instead of failing the job.

use crate::error::JobError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Module run when a request names none
pub const DEFAULT_MODULE: &str = "espresso.wasm";

/// argv[0] handed to every module
pub const PROGRAM_NAME: &str = "espresso";

/// Inbound message as sent by the host application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, alias = "wasmPath", skip_serializing_if = "Option::is_none")]
    pub module_ref: Option<String>,
}

impl JobRequest {
    /// Parse one JSON message; only unparseable text is an error
    pub fn parse(text: &str) -> Result<Self, JobError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| JobError::Protocol(e.to_string()))?;
        Ok(Self::from_value(value))
    }

    /// Lenient extraction: anything missing or mistyped takes its default
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };

        let input = match fields.remove("input") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        let args = match fields.remove("args") {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            _ => None,
        };

        let module_ref = ["moduleRef", "wasmPath"]
            .into_iter()
            .find_map(|key| match fields.remove(key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s),
                _ => None,
            });

        Self {
            input,
            args,
            module_ref,
        }
    }

    /// Apply defaults and freeze into a [`Job`]
    pub fn into_job(self, default_module: &str) -> Job {
        Job {
            input: self.input.unwrap_or_default(),
            args: self.args.unwrap_or_default(),
            module_ref: self
                .module_ref
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| default_module.to_string()),
        }
    }
}

/// One fully-specified execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub input: String,
    pub args: Vec<String>,
    pub module_ref: String,
}

impl Job {
    pub fn new(input: impl Into<String>, args: Vec<String>, module_ref: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            args,
            module_ref: module_ref.into(),
        }
    }
}

/// Outbound message; the only thing a job ever produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    /// Shape every failure takes once it reaches the job boundary
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            stdout: String::new(),
            stderr: description.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

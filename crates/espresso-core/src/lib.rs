//! Espresso Core - Job execution and the worker protocol
//!
//! Turns loosely-typed job requests into sandboxed module runs and hands back
//! one result per request. Shared by every frontend (CLI, NDJSON stream, or an
//! embedding host).

pub mod error;
pub mod executor;
pub mod job;
pub mod stream;
pub mod worker;

pub use error::{JobError, WorkerError};
pub use executor::{ExecutorConfig, JobExecutor};
pub use job::{ExecutionResult, Job, JobRequest, DEFAULT_MODULE, PROGRAM_NAME};
pub use stream::serve_lines;
pub use worker::{PendingResult, Worker, WorkerHandle, DEFAULT_QUEUE_DEPTH};

pub use espresso_sandbox::FailureKind;

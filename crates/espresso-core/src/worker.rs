//! Worker protocol
//!
//! Requests go into a bounded queue; one task drains it and runs each job to
//! completion before taking the next. Receiving is decoupled from running, so
//! callers can keep submitting while a job is in flight.

use crate::error::WorkerError;
use crate::executor::JobExecutor;
use crate::job::{ExecutionResult, JobRequest};
use espresso_sandbox::FailureKind;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Default number of requests that may wait behind the running one
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

struct Envelope {
    request: JobRequest,
    reply: oneshot::Sender<ExecutionResult>,
}

/// A result that has been queued but not necessarily produced yet
pub struct PendingResult {
    rx: oneshot::Receiver<ExecutionResult>,
}

impl PendingResult {
    pub async fn wait(self) -> Result<ExecutionResult, WorkerError> {
        self.rx.await.map_err(|_| WorkerError::Dropped)
    }
}

/// Cloneable sender side of a running worker
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Enqueue a request; waits only for queue space, not for the job
    pub async fn submit(&self, request: JobRequest) -> Result<PendingResult, WorkerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| WorkerError::Stopped)?;
        Ok(PendingResult { rx })
    }

    /// Submit and wait for the result
    pub async fn execute(&self, request: JobRequest) -> Result<ExecutionResult, WorkerError> {
        self.submit(request).await?.wait().await
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One isolated worker instance: its own runtime, cache and queue
pub struct Worker {
    executor: JobExecutor,
    rx: mpsc::Receiver<Envelope>,
}

impl Worker {
    /// Start the processing loop on the current tokio runtime
    pub fn spawn(executor: JobExecutor, queue_depth: usize) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        tokio::spawn(Worker { executor, rx }.run());
        WorkerHandle { tx }
    }

    async fn run(mut self) {
        let mut processed: u64 = 0;

        while let Some(Envelope { request, reply }) = self.rx.recv().await {
            processed += 1;
            let job = request.into_job(&self.executor.config().default_module);
            debug!(seq = processed, module_ref = %job.module_ref, "job dequeued");

            let result = match self.executor.try_run(&job).await {
                Ok(result) => result,
                Err(e) if e.kind() == FailureKind::Setup => {
                    error!(error = %e, "runtime setup failed; stopping worker");
                    let failure = e.into_result();
                    let _ = reply.send(failure.clone());
                    self.drain(failure).await;
                    return;
                }
                Err(e) => {
                    warn!(seq = processed, kind = ?e.kind(), error = %e, "job failed");
                    e.into_result()
                }
            };

            // The caller may have stopped waiting; nothing to do about it.
            let _ = reply.send(result);
        }

        info!(processed, "worker queue closed");
    }

    /// Answer everything still queued with `failure` and refuse new work
    async fn drain(&mut self, failure: ExecutionResult) {
        self.rx.close();
        while let Some(envelope) = self.rx.recv().await {
            let _ = envelope.reply.send(failure.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;
    use espresso_sandbox::{
        testing, InMemorySource, RuntimeEnvironment, SandboxConfig, SandboxError,
    };
    use std::sync::Arc;

    fn spawn_worker() -> (WorkerHandle, Arc<InMemorySource>) {
        let source = Arc::new(
            InMemorySource::new()
                .with_module("espresso.wasm", testing::ECHO_INPUT)
                .with_module("args.wasm", testing::PRINT_ARGS)
                .with_module("fail.wasm", testing::FAIL_WITH_STDERR),
        );
        let executor = JobExecutor::new(
            ExecutorConfig::default(),
            SandboxConfig::default(),
            source.clone(),
        );
        (Worker::spawn(executor, 4), source)
    }

    fn request(input: &str, args: &[&str], module_ref: Option<&str>) -> JobRequest {
        JobRequest {
            input: Some(input.to_string()),
            args: Some(args.iter().map(|a| a.to_string()).collect()),
            module_ref: module_ref.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_default_request() {
        let (worker, _) = spawn_worker();
        let result = worker.execute(JobRequest::default()).await.unwrap();
        assert_eq!(
            result,
            ExecutionResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_requests_queue_and_answer_in_order() {
        let (worker, source) = spawn_worker();

        let mut pending = Vec::new();
        for i in 0..8 {
            let input = format!("job-{i}");
            pending.push(worker.submit(request(&input, &[], None)).await.unwrap());
        }

        for (i, p) in pending.into_iter().enumerate() {
            let result = p.wait().await.unwrap();
            assert_eq!(result.stdout, format!("job-{i}"));
        }
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_each_result_holds_only_its_own_output() {
        let (worker, _) = spawn_worker();

        let a = worker.submit(request("", &[], Some("fail.wasm"))).await.unwrap();
        let b = worker.submit(request("x = 1;", &["-v"], Some("args.wasm"))).await.unwrap();

        let a = a.wait().await.unwrap();
        let b = b.wait().await.unwrap();
        assert_eq!((a.exit_code, a.stdout.as_str(), a.stderr.as_str()), (3, "", "oops\n"));
        assert_eq!(b.stdout, "espresso\n-v\n/input.esp\n");
        assert_eq!(b.stderr, "");
    }

    #[tokio::test]
    async fn test_failure_is_a_result_not_a_fault() {
        let (worker, _) = spawn_worker();

        let result = worker.execute(request("", &[], Some("nowhere.wasm"))).await.unwrap();
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("nowhere.wasm"));

        // the worker keeps serving after a failed job
        let result = worker.execute(request("still here", &[], None)).await.unwrap();
        assert_eq!(result.stdout, "still here");
        assert!(!worker.is_stopped());
    }

    #[tokio::test]
    async fn test_setup_failure_answers_queue_then_stops() {
        let runtime = RuntimeEnvironment::with_initializer(SandboxConfig::default(), |_| {
            Err(SandboxError::Setup("engine unavailable".into()))
        });
        let source =
            Arc::new(InMemorySource::new().with_module("espresso.wasm", testing::ECHO_INPUT));
        let executor = JobExecutor::with_runtime(ExecutorConfig::default(), runtime, source);
        let worker = Worker::spawn(executor, 4);

        let mut pending = Vec::new();
        for input in ["a", "b", "c"] {
            pending.push(worker.submit(request(input, &[], None)).await.unwrap());
        }
        for p in pending {
            let result = p.wait().await.unwrap();
            assert_eq!(result.exit_code, 1);
            assert_eq!(result.stdout, "");
            assert!(result.stderr.contains("engine unavailable"), "{result:?}");
        }

        assert!(worker.is_stopped());
        let err = worker.submit(request("late", &[], None)).await.err().unwrap();
        assert!(matches!(err, WorkerError::Stopped));
    }
}

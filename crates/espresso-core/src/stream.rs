//! Newline-delimited JSON transport
//!
//! One request object per line in, one result object per line out, in the same
//! order. Reading keeps going while earlier jobs run, so the worker queue stays
//! fed; results are written as soon as the next one in line is ready.

use crate::job::{ExecutionResult, JobRequest};
use crate::worker::{PendingResult, WorkerHandle};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Results waiting to be written, in request order
const IN_FLIGHT: usize = 64;

enum Slot {
    Ready(ExecutionResult),
    Queued(PendingResult),
}

impl Slot {
    async fn resolve(self) -> ExecutionResult {
        match self {
            Slot::Ready(result) => result,
            Slot::Queued(pending) => pending
                .wait()
                .await
                .unwrap_or_else(|e| ExecutionResult::failure(e.to_string())),
        }
    }
}

/// Serve requests from `reader` until end of input, writing results to `writer`
pub async fn serve_lines<R, W>(handle: WorkerHandle, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (tx, mut rx) = mpsc::channel::<Slot>(IN_FLIGHT);

    let read = async move {
        let mut lines = reader.lines();
        let mut received: u64 = 0;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            received += 1;

            let slot = match JobRequest::parse(&line) {
                Ok(request) => match handle.submit(request).await {
                    Ok(pending) => Slot::Queued(pending),
                    Err(e) => Slot::Ready(ExecutionResult::failure(e.to_string())),
                },
                Err(e) => {
                    warn!(line = received, error = %e, "rejecting request");
                    Slot::Ready(e.into_result())
                }
            };

            if tx.send(slot).await.is_err() {
                // writer is gone; nobody left to answer
                break;
            }
        }

        debug!(received, "request stream ended");
        Ok::<_, io::Error>(())
    };

    let write = async {
        while let Some(slot) = rx.recv().await {
            let result = slot.resolve().await;
            let mut line = serde_json::to_vec(&result)?;
            line.push(b'\n');
            writer.write_all(&line).await?;
            writer.flush().await?;
        }
        Ok::<_, io::Error>(())
    };

    let (read, write) = tokio::join!(read, write);
    write?;
    read
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorConfig, JobExecutor};
    use crate::worker::Worker;
    use espresso_sandbox::{testing, InMemorySource, SandboxConfig};
    use std::sync::Arc;

    fn worker() -> WorkerHandle {
        let source = InMemorySource::new()
            .with_module("espresso.wasm", testing::ECHO_INPUT)
            .with_module("fail.wasm", testing::FAIL_WITH_STDERR);
        let executor = JobExecutor::new(
            ExecutorConfig::default(),
            SandboxConfig::default(),
            Arc::new(source),
        );
        Worker::spawn(executor, 2)
    }

    async fn serve(input: &str) -> Vec<ExecutionResult> {
        let mut out = Vec::new();
        serve_lines(worker(), input.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_result_per_request_in_order() {
        let input = r#"{"input":"first"}
{"moduleRef":"fail.wasm"}
{"input":"third"}
"#;
        let results = serve(input).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].stdout, "first");
        assert_eq!((results[1].exit_code, results[1].stderr.as_str()), (3, "oops\n"));
        assert_eq!(results[2].stdout, "third");
    }

    #[tokio::test]
    async fn test_malformed_line_answered_in_place() {
        let results = serve("{\"input\":\"a\"}\n{oops\n\n{\"input\":\"b\"}\n").await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].stdout, "a");
        assert_eq!(results[1].exit_code, 1);
        assert!(results[1].stderr.starts_with("Invalid job request"));
        assert_eq!(results[2].stdout, "b");
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        assert!(serve("").await.is_empty());
        assert!(serve("\n  \n").await.is_empty());
    }

    #[tokio::test]
    async fn test_more_requests_than_queue_depth() {
        let input: String = (0..20).map(|i| format!("{{\"input\":\"{i}\"}}\n")).collect();
        let results = serve(&input).await;

        assert_eq!(results.len(), 20);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.stdout, i.to_string());
        }
    }
}

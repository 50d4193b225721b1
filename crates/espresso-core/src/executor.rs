//! Job execution
//!
//! Drives one job end-to-end: runtime, module, filesystem, run, result.

use crate::error::JobError;
use crate::job::{ExecutionResult, Job, DEFAULT_MODULE, PROGRAM_NAME};
use espresso_sandbox::{
    ModuleCache, ModuleSource, RuntimeEnvironment, SandboxConfig, SandboxError, VirtualFs,
    INPUT_PATH,
};
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

/// Fixed parts of every invocation
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// argv[0]
    pub program_name: String,
    /// Module used when a request names none
    pub default_module: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program_name: PROGRAM_NAME.to_string(),
            default_module: DEFAULT_MODULE.to_string(),
        }
    }
}

/// Runs jobs against one runtime and one module cache
pub struct JobExecutor {
    config: ExecutorConfig,
    runtime: RuntimeEnvironment,
    cache: ModuleCache,
}

impl JobExecutor {
    pub fn new(
        config: ExecutorConfig,
        sandbox: SandboxConfig,
        source: Arc<dyn ModuleSource>,
    ) -> Self {
        Self::with_runtime(config, RuntimeEnvironment::new(sandbox), source)
    }

    /// Run against an already-configured runtime environment
    pub fn with_runtime(
        config: ExecutorConfig,
        runtime: RuntimeEnvironment,
        source: Arc<dyn ModuleSource>,
    ) -> Self {
        Self {
            config,
            runtime,
            cache: ModuleCache::new(source),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn runtime(&self) -> &RuntimeEnvironment {
        &self.runtime
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Program name, the job's own arguments, then the input path. Modules rely on this order.
    pub fn invocation_args(&self, job: &Job) -> Vec<String> {
        let mut argv = Vec::with_capacity(job.args.len() + 2);
        argv.push(self.config.program_name.clone());
        argv.extend(job.args.iter().cloned());
        argv.push(INPUT_PATH.to_string());
        argv
    }

    /// Run `job`, keeping the failure kind visible
    pub async fn try_run(&self, job: &Job) -> Result<ExecutionResult, JobError> {
        let span = tracing::debug_span!("job", module_ref = %job.module_ref);
        async {
            let runtime = self.runtime.ensure_initialized().await?;
            let module = self.cache.resolve(runtime.engine(), &job.module_ref).await?;

            let args = self.invocation_args(job);
            debug!(args = ?args, input_bytes = job.input.len(), "starting module");

            let runtime = runtime.clone();
            let input = job.input.clone();
            let completion = tokio::task::spawn_blocking(move || {
                let fs = VirtualFs::create(&input, runtime.config().max_output)?;
                runtime.execute(&module, fs, &args)
            })
            .await
            .map_err(|e| SandboxError::Execution(format!("execution task failed: {e}")))??;

            debug!(exit_code = completion.exit_code, "module finished");
            Ok::<_, JobError>(ExecutionResult {
                exit_code: completion.exit_code,
                stdout: completion.fs.read_stdout(),
                stderr: completion.fs.read_stderr(),
            })
        }
        .instrument(span)
        .await
    }

    /// Run `job`; every failure comes back as an exit-1 result
    pub async fn run(&self, job: &Job) -> ExecutionResult {
        match self.try_run(job).await {
            Ok(result) => result,
            Err(e) => {
                warn!(module_ref = %job.module_ref, kind = ?e.kind(), error = %e, "job failed");
                e.into_result()
            }
        }
    }
}

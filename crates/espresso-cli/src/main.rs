//! Espresso CLI - Sandboxed Espresso runs from the command line
//!
//! Usage:
//!   espresso serve  - Answer NDJSON job requests on stdin/stdout
//!   espresso run    - Run a single job and exit with its exit code

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use espresso_core::{
    serve_lines, ExecutorConfig, JobExecutor, JobRequest, Worker, DEFAULT_MODULE,
    DEFAULT_QUEUE_DEPTH, PROGRAM_NAME,
};
use espresso_sandbox::{RoutedSource, SandboxConfig};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "espresso")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Logic minimization in a WebAssembly sandbox", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Settings {
    /// Directory that relative module refs resolve against
    #[arg(long, global = true, default_value = ".")]
    module_dir: PathBuf,

    /// Module run when a request names none
    #[arg(long, global = true, default_value = DEFAULT_MODULE)]
    default_module: String,

    /// argv[0] passed to every module
    #[arg(long, global = true, default_value = PROGRAM_NAME)]
    program_name: String,

    /// Linear memory cap per job, in MiB
    #[arg(long, global = true, default_value_t = 64)]
    max_memory_mb: usize,

    /// Capture cap for each of stdout and stderr per job, in KiB
    #[arg(long, global = true, default_value_t = 1024)]
    max_output_kb: usize,

    /// Requests allowed to wait behind the running job
    #[arg(long, global = true, default_value_t = DEFAULT_QUEUE_DEPTH)]
    queue_depth: usize,
}

impl Settings {
    fn executor(&self) -> JobExecutor {
        let config = ExecutorConfig {
            program_name: self.program_name.clone(),
            default_module: self.default_module.clone(),
        };
        let sandbox = SandboxConfig {
            max_memory: self.max_memory_mb.saturating_mul(1024 * 1024),
            max_output: self.max_output_kb.saturating_mul(1024),
        };
        JobExecutor::new(config, sandbox, Arc::new(RoutedSource::new(&self.module_dir)))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve newline-delimited JSON requests from stdin
    Serve,

    /// Run one job
    Run {
        /// Module ref (path under --module-dir, or an http(s) URL)
        #[arg(long)]
        module: Option<String>,

        /// Read job input from this file instead of stdin
        #[arg(long)]
        input: Option<PathBuf>,

        /// Arguments passed to the module before the input path
        #[arg(last = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries results
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let executor = cli.settings.executor();

    match cli.command {
        Commands::Serve => {
            let worker = Worker::spawn(executor, cli.settings.queue_depth);
            let stdin = BufReader::new(tokio::io::stdin());
            serve_lines(worker, stdin, tokio::io::stdout())
                .await
                .context("request stream failed")?;
        }

        Commands::Run { module, input, args } => {
            let input = match input {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    tokio::io::stdin()
                        .read_to_string(&mut buf)
                        .await
                        .context("reading stdin")?;
                    buf
                }
            };

            let request = JobRequest {
                input: Some(input),
                args: Some(args),
                module_ref: module,
            };
            let job = request.into_job(&executor.config().default_module);
            let result = executor.run(&job).await;

            print!("{}", result.stdout);
            eprint!("{}", result.stderr);
            std::io::stdout().flush()?;
            std::process::exit(result.exit_code);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["espresso", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve));
        assert_eq!(cli.settings.module_dir, PathBuf::from("."));
        assert_eq!(cli.settings.default_module, "espresso.wasm");
        assert_eq!(cli.settings.program_name, "espresso");
        assert_eq!(cli.settings.max_memory_mb, 64);
        assert_eq!(cli.settings.max_output_kb, 1024);
        assert_eq!(cli.settings.queue_depth, 64);
    }

    #[test]
    fn test_run_with_trailing_args() {
        let cli = Cli::try_parse_from([
            "espresso",
            "run",
            "--module",
            "alt.wasm",
            "--input",
            "pla.txt",
            "--module-dir",
            "/opt/modules",
            "--",
            "-Dexact",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.settings.module_dir, PathBuf::from("/opt/modules"));
        match cli.command {
            Commands::Run { module, input, args } => {
                assert_eq!(module.as_deref(), Some("alt.wasm"));
                assert_eq!(input, Some(PathBuf::from("pla.txt")));
                assert_eq!(args, vec!["-Dexact", "-v"]);
            }
            Commands::Serve => panic!("expected run"),
        }
    }

    #[test]
    fn test_memory_cap_in_bytes() {
        let cli = Cli::try_parse_from(["espresso", "--max-memory-mb", "2", "serve"]).unwrap();
        let executor = cli.settings.executor();
        assert_eq!(executor.runtime().config().max_memory, 2 * 1024 * 1024);
    }

    #[test]
    fn test_output_cap_in_bytes() {
        let cli = Cli::try_parse_from(["espresso", "serve", "--max-output-kb", "4"]).unwrap();
        let executor = cli.settings.executor();
        assert_eq!(executor.runtime().config().max_output, 4096);
        assert_eq!(executor.runtime().config().max_memory, 64 * 1024 * 1024);
    }
}

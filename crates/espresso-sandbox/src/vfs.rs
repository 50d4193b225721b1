//! Per-job filesystem view
//!
//! The guest sees one read-only directory preopened at `/` holding
//! `input.esp`, plus stdout and stderr captured into bounded in-memory pipes.
//! The directory is private to the job and removed when the handle drops.

use crate::{Result, SandboxError};
use std::path::Path;
use tempfile::TempDir;
use wasmtime_wasi::p1::WasiP1Ctx;
use wasmtime_wasi::p2::pipe::MemoryOutputPipe;
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

/// Where the guest finds its input; always the last argument it receives
pub const INPUT_PATH: &str = "/input.esp";

/// Guest path of the preopened job directory
pub const ROOT_NAME: &str = "/";

/// Default capture limit for each of stdout and stderr
pub const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024; // 1 MiB

const INPUT_FILE: &str = "input.esp";

pub struct VirtualFs {
    root: TempDir,
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
}

impl VirtualFs {
    /// Fresh view holding `input` at [`INPUT_PATH`].
    ///
    /// Each capture pipe accepts at most `output_limit` bytes; writes past that
    /// fail inside the guest instead of growing host memory.
    pub fn create(input: &str, output_limit: usize) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("espresso-job-")
            .tempdir()
            .map_err(|e| fs_error("failed to create job directory", e))?;
        std::fs::write(root.path().join(INPUT_FILE), input)
            .map_err(|e| fs_error("failed to write job input", e))?;

        Ok(Self {
            root,
            stdout: MemoryOutputPipe::new(output_limit),
            stderr: MemoryOutputPipe::new(output_limit),
        })
    }

    /// WASI context wired to this view: `args`, the capture pipes, and the
    /// root preopen. Nothing in it can write to the directory.
    pub(crate) fn wasi_ctx(&self, args: &[String]) -> Result<WasiP1Ctx> {
        let mut builder = WasiCtxBuilder::new();
        builder
            .args(args)
            .stdout(self.stdout.clone())
            .stderr(self.stderr.clone())
            .allow_blocking_current_thread(true);
        builder
            .preopened_dir(self.root.path(), ROOT_NAME, DirPerms::READ, FilePerms::READ)
            .map_err(|e| {
                SandboxError::Instantiation(format!("failed to preopen job directory: {e:#}"))
            })?;
        Ok(builder.build_p1())
    }

    /// Host location of the job directory
    pub fn host_path(&self) -> &Path {
        self.root.path()
    }

    /// Everything the guest wrote to stdout
    pub fn read_stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout.contents()).into_owned()
    }

    /// Everything the guest wrote to stderr
    pub fn read_stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr.contents()).into_owned()
    }
}

fn fs_error(context: &str, e: std::io::Error) -> SandboxError {
    SandboxError::Instantiation(format!("{context}: {e}"))
}

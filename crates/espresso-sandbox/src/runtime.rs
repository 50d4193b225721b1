//! Sandbox runtime using Wasmtime

use crate::vfs::{VirtualFs, DEFAULT_OUTPUT_LIMIT};
use crate::{Result, SandboxError};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;
use wasmtime::{Config, Engine, Linker, Module, Store, StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::p1::{self, WasiP1Ctx};
use wasmtime_wasi::I32Exit;

/// Export every WASI command runs from
pub const ENTRY_POINT: &str = "_start";

/// Configuration for the sandbox
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum linear memory per job in bytes
    pub max_memory: usize,
    /// Maximum bytes captured per output stream per job
    pub max_output: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory: 64 * 1024 * 1024, // 64MB
            max_output: DEFAULT_OUTPUT_LIMIT,
        }
    }
}

/// Store data for one job
struct JobState {
    wasi: WasiP1Ctx,
    limits: StoreLimits,
}

/// An initialized engine plus a linker carrying WASI preview 1
#[derive(Clone)]
pub struct Runtime {
    engine: Engine,
    linker: Linker<JobState>,
    config: SandboxConfig,
}

/// What a finished module leaves behind
pub struct Completion {
    pub exit_code: i32,
    pub fs: VirtualFs,
}

impl Runtime {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        let engine = Engine::new(&Config::new())
            .map_err(|e| SandboxError::Setup(format!("{e:#}")))?;

        let mut linker = Linker::new(&engine);
        p1::add_to_linker_sync(&mut linker, |state: &mut JobState| &mut state.wasi)
            .map_err(|e| SandboxError::Setup(format!("failed to link WASI: {e:#}")))?;

        Ok(Self {
            engine,
            linker,
            config,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Instantiate `module` over `fs` with `args` and run its entry point to completion.
    ///
    /// Blocks the calling thread for the duration of the guest; callers on an
    /// async runtime should move this onto the blocking pool.
    pub fn execute(&self, module: &Module, fs: VirtualFs, args: &[String]) -> Result<Completion> {
        let mut linker = self.linker.clone();
        linker
            .define_unknown_imports_as_traps(module)
            .map_err(|e| SandboxError::Instantiation(format!("{e:#}")))?;

        let state = JobState {
            wasi: fs.wasi_ctx(args)?,
            limits: StoreLimitsBuilder::new()
                .memory_size(self.config.max_memory)
                .build(),
        };
        let mut store = Store::new(&self.engine, state);
        store.limiter(|state| &mut state.limits);

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| SandboxError::Instantiation(format!("{e:#}")))?;

        let start = instance
            .get_typed_func::<(), ()>(&mut store, ENTRY_POINT)
            .map_err(|e| {
                SandboxError::Instantiation(format!("missing `{ENTRY_POINT}` export: {e:#}"))
            })?;

        let exit_code = match start.call(&mut store, ()) {
            Ok(()) => 0,
            Err(e) => match e.downcast_ref::<I32Exit>() {
                Some(exit) => exit.0,
                None => return Err(SandboxError::Execution(format!("{e:#}"))),
            },
        };

        Ok(Completion { exit_code, fs })
    }
}

/// Builds the runtime on first use
pub type Initializer = fn(SandboxConfig) -> Result<Runtime>;

/// Lazily-initialized runtime owned by one worker instance
pub struct RuntimeEnvironment {
    config: SandboxConfig,
    init: Initializer,
    runtime: OnceCell<Runtime>,
    initializations: AtomicUsize,
}

impl RuntimeEnvironment {
    pub fn new(config: SandboxConfig) -> Self {
        Self::with_initializer(config, Runtime::new)
    }

    /// Use `init` in place of [`Runtime::new`]
    pub fn with_initializer(config: SandboxConfig, init: Initializer) -> Self {
        Self {
            config,
            init,
            runtime: OnceCell::new(),
            initializations: AtomicUsize::new(0),
        }
    }

    /// Build the engine on first call; later calls return the same runtime
    pub async fn ensure_initialized(&self) -> Result<&Runtime> {
        self.runtime
            .get_or_try_init(|| async {
                let runtime = (self.init)(self.config.clone())?;
                self.initializations.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    max_memory = self.config.max_memory,
                    max_output = self.config.max_output,
                    "wasm runtime initialized"
                );
                Ok::<_, SandboxError>(runtime)
            })
            .await
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.initialized()
    }

    /// How many times the engine has been built (0 or 1)
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::SeqCst)
    }
}

impl Default for RuntimeEnvironment {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

//! Compiled module cache
//!
//! Compilation is the expensive step, so each module ref is fetched and
//! compiled once per worker and the `Module` reused for every later job.
//! Concurrent misses on the same ref share one in-flight compilation.

use crate::source::ModuleSource;
use crate::{Result, SandboxError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};
use wasmtime::{Engine, Module};

pub struct ModuleCache {
    source: Arc<dyn ModuleSource>,
    entries: Mutex<HashMap<String, Arc<OnceCell<Module>>>>,
    compilations: AtomicUsize,
}

impl ModuleCache {
    pub fn new(source: Arc<dyn ModuleSource>) -> Self {
        Self {
            source,
            entries: Mutex::new(HashMap::new()),
            compilations: AtomicUsize::new(0),
        }
    }

    /// Return the compiled module for `module_ref`, fetching and compiling on first use.
    ///
    /// A failed fetch or compile leaves the entry empty so a later job retries.
    pub async fn resolve(&self, engine: &Engine, module_ref: &str) -> Result<Module> {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries.entry(module_ref.to_string()).or_default().clone()
        };

        if let Some(module) = cell.get() {
            debug!(module_ref, "module cache hit");
            return Ok(module.clone());
        }

        let module = cell
            .get_or_try_init(|| self.load(engine, module_ref))
            .await?;
        Ok(module.clone())
    }

    async fn load(&self, engine: &Engine, module_ref: &str) -> Result<Module> {
        debug!(module_ref, "module cache miss");
        let bytes = self.source.fetch(module_ref).await?;

        let started = Instant::now();
        let engine = engine.clone();
        let module = tokio::task::spawn_blocking(move || Module::new(&engine, &bytes))
            .await
            .map_err(|e| compile_error(module_ref, format!("compiler task failed: {e}")))?
            .map_err(|e| compile_error(module_ref, format!("{e:#}")))?;

        self.compilations.fetch_add(1, Ordering::SeqCst);
        info!(
            module_ref,
            elapsed = ?started.elapsed(),
            "compiled module"
        );
        Ok(module)
    }

    /// Number of successful compilations so far
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// Number of refs currently holding a compiled module
    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        entries.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn compile_error(module_ref: &str, reason: String) -> SandboxError {
    SandboxError::Compile {
        module_ref: module_ref.to_string(),
        reason,
    }
}

//! Where module bytes come from
//!
//! The cache only knows module refs; a `ModuleSource` turns a ref into the raw
//! bytes of a WebAssembly binary (or text) artifact.

use crate::{Result, SandboxError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fetches module artifacts by ref
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Return the artifact bytes for `module_ref`
    async fn fetch(&self, module_ref: &str) -> Result<Vec<u8>>;
}

/// Reads modules from a directory on the host
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, module_ref: &str) -> PathBuf {
        let relative = module_ref.strip_prefix("file://").unwrap_or(module_ref);
        self.root.join(relative)
    }
}

#[async_trait]
impl ModuleSource for FileSource {
    async fn fetch(&self, module_ref: &str) -> Result<Vec<u8>> {
        let path = self.path_for(module_ref);
        tokio::fs::read(&path)
            .await
            .map_err(|e| SandboxError::fetch(module_ref, format!("{}: {e}", path.display())))
    }
}

/// Downloads modules over HTTP(S)
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ModuleSource for HttpSource {
    async fn fetch(&self, module_ref: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(module_ref)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SandboxError::fetch(module_ref, e))?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SandboxError::fetch(module_ref, e))?;
        Ok(bytes.to_vec())
    }
}

/// URLs go to [`HttpSource`], everything else to [`FileSource`]
#[derive(Debug, Clone)]
pub struct RoutedSource {
    files: FileSource,
    http: HttpSource,
}

impl RoutedSource {
    pub fn new(module_dir: impl Into<PathBuf>) -> Self {
        Self {
            files: FileSource::new(module_dir),
            http: HttpSource::default(),
        }
    }

    fn is_remote(module_ref: &str) -> bool {
        module_ref.starts_with("http://") || module_ref.starts_with("https://")
    }
}

#[async_trait]
impl ModuleSource for RoutedSource {
    async fn fetch(&self, module_ref: &str) -> Result<Vec<u8>> {
        if Self::is_remote(module_ref) {
            self.http.fetch(module_ref).await
        } else {
            self.files.fetch(module_ref).await
        }
    }
}

/// Preloaded artifacts held in memory; counts every fetch
#[derive(Debug, Default)]
pub struct InMemorySource {
    modules: HashMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, module_ref: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.modules.insert(module_ref.into(), bytes.into());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModuleSource for InMemorySource {
    async fn fetch(&self, module_ref: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.modules
            .get(module_ref)
            .cloned()
            .ok_or_else(|| SandboxError::fetch(module_ref, "no such module"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    #[tokio::test]
    async fn test_in_memory_source() {
        let source = InMemorySource::new().with_module("a.wasm", b"\0asm".to_vec());
        assert_eq!(source.fetch("a.wasm").await.unwrap(), b"\0asm");

        let err = source.fetch("b.wasm").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Resolution);
        assert!(err.to_string().contains("b.wasm"));
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new(std::env::temp_dir().join("espresso-no-such-dir"));
        let err = source.fetch("file://espresso.wasm").await.unwrap_err();
        assert!(matches!(err, SandboxError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_file_source_reads_module() {
        let dir = std::env::temp_dir().join(format!("espresso-src-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("m.wat"), "(module)").await.unwrap();

        let source = RoutedSource::new(&dir);
        assert_eq!(source.fetch("m.wat").await.unwrap(), b"(module)");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn test_routing() {
        assert!(RoutedSource::is_remote("https://example.com/espresso.wasm"));
        assert!(RoutedSource::is_remote("http://localhost:8080/m.wasm"));
        assert!(!RoutedSource::is_remote("espresso.wasm"));
        assert!(!RoutedSource::is_remote("file://espresso.wasm"));
    }
}

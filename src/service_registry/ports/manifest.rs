//! Manifest compilation port.

use crate::service_registry::domain::Definition;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Result type for manifest compilation.
pub type ManifestCompileResult<T> = Result<T, ManifestCompileError>;

/// Turns one manifest file into a definition hosted by another service.
#[async_trait]
pub trait ManifestCompiler: Send + Sync {
    /// Compiles `file`, resolving relative references against `base_dir`.
    async fn compile(
        &self,
        base_dir: &Utf8Path,
        file: &Utf8Path,
    ) -> ManifestCompileResult<Definition>;
}

/// Error returned when a manifest cannot be compiled.
#[derive(Debug, Clone, Error)]
#[error("failed to compile manifest {file}: {reason}")]
pub struct ManifestCompileError {
    /// Manifest path.
    pub file: Utf8PathBuf,
    /// Compiler message.
    pub reason: String,
}

impl ManifestCompileError {
    /// Creates a compile error for `file`.
    #[must_use]
    pub fn new(file: &Utf8Path, reason: impl Into<String>) -> Self {
        Self {
            file: file.to_owned(),
            reason: reason.into(),
        }
    }
}

//! Manifest compilation delegated to a running service.

use crate::service_registry::{
    domain::Definition,
    ports::{ManifestCompileError, ManifestCompileResult, ManifestCompiler, Service},
};
use async_trait::async_trait;
use camino::Utf8Path;
use serde_json::Value;
use std::sync::Arc;

/// Definition identifier that compiles manifests on the hosting service.
pub const MANIFEST_LOADER: &str = "Puppet::ManifestLoader";

/// Operation that compiles one manifest file.
pub const LOAD_MANIFEST_OPERATION: &str = "loadManifest";

/// Compiles manifests by invoking `Puppet::ManifestLoader.loadManifest` on
/// the service that interprets them.
pub struct ServiceManifestCompiler {
    service: Arc<dyn Service>,
}

impl ServiceManifestCompiler {
    /// Creates a compiler backed by `service`.
    #[must_use]
    pub const fn new(service: Arc<dyn Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ManifestCompiler for ServiceManifestCompiler {
    async fn compile(
        &self,
        base_dir: &Utf8Path,
        file: &Utf8Path,
    ) -> ManifestCompileResult<Definition> {
        let reply = self
            .service
            .invoke(
                MANIFEST_LOADER,
                LOAD_MANIFEST_OPERATION,
                vec![
                    Value::String(base_dir.as_str().to_owned()),
                    Value::String(file.as_str().to_owned()),
                ],
            )
            .await
            .map_err(|err| ManifestCompileError::new(file, err.to_string()))?;

        serde_json::from_value(reply).map_err(|err| {
            ManifestCompileError::new(file, format!("reply is not a definition: {err}"))
        })
    }
}

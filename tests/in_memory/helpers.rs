//! Shared fixtures for in-memory loader integration tests.

use std::sync::{Arc, Once};

use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use serde_json::{Value, json};
use switchyard::service_registry::{
    adapters::memory::{InMemoryService, InMemoryWorkerLauncher},
    domain::{Definition, Namespace, ServiceCommand, ServiceMetadata, TypedName},
    services::{LoaderConfig, ServiceLoader},
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Loader type exercised by the in-memory tests.
pub type TestLoader = ServiceLoader<InMemoryWorkerLauncher>;

/// A loader with no discovery sources and the launcher it starts workers
/// through.
pub struct LoaderContext {
    /// Scripted worker launcher.
    pub launcher: Arc<InMemoryWorkerLauncher>,
    /// Loader under test.
    pub loader: Arc<TestLoader>,
}

/// Configuration that discovers nothing on its own.
#[must_use]
pub fn isolated_config() -> LoaderConfig {
    LoaderConfig::default()
        .with_plugin_path(Vec::<String>::new())
        .with_embedded_plugins(Vec::<String>::new())
}

static TRACING: Once = Once::new();

/// Routes loader logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("tracing subscriber should install once");
    });
}

/// Provides a loader over an empty launcher.
#[fixture]
pub fn context() -> LoaderContext {
    init_tracing();
    let launcher = Arc::new(InMemoryWorkerLauncher::new());
    let loader = ServiceLoader::builder(Arc::clone(&launcher))
        .with_config(isolated_config())
        .build();
    LoaderContext { launcher, loader }
}

/// Builds a loader over `launcher` with `config`.
#[must_use]
pub fn loader_with(launcher: &Arc<InMemoryWorkerLauncher>, config: LoaderConfig) -> Arc<TestLoader> {
    init_tracing();
    ServiceLoader::builder(Arc::clone(launcher))
        .with_config(config)
        .build()
}

/// Creates an empty plugin directory that lives as long as the guard.
#[must_use]
pub fn plugin_directory() -> (tempfile::TempDir, Utf8PathBuf) {
    let guard = tempfile::tempdir().expect("temporary directory should be created");
    let path = Utf8PathBuf::from_path_buf(guard.path().to_path_buf())
        .expect("temporary directory should be UTF-8");
    (guard, path)
}

/// Writes `contents` to `name` inside `directory`, returning the new path.
pub fn write_file(directory: &Utf8Path, name: &str, contents: &str) -> Utf8PathBuf {
    let path = directory.join(name);
    std::fs::write(&path, contents).expect("fixture file should be written");
    path
}

/// Builds a command, panicking on invalid test input.
#[must_use]
pub fn command(path: &str) -> ServiceCommand {
    ServiceCommand::new(path).expect("test command should be valid")
}

/// Builds a definition `name` owned by service `service`.
#[must_use]
pub fn definition(service: &str, name: &str) -> Definition {
    Definition::new(
        TypedName::service(service),
        TypedName::new(Namespace::Definition, name),
    )
}

/// Builds a worker for `service` advertising `definitions`.
#[must_use]
pub fn worker(service: &str, definitions: Vec<Definition>) -> Arc<InMemoryService> {
    Arc::new(InMemoryService::new(
        TypedName::service(service),
        ServiceMetadata::new(None, definitions),
    ))
}

/// Renders a definition the way a hosting service returns it.
#[must_use]
pub fn definition_reply(service: &str, name: &str) -> Value {
    json!({
        "serviceId": {"namespace": "service", "name": service},
        "identifier": {"namespace": "definition", "name": name},
        "properties": {}
    })
}

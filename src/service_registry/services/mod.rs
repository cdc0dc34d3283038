//! Application services: discovery, activation, loading and multiplexing.

mod activator;
mod config;
mod discovery;
mod loader;
mod manifest;
mod proxy;

pub use activator::{Activation, ActivationError, ActivationResult, Activator};
pub use config::{
    DEFAULT_PLUGIN_PATH, DiscoveryPatterns, EMBEDDED_PLUGIN_SUBCOMMAND, EMBEDDED_PLUGINS,
    LoaderConfig, LoaderConfigError, PLUGIN_PATH_ENV,
};
pub use discovery::{
    ActivationRequest, Discovery, DiscoveryEngine, DiscoveryError, DiscoverySource,
    TYPES_SUBDIRECTORY, read_link,
};
pub use loader::{
    CommandRegistration, MANIFEST_HOST, PreloadReport, RegistrationReport, ServiceLoader,
    ServiceLoaderBuilder, ServiceLoaderError, ServiceLoaderResult,
};
pub use manifest::{LOAD_MANIFEST_OPERATION, MANIFEST_LOADER, ServiceManifestCompiler};
pub use proxy::{INVOKE_OPERATION, METADATA_OPERATION, MultiplexingProxy, STATE_OPERATION};

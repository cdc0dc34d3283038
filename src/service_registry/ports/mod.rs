//! Port contracts for service resolution, activation and compilation.

mod launcher;
mod loader;
mod manifest;
mod service;

pub use launcher::{LaunchError, LaunchResult, WorkerLauncher};
pub use loader::{EntryLoader, EntryLoaderError, EntryLoaderResult, EntryValue, LoaderEntry};
pub use manifest::{ManifestCompileError, ManifestCompileResult, ManifestCompiler};
pub use service::{Service, ServiceError, ServiceResult, StateObject};

#[cfg(test)]
pub use service::MockService;

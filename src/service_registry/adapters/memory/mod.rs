//! In-memory adapter implementations.
//!
//! [`ServiceRegistry`] is the production entry store. The launcher and
//! service adapters stand in for worker processes in deterministic tests and
//! for services hosted inside the current process.

mod launcher;
mod registry;
mod service;

pub use launcher::InMemoryWorkerLauncher;
pub use registry::ServiceRegistry;
pub use service::{InMemoryService, Invocation};

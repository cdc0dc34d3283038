//! Process-backed worker launching.
//!
//! The launcher owns spawning and termination. Talking to the worker is left
//! to a [`ServiceConnector`], which receives the process pipes and returns a
//! [`Service`](crate::service_registry::ports::Service) handle.

mod launcher;
mod worker;

pub use launcher::ProcessWorkerLauncher;
pub use worker::{ExitWatch, ServiceConnector, WorkerExit, WorkerProcess};

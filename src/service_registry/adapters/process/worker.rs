//! Spawned worker processes handed to service connectors.

use crate::service_registry::{
    domain::ServiceCommand,
    ports::{Service, ServiceResult},
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::watch;
use tokio_util::sync::DropGuard;

/// Establishes a service channel over a freshly spawned worker.
///
/// The returned handle must keep `process` alive for as long as the worker
/// should run: dropping the [`WorkerProcess`] cancels its execution scope and
/// terminates the child.
#[async_trait]
pub trait ServiceConnector: Send + Sync {
    /// Performs the handshake with `process` and returns its service handle.
    async fn connect(&self, process: WorkerProcess) -> ServiceResult<Arc<dyn Service>>;
}

/// How a worker process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// The process exited on its own, with its exit code when one exists.
    Exited(Option<i32>),
    /// The process was killed after its execution scope was cancelled.
    Killed,
    /// Waiting on or killing the process failed.
    WaitFailed(String),
}

/// Observes the exit of a supervised worker.
#[derive(Debug, Clone)]
pub struct ExitWatch(watch::Receiver<Option<WorkerExit>>);

impl ExitWatch {
    pub(super) const fn new(receiver: watch::Receiver<Option<WorkerExit>>) -> Self {
        Self(receiver)
    }

    /// Returns the exit if the worker has already ended.
    #[must_use]
    pub fn current(&self) -> Option<WorkerExit> {
        self.0.borrow().clone()
    }

    /// Waits until the worker has ended.
    ///
    /// Returns `None` if the supervisor went away without reporting.
    pub async fn wait(&mut self) -> Option<WorkerExit> {
        self.0
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|exit| exit.clone())
    }
}

/// A running worker and the pipes a connector talks to it over.
pub struct WorkerProcess {
    command: ServiceCommand,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    exit: ExitWatch,
    _guard: DropGuard,
}

impl fmt::Debug for WorkerProcess {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WorkerProcess")
            .field("command", &self.command)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl WorkerProcess {
    pub(super) fn new(
        command: ServiceCommand,
        pid: Option<u32>,
        pipes: (Option<ChildStdin>, Option<ChildStdout>),
        exit: ExitWatch,
        guard: DropGuard,
    ) -> Self {
        let (stdin, stdout) = pipes;
        Self {
            command,
            pid,
            stdin,
            stdout,
            exit,
            _guard: guard,
        }
    }

    /// Returns the command the worker was started with.
    #[must_use]
    pub const fn command(&self) -> &ServiceCommand {
        &self.command
    }

    /// Returns the operating system process id, if still known.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Takes the worker's standard input.
    pub const fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Takes the worker's standard output.
    pub const fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Returns a watch on the worker's exit.
    #[must_use]
    pub fn exit_watch(&self) -> ExitWatch {
        self.exit.clone()
    }
}

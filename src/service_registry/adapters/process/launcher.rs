//! Worker launcher that spawns operating system processes.

use super::worker::{ExitWatch, ServiceConnector, WorkerExit, WorkerProcess};
use crate::service_registry::{
    domain::ServiceCommand,
    ports::{LaunchError, LaunchResult, Service, WorkerLauncher},
};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Launches workers as child processes and hands them to a connector.
///
/// Each child runs with piped standard input and output and inherited
/// standard error. A supervisor task owns the child: it kills the process
/// once the execution scope is cancelled and publishes the exit on the
/// worker's [`ExitWatch`].
pub struct ProcessWorkerLauncher<C: ServiceConnector> {
    connector: Arc<C>,
}

impl<C: ServiceConnector> ProcessWorkerLauncher<C> {
    /// Creates a launcher that connects to workers through `connector`.
    #[must_use]
    pub const fn new(connector: Arc<C>) -> Self {
        Self { connector }
    }
}

fn supervise(
    mut child: Child,
    command: ServiceCommand,
    scope: CancellationToken,
    exit_tx: watch::Sender<Option<WorkerExit>>,
) {
    tokio::spawn(async move {
        let exit = tokio::select! {
            waited = child.wait() => match waited {
                Ok(status) => WorkerExit::Exited(status.code()),
                Err(err) => WorkerExit::WaitFailed(err.to_string()),
            },
            () = scope.cancelled() => match child.kill().await {
                Ok(()) => WorkerExit::Killed,
                Err(err) => WorkerExit::WaitFailed(err.to_string()),
            },
        };

        match &exit {
            WorkerExit::WaitFailed(reason) => {
                tracing::warn!(command = %command, reason = %reason, "lost track of worker process");
            }
            _ => tracing::debug!(command = %command, exit = ?exit, "worker process ended"),
        }
        exit_tx.send_replace(Some(exit));
    });
}

#[async_trait]
impl<C: ServiceConnector> WorkerLauncher for ProcessWorkerLauncher<C> {
    async fn launch(
        &self,
        command: &ServiceCommand,
        scope: CancellationToken,
    ) -> LaunchResult<Arc<dyn Service>> {
        let mut child = Command::new(command.command())
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| LaunchError::spawn(command, err))?;

        let pid = child.id();
        let pipes = (child.stdin.take(), child.stdout.take());
        let (exit_tx, exit_rx) = watch::channel(None);
        tracing::debug!(command = %command, pid = ?pid, "spawned worker process");
        supervise(child, command.clone(), scope.clone(), exit_tx);

        let process = WorkerProcess::new(
            command.clone(),
            pid,
            pipes,
            ExitWatch::new(exit_rx),
            scope.clone().drop_guard(),
        );

        match self.connector.connect(process).await {
            Ok(service) => Ok(service),
            Err(err) => {
                scope.cancel();
                Err(LaunchError::connect(command, err))
            }
        }
    }
}

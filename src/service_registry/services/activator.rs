//! Worker activation: launch, read metadata, and release transient workers.

use crate::service_registry::{
    domain::{ServiceCommand, ServiceMetadata},
    ports::{LaunchError, Service, WorkerLauncher},
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors returned by [`Activator::activate`].
#[derive(Debug, Clone, Error)]
pub enum ActivationError {
    /// The worker could not be launched or connected to.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The caller cancelled the activation before it completed.
    #[error("activation of `{0}` was cancelled")]
    Cancelled(String),
}

/// Result type for activations.
pub type ActivationResult<T> = Result<T, ActivationError>;

/// A launched worker together with the metadata it advertised.
#[derive(Clone)]
pub struct Activation {
    /// Handle to the worker's service.
    pub service: Arc<dyn Service>,
    /// Metadata read right after launch; empty when the read failed.
    pub metadata: ServiceMetadata,
}

/// Starts workers and copies their metadata.
///
/// Live workers run inside a child of the activator's root scope and stop
/// when [`Activator::shutdown`] is called or their handle is dropped.
/// Transient workers run inside a child of the caller's scope and are stopped
/// as soon as their metadata has been read.
pub struct Activator<L: WorkerLauncher> {
    launcher: Arc<L>,
    root: CancellationToken,
}

impl<L: WorkerLauncher> Activator<L> {
    /// Creates an activator launching workers through `launcher`.
    #[must_use]
    pub fn new(launcher: Arc<L>) -> Self {
        Self {
            launcher,
            root: CancellationToken::new(),
        }
    }

    /// Returns the launcher.
    #[must_use]
    pub const fn launcher(&self) -> &Arc<L> {
        &self.launcher
    }

    /// Launches `command` and reads its metadata.
    ///
    /// A metadata read failure is logged and yields empty metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Launch`] when the launcher fails and
    /// [`ActivationError::Cancelled`] when `caller` is cancelled first. In
    /// both cases the worker's scope is cancelled.
    pub async fn activate(
        &self,
        command: &ServiceCommand,
        keep_alive: bool,
        caller: &CancellationToken,
    ) -> ActivationResult<Activation> {
        let scope = if keep_alive {
            self.root.child_token()
        } else {
            caller.child_token()
        };
        tracing::debug!(command = %command, keep_alive, "activating worker");

        let launched = tokio::select! {
            result = self.launcher.launch(command, scope.clone()) => result.map_err(ActivationError::from),
            () = caller.cancelled() => Err(cancelled(command)),
        };
        let service = match launched {
            Ok(service) => service,
            Err(err) => {
                scope.cancel();
                return Err(err);
            }
        };

        let fetched = tokio::select! {
            result = service.metadata() => Ok(result),
            () = caller.cancelled() => Err(cancelled(command)),
        };
        let metadata = match fetched {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(err)) => {
                tracing::warn!(command = %command, error = %err, "failed to read worker metadata");
                ServiceMetadata::default()
            }
            Err(err) => {
                scope.cancel();
                return Err(err);
            }
        };

        if !keep_alive {
            scope.cancel();
        }
        tracing::info!(
            command = %command,
            keep_alive,
            definitions = metadata.definitions().len(),
            "activated worker"
        );
        Ok(Activation { service, metadata })
    }

    /// Stops every live worker started by this activator.
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    /// Returns whether [`Activator::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }
}

fn cancelled(command: &ServiceCommand) -> ActivationError {
    ActivationError::Cancelled(command.to_string())
}

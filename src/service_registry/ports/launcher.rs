//! Worker launch port used by the activator.

use super::{Service, ServiceError};
use crate::service_registry::domain::ServiceCommand;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for worker launches.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Starts a worker for a command and returns a handle to its service.
///
/// Implementations must terminate the worker once `scope` is cancelled.
/// A handle that owns its worker should also cancel `scope` when dropped.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Launches the worker described by `command` inside `scope`.
    async fn launch(
        &self,
        command: &ServiceCommand,
        scope: CancellationToken,
    ) -> LaunchResult<Arc<dyn Service>>;
}

/// Errors returned by worker launchers.
#[derive(Debug, Clone, Error)]
pub enum LaunchError {
    /// The worker process could not be started.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying spawn failure.
        source: Arc<std::io::Error>,
    },

    /// The worker started but the service handshake failed.
    #[error("failed to connect to `{command}`: {source}")]
    Connect {
        /// Rendered command line.
        command: String,
        /// Handshake failure.
        source: ServiceError,
    },

    /// No worker is known for the command.
    #[error("no worker available for `{0}`")]
    UnknownWorker(String),
}

impl LaunchError {
    /// Creates a spawn failure for `command`.
    pub fn spawn(command: &ServiceCommand, err: std::io::Error) -> Self {
        Self::Spawn {
            command: command.to_string(),
            source: Arc::new(err),
        }
    }

    /// Creates a handshake failure for `command`.
    pub fn connect(command: &ServiceCommand, err: ServiceError) -> Self {
        Self::Connect {
            command: command.to_string(),
            source: err,
        }
    }
}

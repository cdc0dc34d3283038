//! In-memory worker launcher for deterministic activation tests.

use crate::service_registry::{
    domain::ServiceCommand,
    ports::{LaunchError, LaunchResult, Service, WorkerLauncher},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// In-memory worker launcher.
///
/// This adapter models worker activation without spawning external
/// processes. Every launch is recorded together with the execution scope it
/// was given, so tests can assert how often a worker was started and whether
/// its scope was released.
#[derive(Clone, Default)]
pub struct InMemoryWorkerLauncher {
    state: Arc<RwLock<InMemoryLauncherState>>,
}

#[derive(Default)]
struct InMemoryLauncherState {
    workers: HashMap<ServiceCommand, Arc<dyn Service>>,
    failures: HashMap<ServiceCommand, String>,
    launches: Vec<(ServiceCommand, CancellationToken)>,
    delay: Option<Duration>,
}

impl InMemoryWorkerLauncher {
    /// Creates a launcher that knows no workers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        apply: impl FnOnce(&mut InMemoryLauncherState) -> T,
    ) -> LaunchResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|err| LaunchError::UnknownWorker(format!("launcher state poisoned: {err}")))?;
        Ok(apply(&mut state))
    }

    /// Makes `command` start `service`.
    ///
    /// # Errors
    ///
    /// Returns a launch error when lock acquisition fails.
    pub fn register_worker(
        &self,
        command: ServiceCommand,
        service: Arc<dyn Service>,
    ) -> LaunchResult<()> {
        self.with_state(|state| {
            state.failures.remove(&command);
            state.workers.insert(command, service);
        })
    }

    /// Makes launches of `command` fail with `reason`.
    ///
    /// # Errors
    ///
    /// Returns a launch error when lock acquisition fails.
    pub fn fail_worker(
        &self,
        command: ServiceCommand,
        reason: impl Into<String>,
    ) -> LaunchResult<()> {
        let message = reason.into();
        self.with_state(|state| {
            state.workers.remove(&command);
            state.failures.insert(command, message);
        })
    }

    /// Delays every launch, widening the window for concurrent callers.
    ///
    /// # Errors
    ///
    /// Returns a launch error when lock acquisition fails.
    pub fn set_launch_delay(&self, delay: Duration) -> LaunchResult<()> {
        self.with_state(|state| state.delay = Some(delay))
    }

    /// Returns how many times `command` was launched.
    #[must_use]
    pub fn launch_count(&self, command: &ServiceCommand) -> usize {
        self.launches()
            .iter()
            .filter(|launched| *launched == command)
            .count()
    }

    /// Returns every launched command in launch order.
    #[must_use]
    pub fn launches(&self) -> Vec<ServiceCommand> {
        self.state
            .read()
            .map(|state| {
                state
                    .launches
                    .iter()
                    .map(|(command, _)| command.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the execution scopes handed to launches of `command`.
    #[must_use]
    pub fn scopes(&self, command: &ServiceCommand) -> Vec<CancellationToken> {
        self.state
            .read()
            .map(|state| {
                state
                    .launches
                    .iter()
                    .filter(|(launched, _)| launched == command)
                    .map(|(_, scope)| scope.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkerLauncher for InMemoryWorkerLauncher {
    async fn launch(
        &self,
        command: &ServiceCommand,
        scope: CancellationToken,
    ) -> LaunchResult<Arc<dyn Service>> {
        let delay = self.with_state(|state| {
            state.launches.push((command.clone(), scope.clone()));
            state.delay
        })?;

        if let Some(pause) = delay {
            tokio::time::sleep(pause).await;
        }

        self.with_state(|state| {
            if let Some(reason) = state.failures.get(command) {
                return Err(LaunchError::spawn(command, std::io::Error::other(reason.clone())));
            }
            state
                .workers
                .get(command)
                .cloned()
                .ok_or_else(|| LaunchError::UnknownWorker(command.to_string()))
        })?
    }
}

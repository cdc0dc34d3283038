//! Recorded commands used to (re)start a service's worker.

use super::ServiceRegistryDomainError;
use crate::worker::command_line;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How to start the worker process backing a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceCommand {
    command: String,
    args: Vec<String>,
}

impl ServiceCommand {
    /// Creates a command without arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceRegistryDomainError::EmptyCommand`] when `command` is
    /// empty after trimming.
    pub fn new(command: impl Into<String>) -> Result<Self, ServiceRegistryDomainError> {
        let normalized = command.into().trim().to_owned();
        if normalized.is_empty() {
            return Err(ServiceRegistryDomainError::EmptyCommand);
        }

        Ok(Self {
            command: normalized,
            args: Vec::new(),
        })
    }

    /// Replaces the command-line arguments.
    #[must_use]
    pub fn with_args(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.args = values.into_iter().collect();
        self
    }

    /// Returns the executable.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ServiceCommand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&command_line(&self.command, &self.args))
    }
}

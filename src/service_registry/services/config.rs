//! Loader configuration: plugin path, executable and discovery patterns.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Plugin directories searched when none are configured.
pub const DEFAULT_PLUGIN_PATH: [&str; 2] = ["./plugins", "./build"];

/// Plugins compiled into the host executable.
pub const EMBEDDED_PLUGINS: [&str; 2] = ["identity", "puppet"];

/// Subcommand that makes the host executable expose one embedded plugin.
pub const EMBEDDED_PLUGIN_SUBCOMMAND: &str = "plugin";

/// Environment variable overriding the plugin path.
pub const PLUGIN_PATH_ENV: &str = "SWITCHYARD_PLUGIN_PATH";

/// Errors raised while resolving configuration against the environment.
#[derive(Debug, Clone, Error)]
pub enum LoaderConfigError {
    /// The current executable could not be determined.
    #[error("failed to resolve the current executable: {0}")]
    CurrentExecutable(Arc<std::io::Error>),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Glob patterns for each discovery strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscoveryPatterns {
    /// Worker executables.
    pub worker: String,
    /// Manifests written in the manifest DSL.
    pub dsl_manifest: String,
    /// Generic manifests.
    pub generic_manifest: String,
    /// Link descriptors.
    pub link: String,
}

impl Default for DiscoveryPatterns {
    fn default() -> Self {
        Self {
            worker: "plugin-*".to_owned(),
            dsl_manifest: "*.pp".to_owned(),
            generic_manifest: "*.yaml".to_owned(),
            link: "*.ll".to_owned(),
        }
    }
}

/// Configuration for a [`ServiceLoader`](super::ServiceLoader).
///
/// Deserializes from any serde format; every field is optional.
///
/// ```
/// use switchyard::service_registry::services::LoaderConfig;
///
/// let config = LoaderConfig::default().with_plugin_path(["/opt/plugins"]);
/// assert_eq!(config.plugin_path().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    plugin_path: Vec<Utf8PathBuf>,
    executable: Option<Utf8PathBuf>,
    embedded_plugins: Vec<String>,
    patterns: DiscoveryPatterns,
}

fn default_plugin_path() -> Vec<Utf8PathBuf> {
    DEFAULT_PLUGIN_PATH.iter().map(Utf8PathBuf::from).collect()
}

fn default_embedded_plugins() -> Vec<String> {
    EMBEDDED_PLUGINS.iter().map(|name| (*name).to_owned()).collect()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            plugin_path: default_plugin_path(),
            executable: None,
            embedded_plugins: default_embedded_plugins(),
            patterns: DiscoveryPatterns::default(),
        }
    }
}

impl LoaderConfig {
    /// Builds the default configuration, taking the plugin path from
    /// `SWITCHYARD_PLUGIN_PATH` when it is set.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderConfigError::NonUtf8Path`] when an entry of the
    /// variable is not valid UTF-8.
    pub fn from_env() -> Result<Self, LoaderConfigError> {
        let config = Self::default();
        let Some(raw) = std::env::var_os(PLUGIN_PATH_ENV) else {
            return Ok(config);
        };

        let directories = std::env::split_paths(&raw)
            .filter(|path| !path.as_os_str().is_empty())
            .map(|path| Utf8PathBuf::from_path_buf(path).map_err(LoaderConfigError::NonUtf8Path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(config.with_plugin_path(directories))
    }

    /// Replaces the ordered plugin path.
    #[must_use]
    pub fn with_plugin_path<P: Into<Utf8PathBuf>>(
        mut self,
        directories: impl IntoIterator<Item = P>,
    ) -> Self {
        self.plugin_path = directories.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the executable re-invoked for embedded plugins.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<Utf8PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    /// Replaces the embedded plugin list.
    #[must_use]
    pub fn with_embedded_plugins<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.embedded_plugins = names.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the discovery patterns.
    #[must_use]
    pub fn with_patterns(mut self, patterns: DiscoveryPatterns) -> Self {
        self.patterns = patterns;
        self
    }

    /// Returns the ordered plugin path.
    #[must_use]
    pub fn plugin_path(&self) -> &[Utf8PathBuf] {
        &self.plugin_path
    }

    /// Returns the embedded plugin names.
    #[must_use]
    pub fn embedded_plugins(&self) -> &[String] {
        &self.embedded_plugins
    }

    /// Returns the discovery patterns.
    #[must_use]
    pub const fn patterns(&self) -> &DiscoveryPatterns {
        &self.patterns
    }

    /// Returns the executable that hosts embedded plugins.
    ///
    /// Falls back to the current executable when none is configured.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderConfigError`] when the current executable cannot be
    /// resolved or its path is not UTF-8.
    pub fn executable(&self) -> Result<Utf8PathBuf, LoaderConfigError> {
        if let Some(configured) = &self.executable {
            return Ok(configured.clone());
        }

        let current = std::env::current_exe()
            .map_err(|err| LoaderConfigError::CurrentExecutable(Arc::new(err)))?;
        Utf8PathBuf::from_path_buf(current).map_err(LoaderConfigError::NonUtf8Path)
    }

    /// Returns the configured executable without falling back.
    #[must_use]
    pub fn configured_executable(&self) -> Option<&Utf8Path> {
        self.executable.as_deref()
    }
}

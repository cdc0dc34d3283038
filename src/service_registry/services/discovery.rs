//! Discovery strategies that turn configuration and plugin directories into
//! activation requests.
//!
//! Every strategy isolates failures per item: a bad directory, pattern or
//! link file is logged and reported in [`Discovery::errors`] while the
//! remaining items are still produced.

use super::config::{EMBEDDED_PLUGIN_SUBCOMMAND, LoaderConfig, LoaderConfigError};
use crate::service_registry::{
    domain::{
        LinkDescriptor, LinkDescriptorError, ServiceCommand, ServiceRegistryDomainError,
        TypedName,
    },
    ports::ManifestCompileError,
};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use glob::Pattern;
use std::sync::Arc;
use thiserror::Error;

/// Subdirectory searched before its plugin directory.
pub const TYPES_SUBDIRECTORY: &str = "types";

/// Where an activation request was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoverySource {
    /// A plugin compiled into the host executable.
    Embedded(String),
    /// A worker executable found on the plugin path.
    Filesystem(Utf8PathBuf),
    /// A link descriptor found on the plugin path.
    Link(Utf8PathBuf),
}

/// A candidate worker to activate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    /// Command that starts the worker.
    pub command: ServiceCommand,
    /// Whether the worker stays running after its metadata is read.
    pub keep_alive: bool,
    /// Where the candidate came from.
    pub source: DiscoverySource,
}

/// Items produced by one discovery pass together with the failures skipped
/// along the way.
#[derive(Debug, Clone)]
pub struct Discovery<T> {
    /// Discovered items in deterministic order.
    pub items: Vec<T>,
    /// Failures that caused an item or directory to be skipped.
    pub errors: Vec<DiscoveryError>,
}

impl<T> Default for Discovery<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> Discovery<T> {
    fn skip(&mut self, error: DiscoveryError) {
        tracing::error!(error = %error, "skipping discovery candidate");
        self.errors.push(error);
    }

    fn absorb<U>(&mut self, other: Discovery<U>) -> Vec<U> {
        self.errors.extend(other.errors);
        other.items
    }
}

/// Errors isolated by discovery.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    /// A plugin directory does not exist.
    #[error("plugin directory {0} does not exist")]
    MissingDirectory(Utf8PathBuf),

    /// A plugin path entry is not a directory.
    #[error("plugin path entry {0} is not a directory")]
    NotADirectory(Utf8PathBuf),

    /// A discovery pattern is not a valid glob.
    #[error("invalid discovery pattern `{pattern}`: {reason}")]
    InvalidPattern {
        /// Pattern as configured.
        pattern: String,
        /// Parser message.
        reason: String,
    },

    /// A directory or file could not be read.
    #[error("failed to read {path}: {source}")]
    Unreadable {
        /// Path that failed.
        path: Utf8PathBuf,
        /// Underlying failure.
        source: Arc<std::io::Error>,
    },

    /// A link file is malformed.
    #[error("invalid link file {path}: {source}")]
    Link {
        /// Link file.
        path: Utf8PathBuf,
        /// Parse failure.
        source: LinkDescriptorError,
    },

    /// A discovered path cannot be used as a command.
    #[error("cannot start {path}: {source}")]
    InvalidCommand {
        /// Discovered path.
        path: Utf8PathBuf,
        /// Validation failure.
        source: ServiceRegistryDomainError,
    },

    /// The executable hosting embedded plugins is unknown.
    #[error(transparent)]
    Executable(#[from] LoaderConfigError),

    /// The service that compiles manifests is not available.
    #[error("manifest host {0} is not available")]
    ManifestHostUnavailable(TypedName),

    /// A manifest failed to compile.
    #[error(transparent)]
    Manifest(#[from] ManifestCompileError),
}

impl DiscoveryError {
    fn unreadable(path: &Utf8Path, err: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.to_owned(),
            source: Arc::new(err),
        }
    }
}

/// Produces activation requests from the configured sources.
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    config: LoaderConfig,
}

impl DiscoveryEngine {
    /// Creates an engine over `config`.
    #[must_use]
    pub const fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Requests for the plugins compiled into the host executable.
    ///
    /// Each request re-invokes the executable as `<exe> plugin <name>` and
    /// keeps the worker alive.
    #[must_use]
    pub fn embedded_requests(&self) -> Discovery<ActivationRequest> {
        let mut discovery = Discovery::default();
        if self.config.embedded_plugins().is_empty() {
            return discovery;
        }
        let executable = match self.config.executable() {
            Ok(path) => path,
            Err(err) => {
                discovery.skip(err.into());
                return discovery;
            }
        };

        for name in self.config.embedded_plugins() {
            match ServiceCommand::new(executable.as_str()) {
                Ok(command) => discovery.items.push(ActivationRequest {
                    command: command
                        .with_args([EMBEDDED_PLUGIN_SUBCOMMAND.to_owned(), name.clone()]),
                    keep_alive: true,
                    source: DiscoverySource::Embedded(name.clone()),
                }),
                Err(source) => discovery.skip(DiscoveryError::InvalidCommand {
                    path: executable.clone(),
                    source,
                }),
            }
        }
        discovery
    }

    /// Finds files matching `pattern` across the plugin path.
    ///
    /// For each directory in configured order, matches under its `types/`
    /// subdirectory come first, then matches directly inside it. Matches
    /// within one directory are sorted by file name. Subdirectories never
    /// match.
    #[must_use]
    pub fn find_files(&self, pattern: &str) -> Discovery<Utf8PathBuf> {
        let mut discovery = Discovery::default();
        let matcher = match Pattern::new(pattern) {
            Ok(matcher) => matcher,
            Err(err) => {
                discovery.skip(DiscoveryError::InvalidPattern {
                    pattern: pattern.to_owned(),
                    reason: err.to_string(),
                });
                return discovery;
            }
        };

        for directory in self.config.plugin_path() {
            if !directory.exists() {
                discovery.skip(DiscoveryError::MissingDirectory(directory.clone()));
                continue;
            }
            if !directory.is_dir() {
                discovery.skip(DiscoveryError::NotADirectory(directory.clone()));
                continue;
            }

            let types = directory.join(TYPES_SUBDIRECTORY);
            if types.is_dir() {
                match_directory(&types, &matcher, &mut discovery);
            }
            match_directory(directory, &matcher, &mut discovery);
        }
        discovery
    }

    /// Requests for worker executables on the plugin path.
    ///
    /// Workers are started only long enough to read their metadata.
    #[must_use]
    pub fn worker_requests(&self) -> Discovery<ActivationRequest> {
        let mut discovery = Discovery::default();
        let found = self.find_files(&self.config.patterns().worker);
        for path in discovery.absorb(found) {
            match ServiceCommand::new(path.as_str()) {
                Ok(command) => discovery.items.push(ActivationRequest {
                    command,
                    keep_alive: false,
                    source: DiscoverySource::Filesystem(path),
                }),
                Err(source) => discovery.skip(DiscoveryError::InvalidCommand { path, source }),
            }
        }
        discovery
    }

    /// Manifest files on the plugin path, DSL manifests before generic ones.
    #[must_use]
    pub fn manifest_files(&self) -> Discovery<Utf8PathBuf> {
        let patterns = self.config.patterns();
        let mut discovery = Discovery::default();
        for pattern in [&patterns.dsl_manifest, &patterns.generic_manifest] {
            let found = self.find_files(pattern);
            let files = discovery.absorb(found);
            discovery.items.extend(files);
        }
        discovery
    }

    /// Requests for the link descriptors on the plugin path.
    ///
    /// Linked workers are kept alive.
    #[must_use]
    pub fn link_requests(&self) -> Discovery<ActivationRequest> {
        let mut discovery = Discovery::default();
        let found = self.find_files(&self.config.patterns().link);
        for path in discovery.absorb(found) {
            match read_link(&path) {
                Ok(command) => discovery.items.push(ActivationRequest {
                    command,
                    keep_alive: true,
                    source: DiscoverySource::Link(path),
                }),
                Err(err) => discovery.skip(err),
            }
        }
        discovery
    }
}

fn match_directory(
    directory: &Utf8Path,
    matcher: &Pattern,
    discovery: &mut Discovery<Utf8PathBuf>,
) {
    let names = match matching_names(directory, matcher) {
        Ok(names) => names,
        Err(err) => {
            discovery.skip(DiscoveryError::unreadable(directory, err));
            return;
        }
    };
    discovery
        .items
        .extend(names.into_iter().map(|name| directory.join(name)));
}

fn matching_names(directory: &Utf8Path, matcher: &Pattern) -> std::io::Result<Vec<String>> {
    let dir = Dir::open_ambient_dir(directory, ambient_authority())?;
    let mut names = Vec::new();
    for entry in dir.entries()? {
        let Ok(entry) = entry else {
            tracing::debug!(directory = %directory, "skipping unreadable directory entry");
            continue;
        };
        let Ok(name) = entry.file_name() else {
            tracing::debug!(directory = %directory, "skipping directory entry without a UTF-8 name");
            continue;
        };
        if entry.file_type().is_ok_and(|kind| kind.is_dir()) || !matcher.matches(&name) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Reads and parses the link file at `path` into a worker command.
///
/// # Errors
///
/// Returns [`DiscoveryError::Unreadable`] when the file cannot be read and
/// [`DiscoveryError::Link`] when it is not a valid link descriptor.
pub fn read_link(path: &Utf8Path) -> Result<ServiceCommand, DiscoveryError> {
    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return Err(DiscoveryError::unreadable(
            path,
            std::io::Error::other("link path does not name a file"),
        ));
    };
    let directory = if parent.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        parent
    };

    let source = Dir::open_ambient_dir(directory, ambient_authority())
        .and_then(|dir| dir.read_to_string(file_name))
        .map_err(|err| DiscoveryError::unreadable(path, err))?;
    let descriptor = LinkDescriptor::parse(&source).map_err(|err| DiscoveryError::Link {
        path: path.to_owned(),
        source: err,
    })?;
    descriptor
        .to_command()
        .map_err(|err| DiscoveryError::InvalidCommand {
            path: path.to_owned(),
            source: err,
        })
}

//! The service loader: discovery orchestration, metadata registration and
//! lazy activation on lookup.

use super::{
    activator::{ActivationError, Activator},
    config::LoaderConfig,
    discovery::{ActivationRequest, Discovery, DiscoveryEngine, DiscoveryError},
    manifest::ServiceManifestCompiler,
    proxy::MultiplexingProxy,
};
use crate::service_registry::{
    adapters::memory::ServiceRegistry,
    domain::{Definition, ServiceCommand, ServiceMetadata, TypedName},
    ports::{
        EntryLoader, EntryLoaderError, EntryLoaderResult, LoaderEntry, ManifestCompiler, Service,
        ServiceError, WorkerLauncher,
    },
};
use async_trait::async_trait;
use camino::Utf8Path;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Service that compiles manifests and hosts the resulting definitions.
pub const MANIFEST_HOST: &str = "Puppet";

/// Errors returned by [`ServiceLoader`] operations.
#[derive(Debug, Clone, Error)]
pub enum ServiceLoaderError {
    /// The entry store failed.
    #[error(transparent)]
    Store(#[from] EntryLoaderError),
    /// The service being registered failed to report its metadata.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Result type for loader operations.
pub type ServiceLoaderResult<T> = Result<T, ServiceLoaderError>;

/// What happened to the start command offered with a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandRegistration {
    /// No command was offered.
    #[default]
    NotProvided,
    /// The command was recorded for lazy activation.
    Recorded,
    /// A command was already recorded for the service; the offer was dropped.
    Rejected,
}

/// Outcome of registering one service's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegistrationReport {
    /// Service owning the definitions, absent when none were advertised.
    pub service_id: Option<TypedName>,
    /// What happened to the offered command.
    pub command: CommandRegistration,
    /// Names stored by this registration, handler aliases included.
    pub registered: Vec<TypedName>,
    /// Names skipped because an earlier registration holds them.
    pub skipped: Vec<TypedName>,
}

/// Outcome of a preload pass.
#[derive(Debug, Clone, Default)]
pub struct PreloadReport {
    /// One report per service whose metadata was registered.
    pub registrations: Vec<RegistrationReport>,
    /// Candidates skipped during discovery.
    pub discovery_errors: Vec<DiscoveryError>,
    /// Candidates whose worker could not be activated.
    pub activation_failures: Vec<(ServiceCommand, ActivationError)>,
}

impl PreloadReport {
    fn skip(&mut self, error: DiscoveryError) {
        tracing::error!(error = %error, "skipping discovered candidate");
        self.discovery_errors.push(error);
    }

    fn absorb<T>(&mut self, discovery: Discovery<T>) -> Vec<T> {
        self.discovery_errors.extend(discovery.errors);
        discovery.items
    }
}

/// Builder for [`ServiceLoader`].
pub struct ServiceLoaderBuilder<L: WorkerLauncher + 'static> {
    launcher: Arc<L>,
    config: LoaderConfig,
    parent: Option<Arc<dyn EntryLoader>>,
    manifest_compiler: Option<Arc<dyn ManifestCompiler>>,
}

impl<L: WorkerLauncher + 'static> ServiceLoaderBuilder<L> {
    /// Starts a builder launching workers through `launcher`.
    #[must_use]
    pub fn new(launcher: Arc<L>) -> Self {
        Self {
            launcher,
            config: LoaderConfig::default(),
            parent: None,
            manifest_compiler: None,
        }
    }

    /// Sets the discovery configuration.
    #[must_use]
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the loader consulted for names not stored locally.
    #[must_use]
    pub fn with_parent(mut self, parent: Arc<dyn EntryLoader>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Compiles manifests with `compiler` instead of the manifest host.
    #[must_use]
    pub fn with_manifest_compiler(mut self, compiler: Arc<dyn ManifestCompiler>) -> Self {
        self.manifest_compiler = Some(compiler);
        self
    }

    /// Builds the loader.
    #[must_use]
    pub fn build(self) -> Arc<ServiceLoader<L>> {
        let registry = self
            .parent
            .map_or_else(ServiceRegistry::new, ServiceRegistry::with_parent);
        Arc::new_cyclic(|self_ref| ServiceLoader {
            registry,
            activator: Activator::new(self.launcher),
            discovery: DiscoveryEngine::new(self.config),
            manifest_compiler: self.manifest_compiler,
            activations: Mutex::default(),
            self_ref: self_ref.clone(),
        })
    }
}

/// Registry of services, definitions and handlers with lazy activation.
///
/// Names resolve from the local store first, then from the parent. A
/// service name that is still unresolved but has a recorded start command
/// is activated on demand and kept running; concurrent lookups of the same
/// name share one activation.
pub struct ServiceLoader<L: WorkerLauncher + 'static> {
    registry: ServiceRegistry,
    activator: Activator<L>,
    discovery: DiscoveryEngine,
    manifest_compiler: Option<Arc<dyn ManifestCompiler>>,
    activations: Mutex<HashMap<TypedName, Arc<tokio::sync::Mutex<()>>>>,
    self_ref: Weak<Self>,
}

impl<L: WorkerLauncher + 'static> ServiceLoader<L> {
    /// Starts a builder launching workers through `launcher`.
    #[must_use]
    pub fn builder(launcher: Arc<L>) -> ServiceLoaderBuilder<L> {
        ServiceLoaderBuilder::new(launcher)
    }

    /// Returns the discovery engine.
    #[must_use]
    pub const fn discovery(&self) -> &DiscoveryEngine {
        &self.discovery
    }

    /// Resolves `name`, activating its service on demand.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError`] when the entry store is unavailable.
    /// Activation failures are logged and resolve to the prior result.
    pub async fn lookup(&self, name: &TypedName) -> EntryLoaderResult<Option<LoaderEntry>> {
        self.lookup_with_cancel(name, &CancellationToken::new()).await
    }

    /// Resolves `name`; an activation it triggers is abandoned when `cancel`
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError`] when the entry store is unavailable.
    pub async fn lookup_with_cancel(
        &self,
        name: &TypedName,
        cancel: &CancellationToken,
    ) -> EntryLoaderResult<Option<LoaderEntry>> {
        let prior = self.registry.load_entry(name).await?;
        if prior.as_ref().is_some_and(LoaderEntry::has_value) || !name.is_service() {
            return Ok(prior);
        }
        let Some(command) = self.registry.service_command(name)? else {
            tracing::debug!(service = %name, "unknown service id");
            return Ok(prior);
        };

        let guard = self.activation_guard(name)?;
        let _in_flight = tokio::select! {
            in_flight = guard.lock() => in_flight,
            () = cancel.cancelled() => {
                tracing::debug!(service = %name, "lookup cancelled while waiting for activation");
                return Ok(prior);
            }
        };
        if let Some(entry) = self
            .registry
            .local_entry(name)?
            .filter(LoaderEntry::has_value)
        {
            return Ok(Some(entry));
        }

        match self.activator.activate(&command, true, cancel).await {
            Ok(activation) => {
                let entry = LoaderEntry::service(activation.service);
                match self.registry.set_entry(name.clone(), entry.clone()) {
                    Ok(()) => {
                        tracing::info!(service = %name, command = %command, "activated service on demand");
                        Ok(Some(entry))
                    }
                    Err(EntryLoaderError::DuplicateEntry(_)) => {
                        tracing::warn!(service = %name, "service stored concurrently; keeping the first entry");
                        Ok(self.registry.local_entry(name)?.or(Some(entry)))
                    }
                    Err(err) => Err(err),
                }
            }
            Err(err) => {
                tracing::error!(service = %name, error = %err, "service could not be started");
                Ok(prior)
            }
        }
    }

    fn activation_guard(&self, name: &TypedName) -> EntryLoaderResult<Arc<tokio::sync::Mutex<()>>> {
        let mut activations = self.activations.lock().map_err(|err| {
            EntryLoaderError::store_unavailable(std::io::Error::other(err.to_string()))
        })?;
        Ok(Arc::clone(activations.entry(name.clone()).or_default()))
    }

    /// Registers the metadata advertised by `service`.
    ///
    /// The owning service is the `service_id` of the first definition. A
    /// `command` is recorded for it unless one already is; a rejected command
    /// does not stop the definitions from registering. Each definition is
    /// stored under its identifier and, when it declares `handlerFor: T`,
    /// under `Handler:T` as well. Names already holding a value are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceLoaderError`] when the metadata cannot be read or the
    /// entry store is unavailable.
    pub async fn register_metadata(
        &self,
        command: Option<&ServiceCommand>,
        service: &dyn Service,
    ) -> ServiceLoaderResult<RegistrationReport> {
        let metadata = service.metadata().await?;
        Ok(self.register_definitions(command, &metadata)?)
    }

    fn register_definitions(
        &self,
        command: Option<&ServiceCommand>,
        metadata: &ServiceMetadata,
    ) -> EntryLoaderResult<RegistrationReport> {
        let Some(service_id) = metadata.service_id() else {
            return Ok(RegistrationReport::default());
        };
        let mut report = RegistrationReport {
            service_id: Some(service_id.clone()),
            ..RegistrationReport::default()
        };

        if let Some(offered) = command {
            report.command = match self
                .registry
                .record_command(service_id.clone(), offered.clone())
            {
                Ok(()) => {
                    tracing::debug!(
                        service = %service_id,
                        command = %offered,
                        count = self.registry.command_count()?,
                        "registered service"
                    );
                    CommandRegistration::Recorded
                }
                Err(EntryLoaderError::DuplicateCommand(_)) => {
                    tracing::error!(
                        service = %service_id,
                        command = %offered,
                        "a service has already been registered with this service id"
                    );
                    CommandRegistration::Rejected
                }
                Err(err) => return Err(err),
            };
        }

        for definition in metadata.definitions() {
            self.store_definition(definition.identifier().clone(), definition, &mut report)?;
            if let Some(handled) = definition.handler_for() {
                self.store_definition(TypedName::handler(handled), definition, &mut report)?;
            }
        }
        Ok(report)
    }

    fn store_definition(
        &self,
        name: TypedName,
        definition: &Definition,
        report: &mut RegistrationReport,
    ) -> EntryLoaderResult<()> {
        match self
            .registry
            .set_entry(name.clone(), LoaderEntry::definition(definition.clone()))
        {
            Ok(()) => {
                tracing::debug!(name = %name, definition = %definition.identifier(), "registered definition");
                report.registered.push(name);
                Ok(())
            }
            Err(EntryLoaderError::DuplicateEntry(_)) => {
                tracing::warn!(name = %name, "name already registered; keeping the first entry");
                report.skipped.push(name);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Loads everything within reach: embedded plugins, worker executables,
    /// manifests and link descriptors, in that order.
    ///
    /// No failure stops the pass; skipped candidates are logged and listed
    /// in the returned report.
    pub async fn preload(&self) -> PreloadReport {
        self.preload_with_cancel(&CancellationToken::new()).await
    }

    /// Runs [`ServiceLoader::preload`] inside the caller's scope.
    pub async fn preload_with_cancel(&self, cancel: &CancellationToken) -> PreloadReport {
        let mut report = self.preload_plugins_with_cancel(cancel).await;
        self.load_manifests(cancel, &mut report).await;
        let links = self.discovery.link_requests();
        self.activate_all(links, cancel, &mut report).await;
        report
    }

    /// Loads embedded plugins and worker executables only.
    pub async fn preload_plugins(&self) -> PreloadReport {
        self.preload_plugins_with_cancel(&CancellationToken::new())
            .await
    }

    /// Runs [`ServiceLoader::preload_plugins`] inside the caller's scope.
    pub async fn preload_plugins_with_cancel(&self, cancel: &CancellationToken) -> PreloadReport {
        let mut report = PreloadReport::default();
        tracing::debug!("reading embedded plugins");
        let embedded = self.discovery.embedded_requests();
        self.activate_all(embedded, cancel, &mut report).await;
        tracing::debug!("reading plugins from filesystem");
        let workers = self.discovery.worker_requests();
        self.activate_all(workers, cancel, &mut report).await;
        report
    }

    async fn activate_all(
        &self,
        requests: Discovery<ActivationRequest>,
        cancel: &CancellationToken,
        report: &mut PreloadReport,
    ) {
        for request in report.absorb(requests) {
            let activation = match self
                .activator
                .activate(&request.command, request.keep_alive, cancel)
                .await
            {
                Ok(activation) => activation,
                Err(err) => {
                    tracing::error!(
                        command = %request.command,
                        source = ?request.source,
                        error = %err,
                        "failed to load plugin"
                    );
                    report.activation_failures.push((request.command, err));
                    continue;
                }
            };

            if request.keep_alive {
                self.store_live(&activation.service).await;
            }
            match self.register_definitions(Some(&request.command), &activation.metadata) {
                Ok(registration) => report.registrations.push(registration),
                Err(err) => {
                    tracing::error!(command = %request.command, error = %err, "failed to register metadata");
                }
            }
        }
    }

    async fn store_live(&self, service: &Arc<dyn Service>) {
        let identifier = match service.identifier().await {
            Ok(identifier) => identifier,
            Err(err) => {
                tracing::error!(error = %err, "live plugin did not report its identifier");
                return;
            }
        };
        if let Err(err) = self
            .registry
            .set_entry(identifier.clone(), LoaderEntry::service(Arc::clone(service)))
        {
            tracing::warn!(service = %identifier, error = %err, "live plugin not stored");
        }
    }

    async fn load_manifests(&self, cancel: &CancellationToken, report: &mut PreloadReport) {
        let host_name = TypedName::service(MANIFEST_HOST);
        let host = match self.lookup_with_cancel(&host_name, cancel).await {
            Ok(found) => found.and_then(|entry| entry.as_service().cloned()),
            Err(err) => {
                tracing::error!(service = %host_name, error = %err, "manifest host lookup failed");
                None
            }
        };
        let Some(host) = host else {
            report.skip(DiscoveryError::ManifestHostUnavailable(host_name));
            return;
        };
        let compiler: Arc<dyn ManifestCompiler> = match &self.manifest_compiler {
            Some(compiler) => Arc::clone(compiler),
            None => Arc::new(ServiceManifestCompiler::new(host)),
        };

        tracing::debug!("reading manifests from filesystem");
        let manifests = self.discovery.manifest_files();
        for file in report.absorb(manifests) {
            tracing::debug!(file = %file, "loading manifest");
            let definition = match compiler.compile(containing_directory(&file), &file).await {
                Ok(definition) => definition,
                Err(err) => {
                    report.skip(err.into());
                    continue;
                }
            };

            let loader: Weak<dyn EntryLoader> = self.self_ref.clone();
            let proxy = Arc::new(MultiplexingProxy::new(definition, loader));
            let identifier = proxy.service_identifier();
            let entry = LoaderEntry::service(Arc::clone(&proxy) as Arc<dyn Service>)
                .with_origin(file.as_str());
            if let Err(err) = self.registry.set_entry(identifier.clone(), entry) {
                tracing::warn!(service = %identifier, error = %err, "manifest service not stored");
            }

            match self.register_metadata(None, &*proxy).await {
                Ok(registration) => report.registrations.push(registration),
                Err(err) => {
                    tracing::error!(file = %file, error = %err, "failed to register manifest metadata");
                }
            }
        }
    }

    /// Returns the command recorded for `service_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError`] when the entry store is unavailable.
    pub fn service_command(
        &self,
        service_id: &TypedName,
    ) -> EntryLoaderResult<Option<ServiceCommand>> {
        self.registry.service_command(service_id)
    }

    /// Returns every locally stored name in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError`] when the entry store is unavailable.
    pub fn entry_names(&self) -> EntryLoaderResult<Vec<TypedName>> {
        self.registry.names()
    }

    /// Returns the number of locally stored entries.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError`] when the entry store is unavailable.
    pub fn len(&self) -> EntryLoaderResult<usize> {
        Ok(self.registry.names()?.len())
    }

    /// Returns whether no entries are stored locally.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError`] when the entry store is unavailable.
    pub fn is_empty(&self) -> EntryLoaderResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Stops every live worker started by this loader.
    pub fn shutdown(&self) {
        self.activator.shutdown();
    }
}

fn containing_directory(file: &Utf8Path) -> &Utf8Path {
    match file.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

#[async_trait]
impl<L: WorkerLauncher + 'static> EntryLoader for ServiceLoader<L> {
    fn parent(&self) -> Option<Arc<dyn EntryLoader>> {
        self.registry.parent()
    }

    async fn load_entry(&self, name: &TypedName) -> EntryLoaderResult<Option<LoaderEntry>> {
        self.lookup(name).await
    }
}

//! Multiplexing proxy: one logical service answered by a hosting worker.

use crate::service_registry::{
    domain::{Definition, Namespace, ServiceMetadata, TypedName},
    ports::{EntryLoader, Service, ServiceError, ServiceResult, StateObject},
};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// Operation asked of the hosting service to invoke on a sub-identity.
pub const INVOKE_OPERATION: &str = "invoke";
/// Operation asked of the hosting service to describe a sub-identity.
pub const METADATA_OPERATION: &str = "metadata";
/// Operation asked of the hosting service to build a sub-identity's state.
pub const STATE_OPERATION: &str = "state";

/// Forwards every operation of one definition to the service hosting it.
///
/// The hosting service is the definition's `service_id`, resolved through
/// the loader on every call. The definition's own name is passed to the host
/// as the routing identifier and the original operation becomes the method,
/// so one worker can answer for many logical services.
pub struct MultiplexingProxy {
    definition: Definition,
    loader: Weak<dyn EntryLoader>,
}

impl fmt::Debug for MultiplexingProxy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MultiplexingProxy")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

impl MultiplexingProxy {
    /// Creates a proxy for `definition` resolving its host through `loader`.
    #[must_use]
    pub const fn new(definition: Definition, loader: Weak<dyn EntryLoader>) -> Self {
        Self { definition, loader }
    }

    /// Returns the proxied definition.
    #[must_use]
    pub const fn definition(&self) -> &Definition {
        &self.definition
    }

    /// Returns the definition name reinterpreted as a service name.
    #[must_use]
    pub fn service_identifier(&self) -> TypedName {
        self.definition.identifier().with_namespace(Namespace::Service)
    }

    fn sub_identity(&self) -> &str {
        self.definition.identifier().name()
    }

    async fn host(&self) -> ServiceResult<Arc<dyn Service>> {
        let service_id = self.definition.service_id();
        let Some(loader) = self.loader.upgrade() else {
            return Err(ServiceError::proxy_resolution(
                service_id.clone(),
                "the registry has been dropped",
            ));
        };

        let loaded = loader
            .load_entry(service_id)
            .await
            .map_err(|err| ServiceError::proxy_resolution(service_id.clone(), err.to_string()))?;
        let Some(entry) = loaded else {
            return Err(ServiceError::proxy_resolution(
                service_id.clone(),
                "no such service",
            ));
        };
        entry.as_service().cloned().ok_or_else(|| {
            let reason = if entry.has_value() {
                "entry is not a service"
            } else {
                "service is known but not resolvable"
            };
            ServiceError::proxy_resolution(service_id.clone(), reason)
        })
    }

    async fn forward(&self, operation: &str, arguments: Vec<Value>) -> ServiceResult<Value> {
        let host = self.host().await?;
        host.invoke(self.sub_identity(), operation, arguments).await
    }
}

#[async_trait]
impl Service for MultiplexingProxy {
    async fn identifier(&self) -> ServiceResult<TypedName> {
        Ok(self.service_identifier())
    }

    async fn metadata(&self) -> ServiceResult<ServiceMetadata> {
        let reply = self.forward(METADATA_OPERATION, Vec::new()).await?;
        ServiceMetadata::from_reply(reply).map_err(|err| ServiceError::Protocol(err.to_string()))
    }

    async fn invoke(
        &self,
        identifier: &str,
        name: &str,
        arguments: Vec<Value>,
    ) -> ServiceResult<Value> {
        let mut forwarded = Vec::with_capacity(arguments.len().saturating_add(2));
        forwarded.push(Value::String(identifier.to_owned()));
        forwarded.push(Value::String(name.to_owned()));
        forwarded.extend(arguments);
        self.forward(INVOKE_OPERATION, forwarded).await
    }

    async fn state(&self, name: &str, input: StateObject) -> ServiceResult<StateObject> {
        let reply = self
            .forward(
                STATE_OPERATION,
                vec![Value::String(name.to_owned()), Value::Object(input)],
            )
            .await?;
        match reply {
            Value::Object(state) => Ok(state),
            other => Err(ServiceError::Protocol(format!(
                "state reply for {name} must be an object, got {other}"
            ))),
        }
    }
}

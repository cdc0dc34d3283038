//! In-process service for tests and embedded hosting.

use crate::service_registry::{
    domain::{ServiceMetadata, TypedName},
    ports::{Service, ServiceError, ServiceResult, StateObject},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

type InvokeHandler = Arc<dyn Fn(Vec<Value>) -> ServiceResult<Value> + Send + Sync>;

/// One recorded call to [`InMemoryService::invoke`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Target definition identifier.
    pub identifier: String,
    /// Invoked operation.
    pub name: String,
    /// Arguments as received.
    pub arguments: Vec<Value>,
}

/// A service answered from memory.
///
/// Replies are scripted per `(identifier, name)` pair and every invocation is
/// recorded, so tests can assert exactly what a caller forwarded.
pub struct InMemoryService {
    identifier: TypedName,
    metadata: Result<ServiceMetadata, ServiceError>,
    handlers: HashMap<(String, String), InvokeHandler>,
    states: HashMap<String, StateObject>,
    invocations: RwLock<Vec<Invocation>>,
}

impl fmt::Debug for InMemoryService {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InMemoryService")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl InMemoryService {
    /// Creates a service advertising `metadata`.
    #[must_use]
    pub fn new(identifier: TypedName, metadata: ServiceMetadata) -> Self {
        Self {
            identifier,
            metadata: Ok(metadata),
            handlers: HashMap::new(),
            states: HashMap::new(),
            invocations: RwLock::default(),
        }
    }

    /// Makes [`Service::metadata`] fail with `message`.
    #[must_use]
    pub fn with_metadata_error(mut self, message: impl Into<String>) -> Self {
        self.metadata = Err(ServiceError::Remote(message.into()));
        self
    }

    /// Answers `name` on `identifier` with a fixed value.
    #[must_use]
    pub fn with_reply(self, identifier: &str, name: &str, reply: Value) -> Self {
        self.with_handler(identifier, name, move |_| Ok(reply.clone()))
    }

    /// Answers `name` on `identifier` by calling `handler` with the arguments.
    #[must_use]
    pub fn with_handler<F>(mut self, identifier: &str, name: &str, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> ServiceResult<Value> + Send + Sync + 'static,
    {
        self.handlers
            .insert((identifier.to_owned(), name.to_owned()), Arc::new(handler));
        self
    }

    /// Answers [`Service::state`] for `name` with `state`.
    #[must_use]
    pub fn with_state(mut self, name: &str, state: StateObject) -> Self {
        self.states.insert(name.to_owned(), state);
        self
    }

    /// Returns every invocation received so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .read()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Service for InMemoryService {
    async fn identifier(&self) -> ServiceResult<TypedName> {
        Ok(self.identifier.clone())
    }

    async fn metadata(&self) -> ServiceResult<ServiceMetadata> {
        self.metadata.clone()
    }

    async fn invoke(
        &self,
        identifier: &str,
        name: &str,
        arguments: Vec<Value>,
    ) -> ServiceResult<Value> {
        self.invocations
            .write()
            .map_err(|err| ServiceError::transport(std::io::Error::other(err.to_string())))?
            .push(Invocation {
                identifier: identifier.to_owned(),
                name: name.to_owned(),
                arguments: arguments.clone(),
            });

        let handler = self
            .handlers
            .get(&(identifier.to_owned(), name.to_owned()))
            .ok_or_else(|| {
                ServiceError::Remote(format!("{identifier} does not implement {name}"))
            })?;
        handler(arguments)
    }

    async fn state(&self, name: &str, _input: StateObject) -> ServiceResult<StateObject> {
        self.states
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::Remote(format!("no state named {name}")))
    }
}

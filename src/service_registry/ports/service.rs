//! Capability port implemented by every loadable service.

use crate::service_registry::domain::{ServiceMetadata, TypedName};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Structured object returned by [`Service::state`].
pub type StateObject = Map<String, Value>;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A capability-bearing unit: either a directly spawned worker or a logical
/// sub-service multiplexed through one.
///
/// How the handle reaches its worker (transport, handshake, serialization)
/// is the implementor's concern.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Service: Send + Sync {
    /// Returns the identity of this service.
    async fn identifier(&self) -> ServiceResult<TypedName>;

    /// Returns the type set and definitions this service advertises.
    async fn metadata(&self) -> ServiceResult<ServiceMetadata>;

    /// Invokes `name` on the definition `identifier`.
    async fn invoke(
        &self,
        identifier: &str,
        name: &str,
        arguments: Vec<Value>,
    ) -> ServiceResult<Value>;

    /// Constructs the named state object from `input`.
    async fn state(&self, name: &str, input: StateObject) -> ServiceResult<StateObject>;
}

/// Errors returned by service operations.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// A multiplexed service could not resolve the service hosting it.
    #[error("failed to resolve hosting service {service_id}: {reason}")]
    ProxyResolution {
        /// Identifier of the hosting service.
        service_id: TypedName,
        /// Why resolution failed.
        reason: String,
    },

    /// A reply did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The service reported a failure for the requested operation.
    #[error("service error: {0}")]
    Remote(String),

    /// The channel to the worker failed.
    #[error("service transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl ServiceError {
    /// Creates a proxy resolution error.
    #[must_use]
    pub fn proxy_resolution(service_id: TypedName, reason: impl Into<String>) -> Self {
        Self::ProxyResolution {
            service_id,
            reason: reason.into(),
        }
    }

    /// Wraps a transport failure.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}

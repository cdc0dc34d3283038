//! Name-resolution port shared by registries and their parents.

use super::Service;
use crate::service_registry::domain::{Definition, TypedName};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for entry loader operations.
pub type EntryLoaderResult<T> = Result<T, EntryLoaderError>;

/// Value held by a registry entry.
#[derive(Clone)]
pub enum EntryValue {
    /// A live service handle.
    Service(Arc<dyn Service>),
    /// A definition advertised by some service.
    Definition(Definition),
}

impl fmt::Debug for EntryValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(_) => formatter.write_str("Service(..)"),
            Self::Definition(definition) => formatter
                .debug_tuple("Definition")
                .field(definition.identifier())
                .finish(),
        }
    }
}

/// A resolved registry entry.
///
/// An entry without a value means the name is known to a parent but is not
/// resolvable here.
#[derive(Debug, Clone)]
pub struct LoaderEntry {
    value: Option<EntryValue>,
    origin: Option<String>,
}

impl LoaderEntry {
    /// Creates an entry from its parts.
    #[must_use]
    pub const fn new(value: Option<EntryValue>, origin: Option<String>) -> Self {
        Self { value, origin }
    }

    /// Creates an entry holding a live service.
    #[must_use]
    pub const fn service(service: Arc<dyn Service>) -> Self {
        Self::new(Some(EntryValue::Service(service)), None)
    }

    /// Creates an entry holding a definition.
    #[must_use]
    pub const fn definition(definition: Definition) -> Self {
        Self::new(Some(EntryValue::Definition(definition)), None)
    }

    /// Creates an entry that is known but not resolvable.
    #[must_use]
    pub const fn unresolved() -> Self {
        Self::new(None, None)
    }

    /// Records where the entry came from, such as a file path.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Returns the entry value.
    #[must_use]
    pub const fn value(&self) -> Option<&EntryValue> {
        self.value.as_ref()
    }

    /// Returns whether the entry resolves to something.
    #[must_use]
    pub const fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Returns the live service, if the entry holds one.
    #[must_use]
    pub const fn as_service(&self) -> Option<&Arc<dyn Service>> {
        match &self.value {
            Some(EntryValue::Service(service)) => Some(service),
            _ => None,
        }
    }

    /// Returns the definition, if the entry holds one.
    #[must_use]
    pub const fn as_definition(&self) -> Option<&Definition> {
        match &self.value {
            Some(EntryValue::Definition(definition)) => Some(definition),
            _ => None,
        }
    }

    /// Returns the recorded origin.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// A registry that resolves names, delegating misses to an optional parent.
#[async_trait]
pub trait EntryLoader: Send + Sync {
    /// Returns the loader consulted when a name is not resolvable locally.
    fn parent(&self) -> Option<Arc<dyn EntryLoader>>;

    /// Resolves `name`.
    ///
    /// Returns `Ok(None)` when the name is unknown along the whole chain and
    /// an entry without a value when it is known but unresolvable.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError`] when the backing store is unavailable.
    async fn load_entry(&self, name: &TypedName) -> EntryLoaderResult<Option<LoaderEntry>>;
}

/// Errors returned by entry loaders and stores.
#[derive(Debug, Clone, Error)]
pub enum EntryLoaderError {
    /// An entry with a value is already stored under this name.
    #[error("an entry has already been registered for {0}")]
    DuplicateEntry(TypedName),

    /// A start command is already recorded for this service.
    #[error("a service has already been registered with service id {0}")]
    DuplicateCommand(TypedName),

    /// The backing store is unavailable, for example after a poisoned lock.
    #[error("entry store unavailable: {0}")]
    StoreUnavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl EntryLoaderError {
    /// Wraps a store failure.
    pub fn store_unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::StoreUnavailable(Arc::new(err))
    }
}

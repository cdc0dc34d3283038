//! In-memory entry store and service command table.

use crate::service_registry::{
    domain::{ServiceCommand, TypedName},
    ports::{EntryLoader, EntryLoaderError, EntryLoaderResult, LoaderEntry},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe registry of entries and recorded service commands.
///
/// Both tables sit behind one lock so a registration never exposes an entry
/// without its command. Storing under a name that already holds a value is
/// rejected: the first registration wins.
#[derive(Default)]
pub struct ServiceRegistry {
    state: RwLock<RegistryState>,
    parent: Option<Arc<dyn EntryLoader>>,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<TypedName, LoaderEntry>,
    commands: HashMap<TypedName, ServiceCommand>,
}

impl ServiceRegistry {
    /// Creates an empty registry without a parent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry delegating misses to `parent`.
    #[must_use]
    pub fn with_parent(parent: Arc<dyn EntryLoader>) -> Self {
        Self {
            state: RwLock::default(),
            parent: Some(parent),
        }
    }

    fn read(&self) -> EntryLoaderResult<RwLockReadGuard<'_, RegistryState>> {
        self.state.read().map_err(|err| {
            EntryLoaderError::store_unavailable(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> EntryLoaderResult<RwLockWriteGuard<'_, RegistryState>> {
        self.state.write().map_err(|err| {
            EntryLoaderError::store_unavailable(std::io::Error::other(err.to_string()))
        })
    }

    /// Stores `entry` under `name`.
    ///
    /// A valueless placeholder may be replaced; an entry with a value may not.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError::DuplicateEntry`] when `name` already holds
    /// a value.
    pub fn set_entry(&self, name: TypedName, entry: LoaderEntry) -> EntryLoaderResult<()> {
        let mut state = self.write()?;
        if state.entries.get(&name).is_some_and(LoaderEntry::has_value) {
            return Err(EntryLoaderError::DuplicateEntry(name));
        }

        state.entries.insert(name, entry);
        Ok(())
    }

    /// Returns the entry stored locally under `name`, ignoring the parent.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError::StoreUnavailable`] when the lock is
    /// poisoned.
    pub fn local_entry(&self, name: &TypedName) -> EntryLoaderResult<Option<LoaderEntry>> {
        Ok(self.read()?.entries.get(name).cloned())
    }

    /// Records the command that starts `service_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError::DuplicateCommand`] when a command is
    /// already recorded; the recorded command is left untouched.
    pub fn record_command(
        &self,
        service_id: TypedName,
        command: ServiceCommand,
    ) -> EntryLoaderResult<()> {
        let mut state = self.write()?;
        if state.commands.contains_key(&service_id) {
            return Err(EntryLoaderError::DuplicateCommand(service_id));
        }

        state.commands.insert(service_id, command);
        Ok(())
    }

    /// Returns the command recorded for `service_id`.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError::StoreUnavailable`] when the lock is
    /// poisoned.
    pub fn service_command(
        &self,
        service_id: &TypedName,
    ) -> EntryLoaderResult<Option<ServiceCommand>> {
        Ok(self.read()?.commands.get(service_id).cloned())
    }

    /// Returns the number of recorded service commands.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError::StoreUnavailable`] when the lock is
    /// poisoned.
    pub fn command_count(&self) -> EntryLoaderResult<usize> {
        Ok(self.read()?.commands.len())
    }

    /// Returns all locally stored names in sorted order.
    ///
    /// # Errors
    ///
    /// Returns [`EntryLoaderError::StoreUnavailable`] when the lock is
    /// poisoned.
    pub fn names(&self) -> EntryLoaderResult<Vec<TypedName>> {
        let mut names: Vec<TypedName> = self.read()?.entries.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl EntryLoader for ServiceRegistry {
    fn parent(&self) -> Option<Arc<dyn EntryLoader>> {
        self.parent.clone()
    }

    async fn load_entry(&self, name: &TypedName) -> EntryLoaderResult<Option<LoaderEntry>> {
        let local = self.local_entry(name)?;
        if local.as_ref().is_some_and(LoaderEntry::has_value) {
            return Ok(local);
        }

        let Some(parent) = &self.parent else {
            return Ok(local);
        };
        let inherited = parent.load_entry(name).await?;
        if inherited.as_ref().is_some_and(LoaderEntry::has_value) {
            return Ok(inherited);
        }

        Ok(local.or(inherited))
    }
}

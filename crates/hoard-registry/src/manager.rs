//! [`BlobStoreManager`]: the registry of running blob stores.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use hoard_group::{FillPolicyRegistry, MemberResolver};
use hoard_store::{BlobStore, MemoryVolumes, StoreError};
use hoard_types::BlobStoreConfiguration;
use tracing::{debug, error, info, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::factory::{FactoryContext, StoreFactories};
use crate::handle::StoreHandle;
use crate::locks::NameLocks;
use crate::names::validate_store_name;
use crate::persistence::{ConfigStore, InMemoryConfigStore, JsonFileConfigStore};
use crate::settings::ManagerSettings;
use crate::traits::BlobStoreRegistry;

/// Outcome of restoring persisted configurations.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Stores that were rebuilt and started, in load order.
    pub loaded: Vec<String>,
    /// Stores that could not be restored. They stay persisted.
    pub failed: Vec<(String, RegistryError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns every running blob store, keyed by name.
///
/// `create`, `delete` and `get` on one name are serialized by a per-name
/// lock; distinct names only share a brief map lock. Registered
/// configurations are written through the [`ConfigStore`] so a later
/// [`BlobStoreManager::open`] can bring them back.
///
/// The manager is always handed out as an `Arc`: groups it builds resolve
/// their members through a weak reference back to it.
pub struct BlobStoreManager {
    settings: ManagerSettings,
    factories: StoreFactories,
    fill_policies: FillPolicyRegistry,
    volumes: MemoryVolumes,
    config_store: Box<dyn ConfigStore>,
    entries: RwLock<BTreeMap<String, StoreHandle>>,
    locks: NameLocks,
    self_ref: Weak<BlobStoreManager>,
}

impl BlobStoreManager {
    /// A manager with the default store types and fill policies.
    pub fn new(settings: ManagerSettings, config_store: Box<dyn ConfigStore>) -> Arc<Self> {
        Self::with_factories(
            settings,
            config_store,
            StoreFactories::default(),
            FillPolicyRegistry::default(),
        )
    }

    pub fn with_factories(
        settings: ManagerSettings,
        config_store: Box<dyn ConfigStore>,
        factories: StoreFactories,
        fill_policies: FillPolicyRegistry,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            settings,
            factories,
            fill_policies,
            volumes: MemoryVolumes::new(),
            config_store,
            entries: RwLock::new(BTreeMap::new()),
            locks: NameLocks::new(),
            self_ref: self_ref.clone(),
        })
    }

    /// A manager that persists nothing to disk.
    pub fn in_memory() -> Arc<Self> {
        Self::new(ManagerSettings::default(), Box::new(InMemoryConfigStore::new()))
    }

    /// Open the manager described by `settings`, restoring every store
    /// persisted in its configuration file.
    pub fn open(settings: ManagerSettings) -> RegistryResult<(Arc<Self>, LoadReport)> {
        let config_store = JsonFileConfigStore::new(settings.config_path());
        let manager = Self::new(settings, Box::new(config_store));
        let report = manager.load()?;
        Ok((manager, report))
    }

    /// Rebuild and start every persisted configuration that is not already
    /// registered. Standalone stores come first, groups last.
    ///
    /// A store that fails is logged and reported, never fatal.
    pub fn load(&self) -> RegistryResult<LoadReport> {
        let mut configs = self.config_store.load_all()?;
        configs.sort_by_key(|c| c.is_group());

        let mut report = LoadReport::default();
        for config in configs {
            let name = config.name.clone();
            if self.read_entries().contains_key(&name) {
                debug!(store = %name, "already registered; not restoring");
                continue;
            }
            match self.register(config, false) {
                Ok(_) => report.loaded.push(name),
                Err(e) => {
                    error!(store = %name, error = %e, "failed to restore blob store");
                    report.failed.push((name, e));
                }
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "blob store configurations restored"
        );
        Ok(report)
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Volumes behind every `memory` store this manager builds.
    pub fn volumes(&self) -> &MemoryVolumes {
        &self.volumes
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.read_entries().keys().cloned().collect()
    }

    /// Configuration of the store registered under `name`.
    pub fn configuration(&self, name: &str) -> Option<BlobStoreConfiguration> {
        self.get(name).map(|h| h.configuration().clone())
    }

    /// Stop and unregister every store, groups first.
    ///
    /// Persisted configurations are left in place. Stop failures are
    /// logged; the store is unregistered regardless.
    pub fn shutdown(&self) {
        let (groups, singles): (Vec<_>, Vec<_>) = self
            .read_entries()
            .iter()
            .map(|(name, handle)| (name.clone(), handle.is_group()))
            .partition(|(_, is_group)| *is_group);

        let mut stopped = 0usize;
        for (name, _) in groups.into_iter().chain(singles) {
            let _guard = self.locks.lock(&name);
            let Some(handle) = self.write_entries().remove(&name) else {
                continue;
            };
            match handle.store().stop() {
                Ok(()) => stopped += 1,
                Err(e) => warn!(store = %name, error = %e, "stop failed during shutdown"),
            }
        }
        info!(stopped, "blob store manager shut down");
    }

    fn register(
        &self,
        config: BlobStoreConfiguration,
        persist: bool,
    ) -> RegistryResult<StoreHandle> {
        validate_store_name(&config.name)?;
        let name = config.name.clone();
        let store_type = config.store_type.clone();

        let _guard = self.locks.lock(&name);
        if self.read_entries().contains_key(&name) {
            return Err(RegistryError::NameAlreadyRegistered { name });
        }

        let resolver: Weak<dyn MemberResolver> = self.self_ref.clone();
        let ctx = FactoryContext {
            base_dir: &self.settings.data_dir,
            volumes: &self.volumes,
            fill_policies: &self.fill_policies,
            resolver,
        };
        let handle = match self.factories.build(config, &ctx) {
            None => {
                return Err(RegistryError::UnknownStoreType { name, store_type });
            }
            Some(Err(StoreError::InvalidConfiguration { reason, .. })) => {
                return Err(RegistryError::InvalidConfiguration { name, reason });
            }
            Some(Err(other)) => {
                return Err(RegistryError::InvalidConfiguration {
                    name,
                    reason: other.to_string(),
                });
            }
            Some(Ok(handle)) => handle,
        };

        if let Err(source) = handle.store().start() {
            return Err(RegistryError::BackendStartFailed { name, source });
        }

        if persist {
            if let Err(e) = self.config_store.save(handle.configuration()) {
                if let Err(stop_err) = handle.store().stop() {
                    warn!(store = %name, error = %stop_err, "stop after failed save also failed");
                }
                return Err(e);
            }
        }

        self.write_entries().insert(name.clone(), handle.clone());
        info!(store = %name, store_type = %store_type, "blob store registered");
        Ok(handle)
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, StoreHandle>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, BTreeMap<String, StoreHandle>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStoreRegistry for BlobStoreManager {
    fn create(&self, config: BlobStoreConfiguration) -> RegistryResult<StoreHandle> {
        self.register(config, true)
    }

    fn delete(&self, name: &str) -> RegistryResult<()> {
        let _guard = self.locks.lock(name);
        let handle = self
            .read_entries()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::not_registered(name))?;

        handle
            .store()
            .stop()
            .map_err(|source| RegistryError::StopFailed {
                name: name.to_string(),
                source,
            })?;

        if let Err(e) = self.config_store.remove(name) {
            if let Err(restart) = handle.store().start() {
                error!(store = %name, error = %restart, "restart after failed unpersist failed");
            }
            return Err(e);
        }

        self.write_entries().remove(name);
        info!(store = %name, "blob store unregistered");
        Ok(())
    }

    fn get(&self, name: &str) -> Option<StoreHandle> {
        let _guard = self.locks.lock(name);
        self.read_entries().get(name).cloned()
    }
}

impl MemberResolver for BlobStoreManager {
    // Reads the map directly: a group call must not wait behind a slow
    // create or delete of one of its members.
    fn resolve(&self, name: &str) -> Option<Arc<dyn BlobStore>> {
        self.read_entries().get(name).map(StoreHandle::as_store)
    }
}

impl fmt::Debug for BlobStoreManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStoreManager")
            .field("data_dir", &self.settings.data_dir)
            .field("stores", &self.list())
            .field("factories", &self.factories)
            .finish()
    }
}

//! Store type dispatch: type tag -> constructor.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

use hoard_group::{BlobStoreGroup, FillPolicyRegistry, MemberResolver};
use hoard_store::{
    FileBlobStore, InMemoryBlobStore, MemoryVolumes, StoreResult, FILE_TYPE, MEMORY_TYPE,
};
use hoard_types::{BlobStoreConfiguration, GROUP_TYPE};

use crate::handle::StoreHandle;

/// Everything a store constructor may need from the registry.
pub struct FactoryContext<'a> {
    /// Base directory for relative backend paths.
    pub base_dir: &'a Path,
    /// Volumes behind `memory` stores.
    pub volumes: &'a MemoryVolumes,
    /// Fill policies available to groups.
    pub fill_policies: &'a FillPolicyRegistry,
    /// How groups find their members.
    pub resolver: Weak<dyn MemberResolver>,
}

type StoreConstructor = Box<
    dyn Fn(BlobStoreConfiguration, &FactoryContext<'_>) -> StoreResult<StoreHandle> + Send + Sync,
>;

/// Maps store type tags to constructors.
///
/// Constructors build an unstarted store; the registry starts it.
pub struct StoreFactories {
    constructors: BTreeMap<String, StoreConstructor>,
}

impl StoreFactories {
    /// No store types at all.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// The built-in `memory`, `file` and `group` types.
    pub fn with_defaults() -> Self {
        let mut factories = Self::empty();
        factories.register(MEMORY_TYPE, |config, ctx| {
            let store = InMemoryBlobStore::from_configuration(config, ctx.volumes)?;
            Ok(StoreHandle::Single(Arc::new(store)))
        });
        factories.register(FILE_TYPE, |config, ctx| {
            let store = FileBlobStore::from_configuration(config, ctx.base_dir)?;
            Ok(StoreHandle::Single(Arc::new(store)))
        });
        factories.register(GROUP_TYPE, |config, ctx| {
            let group = BlobStoreGroup::from_configuration(
                config,
                ctx.fill_policies,
                ctx.resolver.clone(),
            )?;
            Ok(StoreHandle::Group(Arc::new(group)))
        });
        factories
    }

    /// Register (or replace) the constructor for `tag`.
    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(BlobStoreConfiguration, &FactoryContext<'_>) -> StoreResult<StoreHandle>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(tag.into(), Box::new(constructor));
    }

    /// Returns `true` if a constructor exists for `tag`.
    pub fn supports(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Build a store, or `None` if the type tag is unknown.
    pub fn build(
        &self,
        config: BlobStoreConfiguration,
        ctx: &FactoryContext<'_>,
    ) -> Option<StoreResult<StoreHandle>> {
        let ctor = self.constructors.get(&config.store_type)?;
        Some(ctor(config, ctx))
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Default for StoreFactories {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StoreFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreFactories")
            .field("types", &self.types())
            .finish()
    }
}

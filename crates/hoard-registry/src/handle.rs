use std::fmt;
use std::sync::Arc;

use hoard_group::BlobStoreGroup;
use hoard_store::BlobStore;
use hoard_types::BlobStoreConfiguration;

/// A running store as handed out by the registry.
#[derive(Clone)]
pub enum StoreHandle {
    /// A standalone store.
    Single(Arc<dyn BlobStore>),
    /// A group store.
    Group(Arc<BlobStoreGroup>),
}

impl StoreHandle {
    /// The store behind this handle.
    pub fn store(&self) -> &dyn BlobStore {
        match self {
            Self::Single(store) => store.as_ref(),
            Self::Group(group) => group.as_ref(),
        }
    }

    /// A shared `dyn BlobStore` reference to the store.
    pub fn as_store(&self) -> Arc<dyn BlobStore> {
        match self {
            Self::Single(store) => Arc::clone(store),
            Self::Group(group) => Arc::clone(group) as Arc<dyn BlobStore>,
        }
    }

    pub fn as_group(&self) -> Option<&Arc<BlobStoreGroup>> {
        match self {
            Self::Group(group) => Some(group),
            Self::Single(_) => None,
        }
    }

    pub fn into_group(self) -> Option<Arc<BlobStoreGroup>> {
        match self {
            Self::Group(group) => Some(group),
            Self::Single(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    pub fn name(&self) -> &str {
        self.store().name()
    }

    pub fn configuration(&self) -> &BlobStoreConfiguration {
        self.store().configuration()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(store) => f
                .debug_struct("Single")
                .field("name", &store.name())
                .field("type", &store.configuration().store_type)
                .field("state", &store.state())
                .finish(),
            Self::Group(group) => f.debug_tuple("Group").field(group).finish(),
        }
    }
}

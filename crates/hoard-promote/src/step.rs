use std::fmt;
use std::time::Duration;

use hoard_registry::{BlobStoreRegistry, RegistryResult, StoreHandle};
use hoard_types::BlobStoreConfiguration;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PromotionPhase
// ---------------------------------------------------------------------------

/// The registry mutations a promotion performs, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromotionPhase {
    /// Unregister the source store under its original name.
    UnregisterOriginal,
    /// Register the source configuration under the promoted name.
    RegisterRenamed,
    /// Register the group under the original name.
    RegisterGroup,
}

impl PromotionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnregisterOriginal => "unregisterOriginal",
            Self::RegisterRenamed => "registerRenamed",
            Self::RegisterGroup => "registerGroup",
        }
    }
}

impl fmt::Display for PromotionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Recorded result of one applied step.
#[derive(Clone, Debug, Serialize)]
pub struct StepResult {
    pub phase: PromotionPhase,
    /// Name the step acted on.
    pub store: String,
    /// Wall-clock time the step took.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// PromotionStep trait
// ---------------------------------------------------------------------------

/// One reversible registry mutation.
///
/// `compensate` is only ever called after `apply` succeeded, and undoes
/// exactly what `apply` did.
pub trait PromotionStep: Send + Sync {
    fn phase(&self) -> PromotionPhase;

    /// Name of the store this step registers or unregisters.
    fn store(&self) -> &str;

    /// Perform the mutation. Returns the handle it registered, if any.
    fn apply(&self, registry: &dyn BlobStoreRegistry) -> RegistryResult<Option<StoreHandle>>;

    /// Undo a successful `apply`.
    fn compensate(&self, registry: &dyn BlobStoreRegistry) -> RegistryResult<()>;
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Delete the source; undone by re-creating it from its configuration.
pub struct UnregisterOriginal {
    pub original: BlobStoreConfiguration,
}

impl PromotionStep for UnregisterOriginal {
    fn phase(&self) -> PromotionPhase {
        PromotionPhase::UnregisterOriginal
    }

    fn store(&self) -> &str {
        &self.original.name
    }

    fn apply(&self, registry: &dyn BlobStoreRegistry) -> RegistryResult<Option<StoreHandle>> {
        registry.delete(&self.original.name)?;
        Ok(None)
    }

    fn compensate(&self, registry: &dyn BlobStoreRegistry) -> RegistryResult<()> {
        registry.create(self.original.clone()).map(drop)
    }
}

/// Create a store; undone by deleting it.
///
/// Used for both the renamed source and the group.
pub struct Register {
    pub phase: PromotionPhase,
    pub config: BlobStoreConfiguration,
}

impl PromotionStep for Register {
    fn phase(&self) -> PromotionPhase {
        self.phase
    }

    fn store(&self) -> &str {
        &self.config.name
    }

    fn apply(&self, registry: &dyn BlobStoreRegistry) -> RegistryResult<Option<StoreHandle>> {
        registry.create(self.config.clone()).map(Some)
    }

    fn compensate(&self, registry: &dyn BlobStoreRegistry) -> RegistryResult<()> {
        registry.delete(&self.config.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names() {
        assert_eq!(PromotionPhase::UnregisterOriginal.to_string(), "unregisterOriginal");
        assert_eq!(PromotionPhase::RegisterRenamed.to_string(), "registerRenamed");
        assert_eq!(PromotionPhase::RegisterGroup.to_string(), "registerGroup");
    }

    #[test]
    fn phase_serializes_camel_case() {
        let json = serde_json::to_string(&PromotionPhase::RegisterGroup).unwrap();
        assert_eq!(json, "\"registerGroup\"");
    }
}

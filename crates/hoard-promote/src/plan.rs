use hoard_registry::validate_store_name;
use hoard_types::{BlobStoreConfiguration, GroupAttributes};

use crate::config::PromotionConfig;
use crate::error::PromotionError;
use crate::step::{PromotionPhase, PromotionStep, Register, UnregisterOriginal};

/// Everything a promotion will register, computed before any mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromotionPlan {
    /// The source configuration as currently registered.
    pub original: BlobStoreConfiguration,
    /// The source configuration under its promoted name.
    pub renamed: BlobStoreConfiguration,
    /// The group that takes over the original name.
    pub group: BlobStoreConfiguration,
}

impl PromotionPlan {
    /// Plan the promotion of a standalone store.
    pub fn new(
        original: BlobStoreConfiguration,
        config: &PromotionConfig,
    ) -> Result<Self, PromotionError> {
        if original.is_group() {
            return Err(PromotionError::invalid_target(
                &original.name,
                "already a group",
            ));
        }
        let promoted = config.promoted_name(&original.name);
        validate_store_name(&promoted).map_err(|e| {
            PromotionError::invalid_target(&original.name, format!("promoted name unusable: {e}"))
        })?;
        let renamed = original.copy_as(promoted.clone());
        let group = GroupAttributes::new(vec![promoted], config.fill_policy_type.clone())
            .into_configuration(original.name.clone())
            .map_err(|e| PromotionError::invalid_target(&original.name, e.to_string()))?;
        Ok(Self {
            original,
            renamed,
            group,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.original.name
    }

    pub fn promoted_name(&self) -> &str {
        &self.renamed.name
    }

    /// The steps, in the order they must be applied.
    pub fn steps(&self) -> Vec<Box<dyn PromotionStep>> {
        vec![
            Box::new(UnregisterOriginal {
                original: self.original.clone(),
            }),
            Box::new(Register {
                phase: PromotionPhase::RegisterRenamed,
                config: self.renamed.clone(),
            }),
            Box::new(Register {
                phase: PromotionPhase::RegisterGroup,
                config: self.group.clone(),
            }),
        ]
    }
}

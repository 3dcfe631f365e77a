use hoard_group::FALLBACK_FILL_POLICY_TYPE;
use serde::{Deserialize, Serialize};

/// Suffix appended to a promoted store's name.
pub const PROMOTED_SUFFIX: &str = "-promoted";

/// How a promotion names and configures what it registers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionConfig {
    /// Appended to the source name to form the member's new name.
    pub suffix: String,
    /// Fill policy of the group that takes over the source name.
    pub fill_policy_type: String,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            suffix: PROMOTED_SUFFIX.to_string(),
            fill_policy_type: FALLBACK_FILL_POLICY_TYPE.to_string(),
        }
    }
}

impl PromotionConfig {
    /// Name the source store is re-registered under.
    pub fn promoted_name(&self, source: &str) -> String {
        format!("{source}{}", self.suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_and_policy() {
        let config = PromotionConfig::default();
        assert_eq!(config.promoted_name("default"), "default-promoted");
        assert_eq!(config.fill_policy_type, "fallback");
    }
}

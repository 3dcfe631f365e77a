use std::fmt;

use hoard_registry::RegistryError;

use crate::step::PromotionPhase;

/// A compensation that could not be carried out.
#[derive(Debug)]
pub struct RecoveryFailure {
    /// Phase whose effect could not be undone.
    pub phase: PromotionPhase,
    /// Why undoing it failed.
    pub error: RegistryError,
}

impl fmt::Display for RecoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "undo {}: {}", self.phase, self.error)
    }
}

/// Errors that can occur during promotion.
#[derive(Debug, thiserror::Error)]
pub enum PromotionError {
    /// The source cannot be promoted. Nothing was changed.
    #[error("cannot promote {name:?}: {reason}")]
    InvalidTarget { name: String, reason: String },

    /// A step failed. Completed steps were compensated in reverse order.
    ///
    /// `source` is the failure that stopped the promotion. Any compensation
    /// that also failed is listed in `recovery_failures`; a non-empty list
    /// means the registry no longer matches its pre-promotion state.
    #[error("promotion failed during {phase}: {source}{}", describe_recovery(.recovery_failures))]
    Failed {
        phase: PromotionPhase,
        #[source]
        source: RegistryError,
        recovery_failures: Vec<RecoveryFailure>,
    },
}

impl PromotionError {
    pub(crate) fn invalid_target(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// The phase that failed, if any step ran.
    pub fn phase(&self) -> Option<PromotionPhase> {
        match self {
            Self::InvalidTarget { .. } => None,
            Self::Failed { phase, .. } => Some(*phase),
        }
    }

    /// Returns `true` if rollback did not fully succeed.
    pub fn is_irrecoverable(&self) -> bool {
        matches!(self, Self::Failed { recovery_failures, .. } if !recovery_failures.is_empty())
    }
}

fn describe_recovery(failures: &[RecoveryFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!(" (rollback incomplete: {})", parts.join("; "))
}

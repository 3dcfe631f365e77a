use std::sync::Arc;
use std::time::{Duration, Instant};

use hoard_group::BlobStoreGroup;
use hoard_registry::{BlobStoreRegistry, RegistryError, StoreHandle};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::PromotionConfig;
use crate::error::{PromotionError, RecoveryFailure};
use crate::plan::PromotionPlan;
use crate::step::{PromotionPhase, PromotionStep, StepResult};

// ---------------------------------------------------------------------------
// PromotionReport
// ---------------------------------------------------------------------------

/// What a successful promotion did.
#[derive(Clone, Debug, Serialize)]
pub struct PromotionReport {
    /// Identifies this run in every log event it emitted.
    pub promotion_id: Uuid,
    /// Name now held by the group.
    pub source: String,
    /// Name the source store now lives under.
    pub promoted: String,
    /// Applied steps in order.
    pub steps: Vec<StepResult>,
    /// Total wall-clock time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Promoter
// ---------------------------------------------------------------------------

/// Turns a standalone store into the sole member of a group that takes
/// over its name.
///
/// The promotion runs as a saga of three registry mutations. When one
/// fails, the mutations already applied are undone in reverse order and the
/// caller gets the failure that stopped the run. Undo failures are logged
/// and attached to the error but never replace it.
///
/// Blobs are never copied: the source store is re-registered under a new
/// name with its backend settings unchanged.
pub struct Promoter {
    registry: Arc<dyn BlobStoreRegistry>,
    config: PromotionConfig,
}

impl Promoter {
    pub fn new(registry: Arc<dyn BlobStoreRegistry>) -> Self {
        Self::with_config(registry, PromotionConfig::default())
    }

    pub fn with_config(registry: Arc<dyn BlobStoreRegistry>, config: PromotionConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &PromotionConfig {
        &self.config
    }

    /// Promote the store registered under `name` and return the group that
    /// now answers to that name.
    pub fn promote(&self, name: &str) -> Result<Arc<BlobStoreGroup>, PromotionError> {
        self.promote_with_report(name).map(|(group, _)| group)
    }

    /// Plan a promotion without mutating anything.
    ///
    /// Fails with [`PromotionError::InvalidTarget`] for an empty name, an
    /// unregistered name, or a group.
    pub fn plan(&self, name: &str) -> Result<PromotionPlan, PromotionError> {
        if name.is_empty() {
            return Err(PromotionError::invalid_target(name, "empty store name"));
        }
        let handle = self
            .registry
            .get(name)
            .ok_or_else(|| PromotionError::invalid_target(name, "not registered"))?;
        if handle.is_group() {
            return Err(PromotionError::invalid_target(name, "already a group"));
        }
        PromotionPlan::new(handle.configuration().clone(), &self.config)
    }

    /// Like [`Promoter::promote`], also returning what was done.
    pub fn promote_with_report(
        &self,
        name: &str,
    ) -> Result<(Arc<BlobStoreGroup>, PromotionReport), PromotionError> {
        let promotion_id = Uuid::now_v7();
        let span = info_span!("promotion", %promotion_id, source = %name);
        let _enter = span.enter();
        let started = Instant::now();

        let plan = self.plan(name)?;
        info!(promoted = %plan.promoted_name(), "promotion started");

        let steps = plan.steps();
        let mut completed: Vec<&dyn PromotionStep> = Vec::with_capacity(steps.len());
        let mut results = Vec::with_capacity(steps.len());
        let mut registered: Option<StoreHandle> = None;

        for step in &steps {
            let step_start = Instant::now();
            match step.apply(self.registry.as_ref()) {
                Ok(handle) => {
                    let elapsed = step_start.elapsed();
                    debug!(phase = %step.phase(), store = %step.store(), ?elapsed, "step applied");
                    results.push(StepResult {
                        phase: step.phase(),
                        store: step.store().to_string(),
                        elapsed,
                    });
                    completed.push(step.as_ref());
                    if handle.is_some() {
                        registered = handle;
                    }
                }
                Err(source) => return Err(self.roll_back(step.phase(), source, &completed)),
            }
        }

        let Some(group) = registered.and_then(StoreHandle::into_group) else {
            let source = RegistryError::InvalidConfiguration {
                name: name.to_string(),
                reason: format!(
                    "type {:?} did not build a group store",
                    plan.group.store_type
                ),
            };
            return Err(self.roll_back(PromotionPhase::RegisterGroup, source, &completed));
        };

        let report = PromotionReport {
            promotion_id,
            source: plan.source_name().to_string(),
            promoted: plan.promoted_name().to_string(),
            steps: results,
            elapsed: started.elapsed(),
        };
        info!(promoted = %report.promoted, elapsed = ?report.elapsed, "promotion complete");
        Ok((group, report))
    }

    /// Undo `completed` in reverse order and build the caller's error.
    ///
    /// Every compensation is attempted, even after one fails.
    fn roll_back(
        &self,
        phase: PromotionPhase,
        source: RegistryError,
        completed: &[&dyn PromotionStep],
    ) -> PromotionError {
        warn!(%phase, error = %source, "promotion step failed; rolling back");

        let mut recovery_failures = Vec::new();
        for step in completed.iter().rev() {
            match step.compensate(self.registry.as_ref()) {
                Ok(()) => {
                    info!(phase = %step.phase(), store = %step.store(), "step undone");
                }
                Err(error) => {
                    error!(
                        phase = %step.phase(),
                        store = %step.store(),
                        %error,
                        "failed to undo promotion step"
                    );
                    recovery_failures.push(RecoveryFailure {
                        phase: step.phase(),
                        error,
                    });
                }
            }
        }

        if recovery_failures.is_empty() {
            info!(%phase, "promotion rolled back");
        } else {
            error!(
                %phase,
                failures = recovery_failures.len(),
                "promotion rollback incomplete; registry is inconsistent and needs manual repair"
            );
        }

        PromotionError::Failed {
            phase,
            source,
            recovery_failures,
        }
    }
}

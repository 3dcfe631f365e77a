//! Promotion of standalone blob stores into groups.
//!
//! Promoting the store registered as `default` re-registers it as
//! `default-promoted` and registers a group named `default` whose only
//! member is `default-promoted`. Callers holding the name `default` keep
//! working and now talk to a group that more members can join later.
//!
//! The three registry mutations run as a saga: if one fails, the ones
//! already applied are undone in reverse order, and the error names the
//! phase that failed.
//!
//! # Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use hoard_promote::Promoter;
//! use hoard_registry::{BlobStoreManager, BlobStoreRegistry};
//! use hoard_store::{BlobStore, Headers};
//! use hoard_types::BlobStoreConfiguration;
//!
//! let manager = BlobStoreManager::in_memory();
//! let config = BlobStoreConfiguration::new("default", "memory")
//!     .with_attribute("memory", "volume", "default");
//! let store = manager.create(config).unwrap();
//! let id = store.store().put(Bytes::from_static(b"hello"), Headers::new()).unwrap();
//!
//! let group = Promoter::new(manager.clone()).promote("default").unwrap();
//! assert_eq!(group.members(), ["default-promoted"]);
//! assert_eq!(group.fetch(&id).unwrap().data, Bytes::from_static(b"hello"));
//! ```

pub mod config;
pub mod error;
pub mod plan;
pub mod promoter;
pub mod step;

pub use config::{PromotionConfig, PROMOTED_SUFFIX};
pub use error::{PromotionError, RecoveryFailure};
pub use plan::PromotionPlan;
pub use promoter::{PromotionReport, Promoter};
pub use step::{PromotionPhase, PromotionStep, StepResult};

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use hoard_group::{BlobStoreGroup, FillPolicyRegistry};
    use hoard_registry::{
        BlobStoreManager, BlobStoreRegistry, InMemoryConfigStore, ManagerSettings,
        RegistryError, RegistryResult, StoreFactories, StoreHandle,
    };
    use hoard_store::{
        Blob, BlobStore, Headers, InMemoryBlobStore, StoreError, StoreResult, StoreState,
        FILE_SECTION, FILE_TYPE, MEMORY_SECTION, MEMORY_TYPE, PATH_KEY, VOLUME_KEY,
    };
    use hoard_types::{BlobId, BlobStoreConfiguration, GROUP_TYPE};

    use super::*;

    /// Names whose start, stop or group construction should fail.
    #[derive(Default)]
    struct Faults {
        start: Mutex<HashSet<String>>,
        stop: Mutex<HashSet<String>>,
        group: Mutex<HashSet<String>>,
    }

    impl Faults {
        fn fail_start(&self, name: &str) {
            self.start.lock().unwrap().insert(name.to_string());
        }

        fn fail_stop(&self, name: &str) {
            self.stop.lock().unwrap().insert(name.to_string());
        }

        fn fail_group(&self, name: &str) {
            self.group.lock().unwrap().insert(name.to_string());
        }

        fn hit(set: &Mutex<HashSet<String>>, name: &str) -> bool {
            set.lock().unwrap().contains(name)
        }
    }

    /// In-memory store with injectable lifecycle failures.
    struct Faulty {
        inner: InMemoryBlobStore,
        faults: Arc<Faults>,
    }

    impl BlobStore for Faulty {
        fn configuration(&self) -> &BlobStoreConfiguration {
            self.inner.configuration()
        }
        fn start(&self) -> StoreResult<()> {
            if Faults::hit(&self.faults.start, self.name()) {
                return Err(StoreError::Backend("injected start failure".into()));
            }
            self.inner.start()
        }
        fn stop(&self) -> StoreResult<()> {
            if Faults::hit(&self.faults.stop, self.name()) {
                return Err(StoreError::Backend("injected stop failure".into()));
            }
            self.inner.stop()
        }
        fn state(&self) -> StoreState {
            self.inner.state()
        }
        fn get(&self, id: &BlobId) -> StoreResult<Option<Blob>> {
            self.inner.get(id)
        }
        fn put(&self, data: Bytes, headers: Headers) -> StoreResult<BlobId> {
            self.inner.put(data, headers)
        }
        fn delete(&self, id: &BlobId) -> StoreResult<bool> {
            self.inner.delete(id)
        }
        fn exists(&self, id: &BlobId) -> StoreResult<bool> {
            self.inner.exists(id)
        }
    }

    /// Counts registry mutations on the way through.
    struct Recording {
        inner: Arc<BlobStoreManager>,
        mutations: AtomicUsize,
    }

    impl BlobStoreRegistry for Recording {
        fn create(&self, config: BlobStoreConfiguration) -> RegistryResult<StoreHandle> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            self.inner.create(config)
        }
        fn delete(&self, name: &str) -> RegistryResult<()> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(name)
        }
        fn get(&self, name: &str) -> Option<StoreHandle> {
            self.inner.get(name)
        }
    }

    fn faulty_manager() -> (Arc<BlobStoreManager>, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        let mut factories = StoreFactories::default();

        let f = Arc::clone(&faults);
        factories.register(MEMORY_TYPE, move |config, ctx| {
            let inner = InMemoryBlobStore::from_configuration(config, ctx.volumes)?;
            Ok(StoreHandle::Single(Arc::new(Faulty {
                inner,
                faults: Arc::clone(&f),
            })))
        });
        let f = Arc::clone(&faults);
        factories.register(GROUP_TYPE, move |config, ctx| {
            if Faults::hit(&f.group, &config.name) {
                return Err(StoreError::Backend("injected group failure".into()));
            }
            let group = BlobStoreGroup::from_configuration(
                config,
                ctx.fill_policies,
                ctx.resolver.clone(),
            )?;
            Ok(StoreHandle::Group(Arc::new(group)))
        });

        let manager = BlobStoreManager::with_factories(
            ManagerSettings::default(),
            Box::new(InMemoryConfigStore::new()),
            factories,
            FillPolicyRegistry::default(),
        );
        (manager, faults)
    }

    fn memory(name: &str, volume: &str) -> BlobStoreConfiguration {
        BlobStoreConfiguration::new(name, MEMORY_TYPE)
            .with_attribute(MEMORY_SECTION, VOLUME_KEY, volume)
            .with_attribute("custom", "owner", "ops")
    }

    /// Registers `default` holding one blob.
    fn seeded(manager: &BlobStoreManager) -> BlobId {
        let handle = manager.create(memory("default", "default-volume")).unwrap();
        handle
            .store()
            .put(Bytes::from_static(b"precious"), Headers::new())
            .unwrap()
    }

    fn snapshot(manager: &BlobStoreManager) -> Vec<BlobStoreConfiguration> {
        manager
            .list()
            .iter()
            .filter_map(|name| manager.configuration(name))
            .collect()
    }

    fn assert_readable(manager: &BlobStoreManager, name: &str, id: &BlobId) {
        let handle = manager.get(name).unwrap();
        let blob = handle.store().fetch(id).unwrap();
        assert_eq!(blob.data, Bytes::from_static(b"precious"));
    }

    // -----------------------------------------------------------------------
    // 1. Successful promotion keeps data reachable under the original name
    // -----------------------------------------------------------------------

    #[test]
    fn promoted_group_serves_existing_blobs() {
        let (manager, _) = faulty_manager();
        let id = seeded(&manager);

        let group = Promoter::new(manager.clone()).promote("default").unwrap();
        assert_eq!(group.name(), "default");
        assert_eq!(group.members(), ["default-promoted"]);
        assert_eq!(group.fill_policy_type(), "fallback");
        assert_eq!(group.fetch(&id).unwrap().data, Bytes::from_static(b"precious"));

        let registered = manager.get("default").unwrap();
        assert!(Arc::ptr_eq(registered.as_group().unwrap(), &group));
        assert_readable(&manager, "default", &id);
        assert_readable(&manager, "default-promoted", &id);
    }

    #[test]
    fn renamed_store_keeps_original_configuration() {
        let (manager, _) = faulty_manager();
        seeded(&manager);
        let original = manager.configuration("default").unwrap();

        Promoter::new(manager.clone()).promote("default").unwrap();
        assert_eq!(
            manager.configuration("default-promoted").unwrap(),
            original.copy_as("default-promoted")
        );
        assert_eq!(manager.list(), vec!["default", "default-promoted"]);
    }

    #[test]
    fn writes_after_promotion_land_in_member() {
        let (manager, _) = faulty_manager();
        seeded(&manager);
        let group = Promoter::new(manager.clone()).promote("default").unwrap();

        let id = group
            .put(Bytes::from_static(b"fresh"), Headers::new())
            .unwrap();
        let member = manager.get("default-promoted").unwrap();
        assert!(member.store().exists(&id).unwrap());
    }

    #[test]
    fn file_store_promotion_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BlobStoreManager::in_memory();
        let config = BlobStoreConfiguration::new("archive", FILE_TYPE)
            .with_attribute(FILE_SECTION, PATH_KEY, dir.path().display().to_string());
        let handle = manager.create(config).unwrap();
        let id = handle
            .store()
            .put(Bytes::from_static(b"on disk"), Headers::new())
            .unwrap();

        let group = Promoter::new(manager.clone()).promote("archive").unwrap();
        assert_eq!(group.fetch(&id).unwrap().data, Bytes::from_static(b"on disk"));
    }

    #[test]
    fn promoted_member_can_itself_be_promoted() {
        let (manager, _) = faulty_manager();
        let id = seeded(&manager);
        let promoter = Promoter::new(manager.clone());
        promoter.promote("default").unwrap();

        assert!(matches!(
            promoter.promote("default"),
            Err(PromotionError::InvalidTarget { .. })
        ));
        promoter.promote("default-promoted").unwrap();
        assert!(manager.get("default-promoted").unwrap().is_group());
        assert_readable(&manager, "default", &id);
    }

    // -----------------------------------------------------------------------
    // 2. Report
    // -----------------------------------------------------------------------

    #[test]
    fn report_records_each_step() {
        let (manager, _) = faulty_manager();
        seeded(&manager);

        let (_, report) = Promoter::new(manager.clone())
            .promote_with_report("default")
            .unwrap();
        assert_eq!(report.promotion_id.get_version_num(), 7);
        assert_eq!(report.source, "default");
        assert_eq!(report.promoted, "default-promoted");

        let phases: Vec<_> = report.steps.iter().map(|s| s.phase).collect();
        assert_eq!(
            phases,
            vec![
                PromotionPhase::UnregisterOriginal,
                PromotionPhase::RegisterRenamed,
                PromotionPhase::RegisterGroup,
            ]
        );
        let total: std::time::Duration = report.steps.iter().map(|s| s.elapsed).sum();
        assert!(total <= report.elapsed);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["steps"][2]["phase"], "registerGroup");
    }

    // -----------------------------------------------------------------------
    // 3. Invalid targets never mutate the registry
    // -----------------------------------------------------------------------

    #[test]
    fn invalid_targets_are_rejected_without_mutation() {
        let (manager, _) = faulty_manager();
        seeded(&manager);
        manager.create(memory("a", "a")).unwrap();
        manager
            .create(
                hoard_types::GroupAttributes::new(vec!["a".into()], "fallback")
                    .into_configuration("g")
                    .unwrap(),
            )
            .unwrap();
        let long_name = "x".repeat(125);
        manager.create(memory(&long_name, "long")).unwrap();
        let before = snapshot(&manager);

        let recording = Arc::new(Recording {
            inner: manager.clone(),
            mutations: AtomicUsize::new(0),
        });
        let promoter = Promoter::new(recording.clone());

        for name in ["g", "ghost", "", long_name.as_str()] {
            let err = promoter.promote(name).unwrap_err();
            assert!(
                matches!(err, PromotionError::InvalidTarget { .. }),
                "{name:?}: {err}"
            );
        }
        assert_eq!(recording.mutations.load(Ordering::SeqCst), 0);
        assert_eq!(snapshot(&manager), before);
    }

    // -----------------------------------------------------------------------
    // 4. Failure while unregistering the original
    // -----------------------------------------------------------------------

    #[test]
    fn unregister_failure_leaves_registry_unchanged() {
        let (manager, faults) = faulty_manager();
        let id = seeded(&manager);
        let before = snapshot(&manager);
        faults.fail_stop("default");

        let err = Promoter::new(manager.clone()).promote("default").unwrap_err();
        assert_eq!(err.phase(), Some(PromotionPhase::UnregisterOriginal));
        assert!(!err.is_irrecoverable());
        assert!(matches!(
            err,
            PromotionError::Failed {
                source: RegistryError::StopFailed { .. },
                ..
            }
        ));

        assert_eq!(snapshot(&manager), before);
        assert!(manager.get("default-promoted").is_none());
        assert_readable(&manager, "default", &id);
    }

    // -----------------------------------------------------------------------
    // 5. Failure while registering the renamed store
    // -----------------------------------------------------------------------

    #[test]
    fn rename_failure_restores_original() {
        let (manager, faults) = faulty_manager();
        let id = seeded(&manager);
        let before = snapshot(&manager);
        faults.fail_start("default-promoted");

        let err = Promoter::new(manager.clone()).promote("default").unwrap_err();
        assert_eq!(err.phase(), Some(PromotionPhase::RegisterRenamed));
        assert!(!err.is_irrecoverable());

        assert_eq!(snapshot(&manager), before);
        assert_readable(&manager, "default", &id);
    }

    #[test]
    fn rename_collision_restores_original() {
        let (manager, _) = faulty_manager();
        let id = seeded(&manager);
        manager
            .create(memory("default-promoted", "someone-else"))
            .unwrap();
        let before = snapshot(&manager);

        let err = Promoter::new(manager.clone()).promote("default").unwrap_err();
        assert!(matches!(
            err,
            PromotionError::Failed {
                phase: PromotionPhase::RegisterRenamed,
                source: RegistryError::NameAlreadyRegistered { .. },
                ..
            }
        ));
        assert_eq!(snapshot(&manager), before);
        assert_readable(&manager, "default", &id);
    }

    #[test]
    fn rename_failure_with_failed_recovery_is_irrecoverable() {
        let (manager, faults) = faulty_manager();
        seeded(&manager);
        faults.fail_start("default-promoted");
        faults.fail_start("default");

        let err = Promoter::new(manager.clone()).promote("default").unwrap_err();
        assert!(err.is_irrecoverable());
        let PromotionError::Failed {
            phase,
            source,
            recovery_failures,
        } = err
        else {
            panic!("expected a failed promotion");
        };
        assert_eq!(phase, PromotionPhase::RegisterRenamed);
        assert!(matches!(
            source,
            RegistryError::BackendStartFailed { ref name, .. } if name == "default-promoted"
        ));
        assert_eq!(recovery_failures.len(), 1);
        assert_eq!(recovery_failures[0].phase, PromotionPhase::UnregisterOriginal);

        // The split state is visible, not hidden.
        assert!(manager.list().is_empty());
    }

    // -----------------------------------------------------------------------
    // 6. Failure while registering the group
    // -----------------------------------------------------------------------

    #[test]
    fn group_failure_restores_original() {
        let (manager, faults) = faulty_manager();
        let id = seeded(&manager);
        let before = snapshot(&manager);
        faults.fail_group("default");

        let err = Promoter::new(manager.clone()).promote("default").unwrap_err();
        assert_eq!(err.phase(), Some(PromotionPhase::RegisterGroup));
        assert!(!err.is_irrecoverable());

        assert_eq!(snapshot(&manager), before);
        assert!(!manager.get("default").unwrap().is_group());
        assert_readable(&manager, "default", &id);
    }

    #[test]
    fn group_failure_attempts_every_compensation() {
        let (manager, faults) = faulty_manager();
        let id = seeded(&manager);
        faults.fail_group("default");
        faults.fail_stop("default-promoted");

        let err = Promoter::new(manager.clone()).promote("default").unwrap_err();
        assert!(err.is_irrecoverable());
        let PromotionError::Failed {
            phase,
            recovery_failures,
            ..
        } = err
        else {
            panic!("expected a failed promotion");
        };
        assert_eq!(phase, PromotionPhase::RegisterGroup);
        assert_eq!(recovery_failures.len(), 1);
        assert_eq!(recovery_failures[0].phase, PromotionPhase::RegisterRenamed);
        assert!(matches!(
            recovery_failures[0].error,
            RegistryError::StopFailed { .. }
        ));

        // Undoing the rename failed, but the original was still restored.
        assert_eq!(manager.list(), vec!["default", "default-promoted"]);
        assert!(!manager.get("default").unwrap().is_group());
        assert_readable(&manager, "default", &id);
    }
}

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use hoard_store::{Blob, BlobStore, Headers, Lifecycle, StoreError, StoreResult, StoreState};
use hoard_types::{BlobId, BlobStoreConfiguration, GroupAttributes};
use tracing::{debug, warn};

use crate::policy::{FillPolicy, FillPolicyRegistry, MemberStatus};

/// Looks up running stores by name.
///
/// The registry implements this; a group holds only a weak reference to it
/// and asks again on every call.
pub trait MemberResolver: Send + Sync {
    /// The running store registered under `name`, if any.
    fn resolve(&self, name: &str) -> Option<Arc<dyn BlobStore>>;
}

/// A blob store composed of named member stores and a fill policy.
///
/// Members are held by name only. Every operation resolves them afresh, so
/// a member can be restarted, replaced or briefly missing without rebuilding
/// the group. A member name that does not resolve to a started store is
/// skipped, never fatal.
///
/// A group never lists itself as a member. Longer cycles (a group reaching
/// itself through another group) are not detected.
pub struct BlobStoreGroup {
    config: BlobStoreConfiguration,
    members: Vec<String>,
    fill_policy: Arc<dyn FillPolicy>,
    resolver: Weak<dyn MemberResolver>,
    lifecycle: Lifecycle,
}

/// A member resolved for one call.
struct Resolved {
    status: MemberStatus,
    store: Option<Arc<dyn BlobStore>>,
}

impl BlobStoreGroup {
    /// Build a group from its configuration.
    ///
    /// Fails with [`StoreError::InvalidConfiguration`] when the group
    /// section is missing, lists no members, lists the group itself or the
    /// same member twice, or names an unknown fill policy.
    pub fn from_configuration(
        config: BlobStoreConfiguration,
        policies: &FillPolicyRegistry,
        resolver: Weak<dyn MemberResolver>,
    ) -> StoreResult<Self> {
        let view = GroupAttributes::from_configuration(&config)
            .map_err(|e| StoreError::invalid_config(config.name.clone(), e.to_string()))?;

        if view.members.is_empty() {
            return Err(StoreError::invalid_config(
                config.name.clone(),
                "a group needs at least one member",
            ));
        }
        if view.members.iter().any(|m| *m == config.name) {
            return Err(StoreError::invalid_config(
                config.name.clone(),
                "a group cannot be its own member",
            ));
        }
        for (i, member) in view.members.iter().enumerate() {
            if view.members[..i].contains(member) {
                return Err(StoreError::invalid_config(
                    config.name.clone(),
                    format!("member {member} is listed twice"),
                ));
            }
        }

        let fill_policy = policies.create(&view.fill_policy_type).ok_or_else(|| {
            StoreError::invalid_config(
                config.name.clone(),
                format!("unknown fill policy type {:?}", view.fill_policy_type),
            )
        })?;

        Ok(Self {
            config,
            members: view.members,
            fill_policy,
            resolver,
            lifecycle: Lifecycle::new(),
        })
    }

    /// Member names in group order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Type tag of the active fill policy.
    pub fn fill_policy_type(&self) -> &str {
        self.fill_policy.type_tag()
    }

    /// Current live/absent status of every member.
    pub fn member_statuses(&self) -> Vec<MemberStatus> {
        self.resolve_members().into_iter().map(|r| r.status).collect()
    }

    fn resolve_members(&self) -> Vec<Resolved> {
        let resolver = self.resolver.upgrade();
        self.members
            .iter()
            .map(|name| {
                let store = resolver
                    .as_ref()
                    .and_then(|r| r.resolve(name))
                    .filter(|s| s.is_started());
                Resolved {
                    status: MemberStatus::new(name.clone(), store.is_some()),
                    store,
                }
            })
            .collect()
    }

    fn statuses(resolved: &[Resolved]) -> Vec<MemberStatus> {
        resolved.iter().map(|r| r.status.clone()).collect()
    }

    /// Probe members in read order until `probe` yields `Some`.
    ///
    /// A member error does not stop the probe. It is returned only when no
    /// member produced a hit.
    fn probe<T, F>(&self, id: &BlobId, op: &str, probe: F) -> StoreResult<Option<T>>
    where
        F: Fn(&dyn BlobStore) -> StoreResult<Option<T>>,
    {
        let resolved = self.resolve_members();
        let order = self.fill_policy.select_for_read(&Self::statuses(&resolved));
        let mut first_error: Option<StoreError> = None;

        for idx in order {
            let Some(member) = resolved.get(idx) else {
                continue;
            };
            let Some(store) = member.store.as_ref() else {
                debug!(
                    group = %self.name(),
                    member = %member.status.name,
                    op,
                    "member not available; skipping"
                );
                continue;
            };
            match probe(store.as_ref()) {
                Ok(Some(found)) => {
                    if let Some(e) = &first_error {
                        warn!(
                            group = %self.name(),
                            blob = %id.short_hex(),
                            op,
                            error = %e,
                            "found blob after an earlier member failed"
                        );
                    }
                    return Ok(Some(found));
                }
                Ok(None) => {}
                Err(StoreError::NotStarted { .. }) => {
                    debug!(
                        group = %self.name(),
                        member = %member.status.name,
                        op,
                        "member stopped mid-call; skipping"
                    );
                }
                Err(e) => {
                    warn!(
                        group = %self.name(),
                        member = %member.status.name,
                        blob = %id.short_hex(),
                        op,
                        error = %e,
                        "member read failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

impl BlobStore for BlobStoreGroup {
    fn configuration(&self) -> &BlobStoreConfiguration {
        &self.config
    }

    fn start(&self) -> StoreResult<()> {
        self.lifecycle.start_with(|| Ok(()))
    }

    fn stop(&self) -> StoreResult<()> {
        self.lifecycle.stop_with(|| Ok(()))
    }

    fn state(&self) -> StoreState {
        self.lifecycle.state()
    }

    fn get(&self, id: &BlobId) -> StoreResult<Option<Blob>> {
        self.lifecycle.ensure_started(self.name())?;
        self.probe(id, "get", |store| store.get(id))
    }

    fn put(&self, data: Bytes, headers: Headers) -> StoreResult<BlobId> {
        self.lifecycle.ensure_started(self.name())?;
        let resolved = self.resolve_members();
        let statuses = Self::statuses(&resolved);

        let chosen = self
            .fill_policy
            .select_for_write(&statuses)
            .and_then(|idx| resolved.get(idx))
            .and_then(|r| r.store.as_ref().map(|s| (r.status.name.clone(), Arc::clone(s))));
        let Some((member, store)) = chosen else {
            return Err(StoreError::NoLiveMembers {
                group: self.name().to_string(),
            });
        };

        let id = store.put(data, headers).map_err(|e| StoreError::WriteFailed {
            member: member.clone(),
            source: Box::new(e),
        })?;
        debug!(group = %self.name(), member = %member, blob = %id.short_hex(), "blob written");
        Ok(id)
    }

    fn delete(&self, id: &BlobId) -> StoreResult<bool> {
        self.lifecycle.ensure_started(self.name())?;
        let mut deleted = false;
        let mut failures = Vec::new();

        for member in self.resolve_members() {
            let Some(store) = member.store else {
                continue;
            };
            match store.delete(id) {
                Ok(true) => deleted = true,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        group = %self.name(),
                        member = %member.status.name,
                        blob = %id.short_hex(),
                        error = %e,
                        "member delete failed"
                    );
                    failures.push((member.status.name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(deleted)
        } else {
            Err(StoreError::PartialDeleteFailure { deleted, failures })
        }
    }

    fn exists(&self, id: &BlobId) -> StoreResult<bool> {
        self.lifecycle.ensure_started(self.name())?;
        let hit = self.probe(id, "exists", |store| {
            Ok(store.exists(id)?.then_some(()))
        })?;
        Ok(hit.is_some())
    }
}

impl fmt::Debug for BlobStoreGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStoreGroup")
            .field("name", &self.config.name)
            .field("members", &self.members)
            .field("fill_policy", &self.fill_policy.type_tag())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

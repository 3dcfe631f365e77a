//! Fill policies: where a group writes, and in what order it reads.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Type tag of [`FallbackFillPolicy`].
pub const FALLBACK_FILL_POLICY_TYPE: &str = "fallback";
/// Type tag of [`RoundRobinFillPolicy`].
pub const ROUND_ROBIN_FILL_POLICY_TYPE: &str = "roundRobin";

/// A group member as seen by a fill policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberStatus {
    /// Registered name of the member.
    pub name: String,
    /// `true` when the name resolves to a started store.
    pub live: bool,
}

impl MemberStatus {
    pub fn new(name: impl Into<String>, live: bool) -> Self {
        Self {
            name: name.into(),
            live,
        }
    }
}

/// Strategy selecting the member that receives a write and the order in
/// which members are probed for a read.
///
/// `members` always holds one entry per configured member, in group order;
/// returned values are indices into it. Implementations are shared across
/// threads and must keep any internal state consistent under concurrent
/// calls.
pub trait FillPolicy: Send + Sync + fmt::Debug {
    /// Type tag this policy is registered under.
    fn type_tag(&self) -> &str;

    /// Pick the member for a new write. Must return a live member, or `None`
    /// when no member is live.
    fn select_for_write(&self, members: &[MemberStatus]) -> Option<usize>;

    /// Probe order for reads. Defaults to group order.
    fn select_for_read(&self, members: &[MemberStatus]) -> Vec<usize> {
        (0..members.len()).collect()
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Writes go to the first live member; reads probe members in group order.
///
/// A group whose only member is a promoted store behaves exactly like the
/// store did before promotion.
#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackFillPolicy;

impl FillPolicy for FallbackFillPolicy {
    fn type_tag(&self) -> &str {
        FALLBACK_FILL_POLICY_TYPE
    }

    fn select_for_write(&self, members: &[MemberStatus]) -> Option<usize> {
        members.iter().position(|m| m.live)
    }
}

// ---------------------------------------------------------------------------
// Round robin
// ---------------------------------------------------------------------------

/// Writes rotate across live members; reads probe members in group order.
#[derive(Debug, Default)]
pub struct RoundRobinFillPolicy {
    cursor: AtomicUsize,
}

impl RoundRobinFillPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FillPolicy for RoundRobinFillPolicy {
    fn type_tag(&self) -> &str {
        ROUND_ROBIN_FILL_POLICY_TYPE
    }

    fn select_for_write(&self, members: &[MemberStatus]) -> Option<usize> {
        let live: Vec<usize> = members
            .iter()
            .enumerate()
            .filter(|(_, m)| m.live)
            .map(|(i, _)| i)
            .collect();
        if live.is_empty() {
            return None;
        }
        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(live[turn % live.len()])
    }
}

// ---------------------------------------------------------------------------
// FillPolicyRegistry
// ---------------------------------------------------------------------------

type PolicyConstructor = Box<dyn Fn() -> Arc<dyn FillPolicy> + Send + Sync>;

/// Maps fill policy type tags to constructors.
///
/// Groups look their policy up here when they are built, so an unknown tag
/// is reported at configuration time rather than on the first write.
pub struct FillPolicyRegistry {
    constructors: BTreeMap<String, PolicyConstructor>,
}

impl FillPolicyRegistry {
    /// A registry with no policies.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry with the built-in `fallback` and `roundRobin` policies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(FALLBACK_FILL_POLICY_TYPE, || Arc::new(FallbackFillPolicy));
        registry.register(ROUND_ROBIN_FILL_POLICY_TYPE, || {
            Arc::new(RoundRobinFillPolicy::new())
        });
        registry
    }

    /// Register (or replace) the constructor for `tag`.
    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn FillPolicy> + Send + Sync + 'static,
    {
        self.constructors.insert(tag.into(), Box::new(constructor));
    }

    /// Build a fresh policy instance for `tag`.
    pub fn create(&self, tag: &str) -> Option<Arc<dyn FillPolicy>> {
        self.constructors.get(tag).map(|ctor| ctor())
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Default for FillPolicyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for FillPolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillPolicyRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

//! Group blob stores for Hoard.
//!
//! A [`BlobStoreGroup`] is itself a [`hoard_store::BlobStore`]: it routes
//! writes to one member chosen by its [`FillPolicy`], probes members in the
//! policy's read order, and broadcasts deletes. Members are referenced by
//! name and resolved through a [`MemberResolver`] (normally the registry) on
//! every call.
//!
//! # Fill Policies
//!
//! - [`FallbackFillPolicy`] (`"fallback"`) -- first live member takes writes
//! - [`RoundRobinFillPolicy`] (`"roundRobin"`) -- writes rotate across live members
//!
//! Policies are looked up by tag in a [`FillPolicyRegistry`].

pub mod group;
pub mod policy;

pub use group::{BlobStoreGroup, MemberResolver};
pub use policy::{
    FallbackFillPolicy, FillPolicy, FillPolicyRegistry, MemberStatus, RoundRobinFillPolicy,
    FALLBACK_FILL_POLICY_TYPE, ROUND_ROBIN_FILL_POLICY_TYPE,
};

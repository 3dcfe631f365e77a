//! Blob store configurations and the typed group view over them.
//!
//! A [`BlobStoreConfiguration`] is what the registry persists: a unique name,
//! a type tag that selects the constructor, and a two-level string map of
//! attributes. Backends read their own section; anything they do not know is
//! carried along untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Section name -> (key -> value).
pub type Attributes = BTreeMap<String, BTreeMap<String, String>>;

/// Type tag of group stores.
pub const GROUP_TYPE: &str = "group";

/// Configuration a blob store is built from.
///
/// Attribute values are owned strings, so `Clone` is always a deep copy:
/// renaming a clone never affects the configuration it was copied from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobStoreConfiguration {
    /// Unique name within the registry.
    pub name: String,
    /// Type tag, e.g. `"file"`, `"memory"`, `"group"`.
    #[serde(rename = "type")]
    pub store_type: String,
    /// Per-section attributes.
    #[serde(default)]
    pub attributes: Attributes,
}

impl BlobStoreConfiguration {
    pub fn new(name: impl Into<String>, store_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_type: store_type.into(),
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(
        mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.set_attribute(section, key, value);
        self
    }

    pub fn set_attribute(
        &mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.attributes
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Look up a single attribute value.
    pub fn attribute(&self, section: &str, key: &str) -> Option<&str> {
        self.attributes
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    /// Look up an attribute that must be present.
    pub fn required_attribute(&self, section: &str, key: &str) -> Result<&str, TypeError> {
        self.attribute(section, key)
            .ok_or_else(|| TypeError::MissingAttribute {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// An independent copy of this configuration under a new name.
    pub fn copy_as(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_type: self.store_type.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Returns `true` if this configuration describes a group store.
    pub fn is_group(&self) -> bool {
        self.store_type == GROUP_TYPE
    }
}

// ---------------------------------------------------------------------------
// GroupAttributes
// ---------------------------------------------------------------------------

/// Typed view over the `group` attribute section.
///
/// Group code works with this view only; the raw keys are touched exclusively
/// by [`GroupAttributes::from_configuration`] and [`GroupAttributes::apply_to`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupAttributes {
    /// Member store names in registration order.
    pub members: Vec<String>,
    /// Fill policy type tag.
    pub fill_policy_type: String,
}

impl GroupAttributes {
    pub const SECTION: &'static str = "group";
    pub const MEMBERS_KEY: &'static str = "members";
    pub const FILL_POLICY_KEY: &'static str = "fillPolicyType";
    /// Delimiter between member names in the persisted form.
    pub const MEMBER_DELIMITER: char = ',';

    pub fn new(members: Vec<String>, fill_policy_type: impl Into<String>) -> Self {
        Self {
            members,
            fill_policy_type: fill_policy_type.into(),
        }
    }

    /// Read the typed view from a configuration's `group` section.
    pub fn from_configuration(config: &BlobStoreConfiguration) -> Result<Self, TypeError> {
        let raw_members = config.required_attribute(Self::SECTION, Self::MEMBERS_KEY)?;
        let members = raw_members
            .split(Self::MEMBER_DELIMITER)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        let fill_policy_type = config
            .required_attribute(Self::SECTION, Self::FILL_POLICY_KEY)?
            .trim()
            .to_string();
        Ok(Self {
            members,
            fill_policy_type,
        })
    }

    /// Write the typed view into a configuration, keeping any other keys of
    /// the `group` section.
    pub fn apply_to(&self, config: &mut BlobStoreConfiguration) -> Result<(), TypeError> {
        if let Some(bad) = self
            .members
            .iter()
            .find(|m| m.contains(Self::MEMBER_DELIMITER))
        {
            return Err(TypeError::InvalidAttribute {
                section: Self::SECTION.to_string(),
                key: Self::MEMBERS_KEY.to_string(),
                reason: format!("member name {bad:?} contains the delimiter"),
            });
        }
        let joined = self
            .members
            .join(&Self::MEMBER_DELIMITER.to_string());
        config.set_attribute(Self::SECTION, Self::MEMBERS_KEY, joined);
        config.set_attribute(
            Self::SECTION,
            Self::FILL_POLICY_KEY,
            self.fill_policy_type.clone(),
        );
        Ok(())
    }

    /// Build a complete group configuration.
    pub fn into_configuration(
        self,
        name: impl Into<String>,
    ) -> Result<BlobStoreConfiguration, TypeError> {
        let mut config = BlobStoreConfiguration::new(name, GROUP_TYPE);
        self.apply_to(&mut config)?;
        Ok(config)
    }
}

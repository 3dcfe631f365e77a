//! Blob store name validation.
//!
//! Valid store names:
//! - Must be non-empty and at most 128 characters
//! - Must not contain whitespace, control characters, `,` (the group member
//!   delimiter), `/`, `\`, `:`, `*`, `?`
//! - Must not start with `.` or `-`

use crate::error::{RegistryError, RegistryResult};

/// Longest accepted store name.
pub const MAX_NAME_LEN: usize = 128;

/// Characters that are forbidden anywhere in a store name.
const FORBIDDEN_CHARS: &[char] = &[',', '/', '\\', ':', '*', '?'];

/// Validate a blob store name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use hoard_registry::names::validate_store_name;
///
/// assert!(validate_store_name("default").is_ok());
/// assert!(validate_store_name("default-promoted").is_ok());
/// assert!(validate_store_name("").is_err());
/// assert!(validate_store_name("a,b").is_err());
/// ```
pub fn validate_store_name(name: &str) -> RegistryResult<()> {
    let invalid = |reason: String| RegistryError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("store name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(invalid(format!("longer than {MAX_NAME_LEN} characters")));
    }
    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(c))
    {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err(invalid("must not start with '.' or '-'".into()));
    }
    Ok(())
}

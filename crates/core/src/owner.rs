//! Owner identifiers.
//!
//! The owner id names a storage partition directory, so it is validated once
//! at the edge and carried as a newtype afterwards.

use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

/// Maximum length of an owner id.
const MAX_OWNER_ID_LEN: usize = 128;

/// A validated owner identifier, safe to use as a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Validate an owner id.
    ///
    /// Rules:
    /// - Must not be empty.
    /// - Must not exceed `MAX_OWNER_ID_LEN` characters.
    /// - Must contain only ASCII alphanumeric, hyphen, or underscore characters.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::InvalidOwnerId(
                "owner id must not be empty".to_string(),
            ));
        }
        if raw.len() > MAX_OWNER_ID_LEN {
            return Err(CoreError::InvalidOwnerId(format!(
                "owner id must not exceed {MAX_OWNER_ID_LEN} characters"
            )));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidOwnerId(
                "owner id may only contain alphanumeric, hyphen, or underscore characters"
                    .to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::path::Path> for OwnerId {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

//! Core identifier types for Scenesync

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Prefix the widget protocol uses for object reference tokens.
pub const REFERENCE_PREFIX: &str = "IPY_MODEL_";

/// Unique identity of a registered synchronized object
///
/// Uses ULID so identities are time-ordered and never reused within a
/// process, even after the object they named has been torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub Ulid);

impl ObjectId {
    /// Create a new ObjectId with current timestamp
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get the underlying ULID
    pub fn as_ulid(&self) -> &Ulid {
        &self.0
    }

    /// Encode as a reference token (`IPY_MODEL_<ulid>`)
    pub fn to_token(&self) -> String {
        format!("{}{}", REFERENCE_PREFIX, self.0)
    }

    /// Parse a reference token. Returns `None` for anything that is not a token.
    pub fn from_token(token: &str) -> Option<Self> {
        let raw = token.strip_prefix(REFERENCE_PREFIX)?;
        Ulid::from_string(raw).ok().map(Self)
    }

    /// Parse the bare ULID form
    pub fn from_string(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

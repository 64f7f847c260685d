use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier.
///
/// Names compare case-sensitively and exactly. The type borrows as `str`, so
/// maps keyed by `Participant` can be queried with plain string slices.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Participant(String);

impl Participant {
    /// Create a participant from a name. No validation happens here.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Participant {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Participant {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Participant {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Participant {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&Participant> for Participant {
    fn from(p: &Participant) -> Self {
        p.clone()
    }
}

impl PartialEq<str> for Participant {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Participant {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

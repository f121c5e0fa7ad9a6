use std::fmt;

use chrono::{DateTime, Utc};

/// Bearer credential for the upstream API.
///
/// Never mutated: a refresh produces a new value that replaces the old one.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    obtained_at: DateTime<Utc>,
}

impl Credential {
    /// Wrap a freshly issued token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            obtained_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn obtained_at(&self) -> DateTime<Utc> {
        self.obtained_at
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

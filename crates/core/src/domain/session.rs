use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Stable session id for a telephony caller: hex SHA-256 of the caller
    /// identifier, so repeated calls from one number share a cart.
    pub fn from_caller(caller: &str) -> Self {
        let digest = Sha256::digest(caller.trim().as_bytes());
        Self(format!("{digest:x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::SessionId;

    #[test]
    fn caller_sessions_are_stable_and_opaque() {
        let first = SessionId::from_caller("+919800000001");
        let again = SessionId::from_caller(" +919800000001 ");
        let other = SessionId::from_caller("+919800000002");

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(first.as_str().len(), 64);
        assert!(!first.as_str().contains("9800000001"));
    }
}

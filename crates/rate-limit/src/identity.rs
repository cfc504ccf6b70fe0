use std::fmt;

/// The key of a rate limiting bucket: an IP address or a token chosen by the client.
///
/// Nothing about the identity is verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Bucket shared by all callers whose identity could not be determined.
    pub const UNKNOWN: &'static str = "unknown";

    /// Create an identity from any string key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The shared identity of unidentifiable callers.
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// The identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

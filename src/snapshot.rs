//! Snapshots and version tokens.

use std::fmt;
use std::str::FromStr;

use confvault_git::GitOid;

use crate::error::StoreError;

/// Opaque identifier of a point in the store's history.
///
/// Minted by the store when it commits and never modified afterwards. Two
/// tokens can be compared for equality; nothing else about their order is
/// meaningful.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionToken(GitOid);

impl VersionToken {
    pub(crate) const fn from_oid(oid: GitOid) -> Self {
        Self(oid)
    }

    pub(crate) const fn oid(self) -> GitOid {
        self.0
    }

    /// Abbreviated form for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.short()
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({})", self.0)
    }
}

impl FromStr for VersionToken {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<GitOid>()
            .map(Self)
            .map_err(|e| StoreError::invalid_token(s, e.reason))
    }
}

/// A document together with the version it was read at.
///
/// `version` is `None` only for a document that has never been persisted.
/// Snapshots are values: deriving a candidate update produces a new
/// snapshot carrying the same token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// The document.
    pub data: T,
    /// The version the document was read at.
    pub version: Option<VersionToken>,
}

impl<T> Snapshot<T> {
    /// A snapshot of a document that has never been stored.
    pub const fn new(data: T) -> Self {
        Self {
            data,
            version: None,
        }
    }

    /// A snapshot of `data` derived from `version`.
    pub const fn with_version(data: T, version: VersionToken) -> Self {
        Self {
            data,
            version: Some(version),
        }
    }

    /// The version this snapshot was read at, if any.
    #[must_use]
    pub const fn version(&self) -> Option<VersionToken> {
        self.version
    }

    /// Derive a candidate update, keeping the base version.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Snapshot<U> {
        Snapshot {
            data: f(self.data),
            version: self.version,
        }
    }

    /// Take the document out of the snapshot.
    pub fn into_data(self) -> T {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn token_parses_and_displays_hex() {
        let token: VersionToken = HEX.parse().unwrap();
        assert_eq!(token.to_string(), HEX);
        assert_eq!(token.short(), "0123456789ab");
    }

    #[test]
    fn token_parse_tolerates_surrounding_whitespace() {
        let token: VersionToken = format!("{HEX}\n").parse().unwrap();
        assert_eq!(token.to_string(), HEX);
    }

    #[test]
    fn malformed_token_is_invalid_version_token() {
        let err = "not-a-token".parse::<VersionToken>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidVersionToken { .. }));
    }

    #[test]
    fn map_keeps_version() {
        let token: VersionToken = HEX.parse().unwrap();
        let snap = Snapshot::with_version(1_u32, token).map(|n| n + 1);
        assert_eq!(snap.data, 2);
        assert_eq!(snap.version(), Some(token));
    }

    #[test]
    fn new_snapshot_has_no_version() {
        let snap = Snapshot::new("doc");
        assert_eq!(snap.version(), None);
        assert_eq!(snap.into_data(), "doc");
    }
}

//! Network identities
//!
//! A [`Jid`] is the bare address of an artifact or peer on the federated
//! network: a local-part and a domain, written `local@domain`. Resources
//! (`local@domain/resource`) are accepted when parsing and dropped, so two
//! sessions of the same account compare equal.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IdentityError;

/// Bare network address of an artifact or peer
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Jid {
    local: String,
    domain: String,
}

impl Jid {
    /// Create an identity from its parts
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Result<Self, IdentityError> {
        let local = local.into();
        let domain = domain.into();

        if local.is_empty() {
            return Err(IdentityError::InvalidFormat("empty local-part".into()));
        }
        if domain.is_empty() {
            return Err(IdentityError::InvalidFormat("empty domain".into()));
        }
        if local.contains(['@', '/']) || domain.contains(['@', '/']) {
            return Err(IdentityError::InvalidFormat(format!(
                "reserved character in {}@{}",
                local, domain
            )));
        }

        Ok(Self {
            local,
            domain: domain.to_ascii_lowercase(),
        })
    }

    /// Parse `local@domain`, ignoring an optional `/resource` suffix
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let bare = s.split_once('/').map_or(s, |(bare, _)| bare);
        let (local, domain) = bare
            .split_once('@')
            .ok_or_else(|| IdentityError::InvalidFormat(format!("missing '@' in {:?}", s)))?;
        Self::new(local, domain)
    }

    /// The local-part, used as the artifact's name
    pub fn local(&self) -> &str {
        &self.local
    }

    /// The domain serving this identity
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl FromStr for Jid {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for Jid {
    type Error = IdentityError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl Serialize for Jid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Jid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Jid::parse(&s).map_err(serde::de::Error::custom)
    }
}

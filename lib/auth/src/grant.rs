//! The authorization grant issued after a successful login.

use crate::claims::UserData;
use crate::config::ProviderConfig;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// An identity name in the host framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub name: String,
}

impl Alias {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Lifetime of the session the host framework creates from a grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseOptions {
    #[serde(rename = "ttl_seconds", serialize_with = "as_seconds")]
    pub ttl: Duration,
    #[serde(rename = "max_ttl_seconds", serialize_with = "as_seconds")]
    pub max_ttl: Duration,
    pub renewable: bool,
}

/// Result of a successful callback, handed to the host framework.
///
/// Not retained after it is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationGrant {
    pub display_name: String,
    pub policies: BTreeSet<String>,
    pub metadata: BTreeMap<String, String>,
    /// The user's own alias, named after the mapped username.
    pub alias: Alias,
    /// One alias per group, in the order the provider listed them.
    pub group_aliases: Vec<Alias>,
    pub lease: LeaseOptions,
}

impl AuthorizationGrant {
    /// Builds a grant from a mapped user and the provider's lease settings.
    ///
    /// Grants are always renewable.
    #[must_use]
    pub fn from_user(user: UserData, config: &ProviderConfig) -> Self {
        Self {
            display_name: user.display_name,
            policies: user.policies,
            metadata: user.metadata,
            alias: Alias::new(user.username),
            group_aliases: user.groups.into_iter().map(Alias::new).collect(),
            lease: LeaseOptions {
                ttl: config.ttl(),
                max_ttl: config.max_ttl(),
                renewable: true,
            },
        }
    }
}

fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

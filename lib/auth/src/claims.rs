//! Mapping of provider claims to an internal user.
//!
//! The mapping is declarative: [`ClaimsMappingConfig`] names the claim that
//! feeds each field and [`map_claims`] evaluates those rules generically, so
//! nothing here is specific to one identity provider.

use crate::config::ClaimsMappingConfig;
use crate::error::ClaimsError;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

/// Raw claims as returned by the provider, keyed by claim name.
pub type RawClaims = serde_json::Map<String, JsonValue>;

/// A user as derived from provider claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    /// Username, never empty.
    pub username: String,
    /// Human-readable name.
    pub display_name: String,
    /// Granted policies, sorted.
    pub policies: BTreeSet<String>,
    /// Propagated claim values.
    pub metadata: BTreeMap<String, String>,
    /// Group memberships in the order the provider listed them.
    pub groups: Vec<String>,
}

/// Translates raw claims into a [`UserData`] according to `mapping`.
///
/// Only the username is required. Missing display name, groups, policies
/// and metadata claims yield fallbacks or empty collections.
///
/// # Errors
///
/// Returns `MissingRequiredClaim` when the username claim is absent or
/// empty, and `InvalidClaimType` when the username or display name claim
/// is not a scalar.
pub fn map_claims(
    claims: &RawClaims,
    mapping: &ClaimsMappingConfig,
) -> Result<UserData, Report<ClaimsError>> {
    let username_claim = mapping.username_claim();
    let username = match lookup(claims, username_claim) {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(scalar(value).ok_or_else(|| ClaimsError::InvalidClaimType {
            claim: username_claim.to_string(),
            expected: "a string or number",
        })?),
    }
    .filter(|username| !username.trim().is_empty())
    .ok_or_else(|| ClaimsError::MissingRequiredClaim {
        claim: username_claim.to_string(),
    })?;

    let display_name_claim = mapping.display_name_claim();
    let display_name = match lookup(claims, display_name_claim) {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(scalar(value).ok_or_else(|| ClaimsError::InvalidClaimType {
            claim: display_name_claim.to_string(),
            expected: "a string or number",
        })?),
    }
    .filter(|name| !name.is_empty())
    .unwrap_or_else(|| username.clone());

    let groups = string_list(lookup(claims, mapping.groups_claim()));

    let mut policies: BTreeSet<String> = mapping
        .default_policies()
        .into_iter()
        .map(str::to_string)
        .collect();
    if let Some(policies_claim) = mapping.policies_claim() {
        policies.extend(string_list(lookup(claims, policies_claim)));
    }

    let metadata = mapping
        .metadata_claims()
        .iter()
        .filter_map(|(key, claim)| {
            lookup(claims, claim)
                .and_then(scalar)
                .map(|value| (key.clone(), value))
        })
        .collect();

    Ok(UserData {
        username,
        display_name,
        policies,
        metadata,
        groups,
    })
}

/// Resolves a claim reference: a JSON pointer when it starts with `/`,
/// otherwise a top-level claim name taken verbatim.
fn lookup<'a>(claims: &'a RawClaims, reference: &str) -> Option<&'a JsonValue> {
    if reference.starts_with('/') {
        let (first, rest) = split_pointer(reference);
        let root = claims.get(&first)?;
        if rest.is_empty() {
            Some(root)
        } else {
            root.pointer(rest)
        }
    } else {
        claims.get(reference)
    }
}

/// Splits "/a/b/c" into the unescaped first segment "a" and the remaining pointer "/b/c".
fn split_pointer(pointer: &str) -> (String, &str) {
    let without_slash = &pointer[1..];
    let (first, rest) = match without_slash.find('/') {
        Some(idx) => (&without_slash[..idx], &without_slash[idx..]),
        None => (without_slash, ""),
    };
    (first.replace("~1", "/").replace("~0", "~"), rest)
}

fn scalar(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(JsonValue::String(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    }
}

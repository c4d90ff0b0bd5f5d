//! Error types for the auth crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ProviderError`: failures talking to the identity provider
//! - `ClaimsError`: provider claims that cannot be mapped to a user
//! - `ConfigStoreError`: the configuration store could not be read
//! - `CallbackError`: the outermost context, naming the callback step that failed
//!
//! The `Display` output of every error here is meant for logs. Text shown to
//! the end user comes from [`CallbackError::public_message`] only.

use std::fmt;

/// Errors from calls to the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached during discovery.
    Unreachable { reason: String },
    /// Discovery metadata or local provider settings are unusable.
    Misconfigured { reason: String },
    /// The authorization code could not be exchanged for tokens.
    CodeExchangeFailed { reason: String },
    /// The ID token failed signature, issuer, audience or expiry checks.
    TokenVerificationFailed { reason: String },
    /// The user-info endpoint call failed.
    UserInfoFetchFailed { reason: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { reason } => {
                write!(f, "identity provider unreachable: {reason}")
            }
            Self::Misconfigured { reason } => {
                write!(f, "identity provider misconfigured: {reason}")
            }
            Self::CodeExchangeFailed { reason } => {
                write!(f, "authorization code exchange failed: {reason}")
            }
            Self::TokenVerificationFailed { reason } => {
                write!(f, "ID token verification failed: {reason}")
            }
            Self::UserInfoFetchFailed { reason } => {
                write!(f, "user info request failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors from mapping provider claims to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// A claim required by the mapping rules is absent or empty.
    MissingRequiredClaim { claim: String },
    /// A claim is present but has an unusable JSON type.
    InvalidClaimType {
        claim: String,
        expected: &'static str,
    },
}

impl fmt::Display for ClaimsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRequiredClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
            Self::InvalidClaimType { claim, expected } => {
                write!(f, "claim '{claim}' is not {expected}")
            }
        }
    }
}

impl std::error::Error for ClaimsError {}

/// Errors from reading the configuration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStoreError {
    /// The backing store could not be read.
    ReadFailed { reason: String },
}

impl fmt::Display for ConfigStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { reason } => write!(f, "config store read failed: {reason}"),
        }
    }
}

impl std::error::Error for ConfigStoreError {}

/// A step of the callback exchange or of login initiation.
///
/// Callback steps run strictly in declaration order, from `LoadConfig` to
/// `MapClaims`. Login initiation runs `LoadConfig`, `Discover` and then
/// `AuthorizationUrl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallbackStep {
    LoadConfig,
    Discover,
    ExchangeCode,
    VerifyNonce,
    FetchUserInfo,
    MapClaims,
    /// Building the provider authorization URL for a new login.
    AuthorizationUrl,
}

impl CallbackStep {
    /// Returns the step name as used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoadConfig => "load_config",
            Self::Discover => "discover",
            Self::ExchangeCode => "exchange_code",
            Self::VerifyNonce => "verify_nonce",
            Self::FetchUserInfo => "fetch_user_info",
            Self::MapClaims => "map_claims",
            Self::AuthorizationUrl => "authorization_url",
        }
    }
}

impl fmt::Display for CallbackStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a callback was treated as forged or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeryReason {
    /// No fresh nonce was recorded for the client (never issued or expired).
    NoPendingLogin,
    /// The verified ID token carries no nonce claim.
    MissingNonceClaim,
    /// The stored nonce and the ID token nonce differ.
    NonceMismatch,
}

impl fmt::Display for ForgeryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPendingLogin => write!(
                f,
                "no login state for this client, the request may be forged or took longer than the nonce window"
            ),
            Self::MissingNonceClaim => write!(f, "ID token has no nonce claim"),
            Self::NonceMismatch => write!(f, "state nonce does not match, the request may be forged"),
        }
    }
}

/// Terminal failure of a callback, carrying the step that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Provider configuration or claims mapping is absent or unreadable.
    ConfigMissing { what: &'static str },
    /// The inbound request is malformed (e.g. no authorization code).
    BadRequest { reason: String },
    /// Discovery, code exchange or user-info retrieval failed.
    ProviderError { step: CallbackStep },
    /// The ID token did not verify.
    TokenInvalid,
    /// The nonce check failed.
    ForgedOrExpiredRequest { reason: ForgeryReason },
    /// The provider claims could not be mapped to a user.
    ClaimsMappingError,
    /// The caller cancelled or the deadline passed during a provider call.
    Cancelled { step: CallbackStep },
}

/// The failure taxonomy without detail, for matching and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ConfigMissing,
    BadRequest,
    ProviderError,
    TokenInvalid,
    ForgedOrExpiredRequest,
    ClaimsMappingError,
    Cancelled,
}

impl CallbackError {
    /// Returns the failure kind.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ConfigMissing { .. } => FailureKind::ConfigMissing,
            Self::BadRequest { .. } => FailureKind::BadRequest,
            Self::ProviderError { .. } => FailureKind::ProviderError,
            Self::TokenInvalid => FailureKind::TokenInvalid,
            Self::ForgedOrExpiredRequest { .. } => FailureKind::ForgedOrExpiredRequest,
            Self::ClaimsMappingError => FailureKind::ClaimsMappingError,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    /// Returns true for failures that must not reveal their cause to the requester.
    #[must_use]
    pub fn is_security_relevant(&self) -> bool {
        matches!(
            self,
            Self::TokenInvalid | Self::ForgedOrExpiredRequest { .. }
        )
    }

    /// Message safe to show to the end user.
    ///
    /// Token and nonce failures share one message so the requester cannot
    /// tell which check rejected the login.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } => "login is not configured",
            Self::BadRequest { .. } => "missing or invalid authorization code",
            Self::ProviderError { .. } => "identity provider error",
            Self::TokenInvalid | Self::ForgedOrExpiredRequest { .. } => "authentication failed",
            Self::ClaimsMappingError => "identity provider did not supply the required user details",
            Self::Cancelled { .. } => "login request timed out",
        }
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigMissing { what } => write!(f, "could not load {what}"),
            Self::BadRequest { reason } => write!(f, "bad callback request: {reason}"),
            Self::ProviderError { step } => write!(f, "identity provider error during {step}"),
            Self::TokenInvalid => write!(f, "failed to verify ID token"),
            Self::ForgedOrExpiredRequest { reason } => {
                write!(f, "failed to verify nonce: {reason}")
            }
            Self::ClaimsMappingError => write!(f, "failed to map user claims"),
            Self::Cancelled { step } => write!(f, "callback cancelled during {step}"),
        }
    }
}

impl std::error::Error for CallbackError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display() {
        let err = ProviderError::CodeExchangeFailed {
            reason: "invalid_grant".to_string(),
        };
        assert!(err.to_string().contains("code exchange"));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[test]
    fn claims_error_display() {
        let err = ClaimsError::MissingRequiredClaim {
            claim: "email".to_string(),
        };
        assert_eq!(err.to_string(), "missing required claim: email");
    }

    #[test]
    fn callback_error_display_names_step() {
        let err = CallbackError::Cancelled {
            step: CallbackStep::FetchUserInfo,
        };
        assert!(err.to_string().contains("fetch_user_info"));
    }

    #[test]
    fn security_failures_share_public_message() {
        let token = CallbackError::TokenInvalid;
        let missing = CallbackError::ForgedOrExpiredRequest {
            reason: ForgeryReason::NoPendingLogin,
        };
        let mismatch = CallbackError::ForgedOrExpiredRequest {
            reason: ForgeryReason::NonceMismatch,
        };

        assert_eq!(token.public_message(), missing.public_message());
        assert_eq!(missing.public_message(), mismatch.public_message());
        assert!(!mismatch.public_message().contains("nonce"));
        assert!(token.is_security_relevant());
        assert!(mismatch.is_security_relevant());
    }

    #[test]
    fn internal_display_keeps_detail() {
        let err = CallbackError::ForgedOrExpiredRequest {
            reason: ForgeryReason::NonceMismatch,
        };
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            CallbackError::ConfigMissing { what: "x" }.kind(),
            FailureKind::ConfigMissing
        );
        assert_eq!(
            CallbackError::ProviderError {
                step: CallbackStep::Discover
            }
            .kind(),
            FailureKind::ProviderError
        );
        assert!(!CallbackError::ClaimsMappingError.is_security_relevant());
    }

    #[test]
    fn steps_are_ordered() {
        assert!(CallbackStep::ExchangeCode < CallbackStep::VerifyNonce);
        assert!(CallbackStep::VerifyNonce < CallbackStep::FetchUserInfo);
    }

    #[test]
    fn login_step_has_its_own_name() {
        assert_eq!(CallbackStep::AuthorizationUrl.to_string(), "authorization_url");
        assert_ne!(
            CallbackStep::AuthorizationUrl.as_str(),
            CallbackStep::Discover.as_str()
        );
    }
}

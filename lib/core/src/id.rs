//! Correlation identifiers for log output.
//!
//! IDs are ULIDs, so they sort by creation time, which keeps log output for
//! interleaved login attempts easy to follow.

use std::fmt;
use ulid::Ulid;

macro_rules! correlation_id {
    ($(#[$meta:meta])* $name:ident => $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }
    };
}

correlation_id!(
    /// One invocation of the login callback.
    ///
    /// Recorded on the callback's tracing span so every log line of a
    /// single exchange can be correlated.
    CallbackId => "cb"
);

correlation_id!(
    /// One login initiation (redirect to the provider).
    LoginId => "login"
);

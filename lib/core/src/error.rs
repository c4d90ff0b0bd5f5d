//! Error handling foundation for oidc-gate.
//!
//! Only the `Result` alias lives here. Each crate defines its own
//! domain-specific error enums and wraps lower-level reports with
//! `Report::context` as they propagate up the stack.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
///
/// `C` is the context type of the outermost layer of the report.
pub type Result<T, C> = std::result::Result<T, Report<C>>;

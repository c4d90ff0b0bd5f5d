//! Core types shared by the oidc-gate crates.
//!
//! This crate provides the `Result` alias used at every layer and the
//! strongly-typed identifiers that correlate log lines belonging to a
//! single login attempt.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{CallbackId, LoginId};

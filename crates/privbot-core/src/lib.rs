//! Core domain + application logic for privbot.
//!
//! This crate is intentionally framework-agnostic. The chat platform lives
//! behind the `GatewayPort` trait, implemented in adapter crates.

pub mod cleanup;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod privacy;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};

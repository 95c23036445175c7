//! Cross-platform gateway abstractions (Discord today).

pub mod port;
pub mod throttled;
pub mod types;

//! Privacy auto-delete: users opt into having their own messages in a channel
//! deleted a fixed delay after posting.

pub mod commands;
pub mod intake;
pub mod queue;
pub mod registry;
pub mod scanner;
pub mod service;
pub mod worker;

use std::{path::PathBuf, time::Duration};

pub use intake::IntakeDecision;
pub use service::PrivacyService;
pub use worker::DeleteOutcome;

/// Parameters fixed for the lifetime of a [`PrivacyService`].
#[derive(Clone, Debug)]
pub struct PrivacySettings {
    pub map_file: PathBuf,
    pub delete_delay: Duration,
    /// How many recent messages an enrollment scan reads.
    pub history_limit: usize,
    pub pending_marker: String,
    pub command_prefix: String,
    pub error_pause: Duration,
}

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    domain::{ChannelId, UserId},
    messaging::port::GatewayPort,
    privacy::intake::{Intake, IntakeDecision},
};

/// One-time backfill when a user enables privacy in a channel.
///
/// Reads only the given channel, never the rest of the guild.
#[derive(Clone)]
pub struct EnrollmentScanner {
    gateway: Arc<dyn GatewayPort>,
    intake: Intake,
    history_limit: usize,
}

impl EnrollmentScanner {
    pub fn new(gateway: Arc<dyn GatewayPort>, intake: Intake, history_limit: usize) -> Self {
        Self {
            gateway,
            intake,
            history_limit,
        }
    }

    /// Submit `user`'s recent messages in `channel` to intake. Returns how many were queued.
    ///
    /// A failed history read ends the scan; nothing already queued is undone.
    pub async fn scan(&self, channel: ChannelId, user: UserId) -> usize {
        let history = match self
            .gateway
            .recent_messages(channel, self.history_limit)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!(channel_id = %channel, user_id = %user, "enrollment scan failed: {e}");
                return 0;
            }
        };

        let mut queued = 0usize;
        for msg in history.iter().filter(|m| m.author_id == user) {
            if self.intake.submit(msg).await == IntakeDecision::Queued {
                queued += 1;
            }
        }

        info!(
            channel_id = %channel,
            user_id = %user,
            scanned = history.len(),
            queued,
            "enrollment scan finished"
        );
        queued
    }
}

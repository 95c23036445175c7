use std::sync::Arc;

use tracing::debug;

use crate::{
    domain::MessageRef,
    messaging::{port::GatewayPort, types::ObservedMessage},
    privacy::{
        queue::{DeleteQueue, QueuedMessage},
        registry::PrivacyRegistry,
    },
};

/// Why intake did, or did not, queue a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntakeDecision {
    Queued,
    FromBot,
    Command,
    AlreadyQueued,
    NotEnabled,
    /// Direct messages are never monitored.
    OutsideGuild,
}

/// Filter in front of the delete queue, shared by live message events and
/// enrollment scans.
#[derive(Clone)]
pub struct Intake {
    gateway: Arc<dyn GatewayPort>,
    registry: Arc<PrivacyRegistry>,
    queue: Arc<DeleteQueue>,
    command_prefix: String,
    pending_marker: String,
}

impl Intake {
    pub fn new(
        gateway: Arc<dyn GatewayPort>,
        registry: Arc<PrivacyRegistry>,
        queue: Arc<DeleteQueue>,
        command_prefix: impl Into<String>,
        pending_marker: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            registry,
            queue,
            command_prefix: command_prefix.into(),
            pending_marker: pending_marker.into(),
        }
    }

    pub async fn submit(&self, msg: &ObservedMessage) -> IntakeDecision {
        if msg.author_is_bot {
            return IntakeDecision::FromBot;
        }
        if self.is_command(&msg.content) {
            return IntakeDecision::Command;
        }
        if self.queue.is_pending(msg.id) {
            return IntakeDecision::AlreadyQueued;
        }
        if !self.registry.is_enabled(msg.author_id, msg.channel_id).await {
            return IntakeDecision::NotEnabled;
        }
        // Re-checked atomically: another observer may have queued it during the registry lookup.
        if !self.queue.reserve(msg.id) {
            return IntakeDecision::AlreadyQueued;
        }

        self.queue.push(QueuedMessage::from(msg));
        debug!(
            message_id = %msg.id,
            user_id = %msg.author_id,
            channel_id = %msg.channel_id,
            "queued message for deletion"
        );
        self.mark_pending(msg.message_ref());
        IntakeDecision::Queued
    }

    fn is_command(&self, content: &str) -> bool {
        !self.command_prefix.is_empty() && content.starts_with(&self.command_prefix)
    }

    /// Fire-and-forget visual marker. Never affects the enqueue.
    fn mark_pending(&self, msg: MessageRef) {
        let gateway = self.gateway.clone();
        let marker = self.pending_marker.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.add_reaction(msg, &marker).await {
                debug!(message_id = %msg.message_id, "pending marker not added: {e}");
            }
        });
    }
}

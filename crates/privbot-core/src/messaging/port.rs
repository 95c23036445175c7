use async_trait::async_trait;

use crate::{
    domain::{ChannelId, MessageRef},
    messaging::types::{ChannelCapabilities, ObservedMessage},
    Result,
};

/// Cross-platform gateway port.
///
/// Error contract: a message or channel that no longer exists maps to
/// `Error::NotFound`, a permission refusal to `Error::Forbidden`, anything else
/// to `Error::External`.
#[async_trait]
pub trait GatewayPort: Send + Sync {
    /// The bot's own capabilities in `channel`.
    async fn channel_capabilities(&self, channel: ChannelId) -> Result<ChannelCapabilities>;

    /// Up to `limit` most recent messages of `channel`, newest first.
    async fn recent_messages(&self, channel: ChannelId, limit: usize)
        -> Result<Vec<ObservedMessage>>;

    async fn add_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()>;

    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Human-facing mention for a channel, or `None` when the platform cannot resolve it.
    async fn channel_mention(&self, channel: ChannelId) -> Option<String>;
}

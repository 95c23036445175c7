use chrono::{DateTime, Utc};

use crate::domain::{ChannelId, GuildId, MessageId, MessageRef, UserId};

/// A chat message as seen by the core, either from a live event or from a
/// history scan.
///
/// Platform-specific fields stay in the adapter.
#[derive(Clone, Debug)]
pub struct ObservedMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// `None` for direct messages, and for history results on platforms that
    /// omit it.
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    pub author_is_bot: bool,
    /// Authored by this bot's own account.
    pub from_self: bool,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ObservedMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            channel_id: self.channel_id,
            message_id: self.id,
        }
    }
}

/// What the bot is allowed to do in one channel.
///
/// The core never sees host permission bit layouts, only these flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelCapabilities {
    pub can_view: bool,
    pub can_read_history: bool,
    pub can_manage_messages: bool,
}

impl ChannelCapabilities {
    pub const ALL: Self = Self {
        can_view: true,
        can_read_history: true,
        can_manage_messages: true,
    };

    /// Everything needed to scan a channel and delete other users' messages in it.
    pub fn can_moderate(&self) -> bool {
        self.can_view && self.can_read_history && self.can_manage_messages
    }
}

//! Discord adapter (serenity).
//!
//! This crate implements the `privbot-core` GatewayPort over the Discord HTTP
//! API and gateway cache.

use std::{
    future::Future,
    sync::{Arc, OnceLock},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use serenity::all::{
    Cache, CacheHttp, ChannelId as DiscordChannelId, GetMessages, Http, Message,
    MessageId as DiscordMessageId, ReactionType, UserId as DiscordUserId,
};

pub mod handlers;
pub mod router;

use privbot_core::{
    domain::{ChannelId, GuildId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::GatewayPort,
        types::{ChannelCapabilities, ObservedMessage},
    },
    Result,
};

/// Discord caps a single history request at 100 messages.
const HISTORY_PAGE_SIZE: usize = 100;

/// HTTP client plus gateway cache of a running serenity client.
struct Handles {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl CacheHttp for Handles {
    fn http(&self) -> &Http {
        &self.http
    }

    fn cache(&self) -> Option<&Arc<Cache>> {
        Some(&self.cache)
    }
}

/// GatewayPort over serenity. Usable once [`DiscordGateway::attach`] has run.
#[derive(Default)]
pub struct DiscordGateway {
    handles: OnceLock<Handles>,
}

impl DiscordGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the client's HTTP and cache. Later calls are ignored.
    pub fn attach(&self, http: Arc<Http>, cache: Arc<Cache>) {
        let _ = self.handles.set(Handles { http, cache });
    }

    fn handles(&self) -> Result<&Handles> {
        self.handles
            .get()
            .ok_or_else(|| Error::External("discord client not attached yet".to_string()))
    }

    fn dc_channel(channel: ChannelId) -> DiscordChannelId {
        DiscordChannelId::new(channel.0)
    }

    fn dc_message(message: MessageId) -> DiscordMessageId {
        DiscordMessageId::new(message.0)
    }

    fn map_err(e: serenity::Error) -> Error {
        if let serenity::Error::Http(http) = &e {
            match http.status_code().map(|s| s.as_u16()) {
                Some(404) => return Error::NotFound(format!("discord: {e}")),
                Some(403) => return Error::Forbidden(format!("discord: {e}")),
                _ => {}
            }
        }
        Error::External(format!("discord error: {e}"))
    }
}

/// Core view of a Discord message. `me` is the bot's own user id.
pub fn observed_message(msg: &Message, me: DiscordUserId) -> ObservedMessage {
    ObservedMessage {
        id: MessageId(msg.id.get()),
        channel_id: ChannelId(msg.channel_id.get()),
        guild_id: msg.guild_id.map(|g| GuildId(g.get())),
        author_id: UserId(msg.author.id.get()),
        author_is_bot: msg.author.bot,
        from_self: msg.author.id == me,
        content: msg.content.clone(),
        created_at: DateTime::<Utc>::from_timestamp(msg.timestamp.unix_timestamp(), 0)
            .unwrap_or_else(Utc::now),
    }
}

/// Walk history newest-first in pages of at most [`HISTORY_PAGE_SIZE`].
///
/// `fetch(before, page)` returns one page older than `before`. A failure on
/// the first page is an error; a later failure ends the walk and keeps what
/// was already fetched.
async fn collect_history<F, Fut>(limit: usize, mut fetch: F) -> Result<Vec<ObservedMessage>>
where
    F: FnMut(Option<MessageId>, usize) -> Fut,
    Fut: Future<Output = Result<Vec<ObservedMessage>>>,
{
    let mut out = Vec::with_capacity(limit);
    let mut before: Option<MessageId> = None;
    while out.len() < limit {
        let page = (limit - out.len()).min(HISTORY_PAGE_SIZE);
        let batch = match fetch(before, page).await {
            Ok(batch) => batch,
            Err(e) if out.is_empty() => return Err(e),
            Err(e) => {
                warn!(fetched = out.len(), "history page failed, keeping earlier pages: {e}");
                break;
            }
        };

        let short = batch.len() < page;
        before = batch.last().map(|m| m.id);
        out.extend(batch);
        if short {
            break;
        }
    }
    Ok(out)
}

#[async_trait]
impl GatewayPort for DiscordGateway {
    async fn channel_capabilities(&self, channel: ChannelId) -> Result<ChannelCapabilities> {
        let h = self.handles()?;
        let guild_channel = Self::dc_channel(channel)
            .to_channel(h)
            .await
            .map_err(Self::map_err)?
            .guild()
            .ok_or_else(|| Error::External(format!("channel {channel} is not a guild channel")))?;

        let me = h.cache.current_user().id;
        let perms = guild_channel
            .permissions_for_user(&h.cache, me)
            .map_err(Self::map_err)?;

        Ok(ChannelCapabilities {
            can_view: perms.view_channel(),
            can_read_history: perms.read_message_history(),
            can_manage_messages: perms.manage_messages(),
        })
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<ObservedMessage>> {
        let h = self.handles()?;
        let me = h.cache.current_user().id;
        let id = Self::dc_channel(channel);

        collect_history(limit, move |before, page| async move {
            let mut req = GetMessages::new().limit(page as u8);
            if let Some(b) = before {
                req = req.before(Self::dc_message(b));
            }
            let batch = id.messages(h.http(), req).await.map_err(Self::map_err)?;
            Ok(batch.iter().map(|m| observed_message(m, me)).collect())
        })
        .await
    }

    async fn add_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        let h = self.handles()?;
        Self::dc_channel(msg.channel_id)
            .create_reaction(
                h.http(),
                Self::dc_message(msg.message_id),
                ReactionType::Unicode(emoji.to_string()),
            )
            .await
            .map_err(Self::map_err)
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        let h = self.handles()?;
        Self::dc_channel(msg.channel_id)
            .delete_message(h.http(), Self::dc_message(msg.message_id))
            .await
            .map_err(Self::map_err)
    }

    async fn channel_mention(&self, channel: ChannelId) -> Option<String> {
        let h = self.handles().ok()?;
        Self::dc_channel(channel).to_channel(h).await.ok()?;
        Some(format!("<#{channel}>"))
    }
}

//! In-crate fakes shared by unit tests.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    domain::{ChannelId, GuildId, MessageId, MessageRef, UserId},
    messaging::{
        port::GatewayPort,
        types::{ChannelCapabilities, ObservedMessage},
    },
    Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
    Capabilities(ChannelId),
    History(ChannelId, usize),
    React(ChannelId),
    Delete(ChannelId),
}

impl Call {
    pub fn channel(&self) -> ChannelId {
        match *self {
            Call::Capabilities(c) | Call::History(c, _) | Call::React(c) | Call::Delete(c) => c,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Failure {
    NotFound,
    Forbidden,
    Transport,
}

impl Failure {
    fn into_error(self) -> Error {
        match self {
            Failure::NotFound => Error::NotFound("unknown message".to_string()),
            Failure::Forbidden => Error::Forbidden("missing access".to_string()),
            Failure::Transport => Error::External("connection reset".to_string()),
        }
    }
}

/// Records every port call. Channels have full capabilities unless overridden.
#[derive(Default)]
pub struct FakeGateway {
    caps: Mutex<HashMap<ChannelId, ChannelCapabilities>>,
    caps_errors: Mutex<HashSet<ChannelId>>,
    history: Mutex<HashMap<ChannelId, Vec<ObservedMessage>>>,
    history_error: Mutex<Option<Failure>>,
    delete_failures: Mutex<HashMap<MessageId, Failure>>,
    react_fails: Mutex<bool>,
    known_channels: Mutex<HashSet<ChannelId>>,
    calls: Mutex<Vec<Call>>,
    deleted: Mutex<Vec<MessageRef>>,
    reactions: Mutex<Vec<(MessageRef, String)>>,
}

impl FakeGateway {
    pub fn set_caps(&self, channel: ChannelId, caps: ChannelCapabilities) {
        self.caps.lock().unwrap().insert(channel, caps);
    }

    pub fn fail_caps(&self, channel: ChannelId) {
        self.caps_errors.lock().unwrap().insert(channel);
    }

    /// Newest first, as the port returns it.
    pub fn set_history(&self, channel: ChannelId, msgs: Vec<ObservedMessage>) {
        self.history.lock().unwrap().insert(channel, msgs);
    }

    pub fn fail_history(&self, failure: Failure) {
        *self.history_error.lock().unwrap() = Some(failure);
    }

    pub fn fail_delete(&self, id: MessageId, failure: Failure) {
        self.delete_failures.lock().unwrap().insert(id, failure);
    }

    pub fn fail_reactions(&self) {
        *self.react_fails.lock().unwrap() = true;
    }

    pub fn know_channel(&self, channel: ChannelId) {
        self.known_channels.lock().unwrap().insert(channel);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn deleted_ids(&self) -> Vec<u64> {
        self.deleted().iter().map(|m| m.message_id.0).collect()
    }

    pub fn reactions(&self) -> Vec<(MessageRef, String)> {
        self.reactions.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GatewayPort for FakeGateway {
    async fn channel_capabilities(&self, channel: ChannelId) -> Result<ChannelCapabilities> {
        self.record(Call::Capabilities(channel));
        if self.caps_errors.lock().unwrap().contains(&channel) {
            return Err(Error::External("unknown channel".to_string()));
        }
        Ok(self
            .caps
            .lock()
            .unwrap()
            .get(&channel)
            .copied()
            .unwrap_or(ChannelCapabilities::ALL))
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<ObservedMessage>> {
        self.record(Call::History(channel, limit));
        if let Some(f) = *self.history_error.lock().unwrap() {
            return Err(f.into_error());
        }
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(&channel)
            .map(|msgs| msgs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn add_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        self.record(Call::React(msg.channel_id));
        if *self.react_fails.lock().unwrap() {
            return Err(Failure::Forbidden.into_error());
        }
        self.reactions
            .lock()
            .unwrap()
            .push((msg, emoji.to_string()));
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.record(Call::Delete(msg.channel_id));
        if let Some(f) = self.delete_failures.lock().unwrap().get(&msg.message_id) {
            return Err(f.into_error());
        }
        self.deleted.lock().unwrap().push(msg);
        Ok(())
    }

    async fn channel_mention(&self, channel: ChannelId) -> Option<String> {
        if self.known_channels.lock().unwrap().contains(&channel) {
            Some(format!("<#{}>", channel.0))
        } else {
            None
        }
    }
}

pub fn msg(id: u64, author: u64, channel: u64, content: &str) -> ObservedMessage {
    ObservedMessage {
        id: MessageId(id),
        channel_id: ChannelId(channel),
        guild_id: Some(GuildId(1)),
        author_id: UserId(author),
        author_is_bot: false,
        from_self: false,
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

pub fn bot_msg(id: u64, author: u64, channel: u64, content: &str) -> ObservedMessage {
    ObservedMessage {
        author_is_bot: true,
        ..msg(id, author, channel, content)
    }
}

/// Unique, not-yet-existing path under the system temp dir.
pub fn tmp_file(prefix: &str) -> PathBuf {
    static SEQ: AtomicUsize = AtomicUsize::new(0);
    let n = SEQ.fetch_add(1, Ordering::SeqCst);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "privbot-{prefix}-{}-{n}-{nanos}.json",
        std::process::id()
    ))
}

/// Give detached tasks (pending markers, cleanup deletes) a chance to run.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChannelId, MessageRef},
    messaging::{
        port::GatewayPort,
        types::{ChannelCapabilities, ObservedMessage},
    },
    Result,
};

/// Once this many channel limiters exist, idle ones are dropped before adding another.
const PRUNE_CHANNELS_AT: usize = 512;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound API calls (global rate limit).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls against one channel (per-route buckets).
    pub per_channel_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(25),  // ~40/sec
            per_channel_min_interval: Duration::from_millis(250), // ~4/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// GatewayPort decorator that rate-limits outbound calls.
///
/// Best-effort defense against 429s when an enrollment scan and a burst of
/// deletions hit the same channel. Capability and mention lookups are served
/// from the adapter's cache and pass straight through.
pub struct ThrottledGateway {
    inner: Arc<dyn GatewayPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_channel: Mutex<HashMap<ChannelId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledGateway {
    pub fn new(inner: Arc<dyn GatewayPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_channel: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_channel(&self, channel: ChannelId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_channel.lock().await;
        if map.len() >= PRUNE_CHANNELS_AT && !map.contains_key(&channel) {
            // An idle limiter reserves exactly like a fresh one, so dropping it is lossless.
            let now = Instant::now();
            map.retain(|_, lim| {
                Arc::strong_count(lim) > 1 || lim.try_lock().map_or(true, |l| l.next > now)
            });
        }
        map.entry(channel)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_channel_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_channel(&self, channel: ChannelId) {
        let global_wait = { self.global.lock().await.reserve() };
        let channel_wait = {
            let lim = self.limiter_for_channel(channel).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(channel_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl GatewayPort for ThrottledGateway {
    async fn channel_capabilities(&self, channel: ChannelId) -> Result<ChannelCapabilities> {
        self.inner.channel_capabilities(channel).await
    }

    async fn recent_messages(
        &self,
        channel: ChannelId,
        limit: usize,
    ) -> Result<Vec<ObservedMessage>> {
        self.throttle_channel(channel).await;
        self.inner.recent_messages(channel, limit).await
    }

    async fn add_reaction(&self, msg: MessageRef, emoji: &str) -> Result<()> {
        self.throttle_channel(msg.channel_id).await;
        self.inner.add_reaction(msg, emoji).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.throttle_channel(msg.channel_id).await;
        self.inner.delete_message(msg).await
    }

    async fn channel_mention(&self, channel: ChannelId) -> Option<String> {
        self.inner.channel_mention(channel).await
    }
}

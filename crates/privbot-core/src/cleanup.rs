//! Auto-cleanup for one designated channel: every message posted there is
//! deleted after a delay, whoever wrote it (other bots excepted).

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    domain::ChannelId,
    messaging::{port::GatewayPort, types::ObservedMessage},
    Error,
};

pub struct ChannelCleanup {
    channel: Option<ChannelId>,
    delay: Duration,
    gateway: Arc<dyn GatewayPort>,
    cancel: CancellationToken,
}

impl ChannelCleanup {
    pub fn new(channel: Option<ChannelId>, delay: Duration, gateway: Arc<dyn GatewayPort>) -> Self {
        Self {
            channel,
            delay,
            gateway,
            cancel: CancellationToken::new(),
        }
    }

    /// Schedule deletion of `msg` if it belongs to the cleanup channel. Returns whether it did.
    pub fn observe(&self, msg: &ObservedMessage) -> bool {
        if self.channel != Some(msg.channel_id) {
            return false;
        }
        if msg.author_is_bot && !msg.from_self {
            return false;
        }

        let gateway = self.gateway.clone();
        let cancel = self.cancel.clone();
        let delay = self.delay;
        let target = msg.message_ref();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = sleep(delay) => {
                    match gateway.delete_message(target).await {
                        Ok(()) | Err(Error::NotFound(_)) => {
                            debug!(message_id = %target.message_id, "cleanup deleted message");
                        }
                        Err(e) => warn!(message_id = %target.message_id, "cleanup delete failed: {e}"),
                    }
                }
            }
        });
        true
    }

    /// Drop every pending cleanup deletion.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bot_msg, msg, settle, FakeGateway};

    const CLEANUP: ChannelId = ChannelId(55);
    const DELAY: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn deletes_messages_in_the_channel_after_delay() {
        let gateway = Arc::new(FakeGateway::default());
        let cleanup = ChannelCleanup::new(Some(CLEANUP), DELAY, gateway.clone());

        assert!(cleanup.observe(&msg(1, 7, CLEANUP.0, "hi")));
        assert!(!cleanup.observe(&msg(2, 7, 56, "elsewhere")));

        sleep(DELAY - Duration::from_secs(1)).await;
        assert!(gateway.deleted().is_empty());
        sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(gateway.deleted_ids(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn own_messages_are_cleaned_but_other_bots_are_not() {
        let gateway = Arc::new(FakeGateway::default());
        let cleanup = ChannelCleanup::new(Some(CLEANUP), DELAY, gateway.clone());

        let mut own = bot_msg(1, 900, CLEANUP.0, "pong");
        own.from_self = true;
        assert!(cleanup.observe(&own));
        assert!(!cleanup.observe(&bot_msg(2, 901, CLEANUP.0, "other bot")));

        sleep(DELAY + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(gateway.deleted_ids(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_deletions() {
        let gateway = Arc::new(FakeGateway::default());
        let cleanup = ChannelCleanup::new(Some(CLEANUP), DELAY, gateway.clone());
        cleanup.observe(&msg(1, 7, CLEANUP.0, "hi"));

        cleanup.stop();
        sleep(DELAY * 2).await;
        settle().await;
        assert!(gateway.deleted().is_empty());
    }

    #[tokio::test]
    async fn disabled_without_a_channel() {
        let gateway = Arc::new(FakeGateway::default());
        let cleanup = ChannelCleanup::new(None, DELAY, gateway);
        assert!(!cleanup.observe(&msg(1, 7, CLEANUP.0, "hi")));
    }
}

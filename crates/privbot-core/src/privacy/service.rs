use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    domain::{ChannelId, UserId},
    messaging::{port::GatewayPort, types::ObservedMessage},
    privacy::{
        commands::{PrivacyReply, StatusReply},
        intake::{Intake, IntakeDecision},
        queue::DeleteQueue,
        registry::PrivacyRegistry,
        scanner::EnrollmentScanner,
        worker::DeleteWorker,
        PrivacySettings,
    },
    Result,
};

/// Process-wide owner of the privacy pipeline: registry, pending set, queue
/// and worker.
///
/// Construction only loads the registry. The worker runs between `start` and
/// `stop`, which the application calls from its startup/shutdown sequence.
pub struct PrivacyService {
    settings: PrivacySettings,
    gateway: Arc<dyn GatewayPort>,
    registry: Arc<PrivacyRegistry>,
    queue: Arc<DeleteQueue>,
    intake: Intake,
    scanner: EnrollmentScanner,
    worker: DeleteWorker,
}

impl PrivacyService {
    pub fn new(settings: PrivacySettings, gateway: Arc<dyn GatewayPort>) -> Self {
        let registry = Arc::new(PrivacyRegistry::load(settings.map_file.clone()));
        let queue = Arc::new(DeleteQueue::new());
        let intake = Intake::new(
            gateway.clone(),
            registry.clone(),
            queue.clone(),
            settings.command_prefix.clone(),
            settings.pending_marker.clone(),
        );
        let scanner = EnrollmentScanner::new(gateway.clone(), intake.clone(), settings.history_limit);
        let worker = DeleteWorker::new(
            gateway.clone(),
            registry.clone(),
            queue.clone(),
            settings.delete_delay,
            settings.error_pause,
        );

        Self {
            settings,
            gateway,
            registry,
            queue,
            intake,
            scanner,
            worker,
        }
    }

    pub async fn start(&self) -> Result<()> {
        if self.worker.start().await? {
            info!("privacy auto-delete started");
        }
        Ok(())
    }

    /// Stop the worker, then try a final synchronous save of the registry.
    pub async fn stop(&self) {
        self.worker.stop().await;
        if let Err(e) = self.registry.flush_sync() {
            warn!("final privacy map flush failed: {e}");
        }
    }

    pub fn registry(&self) -> &Arc<PrivacyRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<DeleteQueue> {
        &self.queue
    }

    /// Entry point for new-message events.
    pub async fn observe_message(&self, msg: &ObservedMessage) -> IntakeDecision {
        if msg.guild_id.is_none() {
            return IntakeDecision::OutsideGuild;
        }
        self.intake.submit(msg).await
    }

    /// `/privacy channel enable`.
    pub async fn set_privacy(&self, user: UserId, channel: ChannelId, enable: bool) -> PrivacyReply {
        let mention = self.mention(channel).await;

        let capable = match self.gateway.channel_capabilities(channel).await {
            Ok(caps) => caps.can_moderate(),
            Err(e) => {
                warn!(channel_id = %channel, "could not resolve channel permissions: {e}");
                false
            }
        };
        if !capable {
            return PrivacyReply::MissingPermissions { channel: mention };
        }

        if enable {
            self.enable(user, channel, mention).await
        } else {
            self.disable(user, channel, mention).await
        }
    }

    async fn enable(&self, user: UserId, channel: ChannelId, mention: String) -> PrivacyReply {
        let m = self.registry.enable(user, channel).await;
        if !m.changed {
            return PrivacyReply::AlreadyEnabled { channel: mention };
        }

        // Registry is updated before the scan, so intake accepts the backfilled messages.
        let queued = self.scanner.scan(channel, user).await;
        info!(user_id = %user, channel_id = %channel, queued, "privacy enabled");

        PrivacyReply::Enabled {
            channel: mention,
            delay_secs: self.settings.delete_delay.as_secs(),
            saved: m.persisted.is_ok(),
        }
    }

    async fn disable(&self, user: UserId, channel: ChannelId, mention: String) -> PrivacyReply {
        let m = self.registry.disable(user, channel).await;
        if !m.changed {
            return PrivacyReply::NotEnabled { channel: mention };
        }

        info!(user_id = %user, channel_id = %channel, "privacy disabled");
        PrivacyReply::Disabled {
            channel: mention,
            saved: m.persisted.is_ok(),
        }
    }

    /// `/privacystatus`.
    pub async fn status(&self, user: UserId) -> StatusReply {
        let mut channels = Vec::new();
        for channel in self.registry.channels_for(user).await {
            channels.push(self.mention(channel).await);
        }
        StatusReply { channels }
    }

    async fn mention(&self, channel: ChannelId) -> String {
        self.gateway
            .channel_mention(channel)
            .await
            .unwrap_or_else(|| format!("`#{channel}`"))
    }
}

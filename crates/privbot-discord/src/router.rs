use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Client, Command, Context, EventHandler, GatewayIntents, Interaction, Message, Ready};
use tracing::{info, warn};

use privbot_core::{
    cleanup::ChannelCleanup,
    config::Config,
    messaging::{
        port::GatewayPort,
        throttled::{ThrottleConfig, ThrottledGateway},
    },
    privacy::PrivacyService,
};

use crate::handlers;
use crate::DiscordGateway;

pub struct AppState {
    pub cfg: Arc<Config>,
    pub privacy: Arc<PrivacyService>,
    pub cleanup: Arc<ChannelCleanup>,
}

struct Handler {
    state: Arc<AppState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "bot is online");

        match Command::set_global_commands(&ctx.http, handlers::commands::definitions()).await {
            Ok(cmds) => info!(count = cmds.len(), "registered slash commands"),
            Err(e) => warn!("failed to register slash commands: {e}"),
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        handlers::handle_message(&ctx, &msg, &self.state).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(cmd) = interaction {
            handlers::handle_command(&ctx, &cmd, &self.state).await;
        }
    }
}

/// Connect to the gateway and run until the shards shut down (Ctrl-C).
pub async fn run_gateway(cfg: Arc<Config>) -> anyhow::Result<()> {
    let discord = Arc::new(DiscordGateway::new());

    // Throttle outbound calls so an enrollment scan plus a burst of deletions in one
    // channel stays under the per-route limits. Serenity still handles 429s underneath.
    let raw_gateway: Arc<dyn GatewayPort> = discord.clone();
    let gateway: Arc<dyn GatewayPort> = Arc::new(ThrottledGateway::new(
        raw_gateway,
        ThrottleConfig::default(),
    ));

    let privacy = Arc::new(PrivacyService::new(cfg.privacy_settings(), gateway.clone()));
    let cleanup = Arc::new(ChannelCleanup::new(
        cfg.cleanup_channel,
        cfg.cleanup_delay,
        gateway,
    ));
    if let Some(channel) = cfg.cleanup_channel {
        info!(channel_id = %channel, delay_secs = cfg.cleanup_delay.as_secs(), "channel cleanup enabled");
    }

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        privacy,
        cleanup,
    });

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&state.cfg.discord_token, intents)
        .event_handler(Handler {
            state: state.clone(),
        })
        .await?;

    discord.attach(client.http.clone(), client.cache.clone());
    state.privacy.start().await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    let res = client.start().await;

    state.cleanup.stop();
    state.privacy.stop().await;
    info!("bot stopped");

    res.map_err(Into::into)
}

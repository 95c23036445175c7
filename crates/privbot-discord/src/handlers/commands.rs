use serenity::all::{
    ChannelType, CommandDataOptionValue, CommandInteraction, CommandOptionType, Context,
    CreateCommand, CreateCommandOption, CreateInteractionResponseFollowup,
};
use tracing::warn;

use privbot_core::domain::{ChannelId, UserId};

use crate::router::AppState;

pub const PRIVACY: &str = "privacy";
pub const PRIVACY_STATUS: &str = "privacystatus";

const GUILD_ONLY: &str = "This command can only be used in a server.";

/// Channels `/privacy` accepts: regular text and announcement channels.
const PRIVACY_CHANNEL_TYPES: [ChannelType; 2] = [ChannelType::Text, ChannelType::News];

/// Slash commands registered globally on `ready`.
pub fn definitions() -> Vec<CreateCommand> {
    vec![
        CreateCommand::new(PRIVACY)
            .description("Enable or disable privacy auto-delete in a channel for yourself.")
            .dm_permission(false)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Channel,
                    "channel",
                    "Text channel where messages should be auto-deleted",
                )
                .required(true)
                .channel_types(PRIVACY_CHANNEL_TYPES.to_vec()),
            )
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::Boolean,
                    "enable",
                    "Enable (true) or disable (false) privacy in that channel",
                )
                .required(false),
            ),
        CreateCommand::new(PRIVACY_STATUS)
            .description("Show which channels you have privacy auto-delete enabled in.")
            .dm_permission(false),
    ]
}

/// `channel` is required; `enable` defaults to true.
fn parse_privacy_options<'a>(
    options: impl IntoIterator<Item = (&'a str, &'a CommandDataOptionValue)>,
) -> Option<(ChannelId, bool)> {
    let mut channel = None;
    let mut enable = true;
    for (name, value) in options {
        match (name, value) {
            ("channel", CommandDataOptionValue::Channel(id)) => channel = Some(ChannelId(id.get())),
            ("enable", CommandDataOptionValue::Boolean(b)) => enable = *b,
            _ => {}
        }
    }
    channel.map(|c| (c, enable))
}

pub async fn handle_command(ctx: &Context, cmd: &CommandInteraction, state: &AppState) {
    let name = cmd.data.name.as_str();
    if name != PRIVACY && name != PRIVACY_STATUS {
        return;
    }

    // Replies are private to the invoker.
    if let Err(e) = cmd.defer_ephemeral(&ctx.http).await {
        warn!(command = name, "failed to defer interaction: {e}");
        return;
    }

    let user = UserId(cmd.user.id.get());
    let reply = if cmd.guild_id.is_none() {
        GUILD_ONLY.to_string()
    } else if name == PRIVACY {
        let options = cmd
            .data
            .options
            .iter()
            .map(|o| (o.name.as_str(), &o.value));
        match parse_privacy_options(options) {
            Some((channel, enable)) => state
                .privacy
                .set_privacy(user, channel, enable)
                .await
                .to_string(),
            None => "Please choose a text channel.".to_string(),
        }
    } else {
        state.privacy.status(user).await.to_string()
    };

    let followup = CreateInteractionResponseFollowup::new()
        .content(reply)
        .ephemeral(true);
    if let Err(e) = cmd.create_followup(&ctx.http, followup).await {
        warn!(command = name, "failed to send command reply: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_defaults_to_true() {
        let channel = CommandDataOptionValue::Channel(serenity::all::ChannelId::new(42));
        assert_eq!(
            parse_privacy_options([("channel", &channel)]),
            Some((ChannelId(42), true))
        );
    }

    #[test]
    fn explicit_disable_is_honored() {
        let channel = CommandDataOptionValue::Channel(serenity::all::ChannelId::new(42));
        let enable = CommandDataOptionValue::Boolean(false);
        assert_eq!(
            parse_privacy_options([("enable", &enable), ("channel", &channel)]),
            Some((ChannelId(42), false))
        );
    }

    #[test]
    fn missing_channel_is_rejected() {
        let enable = CommandDataOptionValue::Boolean(true);
        assert_eq!(parse_privacy_options([("enable", &enable)]), None);
    }

    #[test]
    fn privacy_accepts_announcement_channels() {
        assert!(PRIVACY_CHANNEL_TYPES.contains(&ChannelType::Text));
        assert!(PRIVACY_CHANNEL_TYPES.contains(&ChannelType::News));
        assert!(!PRIVACY_CHANNEL_TYPES.contains(&ChannelType::Voice));
    }

    #[test]
    fn both_commands_are_defined() {
        assert_eq!(definitions().len(), 2);
    }
}

use std::fmt;

/// Reply to `/privacy`. Rendered privately to the invoker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrivacyReply {
    MissingPermissions {
        channel: String,
    },
    AlreadyEnabled {
        channel: String,
    },
    Enabled {
        channel: String,
        delay_secs: u64,
        saved: bool,
    },
    NotEnabled {
        channel: String,
    },
    Disabled {
        channel: String,
        saved: bool,
    },
}

/// Reply to `/privacystatus`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReply {
    pub channels: Vec<String>,
}

const UNSAVED_NOTE: &str = "\n⚠️ This change could not be saved and will be lost if the bot restarts.";

impl fmt::Display for PrivacyReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivacyReply::MissingPermissions { channel } => write!(
                f,
                "⚠️ I need **View Channel**, **Read Message History**, and **Manage Messages** in {channel} to enable privacy there."
            ),
            PrivacyReply::AlreadyEnabled { channel } => {
                write!(f, "✅ You already have privacy enabled in {channel}.")
            }
            PrivacyReply::Enabled {
                channel,
                delay_secs,
                saved,
            } => {
                write!(
                    f,
                    "🔒 Privacy enabled in {channel}. Your messages in that channel will be deleted after {delay_secs} seconds."
                )?;
                if !saved {
                    f.write_str(UNSAVED_NOTE)?;
                }
                Ok(())
            }
            PrivacyReply::NotEnabled { channel } => {
                write!(f, "ℹ️ You don't have privacy enabled in {channel}.")
            }
            PrivacyReply::Disabled { channel, saved } => {
                write!(f, "🔓 Privacy disabled in {channel}.")?;
                if !saved {
                    f.write_str(UNSAVED_NOTE)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for StatusReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.channels.is_empty() {
            return f.write_str("You have privacy disabled everywhere.");
        }
        write!(f, "Privacy is enabled in: {}", self.channels.join(", "))
    }
}

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChannelId, errors::Error, privacy::PrivacySettings, Result};

/// Typed configuration for the bot, read from the environment once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Gateway
    pub discord_token: String,

    // Privacy auto-delete
    pub privacy_map_file: PathBuf,
    pub auto_delete_delay: Duration,
    pub queue_history_limit: usize,
    pub mark_reaction: String,
    pub command_prefix: String,
    pub worker_error_pause: Duration,

    // Channel cleanup
    pub cleanup_channel: Option<ChannelId>,
    pub cleanup_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let discord_token = env_str("DISCORD_TOKEN").unwrap_or_default();
        if discord_token.trim().is_empty() {
            return Err(Error::Config(
                "DISCORD_TOKEN environment variable is required".to_string(),
            ));
        }

        let privacy_map_file = env_path("PRIVACY_MAP_FILE")
            .unwrap_or_else(|| PathBuf::from("privacy_map.json"));
        let auto_delete_delay = Duration::from_secs(env_u64("AUTO_DELETE_DELAY").unwrap_or(20));
        let queue_history_limit = env_usize("QUEUE_HISTORY_LIMIT").unwrap_or(200);
        let mark_reaction = env_str("PRIVACY_MARK_REACTION")
            .and_then(non_empty)
            .unwrap_or_else(|| "⏳".to_string());
        let command_prefix = env_str("COMMAND_PREFIX")
            .and_then(non_empty)
            .unwrap_or_else(|| "!".to_string());
        let worker_error_pause =
            Duration::from_millis(env_u64("WORKER_ERROR_PAUSE_MS").unwrap_or(2000));

        let cleanup_channel = match env_str("CLEANUP_CHANNEL_ID").and_then(non_empty) {
            Some(raw) => Some(ChannelId(raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("CLEANUP_CHANNEL_ID is not a channel id: {raw}"))
            })?)),
            None => None,
        };
        let cleanup_delay = Duration::from_secs(env_u64("CLEANUP_DELAY").unwrap_or(30));

        Ok(Self {
            discord_token,
            privacy_map_file,
            auto_delete_delay,
            queue_history_limit,
            mark_reaction,
            command_prefix,
            worker_error_pause,
            cleanup_channel,
            cleanup_delay,
        })
    }

    pub fn privacy_settings(&self) -> PrivacySettings {
        PrivacySettings {
            map_file: self.privacy_map_file.clone(),
            delete_delay: self.auto_delete_delay,
            history_limit: self.queue_history_limit,
            pending_marker: self.mark_reaction.clone(),
            command_prefix: self.command_prefix.clone(),
            error_pause: self.worker_error_pause,
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv(
            "# comment\n\nDISCORD_TOKEN=\"abc\"\nPRIVACY_MARK_REACTION='x'\nnot a pair\n=novalue\nAUTO_DELETE_DELAY = 5\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("DISCORD_TOKEN".to_string(), "abc".to_string()),
                ("PRIVACY_MARK_REACTION".to_string(), "x".to_string()),
                ("AUTO_DELETE_DELAY".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn privacy_settings_projects_privacy_fields() {
        let cfg = Config {
            discord_token: "t".to_string(),
            privacy_map_file: "/tmp/map.json".into(),
            auto_delete_delay: Duration::from_secs(20),
            queue_history_limit: 200,
            mark_reaction: "⏳".to_string(),
            command_prefix: "!".to_string(),
            worker_error_pause: Duration::from_secs(2),
            cleanup_channel: None,
            cleanup_delay: Duration::from_secs(30),
        };

        let s = cfg.privacy_settings();
        assert_eq!(s.map_file, PathBuf::from("/tmp/map.json"));
        assert_eq!(s.delete_delay, Duration::from_secs(20));
        assert_eq!(s.history_limit, 200);
        assert_eq!(s.pending_marker, "⏳");
        assert_eq!(s.command_prefix, "!");
        assert_eq!(s.error_pause, Duration::from_secs(2));
    }
}

use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    domain::{ChannelId, UserId},
    Result,
};

/// user -> channels with privacy enabled. A user key exists only while its set is non-empty.
pub type PrivacyMap = BTreeMap<UserId, BTreeSet<ChannelId>>;

/// Outcome of an enable/disable call.
///
/// The in-memory change is applied even when `persisted` is an error.
#[derive(Debug)]
pub struct Mutation {
    pub changed: bool,
    pub persisted: Result<()>,
}

/// Which (user, channel) pairs have opted into auto-deletion.
///
/// Every effective mutation rewrites the whole file. The write happens under
/// the map lock, so the file always reflects the latest mutation.
pub struct PrivacyRegistry {
    path: PathBuf,
    map: Mutex<PrivacyMap>,
}

impl PrivacyRegistry {
    /// Load from `path`. A missing or unreadable file yields an empty registry.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = match load_map(&path) {
            Ok(Some(map)) => {
                info!(users = map.len(), path = %path.display(), "loaded privacy map");
                map
            }
            Ok(None) => {
                info!(path = %path.display(), "no privacy map on disk, starting empty");
                PrivacyMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), "failed to load privacy map, starting empty: {e}");
                PrivacyMap::new()
            }
        };

        Self {
            path,
            map: Mutex::new(map),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn is_enabled(&self, user: UserId, channel: ChannelId) -> bool {
        self.map
            .lock()
            .await
            .get(&user)
            .is_some_and(|chans| chans.contains(&channel))
    }

    pub async fn enable(&self, user: UserId, channel: ChannelId) -> Mutation {
        let mut map = self.map.lock().await;
        if !map.entry(user).or_default().insert(channel) {
            return Mutation {
                changed: false,
                persisted: Ok(()),
            };
        }
        let persisted = self.persist(&map).await;
        Mutation {
            changed: true,
            persisted,
        }
    }

    pub async fn disable(&self, user: UserId, channel: ChannelId) -> Mutation {
        let mut map = self.map.lock().await;
        let Some(chans) = map.get_mut(&user) else {
            return Mutation {
                changed: false,
                persisted: Ok(()),
            };
        };
        let changed = chans.remove(&channel);
        if chans.is_empty() {
            map.remove(&user);
        }
        if !changed {
            return Mutation {
                changed,
                persisted: Ok(()),
            };
        }
        let persisted = self.persist(&map).await;
        Mutation { changed, persisted }
    }

    /// Channels `user` has enabled, ascending.
    pub async fn channels_for(&self, user: UserId) -> Vec<ChannelId> {
        self.map
            .lock()
            .await
            .get(&user)
            .map(|chans| chans.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn snapshot(&self) -> PrivacyMap {
        self.map.lock().await.clone()
    }

    /// Blocking write used on teardown, outside any async context.
    ///
    /// Skips (with a warning) if a command is holding the map at that moment.
    pub fn flush_sync(&self) -> Result<()> {
        let Ok(map) = self.map.try_lock() else {
            warn!("privacy map busy at shutdown, skipping final flush");
            return Ok(());
        };
        let txt = encode_map(&map)?;
        write_atomic_sync(&self.path, &txt)
    }

    async fn persist(&self, map: &PrivacyMap) -> Result<()> {
        let res = async {
            let txt = encode_map(map)?;
            let tmp = tmp_path(&self.path);
            tokio::fs::write(&tmp, txt).await?;
            tokio::fs::rename(&tmp, &self.path).await?;
            Ok(())
        }
        .await;

        if let Err(e) = &res {
            warn!(path = %self.path.display(), "failed to save privacy map: {e}");
        }
        res
    }
}

/// `{ "<user id>": [<channel id>, ...] }`, channel lists ascending.
pub fn encode_map(map: &PrivacyMap) -> Result<String> {
    Ok(serde_json::to_string(map)?)
}

/// Inverse of [`encode_map`]. Users with empty channel lists are dropped.
pub fn decode_map(txt: &str) -> Result<PrivacyMap> {
    let raw: BTreeMap<UserId, Vec<ChannelId>> = serde_json::from_str(txt)?;
    Ok(raw
        .into_iter()
        .filter(|(_, chans)| !chans.is_empty())
        .map(|(user, chans)| (user, chans.into_iter().collect()))
        .collect())
}

fn load_map(path: &Path) -> Result<Option<PrivacyMap>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(decode_map(&txt)?))
}

fn write_atomic_sync(path: &Path, txt: &str) -> Result<()> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, txt)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

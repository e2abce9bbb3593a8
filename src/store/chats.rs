//! Per-channel chat logs, one JSON file per channel.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::fs::{ensure_dir, read_json_opt, write_json_atomic};

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// The full transcript of one channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLog {
    pub channel: String,
    pub messages: Vec<ChatMessage>,
}

/// Store for chat logs under a single directory.
pub struct ChatStore {
    dir: PathBuf,
}

impl ChatStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        ensure_dir(&dir).await?;
        Ok(Self { dir })
    }

    fn channel_path(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{}.json", normalize_channel(channel)))
    }

    /// Read a channel's log. A channel with no file yet is an empty log,
    /// not an error; channels are created lazily by the first append.
    pub async fn log(&self, channel: &str) -> Result<ChatLog, StoreError> {
        let normalized = normalize_channel(channel);
        Ok(read_json_opt(&self.channel_path(channel))
            .await?
            .unwrap_or(ChatLog {
                channel: normalized,
                messages: Vec::new(),
            }))
    }

    /// Append a message to a channel, creating the channel if needed.
    pub async fn append(
        &self,
        channel: &str,
        author: &str,
        text: &str,
    ) -> Result<ChatMessage, StoreError> {
        let mut log = self.log(channel).await?;
        let message = ChatMessage {
            id: Uuid::new_v4(),
            author: author.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        log.messages.push(message.clone());
        write_json_atomic(&self.channel_path(channel), &log).await?;
        Ok(message)
    }
}

/// Channel names become filenames; keep them to a safe alphabet.
fn normalize_channel(channel: &str) -> String {
    let normalized: String = channel
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = normalized.trim_matches('-');
    if trimmed.is_empty() {
        "general".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    async fn test_store() -> (ChatStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ChatStore::open(dir.path().join("chats")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn missing_channel_reads_as_empty_log() {
        let (store, _dir) = test_store().await;
        let log = store.log("standup").await.unwrap();
        assert_eq!(log.channel, "standup");
        assert!(log.messages.is_empty());
    }

    #[tokio::test]
    async fn append_creates_and_accumulates() {
        let (store, _dir) = test_store().await;
        store.append("standup", "alice", "morning").await.unwrap();
        store.append("standup", "bob", "hello").await.unwrap();

        let log = store.log("standup").await.unwrap();
        assert_eq!(log.messages.len(), 2);
        assert_eq!(log.messages[0].author, "alice");
        assert_eq!(log.messages[1].text, "hello");
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let (store, _dir) = test_store().await;
        store.append("a", "x", "one").await.unwrap();
        store.append("b", "y", "two").await.unwrap();

        assert_eq!(store.log("a").await.unwrap().messages.len(), 1);
        assert_eq!(store.log("b").await.unwrap().messages.len(), 1);
    }

    #[test]
    fn channel_names_are_normalized() {
        assert_eq!(normalize_channel("Standup"), "standup");
        assert_eq!(normalize_channel("../etc/passwd"), "etc-passwd");
        assert_eq!(normalize_channel("dev chat"), "dev-chat");
        assert_eq!(normalize_channel("///"), "general");
    }
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::SettingsStore;

/// Settings keys for the remote repository
pub const KEY_OWNER: &str = "github_owner";
pub const KEY_REPO: &str = "github_repo";
pub const KEY_BRANCH: &str = "github_branch";
pub const KEY_TOKEN: &str = "github_token";
pub const KEY_POLL_INTERVAL: &str = "poll_interval_secs";
pub const KEY_SOURCE_PATH: &str = "data_path";
pub const KEY_JSON_PATH: &str = "json_path";

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_SOURCE_PATH: &str = "src/data/chapters.js";
pub const DEFAULT_JSON_PATH: &str = "src/data/chapters.json";

/// Default poll cadence
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Minimum poll interval in seconds (keeps anonymous clients under the API rate limit)
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;

/// Where the archive lives and how to authenticate against it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Bearer token. Without one the client is read-only.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl RemoteConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: DEFAULT_BRANCH.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build from the settings store. Returns `None` when owner or repo is
    /// unset; an empty token means anonymous read-only access.
    pub fn from_settings(settings: &SettingsStore) -> Option<Self> {
        let owner = settings.get_non_empty(KEY_OWNER)?;
        let repo = settings.get_non_empty(KEY_REPO)?;
        Some(Self {
            owner,
            repo,
            branch: settings
                .get_non_empty(KEY_BRANCH)
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            token: settings.get_non_empty(KEY_TOKEN),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.token.as_deref().map_or(false, |t| !t.trim().is_empty())
    }
}

/// Paths and cadence of the sync core
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// The source module, the primary data file
    pub source_path: String,
    /// The JSON document kept beside it
    pub json_path: String,
    pub poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            source_path: DEFAULT_SOURCE_PATH.to_string(),
            json_path: DEFAULT_JSON_PATH.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl SyncConfig {
    pub fn from_settings(settings: &SettingsStore) -> Self {
        let defaults = Self::default();
        let poll_secs = settings
            .get_non_empty(KEY_POLL_INTERVAL)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
            .max(MIN_POLL_INTERVAL_SECS);

        Self {
            source_path: settings
                .get_non_empty(KEY_SOURCE_PATH)
                .unwrap_or(defaults.source_path),
            json_path: settings
                .get_non_empty(KEY_JSON_PATH)
                .unwrap_or(defaults.json_path),
            poll_interval: Duration::from_secs(poll_secs),
        }
    }
}

/// Push progress as broadcast to listeners
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Syncing,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusEvent {
    pub status: SyncState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SyncStatusEvent {
    pub fn syncing() -> Self {
        Self {
            status: SyncState::Syncing,
            timestamp: Utc::now(),
            revision_id: None,
            message: None,
        }
    }

    pub fn success(revision_id: String) -> Self {
        Self {
            status: SyncState::Success,
            timestamp: Utc::now(),
            revision_id: Some(revision_id),
            message: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            status: SyncState::Error,
            timestamp: Utc::now(),
            revision_id: None,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_config_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        assert!(RemoteConfig::from_settings(&settings).is_none());

        settings.set(KEY_OWNER, "ana").unwrap();
        settings.set(KEY_REPO, "memories").unwrap();
        settings.set(KEY_TOKEN, "   ").unwrap();

        let config = RemoteConfig::from_settings(&settings).unwrap();
        assert_eq!(config.branch, "main");
        assert!(!config.has_credential());

        settings.set(KEY_TOKEN, "ghp_secret").unwrap();
        settings.set(KEY_BRANCH, "data").unwrap();
        let config = RemoteConfig::from_settings(&settings).unwrap();
        assert!(config.has_credential());
        assert_eq!(config.branch, "data");
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        settings.set(KEY_POLL_INTERVAL, "1").unwrap();
        assert_eq!(
            SyncConfig::from_settings(&settings).poll_interval,
            Duration::from_secs(MIN_POLL_INTERVAL_SECS)
        );
    }

    #[test]
    fn test_status_event_shape() {
        let event = SyncStatusEvent::success("abc".to_string());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["revisionId"], "abc");
        assert!(json.get("message").is_none());
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use photo_archive::auth::StaticAuthenticator;
use photo_archive::storage::SettingsStore;
use photo_archive::sync::{Durability, GitHubClient, RemoteConfig, SyncConfig, SyncManager};
use photo_archive::Chapter;

/// Open the settings file at `path`, or the default location
pub fn open_settings(path: Option<PathBuf>) -> Result<SettingsStore> {
    let path = match path {
        Some(path) => path,
        None => SettingsStore::default_path().context("Failed to get config directory")?,
    };
    SettingsStore::open(&path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Shared application state for CLI commands
pub struct App {
    pub settings: SettingsStore,
    pub remote: RemoteConfig,
    pub manager: SyncManager,
}

impl App {
    /// Connect to the configured repository and load the current archive
    pub async fn load(settings: SettingsStore) -> Result<Self> {
        let Some(remote) = RemoteConfig::from_settings(&settings) else {
            bail!(
                "Repository not configured. Run:\n  photo-archive-cli config set github_owner <owner>\n  photo-archive-cli config set github_repo <repo>"
            );
        };

        let client = GitHubClient::new(remote.clone()).context("Failed to create GitHub client")?;
        let manager = SyncManager::with_default_dataset(
            Arc::new(client),
            remote.branch.clone(),
            SyncConfig::from_settings(&settings),
        )
        .context("Bundled dataset is invalid")?;

        // Fall back to the bundled dataset when the repository is unreachable
        if let Err(e) = manager.poll_once().await {
            log::warn!("Initial load failed: {}", e);
            eprintln!("warning: could not load {}/{}: {}", remote.owner, remote.repo, e);
        }

        Ok(Self {
            settings,
            remote,
            manager,
        })
    }

    /// Editing commands need a session whenever accounts are configured
    pub fn require_session(&self) -> Result<()> {
        let auth = StaticAuthenticator::from_settings(&self.settings)
            .context("Invalid accounts setting")?;
        if !auth.has_accounts() {
            return Ok(());
        }
        match auth.current_session(&self.settings) {
            Some(session) => {
                log::debug!("Editing as {}", session.username);
                Ok(())
            }
            None => bail!("Not logged in. Run: photo-archive-cli login <username>"),
        }
    }

    /// Editing pushes the whole collection, so it needs the remote archive
    /// loaded rather than the bundled fallback
    pub fn require_loaded(&self) -> Result<()> {
        if !self.manager.is_loaded() {
            bail!(
                "Archive in {}/{} could not be loaded; refusing to overwrite it with bundled data",
                self.remote.owner,
                self.remote.repo
            );
        }
        Ok(())
    }

    /// Find a chapter by id or slug
    pub fn find_chapter(&self, key: &str) -> Result<Chapter> {
        let chapters = self.manager.snapshot();
        let key_lower = key.to_lowercase();

        chapters
            .iter()
            .find(|c| c.id == key || c.slug == key_lower)
            .cloned()
            .with_context(|| {
                format!(
                    "No chapter matching '{}'. Available chapters:\n{}",
                    key,
                    chapters
                        .iter()
                        .map(|c| format!("  - {} ({})", c.slug, c.label))
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            })
    }
}

/// One-line report of how far a mutation got
pub fn describe(durability: &Durability) -> String {
    match durability {
        Durability::Durable { revision_id } => {
            format!("saved ({})", &revision_id[..revision_id.len().min(7)])
        }
        Durability::LocalOnly => "not saved remotely: no github_token configured".to_string(),
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::archive::{
    self, Chapter, ChapterPatch, ChapterPhoto, NewChapter, NewPhoto, Photo, PhotoPatch,
};
use crate::codec::{self, ParseError};
use crate::storage::{validate_restore_candidate, RestoreKind};

use super::config::{SyncConfig, SyncStatusEvent};
use super::error::SyncError;
use super::lock;
use super::readers::ReaderChain;
use super::remote::RemoteStore;
use super::scheduler::{self, PollScheduler};

const DEFAULT_DATASET: &str = include_str!("../../data/default_chapters.json");

/// Chapter id used when a label slugifies to nothing
const FALLBACK_SLUG: &str = "chapter";

type Subscriber = Arc<dyn Fn(Arc<Vec<Chapter>>) + Send + Sync>;
type DriftHook = Arc<dyn Fn(&DeployDrift) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// How far a mutation got
#[derive(Debug, Clone, PartialEq)]
pub enum Durability {
    /// Applied to the cache, no write credential configured
    LocalOnly,
    /// Committed to the remote store
    Durable { revision_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome<T> {
    pub value: T,
    pub durability: Durability,
}

impl<T> MutationOutcome<T> {
    pub fn is_durable(&self) -> bool {
        matches!(self.durability, Durability::Durable { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftReason {
    /// Head commit touched neither data file
    UnrelatedCommit,
    /// Data file was written by a newer release
    NewerDataFormat { found: u32 },
}

/// The deployed code moved ahead of the running client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployDrift {
    pub head: String,
    pub reason: DriftReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Head is the last revision already seen
    Unchanged,
    /// Head touched a data file. `replaced` is false when the fetched
    /// collection equals the cache.
    DataChanged { revision_id: String, replaced: bool },
    CodeChanged(DeployDrift),
}

struct CacheState {
    chapters: Arc<Vec<Chapter>>,
    generation: u64,
    last_seen_revision: Option<String>,
    /// Set by the first deploy drift; no writes after that
    drift: Option<DeployDrift>,
    /// A poll has read the remote archive into the cache
    loaded: bool,
}

/// Outcome of the most recent push, and the cache generation it carried
#[derive(Clone)]
struct PushRecord {
    generation: u64,
    result: Result<String, String>,
}

struct Inner {
    remote: Arc<dyn RemoteStore>,
    branch: String,
    config: SyncConfig,
    readers: ReaderChain,
    cache: Mutex<CacheState>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscriber: AtomicU64,
    drift_hooks: Mutex<Vec<DriftHook>>,
    status_tx: broadcast::Sender<SyncStatusEvent>,
    push_lock: tokio::sync::Mutex<()>,
    last_push: Mutex<Option<PushRecord>>,
    poller: Mutex<Option<PollScheduler>>,
}

/// In-memory chapter cache kept in sync with a remote repository.
///
/// Mutations apply to the cache immediately and notify subscribers, then
/// push the whole collection. Concurrent mutations coalesce: a push always
/// carries the latest cache, and a mutation whose change already went out
/// with an earlier push reuses that push's result. A failed push leaves the
/// local change in place.
///
/// Cloning is cheap and every clone shares the same cache.
#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        branch: impl Into<String>,
        config: SyncConfig,
        initial: Vec<Chapter>,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(64);
        let readers = ReaderChain::preferred(&config);
        Self {
            inner: Arc::new(Inner {
                remote,
                branch: branch.into(),
                config,
                readers,
                cache: Mutex::new(CacheState {
                    chapters: Arc::new(archive::renormalize(&initial)),
                    generation: 0,
                    last_seen_revision: None,
                    drift: None,
                    loaded: false,
                }),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
                drift_hooks: Mutex::new(Vec::new()),
                status_tx,
                push_lock: tokio::sync::Mutex::new(()),
                last_push: Mutex::new(None),
                poller: Mutex::new(None),
            }),
        }
    }

    /// Start from the bundled dataset until the first poll lands
    pub fn with_default_dataset(
        remote: Arc<dyn RemoteStore>,
        branch: impl Into<String>,
        config: SyncConfig,
    ) -> Result<Self, ParseError> {
        let initial = codec::deserialize_json(DEFAULT_DATASET)?;
        Ok(Self::new(remote, branch, config, initial))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn can_write(&self) -> bool {
        self.inner.remote.can_write()
    }

    /// Current cache contents
    pub fn snapshot(&self) -> Arc<Vec<Chapter>> {
        lock(&self.inner.cache).chapters.clone()
    }

    pub fn all_photos(&self) -> Vec<ChapterPhoto> {
        archive::all_photos(&self.snapshot())
    }

    pub fn visible_photos(&self) -> Vec<ChapterPhoto> {
        archive::visible_photos(&self.snapshot())
    }

    pub fn chapter_by_slug(&self, slug: &str) -> Option<Chapter> {
        archive::find_chapter_by_slug(&self.snapshot(), slug).cloned()
    }

    /// Commit the cache was last reconciled with, if any
    pub fn last_seen_revision(&self) -> Option<String> {
        lock(&self.inner.cache).last_seen_revision.clone()
    }

    /// True once a poll has read the remote archive. Until then the cache
    /// holds only the data the manager was built with.
    pub fn is_loaded(&self) -> bool {
        lock(&self.inner.cache).loaded
    }

    /// The deploy drift that stopped this instance from writing, if any
    pub fn deploy_drift(&self) -> Option<DeployDrift> {
        lock(&self.inner.cache).drift.clone()
    }

    /// Register a callback fired after every cache replacement. Returns the
    /// current snapshot so the caller can render without waiting.
    pub fn subscribe<F>(&self, callback: F) -> (SubscriptionId, Arc<Vec<Chapter>>)
    where
        F: Fn(Arc<Vec<Chapter>>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let callback: Subscriber = Arc::new(callback);
        lock(&self.inner.subscribers).push((id, callback));
        (id, self.snapshot())
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.inner.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Register a callback fired when the deployed code moves ahead
    pub fn on_deploy_drift<F>(&self, hook: F)
    where
        F: Fn(&DeployDrift) + Send + Sync + 'static,
    {
        lock(&self.inner.drift_hooks).push(Arc::new(hook));
    }

    /// Push lifecycle events: syncing, then success or error
    pub fn status_events(&self) -> broadcast::Receiver<SyncStatusEvent> {
        self.inner.status_tx.subscribe()
    }

    // ---- Mutations ----

    pub async fn add_chapter(
        &self,
        input: NewChapter,
    ) -> Result<MutationOutcome<Chapter>, SyncError> {
        if input.label.trim().is_empty() {
            return Err(SyncError::InvalidRecord("chapter label is required".into()));
        }
        let message = format!("Add chapter {}", input.label.trim());
        self.mutate(&message, move |chapters| {
            let mut chapter = input.into_chapter();
            if chapter.slug.is_empty() {
                chapter.slug = FALLBACK_SLUG.to_string();
            }
            let slug = unique_slug(chapters, &chapter.slug);
            chapter.id = slug.clone();
            chapter.slug = slug;
            chapters.push(chapter.clone());
            Ok(chapter)
        })
        .await
    }

    pub async fn update_chapter(
        &self,
        chapter_id: &str,
        patch: ChapterPatch,
    ) -> Result<MutationOutcome<Chapter>, SyncError> {
        let id = chapter_id.to_string();
        self.mutate(&format!("Update chapter {}", chapter_id), move |chapters| {
            let index = chapter_index(chapters, &id)?;
            let mut updated = chapters[index].clone();
            patch.apply(&mut updated);

            if updated.label.trim().is_empty() {
                return Err(SyncError::InvalidRecord("chapter label is required".into()));
            }
            if updated.slug.is_empty() {
                return Err(SyncError::InvalidRecord("chapter slug is empty".into()));
            }
            if chapters
                .iter()
                .enumerate()
                .any(|(i, c)| i != index && c.slug == updated.slug)
            {
                return Err(SyncError::DuplicateSlug(updated.slug));
            }

            chapters[index] = updated.clone();
            Ok(updated)
        })
        .await
    }

    pub async fn delete_chapter(
        &self,
        chapter_id: &str,
    ) -> Result<MutationOutcome<Chapter>, SyncError> {
        let id = chapter_id.to_string();
        self.mutate(&format!("Delete chapter {}", chapter_id), move |chapters| {
            let index = chapter_index(chapters, &id)?;
            Ok(chapters.remove(index))
        })
        .await
    }

    pub async fn set_chapter_hidden(
        &self,
        chapter_id: &str,
        hidden: bool,
    ) -> Result<MutationOutcome<Chapter>, SyncError> {
        let verb = if hidden { "Hide" } else { "Unhide" };
        let id = chapter_id.to_string();
        self.mutate(&format!("{} chapter {}", verb, chapter_id), move |chapters| {
            let index = chapter_index(chapters, &id)?;
            chapters[index].hidden = hidden;
            Ok(chapters[index].clone())
        })
        .await
    }

    pub async fn add_photo(
        &self,
        chapter_id: &str,
        input: NewPhoto,
    ) -> Result<MutationOutcome<Photo>, SyncError> {
        if input.urls.iter().all(|u| u.trim().is_empty()) {
            return Err(SyncError::InvalidRecord("a photo needs at least one url".into()));
        }
        let id = chapter_id.to_string();
        self.mutate(&format!("Add photo to {}", chapter_id), move |chapters| {
            let index = chapter_index(chapters, &id)?;
            let photo = input.into_photo();
            chapters[index].photos.push(photo.clone());
            Ok(photo)
        })
        .await
    }

    pub async fn update_photo(
        &self,
        chapter_id: &str,
        photo_id: &str,
        patch: PhotoPatch,
    ) -> Result<MutationOutcome<Photo>, SyncError> {
        if patch
            .urls
            .as_ref()
            .map_or(false, |urls| urls.iter().all(|u| u.trim().is_empty()))
        {
            return Err(SyncError::InvalidRecord("a photo needs at least one url".into()));
        }
        let (cid, pid) = (chapter_id.to_string(), photo_id.to_string());
        self.mutate(&format!("Update photo {}", photo_id), move |chapters| {
            let photo = photo_mut(chapters, &cid, &pid)?;
            patch.apply(photo);
            Ok(photo.clone())
        })
        .await
    }

    pub async fn delete_photo(
        &self,
        chapter_id: &str,
        photo_id: &str,
    ) -> Result<MutationOutcome<Photo>, SyncError> {
        let (cid, pid) = (chapter_id.to_string(), photo_id.to_string());
        self.mutate(&format!("Delete photo {}", photo_id), move |chapters| {
            let index = chapter_index(chapters, &cid)?;
            let photos = &mut chapters[index].photos;
            let position = photos
                .iter()
                .position(|p| p.id == pid)
                .ok_or_else(|| SyncError::PhotoNotFound {
                    chapter_id: cid.clone(),
                    photo_id: pid.clone(),
                })?;
            Ok(photos.remove(position))
        })
        .await
    }

    pub async fn set_photo_hidden(
        &self,
        chapter_id: &str,
        photo_id: &str,
        hidden: bool,
    ) -> Result<MutationOutcome<Photo>, SyncError> {
        let verb = if hidden { "Hide" } else { "Unhide" };
        let (cid, pid) = (chapter_id.to_string(), photo_id.to_string());
        self.mutate(&format!("{} photo {}", verb, photo_id), move |chapters| {
            let photo = photo_mut(chapters, &cid, &pid)?;
            photo.hidden = hidden;
            Ok(photo.clone())
        })
        .await
    }

    /// Replace the whole collection with a backup, after screening it.
    /// Returns the number of chapters restored.
    pub async fn restore(
        &self,
        kind: RestoreKind,
        text: &str,
    ) -> Result<MutationOutcome<usize>, SyncError> {
        validate_restore_candidate(kind, text)?;
        let restored = codec::deserialize(kind.format(), text)?;
        log::info!("Restoring {} chapter(s) from {} backup", restored.len(), kind);
        self.replace_all(restored, &format!("Restore from {} backup", kind))
            .await
    }

    pub async fn replace_all(
        &self,
        chapters: Vec<Chapter>,
        message: &str,
    ) -> Result<MutationOutcome<usize>, SyncError> {
        let chapters = archive::renormalize(&chapters);
        self.mutate(message, move |current| {
            *current = chapters;
            Ok(current.len())
        })
        .await
    }

    /// Apply `change` to the cache, notify, then push unless read-only
    async fn mutate<T, F>(&self, message: &str, change: F) -> Result<MutationOutcome<T>, SyncError>
    where
        F: FnOnce(&mut Vec<Chapter>) -> Result<T, SyncError>,
    {
        let (value, snapshot, generation) = {
            let mut state = lock(&self.inner.cache);
            if let Some(drift) = &state.drift {
                return Err(SyncError::ReloadRequired(drift.head.clone()));
            }
            let mut next = (*state.chapters).clone();
            let value = change(&mut next)?;
            state.chapters = Arc::new(next);
            state.generation += 1;
            (value, state.chapters.clone(), state.generation)
        };
        self.notify(snapshot);

        if !self.inner.remote.can_write() {
            log::debug!("{}: no write token, kept locally", message);
            return Ok(MutationOutcome {
                value,
                durability: Durability::LocalOnly,
            });
        }

        // Let mutations issued in the same turn land before pushing
        tokio::task::yield_now().await;

        let revision_id = self.push(generation, message).await?;
        Ok(MutationOutcome {
            value,
            durability: Durability::Durable { revision_id },
        })
    }

    async fn push(&self, generation: u64, message: &str) -> Result<String, SyncError> {
        let _guard = self.inner.push_lock.lock().await;

        let covering = lock(&self.inner.last_push)
            .clone()
            .filter(|record| record.generation >= generation);
        if let Some(record) = covering {
            log::debug!("{}: carried by an earlier push", message);
            return record.result.map_err(SyncError::SyncFailed);
        }

        let (snapshot, pushed_generation) = {
            let state = lock(&self.inner.cache);
            if let Some(drift) = &state.drift {
                log::warn!("{}: not pushed, deployed code changed at {}", message, drift.head);
                return Err(SyncError::SyncFailed(format!(
                    "deployed code changed at {}",
                    drift.head
                )));
            }
            (state.chapters.clone(), state.generation)
        };

        let _ = self.inner.status_tx.send(SyncStatusEvent::syncing());
        let result = self.write_snapshot(&snapshot, message).await;

        let record = PushRecord {
            generation: pushed_generation,
            result: result
                .as_ref()
                .map(String::clone)
                .map_err(|e| e.to_string()),
        };
        *lock(&self.inner.last_push) = Some(record);

        match result {
            Ok(revision_id) => {
                lock(&self.inner.cache).last_seen_revision = Some(revision_id.clone());
                log::info!("{}: pushed as {}", message, revision_id);
                let _ = self
                    .inner
                    .status_tx
                    .send(SyncStatusEvent::success(revision_id.clone()));
                Ok(revision_id)
            }
            Err(e) => {
                log::error!("{}: push failed: {}", message, e);
                let _ = self.inner.status_tx.send(SyncStatusEvent::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// JSON first and source last, so the head commit after a push always
    /// touches a data file.
    async fn write_snapshot(&self, chapters: &[Chapter], message: &str) -> Result<String, SyncError> {
        let archive = codec::serialize(chapters)?;
        let remote = &self.inner.remote;
        remote
            .write_file(&self.inner.config.json_path, &archive.json_text, message)
            .await?;
        let receipt = remote
            .write_file(&self.inner.config.source_path, &archive.source_text, message)
            .await?;
        Ok(receipt.revision_id)
    }

    // ---- Polling ----

    /// One poll cycle against the branch head.
    ///
    /// The first poll always reads the data. Later polls read only when the
    /// head commit touched a data file; any other new head is reported as
    /// deploy drift and leaves the cache alone.
    pub async fn poll_once(&self) -> Result<PollOutcome, SyncError> {
        let Ok(_guard) = self.inner.push_lock.try_lock() else {
            log::debug!("Push in progress, skipping poll");
            return Ok(PollOutcome::Unchanged);
        };

        let (generation, last_seen) = {
            let state = lock(&self.inner.cache);
            (state.generation, state.last_seen_revision.clone())
        };

        let head = self.inner.remote.read_commit_head(&self.inner.branch).await?;
        if last_seen.as_deref() == Some(head.as_str()) {
            return Ok(PollOutcome::Unchanged);
        }

        if last_seen.is_some() && !self.head_touches_data(&head).await? {
            return Ok(self.report_drift(head, DriftReason::UnrelatedCommit));
        }

        match self.inner.readers.read(self.inner.remote.as_ref(), &head).await {
            Ok(Some((source, chapters))) => {
                log::debug!("Read {} chapter(s) from {}", chapters.len(), source.path);
                let replaced = self.replace_from_remote(chapters, &head, generation);
                Ok(PollOutcome::DataChanged {
                    revision_id: head,
                    replaced,
                })
            }
            Ok(None) => {
                log::warn!("No archive file found at {}", head);
                let mut state = lock(&self.inner.cache);
                state.last_seen_revision = Some(head.clone());
                state.loaded = true;
                drop(state);
                Ok(PollOutcome::DataChanged {
                    revision_id: head,
                    replaced: false,
                })
            }
            Err(SyncError::Parse(ParseError::UnsupportedVersion { found, .. })) => {
                Ok(self.report_drift(head, DriftReason::NewerDataFormat { found }))
            }
            Err(e) => Err(e),
        }
    }

    async fn head_touches_data(&self, head: &str) -> Result<bool, SyncError> {
        for path in [&self.inner.config.source_path, &self.inner.config.json_path] {
            let touched = self.inner.remote.read_file_history(path, head).await?;
            if touched.as_deref() == Some(head) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Swap in a fetched collection if it differs from the cache and no
    /// local mutation happened since the poll began.
    fn replace_from_remote(&self, chapters: Vec<Chapter>, head: &str, generation: u64) -> bool {
        let snapshot = {
            let mut state = lock(&self.inner.cache);
            if state.generation != generation {
                log::debug!("Local change pending, ignoring remote data at {}", head);
                return false;
            }
            state.last_seen_revision = Some(head.to_string());
            state.loaded = true;
            if *state.chapters == chapters {
                return false;
            }
            state.chapters = Arc::new(chapters);
            state.generation += 1;
            state.chapters.clone()
        };
        log::info!("Remote data changed at {}, {} chapter(s)", head, snapshot.len());
        self.notify(snapshot);
        true
    }

    fn report_drift(&self, head: String, reason: DriftReason) -> PollOutcome {
        let drift = DeployDrift { head, reason };
        {
            let mut state = lock(&self.inner.cache);
            state.last_seen_revision = Some(drift.head.clone());
            state.drift.get_or_insert_with(|| drift.clone());
        }
        log::info!("Deployed code changed at {} ({:?})", drift.head, drift.reason);

        let hooks: Vec<DriftHook> = lock(&self.inner.drift_hooks).clone();
        for hook in hooks {
            hook(&drift);
        }
        PollOutcome::CodeChanged(drift)
    }

    fn notify(&self, snapshot: Arc<Vec<Chapter>>) {
        let subscribers: Vec<Subscriber> = lock(&self.inner.subscribers)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in subscribers {
            callback(snapshot.clone());
        }
    }

    /// Start the background poll loop. Only the first call spawns it;
    /// later calls return false. Must be called inside a tokio runtime.
    pub fn start_polling(&self) -> bool {
        let mut poller = lock(&self.inner.poller);
        if poller.is_some() {
            return false;
        }
        *poller = Some(scheduler::start_poll_scheduler(
            self.clone(),
            self.inner.config.poll_interval,
        ));
        true
    }

    /// Ask a running poll loop to check right away
    pub fn poll_now(&self) {
        if let Some(poller) = lock(&self.inner.poller).as_ref() {
            poller.poll_now();
        }
    }

    pub fn stop_polling(&self) {
        if let Some(poller) = lock(&self.inner.poller).take() {
            poller.shutdown();
        }
    }
}

fn chapter_index(chapters: &[Chapter], chapter_id: &str) -> Result<usize, SyncError> {
    chapters
        .iter()
        .position(|c| c.id == chapter_id)
        .ok_or_else(|| SyncError::ChapterNotFound(chapter_id.to_string()))
}

fn photo_mut<'a>(
    chapters: &'a mut [Chapter],
    chapter_id: &str,
    photo_id: &str,
) -> Result<&'a mut Photo, SyncError> {
    let index = chapter_index(chapters, chapter_id)?;
    chapters[index]
        .photos
        .iter_mut()
        .find(|p| p.id == photo_id)
        .ok_or_else(|| SyncError::PhotoNotFound {
            chapter_id: chapter_id.to_string(),
            photo_id: photo_id.to_string(),
        })
}

/// `wanted`, or `wanted-2`, `wanted-3`, ... whichever is free
fn unique_slug(chapters: &[Chapter], wanted: &str) -> String {
    let taken = |slug: &str| chapters.iter().any(|c| c.slug == slug || c.id == slug);
    if !taken(wanted) {
        return wanted.to_string();
    }
    (2u32..)
        .map(|n| format!("{}-{}", wanted, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| format!("{}-{}", wanted, archive::generate_photo_id()))
}

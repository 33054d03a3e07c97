pub mod config;
pub mod github;
pub mod readers;
pub mod remote;

mod error;
mod manager;
mod scheduler;

#[cfg(test)]
pub(crate) mod fake;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::{RemoteConfig, SyncConfig, SyncState, SyncStatusEvent};
pub use error::SyncError;
pub use github::GitHubClient;
pub use manager::{
    DeployDrift, DriftReason, Durability, MutationOutcome, PollOutcome, SubscriptionId,
    SyncManager,
};
pub use readers::{ArchiveSource, ReaderChain};
pub use remote::{RemoteError, RemoteStore, WriteReceipt};
pub use scheduler::{PollMessage, PollScheduler};

/// Lock a mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! In-memory remote used by the sync tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::lock;
use super::remote::{RemoteError, RemoteStore, WriteReceipt};

#[derive(Default)]
struct FakeState {
    files: HashMap<String, String>,
    history: HashMap<String, String>,
    head: String,
    commits: u64,
    reads: HashMap<String, usize>,
    writes: Vec<(String, String)>,
}

impl FakeState {
    fn commit(&mut self) -> String {
        self.commits += 1;
        self.head = format!("c{:04}", self.commits);
        self.head.clone()
    }
}

pub struct FakeRemote {
    state: Mutex<FakeState>,
    writable: bool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

fn bad_gateway() -> RemoteError {
    RemoteError::Server {
        status: 502,
        message: "bad gateway".to_string(),
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.commit();
        Self {
            state: Mutex::new(state),
            writable: true,
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn read_only() -> Self {
        Self {
            writable: false,
            ..Self::new()
        }
    }

    /// Commit `text` to `path` as another client would
    pub fn seed(&self, path: &str, text: &str) -> String {
        let mut state = lock(&self.state);
        let commit = state.commit();
        state.files.insert(path.to_string(), text.to_string());
        state.history.insert(path.to_string(), commit.clone());
        commit
    }

    /// Commit that touches neither data file
    pub fn commit_unrelated(&self) -> String {
        lock(&self.state).commit()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail every read, head lookups included
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), RemoteError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(bad_gateway());
        }
        Ok(())
    }

    pub fn head(&self) -> String {
        lock(&self.state).head.clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        lock(&self.state).files.get(path).cloned()
    }

    pub fn reads_of(&self, path: &str) -> usize {
        lock(&self.state).reads.get(path).copied().unwrap_or(0)
    }

    /// Texts written to `path`, oldest first
    pub fn writes_to(&self, path: &str) -> Vec<String> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        lock(&self.state).writes.len()
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn read_commit_head(&self, _reference: &str) -> Result<String, RemoteError> {
        self.check_reads()?;
        Ok(self.head())
    }

    async fn read_file_history(
        &self,
        path: &str,
        _reference: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.check_reads()?;
        Ok(lock(&self.state).history.get(path).cloned())
    }

    async fn read_file(&self, path: &str, _reference: &str) -> Result<Option<String>, RemoteError> {
        self.check_reads()?;
        let mut state = lock(&self.state);
        *state.reads.entry(path.to_string()).or_default() += 1;
        Ok(state.files.get(path).cloned())
    }

    async fn write_file(
        &self,
        path: &str,
        text: &str,
        _message: &str,
    ) -> Result<WriteReceipt, RemoteError> {
        if !self.writable {
            return Err(RemoteError::ReadOnly);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(bad_gateway());
        }
        let mut state = lock(&self.state);
        state.writes.push((path.to_string(), text.to_string()));
        let commit = state.commit();
        state.files.insert(path.to_string(), text.to_string());
        state.history.insert(path.to_string(), commit.clone());
        Ok(WriteReceipt {
            revision_id: commit,
            html_url: None,
        })
    }

    fn can_write(&self) -> bool {
        self.writable
    }
}

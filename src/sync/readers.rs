use std::collections::HashSet;
use std::sync::Mutex;

use crate::archive::Chapter;
use crate::codec::{self, DataFormat, ParseError};

use super::config::SyncConfig;
use super::error::SyncError;
use super::lock;
use super::remote::RemoteStore;

/// One file the archive can be read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    pub format: DataFormat,
    pub path: String,
}

impl ArchiveSource {
    pub fn new(format: DataFormat, path: impl Into<String>) -> Self {
        Self {
            format,
            path: path.into(),
        }
    }
}

/// Ordered list of sources, tried until one yields records.
///
/// A source whose file is missing is remembered and skipped on later reads.
/// A source that fails to parse falls through to the next one; if none
/// succeeds the first parse error is returned. Network errors and a newer
/// format version stop the chain immediately.
pub struct ReaderChain {
    sources: Vec<ArchiveSource>,
    missing: Mutex<HashSet<usize>>,
}

impl ReaderChain {
    pub fn new(sources: Vec<ArchiveSource>) -> Self {
        Self {
            sources,
            missing: Mutex::new(HashSet::new()),
        }
    }

    /// JSON document first, source module as fallback
    pub fn preferred(config: &SyncConfig) -> Self {
        Self::new(vec![
            ArchiveSource::new(DataFormat::Json, &config.json_path),
            ArchiveSource::new(DataFormat::Source, &config.source_path),
        ])
    }

    pub fn sources(&self) -> &[ArchiveSource] {
        &self.sources
    }

    pub fn is_missing(&self, source: &ArchiveSource) -> bool {
        let missing = lock(&self.missing);
        self.sources
            .iter()
            .position(|s| s == source)
            .map_or(false, |i| missing.contains(&i))
    }

    /// First successful read at `reference`, `None` if every file is missing
    pub async fn read(
        &self,
        remote: &dyn RemoteStore,
        reference: &str,
    ) -> Result<Option<(ArchiveSource, Vec<Chapter>)>, SyncError> {
        let mut first_error: Option<ParseError> = None;

        for (index, source) in self.sources.iter().enumerate() {
            if lock(&self.missing).contains(&index) {
                continue;
            }

            let Some(text) = remote.read_file(&source.path, reference).await? else {
                log::info!("{} not found, skipping it from now on", source.path);
                lock(&self.missing).insert(index);
                continue;
            };

            match codec::deserialize(source.format, &text) {
                Ok(chapters) => return Ok(Some((source.clone(), chapters))),
                Err(e @ ParseError::UnsupportedVersion { .. }) => return Err(e.into()),
                Err(e) => {
                    log::warn!("Could not parse {}: {}", source.path, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(None),
        }
    }
}

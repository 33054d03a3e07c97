pub mod archive;
pub mod auth;
pub mod codec;
pub mod storage;
pub mod sync;

pub use archive::{Chapter, ChapterPhoto, MediaItem, MediaType, Photo};
pub use sync::{SyncError, SyncManager};

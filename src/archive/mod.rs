mod models;
pub mod normalize;
mod views;

pub use models::*;
pub use normalize::{
    classify_url, normalize_chapter, normalize_chapters_value, normalize_photo, renormalize,
    slugify, RawChapter, RawPhoto,
};
pub use views::{all_photos, find_chapter_by_slug, visible_chapters, visible_photos, ChapterPhoto};

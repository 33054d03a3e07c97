use serde::Serialize;

use super::models::{Chapter, Photo};

/// A photo together with the chapter it belongs to
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPhoto {
    pub chapter_id: String,
    pub chapter_label: String,
    #[serde(flatten)]
    pub photo: Photo,
}

/// Flatten every chapter's photos. Recomputed on each call, never stored.
pub fn all_photos(chapters: &[Chapter]) -> Vec<ChapterPhoto> {
    chapters
        .iter()
        .flat_map(|chapter| chapter.photos.iter().map(move |photo| (chapter, photo)))
        .map(|(chapter, photo)| ChapterPhoto {
            chapter_id: chapter.id.clone(),
            chapter_label: chapter.label.clone(),
            photo: photo.clone(),
        })
        .collect()
}

/// Chapters shown in public listings
pub fn visible_chapters(chapters: &[Chapter]) -> Vec<&Chapter> {
    chapters.iter().filter(|c| !c.hidden).collect()
}

/// Photos shown in public listings. A hidden chapter hides all of its photos.
pub fn visible_photos(chapters: &[Chapter]) -> Vec<ChapterPhoto> {
    all_photos(chapters)
        .into_iter()
        .filter(|entry| !entry.photo.hidden)
        .filter(|entry| {
            chapters
                .iter()
                .find(|c| c.id == entry.chapter_id)
                .map_or(false, |c| !c.hidden)
        })
        .collect()
}

/// Direct-link lookup. Hidden chapters are still reachable this way.
pub fn find_chapter_by_slug<'a>(chapters: &'a [Chapter], slug: &str) -> Option<&'a Chapter> {
    chapters.iter().find(|c| c.slug == slug)
}

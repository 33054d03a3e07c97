//! Upgrades legacy record shapes into the canonical [`Chapter`]/[`Photo`] shape.
//!
//! Older data files stored a photo's media as a single `imageUrl` string or an
//! `imageUrls` array. Both are lifted into `mediaItems`, with each item's type
//! inferred from its URL when the record does not say. Normalizing a record
//! that is already canonical returns it unchanged.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::models::{Chapter, MediaItem, MediaType, Photo};

/// File extensions that are always treated as video
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "ogv", "avi", "mkv", "3gp"];

/// URL fragments of hosting services whose links are always videos
const VIDEO_HOSTS: &[&str] = &[
    "youtube.com/watch",
    "youtube.com/embed/",
    "youtube.com/shorts/",
    "youtube-nocookie.com/embed/",
    "youtu.be/",
    "vimeo.com/",
    "streamable.com/",
    "dailymotion.com/video/",
];

/// Classify a bare URL as an image or a video.
pub fn classify_url(url: &str) -> MediaType {
    let lower = url.trim().to_lowercase();

    if VIDEO_HOSTS.iter().any(|host| lower.contains(host)) {
        return MediaType::Video;
    }

    // Ignore query string and fragment when looking at the extension
    let path = lower
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let last_segment = path.rsplit('/').next().unwrap_or_default();

    match last_segment.rsplit_once('.') {
        Some((_, ext)) if VIDEO_EXTENSIONS.contains(&ext) => MediaType::Video,
        _ => MediaType::Image,
    }
}

/// Lowercase, collapse every run of non-alphanumerics into a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Ids were numbers in some early files
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMediaItem {
    Url(String),
    Item {
        #[serde(rename = "type", default)]
        media_type: Option<String>,
        url: String,
    },
}

impl RawMediaItem {
    fn into_media_item(self) -> Option<MediaItem> {
        let (declared, url) = match self {
            Self::Url(url) => (None, url),
            Self::Item { media_type, url } => (media_type, url),
        };
        if url.trim().is_empty() {
            return None;
        }
        let media_type = match declared.as_deref() {
            Some("video") => MediaType::Video,
            Some("image") => MediaType::Image,
            _ => classify_url(&url),
        };
        Some(MediaItem { media_type, url })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTags {
    List(Vec<String>),
    Joined(String),
}

impl RawTags {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(tags) => tags,
            Self::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// A photo record in any of the shapes found in stored data
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPhoto {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub media_items: Option<Vec<RawMediaItem>>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Option<RawTags>,
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChapter {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub years: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub accent_color: Option<String>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub hidden: Option<bool>,
    #[serde(default)]
    pub photos: Vec<RawPhoto>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn normalize_photo(raw: RawPhoto) -> Photo {
    let media_items: Vec<MediaItem> = match (raw.media_items, raw.image_urls, raw.image_url) {
        (Some(items), _, _) if !items.is_empty() => items
            .into_iter()
            .filter_map(RawMediaItem::into_media_item)
            .collect(),
        (_, Some(urls), _) if !urls.is_empty() => urls
            .into_iter()
            .filter(|u| !u.trim().is_empty())
            .map(MediaItem::from_url)
            .collect(),
        (_, _, Some(url)) if !url.trim().is_empty() => vec![MediaItem::from_url(url)],
        _ => Vec::new(),
    };

    Photo {
        id: raw.id.map(RawId::into_string).unwrap_or_default(),
        title: raw.title.unwrap_or_default(),
        caption: raw.caption.unwrap_or_default(),
        media_items,
        date: raw.date.unwrap_or_default(),
        tags: raw.tags.map(RawTags::into_vec).unwrap_or_default(),
        hidden: raw.hidden.unwrap_or(false),
        extra: raw.extra,
    }
}

pub fn normalize_chapter(raw: RawChapter) -> Chapter {
    let mut chapter = Chapter {
        id: raw.id.map(RawId::into_string).unwrap_or_default(),
        label: raw.label.unwrap_or_default(),
        slug: raw.slug.unwrap_or_default(),
        years: raw.years.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
        accent_color: raw.accent_color.unwrap_or_default(),
        emoji: raw.emoji.unwrap_or_default(),
        hidden: raw.hidden.unwrap_or(false),
        photos: raw.photos.into_iter().map(normalize_photo).collect(),
        extra: raw.extra,
    };
    fill_derived_keys(&mut chapter);
    chapter
}

/// Parse and normalize a full collection from an untyped tree.
pub fn normalize_chapters_value(value: Value) -> Result<Vec<Chapter>, serde_json::Error> {
    let raw: Vec<RawChapter> = serde_json::from_value(value)?;
    Ok(raw.into_iter().map(normalize_chapter).collect())
}

/// Re-apply normalization to records that are already typed.
pub fn renormalize(chapters: &[Chapter]) -> Vec<Chapter> {
    chapters
        .iter()
        .cloned()
        .map(|mut chapter| {
            for photo in &mut chapter.photos {
                photo.media_items.retain(|m| !m.url.trim().is_empty());
            }
            fill_derived_keys(&mut chapter);
            chapter
        })
        .collect()
}

/// Chapter id and slug fall back on each other, then on the label. Photos
/// without an id get a positional one scoped to the chapter.
fn fill_derived_keys(chapter: &mut Chapter) {
    if chapter.slug.is_empty() {
        chapter.slug = if chapter.id.is_empty() {
            slugify(&chapter.label)
        } else {
            chapter.id.clone()
        };
    }
    if chapter.id.is_empty() {
        chapter.id = chapter.slug.clone();
    }
    for (index, photo) in chapter.photos.iter_mut().enumerate() {
        if photo.id.is_empty() {
            photo.id = format!("{}-{}", chapter.id, index + 1);
        }
    }
}

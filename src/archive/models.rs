use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
}

impl MediaItem {
    /// Build an item whose type is inferred from the URL
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            media_type: super::normalize::classify_url(&url),
            url,
        }
    }
}

/// A photo record. `id` is only unique within the owning chapter.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub title: String,
    pub caption: String,
    pub media_items: Vec<MediaItem>,
    pub date: String,
    pub tags: Vec<String>,
    pub hidden: bool,
    /// Fields this version does not know about, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Photo {
    pub fn new(title: String, media_items: Vec<MediaItem>) -> Self {
        Self {
            id: generate_photo_id(),
            title,
            caption: String::new(),
            media_items,
            date: String::new(),
            tags: Vec::new(),
            hidden: false,
            extra: Map::new(),
        }
    }

    /// First media item, used as the cover in listings
    pub fn cover(&self) -> Option<&MediaItem> {
        self.media_items.first()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Derived from the slug at creation, never changes afterwards
    pub id: String,
    pub label: String,
    /// Public routing key
    pub slug: String,
    pub years: String,
    pub description: String,
    pub accent_color: String,
    pub emoji: String,
    pub hidden: bool,
    pub photos: Vec<Photo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Chapter {
    pub fn new(label: String, slug: Option<String>) -> Self {
        let slug = slug
            .map(|s| super::normalize::slugify(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| super::normalize::slugify(&label));
        Self {
            id: slug.clone(),
            label,
            slug,
            years: String::new(),
            description: String::new(),
            accent_color: String::new(),
            emoji: String::new(),
            hidden: false,
            photos: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn photo(&self, photo_id: &str) -> Option<&Photo> {
        self.photos.iter().find(|p| p.id == photo_id)
    }
}

/// Input for creating a chapter
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChapter {
    pub label: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub years: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub accent_color: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default)]
    pub hidden: bool,
}

impl NewChapter {
    pub fn into_chapter(self) -> Chapter {
        let mut chapter = Chapter::new(self.label, self.slug);
        chapter.years = self.years;
        chapter.description = self.description;
        chapter.accent_color = self.accent_color;
        chapter.emoji = self.emoji;
        chapter.hidden = self.hidden;
        chapter
    }
}

/// Partial update of a chapter. `id` is not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPatch {
    pub label: Option<String>,
    pub slug: Option<String>,
    pub years: Option<String>,
    pub description: Option<String>,
    pub accent_color: Option<String>,
    pub emoji: Option<String>,
    pub hidden: Option<bool>,
}

impl ChapterPatch {
    pub fn apply(self, chapter: &mut Chapter) {
        if let Some(label) = self.label {
            chapter.label = label;
        }
        if let Some(slug) = self.slug {
            chapter.slug = super::normalize::slugify(&slug);
        }
        if let Some(years) = self.years {
            chapter.years = years;
        }
        if let Some(description) = self.description {
            chapter.description = description;
        }
        if let Some(accent_color) = self.accent_color {
            chapter.accent_color = accent_color;
        }
        if let Some(emoji) = self.emoji {
            chapter.emoji = emoji;
        }
        if let Some(hidden) = self.hidden {
            chapter.hidden = hidden;
        }
    }
}

/// Input for creating a photo
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhoto {
    pub title: String,
    #[serde(default)]
    pub caption: String,
    pub urls: Vec<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
}

impl NewPhoto {
    pub fn into_photo(self) -> Photo {
        let mut photo = Photo::new(self.title, media_items(self.urls));
        photo.caption = self.caption;
        photo.date = self.date;
        photo.tags = self.tags;
        photo.hidden = self.hidden;
        photo
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPatch {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub urls: Option<Vec<String>>,
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub hidden: Option<bool>,
}

impl PhotoPatch {
    pub fn apply(self, photo: &mut Photo) {
        if let Some(title) = self.title {
            photo.title = title;
        }
        if let Some(caption) = self.caption {
            photo.caption = caption;
        }
        if let Some(urls) = self.urls {
            photo.media_items = media_items(urls);
        }
        if let Some(date) = self.date {
            photo.date = date;
        }
        if let Some(tags) = self.tags {
            photo.tags = tags;
        }
        if let Some(hidden) = self.hidden {
            photo.hidden = hidden;
        }
    }
}

/// Blank entries carry no media and are dropped, as on load
fn media_items(urls: Vec<String>) -> Vec<MediaItem> {
    urls.into_iter()
        .filter(|u| !u.trim().is_empty())
        .map(MediaItem::from_url)
        .collect()
}

/// Millisecond timestamp plus a short random suffix, so clients can mint ids
/// without coordinating.
pub fn generate_photo_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chapter_derives_id_from_slug() {
        let chapter = Chapter::new("Summer in Lisbon".to_string(), None);
        assert_eq!(chapter.slug, "summer-in-lisbon");
        assert_eq!(chapter.id, "summer-in-lisbon");

        let chapter = Chapter::new("Whatever".to_string(), Some("Lisbon 2019".to_string()));
        assert_eq!(chapter.id, "lisbon-2019");
    }

    #[test]
    fn test_patch_keeps_chapter_id() {
        let mut chapter = Chapter::new("Old".to_string(), None);
        ChapterPatch {
            label: Some("New".to_string()),
            slug: Some("Brand New".to_string()),
            ..Default::default()
        }
        .apply(&mut chapter);

        assert_eq!(chapter.id, "old");
        assert_eq!(chapter.slug, "brand-new");
        assert_eq!(chapter.label, "New");
    }

    #[test]
    fn test_photo_ids_do_not_collide() {
        let a = generate_photo_id();
        let b = generate_photo_id();
        assert_ne!(a, b);
        assert!(a.contains('-'));
    }

    #[test]
    fn test_blank_urls_are_dropped() {
        let photo = NewPhoto {
            title: "Beach".to_string(),
            urls: vec!["a.jpg".to_string(), "".to_string(), "  ".to_string()],
            ..Default::default()
        }
        .into_photo();
        assert_eq!(photo.media_items, vec![MediaItem::from_url("a.jpg")]);

        let mut photo = photo;
        PhotoPatch {
            urls: Some(vec![" ".to_string(), "b.mp4".to_string()]),
            ..Default::default()
        }
        .apply(&mut photo);
        assert_eq!(photo.media_items, vec![MediaItem::from_url("b.mp4")]);
    }

    #[test]
    fn test_new_photo_classifies_urls() {
        let photo = NewPhoto {
            title: "Beach".to_string(),
            urls: vec![
                "https://cdn.example.com/a.jpg".to_string(),
                "https://cdn.example.com/b.mp4".to_string(),
            ],
            ..Default::default()
        }
        .into_photo();

        assert_eq!(photo.media_items[0].media_type, MediaType::Image);
        assert_eq!(photo.media_items[1].media_type, MediaType::Video);
        assert_eq!(photo.cover().map(|m| m.url.as_str()), Some("https://cdn.example.com/a.jpg"));
    }
}

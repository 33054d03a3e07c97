use photo_archive::{Chapter, ChapterPhoto, MediaType, Photo};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

pub fn paint(text: &str, code: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", code, text, Color::RESET)
    } else {
        text.to_string()
    }
}

fn hidden_marker(hidden: bool, use_color: bool) -> String {
    if hidden {
        format!(" {}", paint("[hidden]", Color::YELLOW, use_color))
    } else {
        String::new()
    }
}

/// `Lisbon (2019-2021) 12 photos`
pub fn chapter_line(chapter: &Chapter, use_color: bool) -> String {
    let mut line = String::new();
    if !chapter.emoji.is_empty() {
        line.push_str(&chapter.emoji);
        line.push(' ');
    }
    line.push_str(&paint(&chapter.label, Color::BOLD, use_color));
    if !chapter.years.is_empty() {
        line.push_str(&format!(" ({})", chapter.years));
    }
    line.push_str(&paint(
        &format!("  /{}  {} photos", chapter.slug, chapter.photos.len()),
        Color::DIM,
        use_color,
    ));
    line.push_str(&hidden_marker(chapter.hidden, use_color));
    line
}

pub fn photo_lines(photo: &Photo, use_color: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {}{}",
        paint(&photo.id, Color::CYAN, use_color),
        photo.title,
        hidden_marker(photo.hidden, use_color)
    )];
    if !photo.caption.is_empty() {
        lines.push(format!("    {}", photo.caption));
    }
    let mut meta = Vec::new();
    if !photo.date.is_empty() {
        meta.push(photo.date.clone());
    }
    if !photo.tags.is_empty() {
        meta.push(photo.tags.iter().map(|t| format!("#{}", t)).collect::<Vec<_>>().join(" "));
    }
    if !meta.is_empty() {
        lines.push(paint(&format!("    {}", meta.join("  ")), Color::DIM, use_color));
    }
    for item in &photo.media_items {
        let kind = match item.media_type {
            MediaType::Image => "img",
            MediaType::Video => "vid",
        };
        lines.push(paint(&format!("    [{}] {}", kind, item.url), Color::DIM, use_color));
    }
    lines
}

pub fn listing_line(entry: &ChapterPhoto, use_color: bool) -> String {
    format!(
        "{}  {}{}",
        paint(&format!("{:<16}", entry.chapter_id), Color::DIM, use_color),
        entry.photo.title,
        hidden_marker(entry.photo.hidden, use_color)
    )
}

use anyhow::Result;
use clap::Subcommand;

use photo_archive::archive::{NewPhoto, PhotoPatch};

use crate::app::{describe, App};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum PhotoCommand {
    /// Add a photo to a chapter
    Add {
        /// Chapter id or slug
        chapter: String,
        title: String,
        /// Image or video URL, repeat for a gallery
        #[arg(long = "url", required = true)]
        urls: Vec<String>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        date: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        hidden: bool,
    },

    /// Edit a photo's fields
    Update {
        chapter: String,
        photo: String,
        #[arg(long)]
        title: Option<String>,
        /// Replaces all media items
        #[arg(long = "url")]
        urls: Vec<String>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        tags: Option<String>,
    },

    Delete { chapter: String, photo: String },

    Hide { chapter: String, photo: String },

    Unhide { chapter: String, photo: String },
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub async fn run(app: &App, command: PhotoCommand, format: &OutputFormat) -> Result<()> {
    let outcome = match command {
        PhotoCommand::Add {
            chapter,
            title,
            urls,
            caption,
            date,
            tags,
            hidden,
        } => {
            let id = app.find_chapter(&chapter)?.id;
            let input = NewPhoto {
                title,
                caption: caption.unwrap_or_default(),
                urls,
                date: date.unwrap_or_default(),
                tags: tags.as_deref().map(split_tags).unwrap_or_default(),
                hidden,
            };
            app.manager.add_photo(&id, input).await?
        }
        PhotoCommand::Update {
            chapter,
            photo,
            title,
            urls,
            caption,
            date,
            tags,
        } => {
            let id = app.find_chapter(&chapter)?.id;
            let patch = PhotoPatch {
                title,
                caption,
                urls: if urls.is_empty() { None } else { Some(urls) },
                date,
                tags: tags.as_deref().map(split_tags),
                hidden: None,
            };
            app.manager.update_photo(&id, &photo, patch).await?
        }
        PhotoCommand::Delete { chapter, photo } => {
            let id = app.find_chapter(&chapter)?.id;
            app.manager.delete_photo(&id, &photo).await?
        }
        PhotoCommand::Hide { chapter, photo } => {
            let id = app.find_chapter(&chapter)?.id;
            app.manager.set_photo_hidden(&id, &photo, true).await?
        }
        PhotoCommand::Unhide { chapter, photo } => {
            let id = app.find_chapter(&chapter)?.id;
            app.manager.set_photo_hidden(&id, &photo, false).await?
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.value)?),
        OutputFormat::Plain => println!(
            "{} {}: {}",
            outcome.value.id,
            outcome.value.title,
            describe(&outcome.durability)
        ),
    }

    Ok(())
}

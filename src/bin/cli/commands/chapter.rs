use anyhow::Result;
use clap::Subcommand;

use photo_archive::archive::{ChapterPatch, NewChapter};

use crate::app::{describe, App};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ChapterCommand {
    /// Create a chapter
    Add {
        label: String,
        /// Routing slug (default: derived from the label)
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        years: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        accent_color: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
        /// Create it hidden from public listings
        #[arg(long)]
        hidden: bool,
    },

    /// Edit a chapter's fields
    Update {
        /// Chapter id or slug
        chapter: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        years: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        accent_color: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
    },

    /// Delete a chapter and all of its photos
    Delete { chapter: String },

    /// Hide a chapter from public listings
    Hide { chapter: String },

    /// Show a hidden chapter again
    Unhide { chapter: String },
}

pub async fn run(app: &App, command: ChapterCommand, format: &OutputFormat) -> Result<()> {
    let outcome = match command {
        ChapterCommand::Add {
            label,
            slug,
            years,
            description,
            accent_color,
            emoji,
            hidden,
        } => {
            let input = NewChapter {
                label,
                slug,
                years: years.unwrap_or_default(),
                description: description.unwrap_or_default(),
                accent_color: accent_color.unwrap_or_default(),
                emoji: emoji.unwrap_or_default(),
                hidden,
            };
            app.manager.add_chapter(input).await?
        }
        ChapterCommand::Update {
            chapter,
            label,
            slug,
            years,
            description,
            accent_color,
            emoji,
        } => {
            let id = app.find_chapter(&chapter)?.id;
            let patch = ChapterPatch {
                label,
                slug,
                years,
                description,
                accent_color,
                emoji,
                hidden: None,
            };
            app.manager.update_chapter(&id, patch).await?
        }
        ChapterCommand::Delete { chapter } => {
            let id = app.find_chapter(&chapter)?.id;
            app.manager.delete_chapter(&id).await?
        }
        ChapterCommand::Hide { chapter } => {
            let id = app.find_chapter(&chapter)?.id;
            app.manager.set_chapter_hidden(&id, true).await?
        }
        ChapterCommand::Unhide { chapter } => {
            let id = app.find_chapter(&chapter)?.id;
            app.manager.set_chapter_hidden(&id, false).await?
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome.value)?),
        OutputFormat::Plain => println!(
            "{} ({}): {}",
            outcome.value.label,
            outcome.value.slug,
            describe(&outcome.durability)
        ),
    }

    Ok(())
}

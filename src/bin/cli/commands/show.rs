use anyhow::Result;

use photo_archive::archive;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run_list(app: &App, all: bool, format: &OutputFormat, use_color: bool) -> Result<()> {
    let snapshot = app.manager.snapshot();
    let chapters: Vec<_> = if all {
        snapshot.iter().collect()
    } else {
        archive::visible_chapters(&snapshot)
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&chapters)?);
        }
        OutputFormat::Plain => {
            if chapters.is_empty() {
                println!("No chapters.");
                return Ok(());
            }
            for chapter in &chapters {
                println!("{}", terminal::chapter_line(chapter, use_color));
            }
            let photos: usize = chapters.iter().map(|c| c.photos.len()).sum();
            println!("\n{} chapters, {} photos", chapters.len(), photos);
        }
    }

    Ok(())
}

pub fn run_chapter(app: &App, slug: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let chapter = app.find_chapter(slug)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&chapter)?);
        }
        OutputFormat::Plain => {
            println!("{}", terminal::chapter_line(&chapter, use_color));
            if !chapter.description.is_empty() {
                println!("{}", terminal::paint(&chapter.description, Color::DIM, use_color));
            }
            println!();
            for photo in &chapter.photos {
                for line in terminal::photo_lines(photo, use_color) {
                    println!("{}", line);
                }
            }
        }
    }

    Ok(())
}

pub fn run_photos(app: &App, all: bool, format: &OutputFormat, use_color: bool) -> Result<()> {
    let photos = if all {
        app.manager.all_photos()
    } else {
        app.manager.visible_photos()
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&photos)?);
        }
        OutputFormat::Plain => {
            for entry in &photos {
                println!("{}", terminal::listing_line(entry, use_color));
            }
            println!("\n{} photos", photos.len());
        }
    }

    Ok(())
}

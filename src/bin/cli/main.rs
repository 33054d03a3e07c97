mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "photo-archive-cli", about = "Photo archive editor backed by a GitHub repository", version)]
struct Cli {
    /// Settings file (default: platform config dir)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List chapters, or show one chapter by slug
    Show {
        slug: Option<String>,
        /// Include hidden chapters and photos
        #[arg(long)]
        all: bool,
    },

    /// List photos across all chapters
    Photos {
        /// Include hidden photos
        #[arg(long)]
        all: bool,
    },

    /// Poll the repository and report changes until interrupted.
    /// Exits with status 3 when the deployed code changes.
    Watch,

    /// Create, edit and remove chapters
    #[command(subcommand)]
    Chapter(commands::chapter::ChapterCommand),

    /// Create, edit and remove photos
    #[command(subcommand)]
    Photo(commands::photo::PhotoCommand),

    /// Replace the whole archive with a backup file
    Restore {
        /// Backup kind: module (also: photos, source) or json
        kind: String,
        file: PathBuf,
    },

    /// Write the current archive files into a directory
    Export { dir: PathBuf },

    /// Read and write settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Start an editing session
    Login {
        username: String,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// End the editing session
    Logout,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Set a key, or clear it with an empty value
    Set { key: String, value: String },
    /// Print all settings (tokens masked)
    Show,
    /// Print the hash to put in the accounts list for a password
    HashPassword { password: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let mut settings = app::open_settings(cli.settings)?;

    match cli.command {
        Command::Config(ConfigCommand::Set { key, value }) => {
            commands::config::run_set(&mut settings, &key, &value)?;
        }
        Command::Config(ConfigCommand::Show) => {
            commands::config::run_show(&settings, &cli.format)?;
        }
        Command::Config(ConfigCommand::HashPassword { password }) => {
            println!("{}", photo_archive::auth::hash_password(&password)?);
        }
        Command::Login { username, password } => {
            commands::session::run_login(&mut settings, &username, password)?;
        }
        Command::Logout => {
            commands::session::run_logout(&mut settings)?;
        }
        Command::Show { slug, all } => {
            let app = app::App::load(settings).await?;
            match slug {
                Some(slug) => commands::show::run_chapter(&app, &slug, &cli.format, use_color)?,
                None => commands::show::run_list(&app, all, &cli.format, use_color)?,
            }
        }
        Command::Photos { all } => {
            let app = app::App::load(settings).await?;
            commands::show::run_photos(&app, all, &cli.format, use_color)?;
        }
        Command::Watch => {
            let app = app::App::load(settings).await?;
            let code = commands::watch::run(&app, use_color).await?;
            std::process::exit(code);
        }
        Command::Chapter(subcmd) => {
            let app = app::App::load(settings).await?;
            app.require_session()?;
            app.require_loaded()?;
            commands::chapter::run(&app, subcmd, &cli.format).await?;
        }
        Command::Photo(subcmd) => {
            let app = app::App::load(settings).await?;
            app.require_session()?;
            app.require_loaded()?;
            commands::photo::run(&app, subcmd, &cli.format).await?;
        }
        Command::Restore { kind, file } => {
            let app = app::App::load(settings).await?;
            app.require_session()?;
            app.require_loaded()?;
            commands::backup::run_restore(&app, &kind, &file).await?;
        }
        Command::Export { dir } => {
            let app = app::App::load(settings).await?;
            commands::backup::run_export(&app, &dir)?;
        }
    }

    Ok(())
}

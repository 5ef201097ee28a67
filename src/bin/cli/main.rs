mod app;
mod commands;

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use inkbridge_lib::config::{LogLevel, Settings};

#[derive(Parser)]
#[command(
    name = "inkbridge",
    about = "Keep a folder of markdown and text notes in sync with a remote note store",
    version
)]
struct Cli {
    /// Config file (default: <config dir>/inkbridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-memory store instead of the remote service
    #[arg(long, global = true)]
    dry_run: bool,

    /// Theme for markdown notes
    #[arg(long, global = true)]
    theme: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

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
    /// Reconcile the workspace, then keep watching it for changes
    Run {
        /// Workspace root; each subdirectory is a notebook
        workspace: PathBuf,
    },

    /// Reconcile the workspace once and print what changed
    Sync {
        /// Workspace root
        workspace: PathBuf,
    },

    /// Print the document a note file would be stored as
    Render {
        /// A .md or .txt file
        file: PathBuf,
    },

    /// Recover the original source from a stored document
    Extract {
        /// File holding the stored document
        file: PathBuf,
    },

    /// List available themes
    Themes,
}

fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let env = env_logger::Env::default().default_filter_or(settings.log_level.to_string());
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = &settings.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.dry_run {
        settings.test = true;
    }
    if let Some(theme) = cli.theme {
        settings.style = theme;
    }
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }

    init_logging(&settings)?;
    match Settings::source(cli.config.as_deref()) {
        Some(path) => log::debug!("Loaded config from {}", path.display()),
        None => log::debug!("No config file, using defaults"),
    }

    match cli.command {
        Command::Run { workspace } => {
            let app = app::App::new(settings)?;
            commands::run::run(&app, &workspace)?;
        }
        Command::Sync { workspace } => {
            let app = app::App::new(settings)?;
            commands::sync::run(&app, &workspace, &cli.format)?;
        }
        Command::Render { file } => {
            let app = app::App::new(settings)?;
            commands::render::run(&app, &file)?;
        }
        Command::Extract { file } => {
            commands::extract::run(&file, &cli.format)?;
        }
        Command::Themes => {
            commands::themes::run(&settings, &cli.format)?;
        }
    }

    Ok(())
}

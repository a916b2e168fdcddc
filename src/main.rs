//! fulllines CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use fulllines::{
    catalog::{Catalog, Language},
    commands::{
        cmd_characters, cmd_check, cmd_cleanup, cmd_extract, cmd_init, cmd_progress, cmd_runs,
        cmd_search, cmd_speaker, cmd_stats, cmd_validate, print_characters, print_cleanup,
        print_connection, print_extract_summary, print_init, print_integrity, print_progress,
        print_runs, print_search_results, print_stats, ExtractOptions, SearchOptions,
    },
    config::Config,
    db::LinesDb,
    error::Result,
    progress::LogWriterFactory,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "fulllines")]
#[command(version, about = "Extract and search multi-language dialogue lines", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "FULLLINES_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration, database and section catalog
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Extract every catalog section into the database
    Extract {
        /// Skip complete sections and clean up partial ones first
        #[arg(long)]
        resume: bool,

        /// Do not draw a progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Show which sections are complete, partial or untouched
    Progress,

    /// Delete rows of sections with partial language coverage
    Cleanup,

    /// Check the database for incomplete sections and key anomalies
    Validate,

    /// Search line text (case-insensitive substring)
    Search {
        /// Text to look for
        text: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Find lines by speaker name, matched in each line's own language
    Speaker {
        /// Localized speaker name
        name: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List speaker names for one language
    Characters {
        /// Language code (us, jp, de, fr); defaults to us
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Show database statistics
    Stats,

    /// Probe the remote service
    Check,

    /// Show extraction run history
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Language (us, jp, de, fr). Text search keeps only this language;
    /// speaker search lists it first
    #[arg(short, long)]
    language: Option<String>,

    /// Only lines from this section
    #[arg(short, long)]
    section: Option<String>,

    /// Maximum number of results
    #[arg(long)]
    limit: Option<usize>,
}

impl FilterArgs {
    fn into_options(self) -> Result<SearchOptions> {
        Ok(SearchOptions {
            language: parse_language(self.language.as_deref())?,
            section: self.section,
            limit: self.limit,
        })
    }
}

fn parse_language(code: Option<&str>) -> Result<Option<Language>> {
    code.map(str::parse).transpose()
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    // Commands that need no existing config
    match &cli.command {
        Commands::Init { force } => {
            let base_dir = cli.config.as_deref().map(config_base_dir);
            let outcome = cmd_init(base_dir, *force).await?;
            return output(cli.json, &outcome, print_init);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "fulllines", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(cli.config.as_deref())?;
    let db = LinesDb::connect(&config).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Extract {
            resume,
            no_progress,
        } => {
            let catalog = load_catalog(&config)?;
            let options = ExtractOptions {
                resume,
                show_progress: !no_progress && !cli.json,
            };
            let summary = cmd_extract(&config, &db, catalog, options).await?;
            output(cli.json, &summary, print_extract_summary)?;
        }

        Commands::Progress => {
            let snapshot = cmd_progress(&db, load_catalog(&config)?).await?;
            output(cli.json, &snapshot, print_progress)?;
        }

        Commands::Cleanup => {
            let stats = cmd_cleanup(&db, load_catalog(&config)?).await?;
            output(cli.json, &stats, print_cleanup)?;
        }

        Commands::Validate => {
            let report = cmd_validate(&db, load_catalog(&config)?).await?;
            output(cli.json, &report, print_integrity)?;
        }

        Commands::Search { text, filters } => {
            let results = cmd_search(&config, &db, &text, filters.into_options()?).await?;
            output(cli.json, &results, print_search_results)?;
        }

        Commands::Speaker { name, filters } => {
            let results = cmd_speaker(&config, &db, &name, filters.into_options()?).await?;
            output(cli.json, &results, print_search_results)?;
        }

        Commands::Characters { language } => {
            let language = parse_language(language.as_deref())?;
            let characters = cmd_characters(&config, &db, language).await?;
            output(cli.json, &characters, |c: &Vec<String>| print_characters(c))?;
        }

        Commands::Stats => {
            let stats = cmd_stats(&config, &db).await?;
            output(cli.json, &stats, print_stats)?;
        }

        Commands::Check => {
            let report = cmd_check(&config, &db, load_catalog(&config)?).await?;
            output(cli.json, &report, |r| print_connection(&config.base_url, r))?;
        }

        Commands::Runs { limit } => {
            let runs = cmd_runs(&db, limit).await?;
            output(cli.json, &runs, |r: &Vec<_>| print_runs(r))?;
        }
    }

    db.close().await;
    Ok(())
}

/// Print `value` as pretty JSON or with its human-readable printer
fn output<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

/// Base directory for `init`: the parent of a `.toml` path, or the path itself
fn config_base_dir(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "toml") {
        path.parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir)
    } else {
        path.to_path_buf()
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);
    Config::load(&config_path)
}

fn load_catalog(config: &Config) -> Result<Arc<Catalog>> {
    let catalog = Catalog::load(&config.sections_path(), &config.characters_path())?;
    Ok(Arc::new(catalog))
}

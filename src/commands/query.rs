//! Search, speaker, characters and stats commands

use crate::catalog::Language;
use crate::config::Config;
use crate::db::LinesDb;
use crate::error::Result;
use crate::search::{LineResult, SearchEngine, Stats};
use serde::Serialize;
use tracing::info;

/// Filters shared by text and speaker search
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub language: Option<Language>,
    pub section: Option<String>,
    pub limit: Option<usize>,
}

/// Search results for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub results: Vec<LineResult>,
}

fn engine(config: &Config, db: &LinesDb) -> SearchEngine {
    SearchEngine::new(db.clone(), &config.search, &config.base_url)
}

pub async fn cmd_search(
    config: &Config,
    db: &LinesDb,
    text: &str,
    options: SearchOptions,
) -> Result<SearchOutput> {
    info!("Searching: {}", text);
    let results = engine(config, db)
        .search(
            text,
            options.language,
            options.section.as_deref(),
            options.limit,
        )
        .await?;
    Ok(SearchOutput {
        query: text.to_string(),
        results,
    })
}

pub async fn cmd_speaker(
    config: &Config,
    db: &LinesDb,
    name: &str,
    options: SearchOptions,
) -> Result<SearchOutput> {
    info!("Searching lines spoken by: {}", name);
    let results = engine(config, db)
        .search_by_speaker(
            name,
            options.language,
            options.section.as_deref(),
            options.limit,
        )
        .await?;
    Ok(SearchOutput {
        query: name.to_string(),
        results,
    })
}

pub async fn cmd_characters(
    config: &Config,
    db: &LinesDb,
    language: Option<Language>,
) -> Result<Vec<String>> {
    engine(config, db).get_unique_characters(language).await
}

pub async fn cmd_stats(config: &Config, db: &LinesDb) -> Result<Stats> {
    engine(config, db).get_stats().await
}

pub fn print_search_results(output: &SearchOutput) {
    if output.results.is_empty() {
        println!("No results found for: {}", output.query);
        return;
    }

    println!("\n🔍 {} result(s) for: {}\n", output.results.len(), output.query);

    for (i, line) in output.results.iter().enumerate() {
        println!(
            "{}. [{} / {}] {}",
            i + 1,
            line.section,
            line.language_name,
            line.speaker_name
        );
        println!("   {}", line.text.replace('\n', "\n   "));
        println!(
            "   id: {}{}  {}",
            line.dialogue_id,
            line.conversation_id
                .as_deref()
                .map(|c| format!("  conversation: {}", c))
                .unwrap_or_default(),
            line.section_url
        );
        println!();
    }
}

pub fn print_characters(characters: &[String]) {
    if characters.is_empty() {
        println!("No speaker names stored. Run 'fulllines extract' first.");
        return;
    }
    for name in characters {
        println!("{}", name);
    }
}

pub fn print_stats(stats: &Stats) {
    println!("\n📊 Database Stats\n");
    println!("Total lines: {}", stats.total_entries);

    if !stats.has_data {
        println!("\nNo data extracted yet.");
        return;
    }

    println!("\nLanguages:");
    for lang in &stats.languages {
        println!("  {} ({}): {}", lang.language_name, lang.language, lang.count);
    }

    println!("\nSections:");
    for section in &stats.sections {
        println!("  {}: {}", section.section, section.count);
    }
}

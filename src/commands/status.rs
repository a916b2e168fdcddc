//! Progress, cleanup, validation and run history commands

use crate::catalog::Catalog;
use crate::db::{ExtractionRun, LinesDb};
use crate::error::Result;
use crate::tracker::{IntegrityReport, ProgressSnapshot, ProgressTracker};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub async fn cmd_progress(db: &LinesDb, catalog: Arc<Catalog>) -> Result<ProgressSnapshot> {
    ProgressTracker::new(db.clone(), catalog)
        .compute_progress()
        .await
}

/// Cleanup outcome
#[derive(Debug, Clone, Serialize)]
pub struct CleanupStats {
    pub sections_cleaned: usize,
    pub lines_remaining: i64,
}

pub async fn cmd_cleanup(db: &LinesDb, catalog: Arc<Catalog>) -> Result<CleanupStats> {
    info!("Cleaning up incomplete sections");
    let sections_cleaned = ProgressTracker::new(db.clone(), catalog)
        .cleanup_incomplete_sections()
        .await?;
    Ok(CleanupStats {
        sections_cleaned,
        lines_remaining: db.count_lines().await?,
    })
}

pub async fn cmd_validate(db: &LinesDb, catalog: Arc<Catalog>) -> Result<IntegrityReport> {
    ProgressTracker::new(db.clone(), catalog)
        .validate_integrity()
        .await
}

pub async fn cmd_runs(db: &LinesDb, limit: usize) -> Result<Vec<ExtractionRun>> {
    db.list_runs(limit).await
}

pub fn print_progress(snapshot: &ProgressSnapshot) {
    println!("\n📊 Extraction Progress\n");
    println!(
        "Complete: {}/{} sections ({} remaining)",
        snapshot.completed.len(),
        snapshot.total,
        snapshot.remaining()
    );

    if !snapshot.has_any_data {
        println!("\nNo data extracted yet. Run 'fulllines extract' to start.");
        return;
    }

    if !snapshot.incomplete.is_empty() {
        println!("\nIncomplete sections:");
        for section in &snapshot.incomplete {
            println!(
                "  {} ({}/{} languages, missing: {})",
                section.section,
                section.actual_count,
                section.expected_count,
                section.missing_languages.join(", ")
            );
        }
        println!("\nRun 'fulllines extract --resume' to finish them.");
    }
}

pub fn print_cleanup(stats: &CleanupStats) {
    if stats.sections_cleaned == 0 {
        println!("No incomplete sections found.");
    } else {
        println!(
            "✓ Cleaned up {} incomplete section(s); {} lines remain",
            stats.sections_cleaned, stats.lines_remaining
        );
    }
}

pub fn print_integrity(report: &IntegrityReport) {
    if report.is_valid {
        println!("✓ Database is consistent");
        return;
    }

    println!("⚠️  {} issue(s) found:", report.issues.len());
    for issue in &report.issues {
        println!("  - {}", issue);
    }
}

pub fn print_runs(runs: &[ExtractionRun]) {
    println!("\n🕑 Extraction Runs\n");

    if runs.is_empty() {
        println!("No runs recorded.");
        return;
    }

    for run in runs {
        println!(
            "{}  {:<9} {}{}",
            run.started_at,
            run.status,
            if run.resume { "resume " } else { "" },
            run.id
        );
        println!(
            "  Succeeded: {}  Failed: {}  Finished: {}",
            run.success_count,
            run.fail_count,
            run.completed_at.as_deref().unwrap_or("-")
        );
        if let Some(error) = &run.error {
            println!("  Error: {}", error);
        }
    }
}

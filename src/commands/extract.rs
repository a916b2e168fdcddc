//! Extract command implementation

use crate::catalog::Catalog;
use crate::config::Config;
use crate::db::LinesDb;
use crate::error::Result;
use crate::extract::{
    event_channel, EventReceiver, Extractor, ProgressStatus, RunResult,
};
use crate::progress::{finish_progress, start_progress_bar};
use crate::tracker::ProgressSnapshot;
use indicatif::ProgressBar;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extraction options
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Skip complete sections and clean up partial ones first
    pub resume: bool,
    /// Draw a progress bar
    pub show_progress: bool,
}

/// Outcome of an extraction for CLI display
#[derive(Debug, Clone, Serialize)]
pub struct ExtractSummary {
    pub resume: bool,
    #[serde(flatten)]
    pub result: RunResult,
    pub progress: ProgressSnapshot,
}

/// Run one extraction. Ctrl-C requests a cooperative cancel: the current
/// file finishes and the partial section is cleaned up before returning.
pub async fn cmd_extract(
    config: &Config,
    db: &LinesDb,
    catalog: Arc<Catalog>,
    options: ExtractOptions,
) -> Result<ExtractSummary> {
    info!(
        "Extracting {} sections (resume: {})",
        catalog.sections().len(),
        options.resume
    );

    let (tx, rx) = event_channel();
    let mut extractor = Extractor::from_config(config, db.clone(), catalog)?.with_events(tx);

    let cancel = extractor.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested; finishing the current file");
            cancel.cancel();
        }
    });
    let reporter = tokio::spawn(report_events(rx, options.show_progress));

    let outcome = extractor.start_extraction(options.resume).await;
    let progress = extractor.get_progress().await;

    // Dropping the extractor closes the event channel
    drop(extractor);
    interrupt.abort();
    if let Err(e) = reporter.await {
        debug!("Progress reporter ended abnormally: {}", e);
    }

    let result = outcome?;
    Ok(ExtractSummary {
        resume: options.resume,
        result,
        progress: progress?,
    })
}

/// Drive the progress bar from pipeline events
async fn report_events(mut rx: EventReceiver, show_progress: bool) {
    let mut pb: Option<ProgressBar> = None;

    while let Some(event) = rx.recv().await {
        if show_progress && pb.is_none() && event.total > 0 {
            pb = start_progress_bar(event.total, "Extracting");
        }

        match event.status {
            ProgressStatus::Downloading => {
                if let (Some(pb), Some(file)) = (&pb, &event.current_file) {
                    pb.set_message(file.clone());
                }
            }
            ProgressStatus::Success => {
                if let Some(pb) = &pb {
                    pb.set_position(event.current as u64);
                }
                if let (Some(file), Some(count)) = (&event.current_file, event.entry_count) {
                    debug!("Stored {} ({} entries)", file, count);
                }
            }
            ProgressStatus::Error => {
                if let Some(pb) = &pb {
                    pb.set_position(event.current as u64);
                }
            }
            ProgressStatus::Info
            | ProgressStatus::Resume
            | ProgressStatus::Cleanup
            | ProgressStatus::Cancelled => {
                if let Some(message) = &event.message {
                    debug!("[{}] {}", event.status, message);
                }
            }
        }
    }

    finish_progress(pb, "done");
}

pub fn print_extract_summary(summary: &ExtractSummary) {
    if summary.result.cancelled {
        println!("\n⏹  Extraction cancelled\n");
    } else {
        println!("\n✓ Extraction completed\n");
    }
    println!("Files succeeded: {}", summary.result.success_count);
    println!("Files failed: {}", summary.result.fail_count);
    println!(
        "Sections complete: {}/{}",
        summary.progress.completed.len(),
        summary.progress.total
    );
    if !summary.progress.incomplete.is_empty() {
        println!(
            "Incomplete sections: {} (run 'fulllines extract --resume' to retry)",
            summary.progress.incomplete.len()
        );
    }
}

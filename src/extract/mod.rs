//! Extraction pipeline
//!
//! Drives the catalog section by section, one file at a time:
//! 1. Base manifest (a failure skips the rest of the section)
//! 2. Conversation list manifest, persisted and turned into lookups
//! 3. One text file per configured language, each persisted in one transaction
//!
//! Resume state is always derived from the database. Cancellation and the
//! consecutive-failure breaker both end with cleanup of partially populated
//! sections so no section is left with partial language coverage.

mod cancel;
mod events;

pub use cancel::*;
pub use events::*;

use crate::catalog::{Catalog, Language, Section};
use crate::config::Config;
use crate::db::{Conversation, DialogueLine, LinesDb, RunStatus, SectionUrl};
use crate::error::{Error, Result};
use crate::fetch::{file_label, CircuitBreaker, Fetcher, Resource, ResourceLocator};
use crate::lookup::{parse_manifest, DialogueLookups};
use crate::tracker::{IntegrityReport, ProgressSnapshot, ProgressTracker};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Cancelled,
    Fatal,
}

/// Outcome of a run that did not hit the breaker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success_count: usize,
    pub fail_count: usize,
    pub cancelled: bool,
}

/// Result of the connectivity probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub reachable: bool,
    pub probed: usize,
    pub failures: Vec<String>,
}

/// Mutable state of one run
#[derive(Debug)]
struct RunState {
    breaker: CircuitBreaker,
    metadata_stored: bool,
    touched: BTreeSet<String>,
    success_count: usize,
    fail_count: usize,
    current: usize,
    total: usize,
}

impl RunState {
    fn new(threshold: u32) -> Self {
        Self {
            breaker: CircuitBreaker::new(threshold),
            metadata_stored: false,
            touched: BTreeSet::new(),
            success_count: 0,
            fail_count: 0,
            current: 0,
            total: 0,
        }
    }

    fn result(&self, cancelled: bool) -> RunResult {
        RunResult {
            success_count: self.success_count,
            fail_count: self.fail_count,
            cancelled,
        }
    }
}

enum SectionOutcome {
    Finished,
    Cancelled,
}

/// The extraction orchestrator
pub struct Extractor {
    db: LinesDb,
    catalog: Arc<Catalog>,
    fetcher: Fetcher,
    locator: ResourceLocator,
    tracker: ProgressTracker,
    failure_threshold: u32,
    cancel: CancelToken,
    events: Option<EventSender>,
    phase: RunPhase,
}

impl Extractor {
    pub fn new(
        db: LinesDb,
        catalog: Arc<Catalog>,
        fetcher: Fetcher,
        locator: ResourceLocator,
        failure_threshold: u32,
    ) -> Self {
        let tracker = ProgressTracker::new(db.clone(), catalog.clone());
        Self {
            db,
            catalog,
            fetcher,
            locator,
            tracker,
            failure_threshold,
            cancel: CancelToken::new(),
            events: None,
            phase: RunPhase::Idle,
        }
    }

    /// Build an HTTP-backed extractor from configuration
    pub fn from_config(config: &Config, db: LinesDb, catalog: Arc<Catalog>) -> Result<Self> {
        let base_url = config.base_url()?;
        let fetcher = Fetcher::from_config(&config.fetch)?;
        Ok(Self::new(
            db,
            catalog,
            fetcher,
            ResourceLocator::new(base_url.as_str()),
            config.fetch.max_consecutive_failures,
        ))
    }

    /// Send progress events to `sender`
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// A handle that cancels the current run from another task
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn get_progress(&self) -> Result<ProgressSnapshot> {
        self.tracker.compute_progress().await
    }

    pub async fn cleanup_incomplete_sections(&self) -> Result<usize> {
        self.tracker.cleanup_incomplete_sections().await
    }

    pub async fn validate_integrity(&self) -> Result<IntegrityReport> {
        self.tracker.validate_integrity().await
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening
            let _ = events.send(event);
        }
    }

    fn emit_message(&self, state: &RunState, status: ProgressStatus, message: String) {
        info!("{}", message);
        self.emit(ProgressEvent::new(status, state.current, state.total).with_message(message));
    }

    /// Run one extraction pass over the catalog.
    ///
    /// Returns `Error::CircuitBreaker` when the run aborts on consecutive
    /// failures; cancellation is an ordinary result with `cancelled` set.
    pub async fn start_extraction(&mut self, resume: bool) -> Result<RunResult> {
        if self.phase == RunPhase::Running {
            return Err(Error::RunInProgress);
        }
        let run = self.db.start_run(resume).await?;
        self.cancel.reset();
        self.phase = RunPhase::Running;
        let mut state = RunState::new(self.failure_threshold);

        let outcome = self.run(&mut state, resume).await;

        let (phase, status, error) = match &outcome {
            Ok(result) if result.cancelled => (RunPhase::Cancelled, RunStatus::Cancelled, None),
            Ok(_) => (RunPhase::Completed, RunStatus::Completed, None),
            Err(e) => (RunPhase::Fatal, RunStatus::Fatal, Some(e.to_string())),
        };
        self.phase = phase;

        if let Err(e) = self
            .db
            .complete_run(
                &run.id,
                status,
                state.success_count,
                state.fail_count,
                error.as_deref(),
            )
            .await
        {
            warn!("Failed to record run {}: {}", run.id, e);
        }

        outcome
    }

    async fn run(&self, state: &mut RunState, resume: bool) -> Result<RunResult> {
        let mut pending: Vec<&Section> = self.catalog.sections().iter().collect();
        let mut starting_progress = 0;

        if resume {
            let snapshot = self.tracker.compute_progress().await?;
            pending.retain(|section| !snapshot.is_complete(&section.name));
            starting_progress = self
                .catalog
                .sections()
                .iter()
                .filter(|section| snapshot.is_complete(&section.name))
                .map(Section::file_count)
                .sum();

            state.current = starting_progress;
            self.emit_message(
                state,
                ProgressStatus::Resume,
                format!(
                    "Resuming extraction. {}/{} sections complete. {} sections remaining.",
                    snapshot.completed.len(),
                    snapshot.total,
                    pending.len()
                ),
            );

            // A partial section may be stale from an earlier abort
            for incomplete in &snapshot.incomplete {
                let removed = self.db.delete_section_lines(&incomplete.section).await?;
                self.emit_message(
                    state,
                    ProgressStatus::Cleanup,
                    format!(
                        "Cleaned up incomplete section {} ({} rows)",
                        incomplete.section, removed
                    ),
                );
            }
        }

        state.total = starting_progress + pending.iter().map(|s| s.file_count()).sum::<usize>();

        self.store_metadata_once(state).await;

        for section in pending {
            if self.cancel.is_cancelled() {
                return Ok(self.finish_cancelled(state, None).await);
            }

            match self.process_section(state, section).await {
                Ok(SectionOutcome::Finished) => {}
                Ok(SectionOutcome::Cancelled) => {
                    return Ok(self.finish_cancelled(state, Some(section)).await);
                }
                Err(e) if e.is_fatal() => {
                    self.cleanup_touched(state).await;
                    return Err(e);
                }
                Err(e) => {
                    // Anything escaping a section counts every one of its files
                    error!("Section {} failed completely: {}", section.name, e);
                    state.fail_count += section.file_count();
                }
            }
        }

        info!(
            "Extraction completed. Success: {}, Failed: {}",
            state.success_count, state.fail_count
        );
        Ok(state.result(false))
    }

    async fn store_metadata_once(&self, state: &mut RunState) {
        if state.metadata_stored {
            return;
        }

        if !self.catalog.speakers().is_empty() {
            self.emit_message(
                state,
                ProgressStatus::Info,
                "Storing character mappings in database...".to_string(),
            );
            if let Err(e) = self.db.upsert_speaker_mappings(self.catalog.speakers()).await {
                error!("Failed to store speaker mappings: {}", e);
            }
        }

        self.emit_message(
            state,
            ProgressStatus::Info,
            "Storing section URL mappings...".to_string(),
        );
        let urls: Vec<SectionUrl> = self
            .catalog
            .sections()
            .iter()
            .map(|section| SectionUrl {
                section: section.name.clone(),
                view_url: self.locator.view_url(&section.name),
            })
            .collect();
        if let Err(e) = self.db.upsert_section_urls(&urls).await {
            error!("Failed to store section URLs: {}", e);
        }

        state.metadata_stored = true;
    }

    /// Fetch one file, reporting progress. Ordinary failures are reported
    /// and returned; the breaker error is returned for the caller to abort.
    async fn fetch_file(
        &self,
        state: &mut RunState,
        section: &str,
        resource: Resource,
        unit: usize,
    ) -> Result<Value> {
        let url = self.locator.resource_url(section, resource);
        let label = file_label(section, resource);

        self.emit(ProgressEvent::new(ProgressStatus::Downloading, unit, state.total).with_file(&label));

        match self.fetcher.fetch(&url, &label, &mut state.breaker).await {
            Ok(payload) => Ok(payload),
            Err(e) if e.is_fatal() => {
                self.emit(
                    ProgressEvent::new(ProgressStatus::Error, unit, state.total)
                        .with_error(e.to_string()),
                );
                Err(e)
            }
            Err(e) => {
                let reason = match &e {
                    Error::Fetch { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                self.emit(
                    ProgressEvent::new(ProgressStatus::Error, unit, state.total)
                        .with_file(&label)
                        .with_error(reason),
                );
                Err(e)
            }
        }
    }

    async fn process_section(
        &self,
        state: &mut RunState,
        section: &Section,
    ) -> Result<SectionOutcome> {
        let name = section.name.as_str();
        debug!(section = %name, "Processing section");
        state.touched.insert(section.name.clone());

        if self.cancel.is_cancelled() {
            return Ok(SectionOutcome::Cancelled);
        }
        let unit = state.current + 1;
        match self.fetch_file(state, name, Resource::Base, unit).await {
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => {
                state.current += section.file_count();
                state.fail_count += section.file_count();
                return Ok(SectionOutcome::Finished);
            }
        }

        if self.cancel.is_cancelled() {
            return Ok(SectionOutcome::Cancelled);
        }
        let list_label = file_label(name, Resource::List);
        let manifest = match self.fetch_file(state, name, Resource::List, unit).await {
            Ok(payload) => parse_manifest(payload, &list_label),
            Err(e) => Err(e),
        };
        state.current += 1;
        let manifest = match manifest {
            Ok(manifest) => manifest,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                if matches!(e, Error::Payload { .. }) {
                    warn!("{}", e);
                    self.emit(
                        ProgressEvent::new(ProgressStatus::Error, state.current, state.total)
                            .with_file(&list_label)
                            .with_error(e.to_string()),
                    );
                }
                state.current += section.languages.len();
                state.fail_count += section.file_count();
                return Ok(SectionOutcome::Finished);
            }
        };
        state.success_count += 1;

        let conversations: Vec<Conversation> = manifest
            .iter()
            .map(|c| Conversation {
                id: c.id.clone(),
                section: section.name.clone(),
            })
            .collect();
        match self.db.upsert_conversations(&conversations).await {
            Ok(count) => self.emit(
                ProgressEvent::new(ProgressStatus::Success, state.current, state.total)
                    .with_file(&list_label)
                    .with_entries(count),
            ),
            Err(e) => error!("Failed to store conversations for {}: {}", name, e),
        }

        let lookups = DialogueLookups::build(&manifest);

        for &language in &section.languages {
            if self.cancel.is_cancelled() {
                return Ok(SectionOutcome::Cancelled);
            }
            state.current += 1;
            match self.process_language(state, section, language, &lookups).await {
                Ok(()) => state.success_count += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => state.fail_count += 1,
            }
        }

        Ok(SectionOutcome::Finished)
    }

    async fn process_language(
        &self,
        state: &mut RunState,
        section: &Section,
        language: Language,
        lookups: &DialogueLookups,
    ) -> Result<()> {
        let unit = state.current;
        let payload = self
            .fetch_file(state, &section.name, Resource::Language(language), unit)
            .await?;

        let label = file_label(&section.name, Resource::Language(language));
        let lines = match annotate_lines(payload, &label, &section.name, language, lookups) {
            Ok(lines) => lines,
            Err(e) => {
                warn!("{}", e);
                self.emit(
                    ProgressEvent::new(ProgressStatus::Error, state.current, state.total)
                        .with_file(&label)
                        .with_error(e.to_string()),
                );
                return Err(e);
            }
        };

        match self.db.upsert_dialogue_lines(&lines).await {
            Ok(count) => {
                self.emit(
                    ProgressEvent::new(ProgressStatus::Success, state.current, state.total)
                        .with_file(&label)
                        .with_entries(count),
                );
                Ok(())
            }
            Err(e) => {
                error!("Database error for {}: {}", label, e);
                self.emit(
                    ProgressEvent::new(ProgressStatus::Error, state.current, state.total)
                        .with_file(&label)
                        .with_error(e.to_string()),
                );
                Err(e)
            }
        }
    }

    async fn finish_cancelled(&self, state: &RunState, current: Option<&Section>) -> RunResult {
        if let Some(section) = current {
            match self.tracker.cleanup_if_incomplete(section).await {
                Ok(0) => {}
                Ok(removed) => self.emit(
                    ProgressEvent::new(ProgressStatus::Cleanup, state.current, state.total)
                        .with_file(&section.name)
                        .with_message(format!("Removed {} partial rows", removed)),
                ),
                Err(e) => warn!("Cleanup of {} failed: {}", section.name, e),
            }
        }

        info!("Extraction cancelled by user");
        self.emit(
            ProgressEvent::new(ProgressStatus::Cancelled, state.current, state.total)
                .with_message("Extraction cancelled by user"),
        );
        state.result(true)
    }

    /// Best-effort cleanup of every section this run wrote to
    async fn cleanup_touched(&self, state: &RunState) {
        for name in &state.touched {
            let Some(section) = self.catalog.section(name) else {
                continue;
            };
            match self.tracker.cleanup_if_incomplete(section).await {
                Ok(0) => {}
                Ok(removed) => self.emit(
                    ProgressEvent::new(ProgressStatus::Cleanup, state.current, state.total)
                        .with_file(name)
                        .with_message(format!("Removed {} partial rows", removed)),
                ),
                Err(e) => warn!("Cleanup of {} failed: {}", name, e),
            }
        }
    }

    /// Probe the remote service with the base manifests of up to two sections
    pub async fn check_connection(&self) -> Result<ConnectionReport> {
        let mut report = ConnectionReport::default();

        for section in self.catalog.sections().iter().take(2) {
            let url = self.locator.resource_url(&section.name, Resource::Base);
            report.probed += 1;
            match self.fetcher.probe(&url).await {
                Ok(_) => debug!("Reachable: {}", url),
                Err(e) => {
                    warn!("Probe failed for {}: {}", section.name, e);
                    report.failures.push(format!("{}: {}", section.name, e));
                }
            }
        }

        report.reachable = report.failures.len() <= 1 && report.failures.len() < report.probed;
        Ok(report)
    }
}

/// Turn a language file (dialogue id -> text) into annotated rows
fn annotate_lines(
    payload: Value,
    label: &str,
    section: &str,
    language: Language,
    lookups: &DialogueLookups,
) -> Result<Vec<DialogueLine>> {
    let Value::Object(entries) = payload else {
        return Err(Error::Payload {
            label: label.to_string(),
            reason: "expected an object of dialogue id to text".to_string(),
        });
    };

    let mut lines = Vec::with_capacity(entries.len());
    for (id, text) in entries {
        let text = match text {
            Value::String(s) => s,
            Value::Null => continue,
            other => other.to_string(),
        };
        let mut line = DialogueLine::new(id.as_str(), section, language, text);
        line.conversation_id = lookups.conversation_of(&id).map(str::to_string);
        line.speaker_id = lookups.speaker_of(&id).map(str::to_string);
        lines.push(line);
    }
    Ok(lines)
}

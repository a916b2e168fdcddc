//! Extraction progress derived from persisted rows
//!
//! Nothing here is cached: every answer is recomputed from the database so
//! resume decisions survive crashes and restarts.

use crate::catalog::{Catalog, Section};
use crate::db::LinesDb;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Completeness of one section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Every configured language is present
    Complete,
    /// Some rows exist but at least one configured language is missing
    Incomplete,
    /// No rows at all
    Untouched,
}

/// Classify a section given the languages persisted for it
pub fn classify(section: &Section, present: &BTreeSet<String>) -> Completeness {
    if present.is_empty() {
        return Completeness::Untouched;
    }
    let all_present = section
        .languages
        .iter()
        .all(|lang| present.contains(lang.code()));
    if all_present {
        Completeness::Complete
    } else {
        Completeness::Incomplete
    }
}

/// A section with partial language coverage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteSection {
    pub section: String,
    pub present_languages: Vec<String>,
    pub missing_languages: Vec<String>,
    pub expected_count: usize,
    pub actual_count: usize,
}

impl IncompleteSection {
    fn new(section: &Section, present: &BTreeSet<String>) -> Self {
        let missing: Vec<String> = section
            .languages
            .iter()
            .filter(|lang| !present.contains(lang.code()))
            .map(|lang| lang.code().to_string())
            .collect();
        let missing_count = missing.len();
        Self {
            section: section.name.clone(),
            present_languages: present.iter().cloned().collect(),
            missing_languages: missing,
            expected_count: section.languages.len(),
            actual_count: section.languages.len() - missing_count,
        }
    }
}

/// Snapshot of extraction progress across the catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: Vec<String>,
    pub incomplete: Vec<IncompleteSection>,
    pub has_any_data: bool,
}

impl ProgressSnapshot {
    pub fn remaining(&self) -> usize {
        self.total - self.completed.len()
    }

    pub fn is_complete(&self, section: &str) -> bool {
        self.completed.iter().any(|s| s == section)
    }
}

/// A non-fatal problem found by `validate_integrity`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    IncompleteSection {
        section: String,
        missing_languages: Vec<String>,
    },
    DuplicateKeys {
        count: usize,
    },
    OrphanConversationRefs {
        count: i64,
    },
    UnknownSection {
        section: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::IncompleteSection {
                section,
                missing_languages,
            } => write!(
                f,
                "Section {} is incomplete (missing: {})",
                section,
                missing_languages.join(", ")
            ),
            ValidationIssue::DuplicateKeys { count } => {
                write!(f, "{} duplicate (id, language) keys found", count)
            }
            ValidationIssue::OrphanConversationRefs { count } => {
                write!(f, "{} lines reference unknown conversations", count)
            }
            ValidationIssue::UnknownSection { section } => {
                write!(f, "Section {} is not in the catalog", section)
            }
        }
    }
}

/// Result of an integrity check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub is_valid: bool,
    pub issues: Vec<ValidationIssue>,
}

/// Computes progress and restores the all-or-nothing invariant
#[derive(Clone)]
pub struct ProgressTracker {
    db: LinesDb,
    catalog: Arc<Catalog>,
}

impl ProgressTracker {
    pub fn new(db: LinesDb, catalog: Arc<Catalog>) -> Self {
        Self { db, catalog }
    }

    async fn present_languages(&self) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let mut by_section: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (section, language) in self.db.section_languages().await? {
            by_section.entry(section).or_default().insert(language);
        }
        Ok(by_section)
    }

    /// Classify every catalog section from persisted rows
    pub async fn compute_progress(&self) -> Result<ProgressSnapshot> {
        let present = self.present_languages().await?;
        let empty = BTreeSet::new();

        let mut snapshot = ProgressSnapshot {
            total: self.catalog.sections().len(),
            has_any_data: !present.is_empty(),
            ..Default::default()
        };

        for section in self.catalog.sections() {
            let languages = present.get(&section.name).unwrap_or(&empty);
            match classify(section, languages) {
                Completeness::Complete => snapshot.completed.push(section.name.clone()),
                Completeness::Incomplete => snapshot
                    .incomplete
                    .push(IncompleteSection::new(section, languages)),
                Completeness::Untouched => {}
            }
        }

        Ok(snapshot)
    }

    /// Completeness of a single section
    pub async fn section_completeness(&self, section: &Section) -> Result<Completeness> {
        let present: BTreeSet<String> = self
            .db
            .languages_for_section(&section.name)
            .await?
            .into_iter()
            .collect();
        Ok(classify(section, &present))
    }

    /// Delete a section's rows if it is left partially populated.
    /// Returns the number of rows removed.
    pub async fn cleanup_if_incomplete(&self, section: &Section) -> Result<u64> {
        if self.section_completeness(section).await? != Completeness::Incomplete {
            return Ok(0);
        }
        let removed = self.db.delete_section_lines(&section.name).await?;
        info!("Cleaned up incomplete section {} ({} rows)", section.name, removed);
        Ok(removed)
    }

    /// Delete the rows of every incomplete section; returns the section count
    pub async fn cleanup_incomplete_sections(&self) -> Result<usize> {
        let snapshot = self.compute_progress().await?;
        for incomplete in &snapshot.incomplete {
            let removed = self.db.delete_section_lines(&incomplete.section).await?;
            info!(
                "Cleaned up incomplete section {} ({} rows, missing {})",
                incomplete.section,
                removed,
                incomplete.missing_languages.join(", ")
            );
        }
        Ok(snapshot.incomplete.len())
    }

    /// Report incomplete sections and key/reference anomalies
    pub async fn validate_integrity(&self) -> Result<IntegrityReport> {
        let mut issues = Vec::new();

        let snapshot = self.compute_progress().await?;
        for incomplete in snapshot.incomplete {
            issues.push(ValidationIssue::IncompleteSection {
                section: incomplete.section,
                missing_languages: incomplete.missing_languages,
            });
        }

        let duplicates = self.db.duplicate_keys().await?;
        if !duplicates.is_empty() {
            warn!(
                "{} duplicate natural keys found; schema and upsert key disagree",
                duplicates.len()
            );
            issues.push(ValidationIssue::DuplicateKeys {
                count: duplicates.len(),
            });
        }

        let orphans = self.db.count_orphan_conversation_refs().await?;
        if orphans > 0 {
            issues.push(ValidationIssue::OrphanConversationRefs { count: orphans });
        }

        for section in self.present_languages().await?.into_keys() {
            if self.catalog.section(&section).is_none() {
                issues.push(ValidationIssue::UnknownSection { section });
            }
        }

        Ok(IntegrityReport {
            is_valid: issues.is_empty(),
            issues,
        })
    }
}

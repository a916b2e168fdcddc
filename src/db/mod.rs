//! Persistence using SQLite
//!
//! This module owns the relational schema and exposes:
//! - Idempotent batch upserts, each batch in one transaction
//! - Completeness queries grouped by (section, language)
//! - Section cleanup for the all-or-nothing invariant
//! - Statistics, integrity probes and run history

mod schema;

pub use schema::*;

use crate::catalog::{Language, SpeakerCatalog, SpeakerNames};
use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A persisted dialogue line
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DialogueLine {
    pub id: String,
    pub conversation_id: Option<String>,
    pub section: String,
    pub language: String,
    pub language_name: String,
    pub text: String,
    pub speaker_id: Option<String>,
}

impl DialogueLine {
    pub fn new(
        id: impl Into<String>,
        section: impl Into<String>,
        language: Language,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            conversation_id: None,
            section: section.into(),
            language: language.code().to_string(),
            language_name: language.display_name().to_string(),
            text: text.into(),
            speaker_id: None,
        }
    }
}

/// A persisted conversation
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub section: String,
}

/// A persisted section page URL
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SectionUrl {
    pub section: String,
    pub view_url: String,
}

/// Extraction run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Fatal,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
            RunStatus::Fatal => write!(f, "fatal"),
        }
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "cancelled" => Ok(RunStatus::Cancelled),
            "fatal" => Ok(RunStatus::Fatal),
            _ => Err(Error::Config(format!("Unknown run status: {}", s))),
        }
    }
}

/// An extraction run record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExtractionRun {
    pub id: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub status: String,
    pub resume: bool,
    pub success_count: i64,
    pub fail_count: i64,
    pub error: Option<String>,
}

impl ExtractionRun {
    pub fn new(resume: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
            status: RunStatus::Running.to_string(),
            resume,
            success_count: 0,
            fail_count: 0,
            error: None,
        }
    }
}

/// Row count for one language
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LanguageCount {
    pub language: String,
    pub language_name: String,
    pub count: i64,
}

/// Row count for one section
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SectionCount {
    pub section: String,
    pub count: i64,
}

/// A natural key that occurs more than once
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub id: String,
    pub language: String,
    pub count: i64,
}

/// Lines database handle
#[derive(Clone)]
pub struct LinesDb {
    pool: SqlitePool,
}

impl LinesDb {
    /// Connect to the database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Open (creating if needed) the database at `db_path` and apply the schema
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        if !db.is_initialized().await? {
            info!("Initializing database schema");
        }
        db.init_schema().await?;

        Ok(db)
    }

    /// Apply the schema. Every statement is `IF NOT EXISTS`, so this also
    /// brings databases created by older versions up to date.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        self.migrate().await?;
        sqlx::query(POST_MIGRATION_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Add columns missing from older databases and backfill them
    async fn migrate(&self) -> Result<()> {
        let has_folded: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM pragma_table_info('dialogue_lines') WHERE name = 'text_folded'",
        )
        .fetch_optional(&self.pool)
        .await?;
        if has_folded.is_some() {
            return Ok(());
        }

        info!("Adding folded text column to dialogue_lines");
        sqlx::query("ALTER TABLE dialogue_lines ADD COLUMN text_folded TEXT NOT NULL DEFAULT ''")
            .execute(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, language, text FROM dialogue_lines",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut tx = self.pool.begin().await?;
        for (id, language, text) in &rows {
            sqlx::query("UPDATE dialogue_lines SET text_folded = ? WHERE id = ? AND language = ?")
                .bind(fold_text(text))
                .bind(id)
                .bind(language)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!("Backfilled folded text for {} rows", rows.len());
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='dialogue_lines'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ===== Batch upserts =====

    /// Upsert a batch of dialogue lines in one transaction
    pub async fn upsert_dialogue_lines(&self, lines: &[DialogueLine]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO dialogue_lines (id, conversation_id, section, language, language_name, text, text_folded, speaker_id)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id, language) DO UPDATE SET
                    conversation_id = excluded.conversation_id,
                    section = excluded.section,
                    language_name = excluded.language_name,
                    text = excluded.text,
                    text_folded = excluded.text_folded,
                    speaker_id = excluded.speaker_id
                "#,
            )
            .bind(&line.id)
            .bind(&line.conversation_id)
            .bind(&line.section)
            .bind(&line.language)
            .bind(&line.language_name)
            .bind(&line.text)
            .bind(fold_text(&line.text))
            .bind(&line.speaker_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(lines.len())
    }

    /// Upsert a batch of conversations in one transaction
    pub async fn upsert_conversations(&self, conversations: &[Conversation]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for conversation in conversations {
            sqlx::query(
                r#"
                INSERT INTO conversations (id, section) VALUES (?, ?)
                ON CONFLICT(id) DO UPDATE SET section = excluded.section
                "#,
            )
            .bind(&conversation.id)
            .bind(&conversation.section)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(conversations.len())
    }

    /// Upsert the speaker catalog in one transaction
    pub async fn upsert_speaker_mappings(&self, speakers: &SpeakerCatalog) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for (speaker_id, names) in speakers {
            sqlx::query(
                r#"
                INSERT INTO speaker_mappings (speaker_id, us_name, jp_name, de_name, fr_name)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(speaker_id) DO UPDATE SET
                    us_name = excluded.us_name,
                    jp_name = excluded.jp_name,
                    de_name = excluded.de_name,
                    fr_name = excluded.fr_name
                "#,
            )
            .bind(speaker_id)
            .bind(&names.us)
            .bind(&names.jp)
            .bind(&names.de)
            .bind(&names.fr)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(speakers.len())
    }

    /// Upsert a batch of section URLs in one transaction
    pub async fn upsert_section_urls(&self, urls: &[SectionUrl]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for url in urls {
            sqlx::query(
                r#"
                INSERT INTO section_urls (section, view_url) VALUES (?, ?)
                ON CONFLICT(section) DO UPDATE SET view_url = excluded.view_url
                "#,
            )
            .bind(&url.section)
            .bind(&url.view_url)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(urls.len())
    }

    // ===== Completeness =====

    /// Distinct (section, language) pairs present in dialogue lines
    pub async fn section_languages(&self) -> Result<Vec<(String, String)>> {
        let pairs = sqlx::query_as::<_, (String, String)>(
            "SELECT DISTINCT section, language FROM dialogue_lines ORDER BY section, language",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(pairs)
    }

    /// Distinct languages present for one section
    pub async fn languages_for_section(&self, section: &str) -> Result<Vec<String>> {
        let languages = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT language FROM dialogue_lines WHERE section = ? ORDER BY language",
        )
        .bind(section)
        .fetch_all(&self.pool)
        .await?;
        Ok(languages)
    }

    /// Remove every dialogue line of a section
    pub async fn delete_section_lines(&self, section: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM dialogue_lines WHERE section = ?")
            .bind(section)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ===== Reads =====

    pub async fn get_line(&self, id: &str, language: Language) -> Result<Option<DialogueLine>> {
        let line = sqlx::query_as::<_, DialogueLine>(
            "SELECT * FROM dialogue_lines WHERE id = ? AND language = ?",
        )
        .bind(id)
        .bind(language.code())
        .fetch_optional(&self.pool)
        .await?;
        Ok(line)
    }

    pub async fn list_conversations(&self, section: &str) -> Result<Vec<Conversation>> {
        let conversations = sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE section = ? ORDER BY id",
        )
        .bind(section)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversations)
    }

    pub async fn get_speaker(&self, speaker_id: &str) -> Result<Option<SpeakerNames>> {
        let row = sqlx::query_as::<_, (Option<String>, Option<String>, Option<String>, Option<String>)>(
            "SELECT us_name, jp_name, de_name, fr_name FROM speaker_mappings WHERE speaker_id = ?",
        )
        .bind(speaker_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(us, jp, de, fr)| SpeakerNames { us, jp, de, fr }))
    }

    // ===== Statistics =====

    pub async fn count_lines(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dialogue_lines")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_conversations(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn language_counts(&self) -> Result<Vec<LanguageCount>> {
        let counts = sqlx::query_as::<_, LanguageCount>(
            r#"
            SELECT language, MAX(language_name) AS language_name, COUNT(*) AS count
            FROM dialogue_lines
            GROUP BY language
            ORDER BY language
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    pub async fn section_counts(&self) -> Result<Vec<SectionCount>> {
        let counts = sqlx::query_as::<_, SectionCount>(
            r#"
            SELECT section, COUNT(*) AS count
            FROM dialogue_lines
            GROUP BY section
            ORDER BY count DESC, section
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    // ===== Integrity probes =====

    /// Natural keys stored more than once
    pub async fn duplicate_keys(&self) -> Result<Vec<DuplicateKey>> {
        let dupes = sqlx::query_as::<_, DuplicateKey>(
            r#"
            SELECT id, language, COUNT(*) AS count
            FROM dialogue_lines
            GROUP BY id, language
            HAVING COUNT(*) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(dupes)
    }

    /// Lines pointing at a conversation that was never stored
    pub async fn count_orphan_conversation_refs(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM dialogue_lines l
            LEFT JOIN conversations c ON l.conversation_id = c.id
            WHERE l.conversation_id IS NOT NULL AND c.id IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ===== Run history =====

    pub async fn start_run(&self, resume: bool) -> Result<ExtractionRun> {
        let run = ExtractionRun::new(resume);
        sqlx::query(
            r#"
            INSERT INTO extraction_runs (id, started_at, status, resume, success_count, fail_count)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.started_at)
        .bind(&run.status)
        .bind(run.resume)
        .bind(run.success_count)
        .bind(run.fail_count)
        .execute(&self.pool)
        .await?;
        Ok(run)
    }

    pub async fn complete_run(
        &self,
        id: &str,
        status: RunStatus,
        success_count: usize,
        fail_count: usize,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE extraction_runs SET
                completed_at = ?,
                status = ?,
                success_count = ?,
                fail_count = ?,
                error = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(status.to_string())
        .bind(success_count as i64)
        .bind(fail_count as i64)
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_runs(&self, limit: usize) -> Result<Vec<ExtractionRun>> {
        let runs = sqlx::query_as::<_, ExtractionRun>(
            "SELECT * FROM extraction_runs ORDER BY started_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(runs)
    }
}

/// Case folding shared by stored text and search patterns. SQLite's own
/// `LOWER` only folds ASCII.
pub fn fold_text(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::LinesDb;
    use tempfile::TempDir;

    pub async fn setup_test_db() -> (LinesDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = LinesDb::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }
}

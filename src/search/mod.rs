//! Language-aware search over persisted dialogue lines
//!
//! Speaker names are resolved per row: a `CASE` over the row's own language
//! picks the matching localized column of `speaker_mappings`. Text matching
//! runs against `text_folded`, lowercased in Rust so accented capitals fold
//! too. Every caller value is bound, never spliced into the statement text.

use crate::catalog::Language;
use crate::config::SearchConfig;
use crate::db::{fold_text, LanguageCount, LinesDb, SectionCount};
use crate::error::{Error, Result};
use crate::fetch::ResourceLocator;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::debug;

/// Label for lines whose speaker has no mapping in the row's language
pub const UNKNOWN_SPEAKER: &str = "Unknown";

const SPEAKER_NAME_FOR_ROW: &str = "CASE l.language \
     WHEN 'us' THEN s.us_name \
     WHEN 'jp' THEN s.jp_name \
     WHEN 'de' THEN s.de_name \
     WHEN 'fr' THEN s.fr_name \
     END";

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineResult {
    pub dialogue_id: String,
    pub conversation_id: Option<String>,
    pub section: String,
    pub language: String,
    pub language_name: String,
    pub text: String,
    pub speaker_id: Option<String>,
    pub speaker_name: String,
    pub section_url: String,
}

#[derive(Debug, FromRow)]
struct SearchRow {
    dialogue_id: String,
    conversation_id: Option<String>,
    section: String,
    language: String,
    language_name: String,
    text: String,
    speaker_id: Option<String>,
    speaker_name: Option<String>,
    view_url: Option<String>,
}

/// Database summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub total_entries: i64,
    pub languages: Vec<LanguageCount>,
    /// Ordered by descending row count
    pub sections: Vec<SectionCount>,
    pub has_data: bool,
}

/// Read-only query layer
#[derive(Clone)]
pub struct SearchEngine {
    db: LinesDb,
    locator: ResourceLocator,
    default_limit: Option<usize>,
    max_results: usize,
}

impl SearchEngine {
    pub fn new(db: LinesDb, config: &SearchConfig, base_url: &str) -> Self {
        Self {
            db,
            locator: ResourceLocator::new(base_url),
            default_limit: config.default_limit,
            max_results: config.max_results,
        }
    }

    fn select_lines<'a>(speaker_join: &str) -> QueryBuilder<'a, Sqlite> {
        QueryBuilder::new(format!(
            "SELECT l.id AS dialogue_id, l.conversation_id, l.section, l.language, \
             l.language_name, l.text, l.speaker_id, {} AS speaker_name, u.view_url \
             FROM dialogue_lines l \
             {} speaker_mappings s ON l.speaker_id = s.speaker_id \
             LEFT JOIN section_urls u ON l.section = u.section \
             WHERE ",
            SPEAKER_NAME_FOR_ROW, speaker_join
        ))
    }

    fn push_filters_and_limit<'a>(
        &self,
        qb: &mut QueryBuilder<'a, Sqlite>,
        language: Option<Language>,
        section: Option<&'a str>,
        limit: Option<usize>,
    ) {
        if let Some(language) = language {
            qb.push(" AND l.language = ").push_bind(language.code());
        }
        if let Some(section) = section {
            qb.push(" AND l.section = ").push_bind(section);
        }
        qb.push(" ORDER BY l.section, l.language, l.id LIMIT ")
            .push_bind(effective_limit(limit, self.default_limit, self.max_results));
    }

    fn into_result(&self, row: SearchRow, fallback_name: &str) -> LineResult {
        let section_url = row
            .view_url
            .unwrap_or_else(|| self.locator.view_url(&row.section));
        LineResult {
            dialogue_id: row.dialogue_id,
            conversation_id: row.conversation_id,
            section: row.section,
            language: row.language,
            language_name: row.language_name,
            text: row.text,
            speaker_id: row.speaker_id,
            speaker_name: row.speaker_name.unwrap_or_else(|| fallback_name.to_string()),
            section_url,
        }
    }

    /// Case-insensitive substring search on line text
    pub async fn search(
        &self,
        text: &str,
        language: Option<Language>,
        section: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<LineResult>> {
        if text.is_empty() {
            return Err(Error::InvalidQuery("search text is required".to_string()));
        }

        let pattern = format!("%{}%", escape_like(&fold_text(text)));
        let mut qb = Self::select_lines("LEFT JOIN");
        qb.push("l.text_folded LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\'");
        self.push_filters_and_limit(&mut qb, language, section, limit);

        let rows = qb
            .build_query_as::<SearchRow>()
            .fetch_all(self.db.pool())
            .await?;
        debug!("Text search {:?} matched {} rows", text, rows.len());

        Ok(rows
            .into_iter()
            .map(|row| self.into_result(row, UNKNOWN_SPEAKER))
            .collect())
    }

    /// Lines whose speaker's name, in the line's own language, equals `name`.
    ///
    /// `language` does not narrow the rows: a German line spoken by
    /// "Noctis_DE" is found by that name whatever language the caller has
    /// selected. It only decides which language's rows come first.
    pub async fn search_by_speaker(
        &self,
        name: &str,
        language: Option<Language>,
        section: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<LineResult>> {
        if name.is_empty() {
            return Err(Error::InvalidQuery("speaker name is required".to_string()));
        }

        let mut qb = Self::select_lines("JOIN");
        qb.push(SPEAKER_NAME_FOR_ROW).push(" = ").push_bind(name);
        if let Some(section) = section {
            qb.push(" AND l.section = ").push_bind(section);
        }
        qb.push(" ORDER BY ");
        if let Some(language) = language {
            qb.push("l.language <> ").push_bind(language.code()).push(", ");
        }
        qb.push("l.section, l.language, l.id LIMIT ")
            .push_bind(effective_limit(limit, self.default_limit, self.max_results));

        let rows = qb
            .build_query_as::<SearchRow>()
            .fetch_all(self.db.pool())
            .await?;
        debug!("Speaker search {:?} matched {} rows", name, rows.len());

        Ok(rows
            .into_iter()
            .map(|row| self.into_result(row, name))
            .collect())
    }

    /// Distinct speaker names in one language, English when none is given
    pub async fn get_unique_characters(&self, language: Option<Language>) -> Result<Vec<String>> {
        let code = language.unwrap_or(Language::CANONICAL).code();
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT name FROM (
                SELECT CASE ?
                    WHEN 'us' THEN us_name
                    WHEN 'jp' THEN jp_name
                    WHEN 'de' THEN de_name
                    WHEN 'fr' THEN fr_name
                END AS name
                FROM speaker_mappings
            )
            WHERE name IS NOT NULL
            ORDER BY name
            "#,
        )
        .bind(code)
        .fetch_all(self.db.pool())
        .await?;
        Ok(names)
    }

    pub async fn get_stats(&self) -> Result<Stats> {
        let total_entries = self.db.count_lines().await?;
        Ok(Stats {
            total_entries,
            languages: self.db.language_counts().await?,
            sections: self.db.section_counts().await?,
            has_data: total_entries > 0,
        })
    }
}

/// Row limit for a query. A zero limit means "not given"; every limit is
/// capped at `max_results`.
fn effective_limit(limit: Option<usize>, default_limit: Option<usize>, max_results: usize) -> i64 {
    let requested = limit
        .filter(|&n| n > 0)
        .or(default_limit.filter(|&n| n > 0))
        .unwrap_or(max_results);
    requested.min(max_results) as i64
}

/// Escape LIKE wildcards so the text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SpeakerCatalog, SpeakerNames};
    use crate::db::test_support::setup_test_db;
    use crate::db::{DialogueLine, SectionUrl};

    const BASE: &str = "https://lines.test";

    fn line(id: &str, section: &str, language: Language, text: &str, speaker: &str) -> DialogueLine {
        let mut line = DialogueLine::new(id, section, language, text);
        line.speaker_id = Some(speaker.to_string());
        line
    }

    async fn seeded() -> (SearchEngine, tempfile::TempDir) {
        let (db, tmp) = setup_test_db().await;

        let mut speakers = SpeakerCatalog::new();
        speakers.insert(
            "noct".to_string(),
            SpeakerNames {
                us: Some("Noctis".to_string()),
                jp: Some("ノクティス".to_string()),
                de: Some("Noctis_DE".to_string()),
                fr: None,
            },
        );
        speakers.insert(
            "prom".to_string(),
            SpeakerNames {
                us: Some("Prompto".to_string()),
                ..Default::default()
            },
        );
        db.upsert_speaker_mappings(&speakers).await.unwrap();

        db.upsert_dialogue_lines(&[
            line("d1", "nowloading", Language::Us, "Hello there", "noct"),
            line("d1", "nowloading", Language::De, "Hallo", "noct"),
            line("d1", "nowloading", Language::Fr, "Bonjour", "noct"),
            line("d2", "dir/s1", Language::Us, "Say hello, Prompto", "prom"),
            line("d3", "dir/s1", Language::Us, "100% sure", "ghost"),
        ])
        .await
        .unwrap();
        db.upsert_section_urls(&[SectionUrl {
            section: "nowloading".to_string(),
            view_url: format!("{}/#/nowloading", BASE),
        }])
        .await
        .unwrap();

        (SearchEngine::new(db, &SearchConfig::default(), BASE), tmp)
    }

    #[tokio::test]
    async fn test_text_search_is_case_insensitive_and_ordered() {
        let (engine, _tmp) = seeded().await;
        let hits = engine.search("HELLO", None, None, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].section, "dir/s1");
        assert_eq!(hits[1].section, "nowloading");
        assert_eq!(hits[1].speaker_name, "Noctis");
        assert_eq!(hits[1].section_url, "https://lines.test/#/nowloading");
        // No stored URL: derived from the section name
        assert_eq!(hits[0].section_url, "https://lines.test/#/dir/s1");
    }

    #[tokio::test]
    async fn test_text_search_filters_and_limit() {
        let (engine, _tmp) = seeded().await;
        let hits = engine
            .search("hello", Some(Language::Us), Some("nowloading"), None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].dialogue_id, "d1");

        let hits = engine.search("o", None, None, Some(2)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_wildcards_match_literally() {
        let (engine, _tmp) = seeded().await;
        let hits = engine.search("100%", None, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].speaker_name, UNKNOWN_SPEAKER);
        assert!(engine.search("_", None, None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_localized_name_uses_sentinel() {
        let (engine, _tmp) = seeded().await;
        let hits = engine.search("Bonjour", None, None, None).await.unwrap();
        assert_eq!(hits[0].speaker_name, UNKNOWN_SPEAKER);
        assert_eq!(hits[0].speaker_id.as_deref(), Some("noct"));
    }

    #[tokio::test]
    async fn test_speaker_search_resolves_name_per_row() {
        let (engine, _tmp) = seeded().await;

        // German row matches the German name under any filter
        let hits = engine
            .search_by_speaker("Noctis_DE", None, None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].language, "de");
        assert_eq!(hits[0].speaker_name, "Noctis_DE");


        // The English name does not match the German row
        let hits = engine
            .search_by_speaker("Noctis", None, None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].language, "us");
    }

    #[tokio::test]
    async fn test_speaker_search_ignores_language_filter_for_matching() {
        let (engine, _tmp) = seeded().await;

        let hits = engine
            .search_by_speaker("Noctis_DE", Some(Language::Us), None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].language, "de");
        assert_eq!(hits[0].speaker_name, "Noctis_DE");

        // The English name still only matches the English row
        let hits = engine
            .search_by_speaker("Noctis", Some(Language::De), None, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].language, "us");
    }

    #[tokio::test]
    async fn test_speaker_search_puts_filter_language_first() {
        let (db, _tmp) = setup_test_db().await;
        let mut speakers = SpeakerCatalog::new();
        speakers.insert(
            "gla".to_string(),
            SpeakerNames {
                us: Some("Gladiolus".to_string()),
                de: Some("Gladiolus".to_string()),
                ..Default::default()
            },
        );
        db.upsert_speaker_mappings(&speakers).await.unwrap();
        db.upsert_dialogue_lines(&[
            line("g1", "camp", Language::De, "Los geht's", "gla"),
            line("g1", "camp", Language::Us, "Let's go", "gla"),
        ])
        .await
        .unwrap();
        let engine = SearchEngine::new(db, &SearchConfig::default(), BASE);

        let hits = engine
            .search_by_speaker("Gladiolus", Some(Language::Us), None, None)
            .await
            .unwrap();
        let languages: Vec<&str> = hits.iter().map(|h| h.language.as_str()).collect();
        assert_eq!(languages, vec!["us", "de"]);

        let hits = engine
            .search_by_speaker("Gladiolus", None, None, Some(1))
            .await
            .unwrap();
        assert_eq!(hits[0].language, "de");
    }

    #[tokio::test]
    async fn test_text_search_folds_non_ascii_case() {
        let (db, _tmp) = setup_test_db().await;
        db.upsert_dialogue_lines(&[
            line("u1", "s", Language::De, "Über alles", "noct"),
            line("u2", "s", Language::Fr, "ÉTAT critique", "noct"),
        ])
        .await
        .unwrap();
        let engine = SearchEngine::new(db, &SearchConfig::default(), BASE);

        let hits = engine.search("über", None, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Über alles");

        let hits = engine.search("état", None, None, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].dialogue_id, "u2");

        assert_eq!(engine.search("ÜBER", None, None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_queries_are_rejected() {
        let (engine, _tmp) = seeded().await;
        assert!(matches!(
            engine.search("", None, None, None).await,
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            engine.search_by_speaker("", None, None, None).await,
            Err(Error::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_unique_characters() {
        let (engine, _tmp) = seeded().await;
        assert_eq!(
            engine.get_unique_characters(None).await.unwrap(),
            vec!["Noctis", "Prompto"]
        );
        assert_eq!(
            engine.get_unique_characters(Some(Language::De)).await.unwrap(),
            vec!["Noctis_DE"]
        );
        assert!(engine
            .get_unique_characters(Some(Language::Fr))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let (engine, _tmp) = seeded().await;
        let stats = engine.get_stats().await.unwrap();
        assert!(stats.has_data);
        assert_eq!(stats.total_entries, 5);
        assert_eq!(stats.sections[0].section, "nowloading");
        assert_eq!(stats.sections[0].count, 3);
        let us = stats.languages.iter().find(|l| l.language == "us").unwrap();
        assert_eq!(us.count, 3);
        assert_eq!(us.language_name, "English");
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(effective_limit(None, None, 50), 50);
        assert_eq!(effective_limit(Some(0), None, 50), 50);
        assert_eq!(effective_limit(Some(10), None, 50), 10);
        assert_eq!(effective_limit(Some(500), None, 50), 50);
        assert_eq!(effective_limit(None, Some(20), 50), 20);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("a%b_c\\"), "a\\%b\\_c\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}

//! SQLite schema definition

/// SQL schema for the lines database
pub const SCHEMA_SQL: &str = r#"
-- Dialogue lines: one row per (dialogue id, language)
CREATE TABLE IF NOT EXISTS dialogue_lines (
    id TEXT NOT NULL,
    conversation_id TEXT,
    section TEXT NOT NULL,
    language TEXT NOT NULL,
    language_name TEXT NOT NULL,
    text TEXT NOT NULL,
    -- Unicode-lowercased text for case-insensitive search
    text_folded TEXT NOT NULL DEFAULT '',
    speaker_id TEXT,
    PRIMARY KEY (id, language)
);

-- Conversations: written once per list manifest
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    section TEXT NOT NULL
);

-- Speaker mappings: localized display names per speaker
CREATE TABLE IF NOT EXISTS speaker_mappings (
    speaker_id TEXT PRIMARY KEY,
    us_name TEXT,
    jp_name TEXT,
    de_name TEXT,
    fr_name TEXT
);

-- Section URLs: human-facing page per section
CREATE TABLE IF NOT EXISTS section_urls (
    section TEXT PRIMARY KEY,
    view_url TEXT NOT NULL
);

-- Extraction runs: tracking history
CREATE TABLE IF NOT EXISTS extraction_runs (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    status TEXT NOT NULL,
    resume INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    fail_count INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

-- Indexes for search and completeness queries
CREATE INDEX IF NOT EXISTS idx_lines_text ON dialogue_lines(text);
CREATE INDEX IF NOT EXISTS idx_lines_section ON dialogue_lines(section);
CREATE INDEX IF NOT EXISTS idx_lines_language ON dialogue_lines(language);
CREATE INDEX IF NOT EXISTS idx_lines_speaker ON dialogue_lines(speaker_id);
CREATE INDEX IF NOT EXISTS idx_lines_conversation ON dialogue_lines(conversation_id);
CREATE INDEX IF NOT EXISTS idx_lines_section_language ON dialogue_lines(section, language);
CREATE INDEX IF NOT EXISTS idx_conversations_section ON conversations(section);
CREATE INDEX IF NOT EXISTS idx_speaker_us ON speaker_mappings(us_name) WHERE us_name IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_speaker_jp ON speaker_mappings(jp_name) WHERE jp_name IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_speaker_de ON speaker_mappings(de_name) WHERE de_name IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_speaker_fr ON speaker_mappings(fr_name) WHERE fr_name IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_runs_started ON extraction_runs(started_at);
"#;

/// Indexes on columns that older databases gain through `LinesDb::migrate`
pub const POST_MIGRATION_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_lines_text_folded ON dialogue_lines(text_folded);
"#;

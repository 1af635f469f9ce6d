//! SQLite schema definition

/// SQL schema for the verse store
pub const SCHEMA_SQL: &str = r#"
-- Verses: one row per (translation, book, chapter, verse)
CREATE TABLE IF NOT EXISTS verses (
    translation TEXT NOT NULL,
    book TEXT NOT NULL,
    chapter INTEGER NOT NULL CHECK (chapter > 0),
    verse INTEGER NOT NULL CHECK (verse > 0),
    text TEXT NOT NULL,
    PRIMARY KEY (translation, book, chapter, verse)
);

-- Chapter lookups
CREATE INDEX IF NOT EXISTS idx_verses_lookup ON verses(translation, book, chapter);
"#;

use sqlx::SqlitePool;

// Schema definitions
pub const PHOTOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,

    -- Stored file
    filename TEXT NOT NULL,
    original_name TEXT NOT NULL,
    file_path TEXT NOT NULL UNIQUE,
    file_size INTEGER NOT NULL CHECK(file_size >= 0),
    mime_type TEXT NOT NULL,

    -- Extracted metadata
    capture_date DATE,
    width INTEGER,
    height INTEGER,
    camera_make TEXT,
    camera_model TEXT,

    -- System timestamps
    upload_date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

pub const SCHEMA_SQL: &[&str] = &[
    PHOTOS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photos_capture_date ON photos(capture_date);",
    "CREATE INDEX IF NOT EXISTS idx_photos_upload_date ON photos(upload_date);",
];

/// Safe to run on every startup.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for sql in SCHEMA_SQL {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}

use super::schema::{
    ClassificationResult, DocumentListResponse, DocumentRecord, ProcessingStatus, UploadRecord,
};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

const SELECT_COLUMNS: &str = "d.id, d.filename, d.mime_type, d.file_size, d.source, d.status,
     d.uploaded_at, d.blob_path, d.extracted_text, d.classification, d.error";

/// SQLite-backed metadata store keyed by upload id, with FTS5 keyword search
/// over filename, extracted text and classification tags.
pub struct DocumentIndex {
    conn: Arc<Mutex<Connection>>,
}

impl DocumentIndex {
    /// Open (or create) `documents.db` inside `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        let db_path = data_dir.join("documents.db");
        let conn = Connection::open(&db_path).context("Failed to open documents.db")?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA temp_store   = MEMORY;",
        )?;

        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory index")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id              TEXT PRIMARY KEY,
                filename        TEXT NOT NULL,
                mime_type       TEXT NOT NULL,
                file_size       INTEGER NOT NULL,
                source          TEXT NOT NULL,
                status          TEXT NOT NULL,
                uploaded_at     TEXT NOT NULL,
                blob_path       TEXT,
                extracted_text  TEXT,
                category        TEXT,
                tags            TEXT,
                classification  TEXT,
                error           TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_documents_uploaded ON documents(uploaded_at);
            CREATE INDEX IF NOT EXISTS idx_documents_category ON documents(category);

            CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
                filename, extracted_text, tags,
                content='documents', content_rowid='rowid'
            );

            CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
                INSERT INTO documents_fts(rowid, filename, extracted_text, tags)
                VALUES (new.rowid, new.filename, new.extracted_text, new.tags);
            END;

            CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, filename, extracted_text, tags)
                VALUES ('delete', old.rowid, old.filename, old.extracted_text, old.tags);
            END;

            CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, filename, extracted_text, tags)
                VALUES ('delete', old.rowid, old.filename, old.extracted_text, old.tags);
                INSERT INTO documents_fts(rowid, filename, extracted_text, tags)
                VALUES (new.rowid, new.filename, new.extracted_text, new.tags);
            END;",
        )
        .context("Failed to init document schema")?;
        Ok(())
    }

    /// Insert a freshly accepted upload. The blob path is attached once the
    /// payload has been written.
    pub fn insert(&self, record: &UploadRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO documents (id, filename, mime_type, file_size, source, status,
             uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.filename,
                record.mime_type,
                record.size as i64,
                record.source,
                record.status.as_str(),
                record.uploaded_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            ],
        )
        .context("Failed to insert document record")?;
        Ok(())
    }

    pub fn set_blob_path(&self, id: &str, blob_path: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE documents SET blob_path = ?1 WHERE id = ?2",
            params![blob_path, id],
        )?;
        if changed == 0 {
            bail!("document {id} not found");
        }
        Ok(())
    }

    pub fn set_status(&self, id: &str, status: ProcessingStatus) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            bail!("document {id} not found");
        }
        Ok(())
    }

    /// Record extraction and classification output and mark the document completed.
    pub fn complete(
        &self,
        id: &str,
        text: Option<&str>,
        classification: Option<&ClassificationResult>,
    ) -> Result<()> {
        let classification_json = classification
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialize classification")?;
        let category = classification.map(|c| c.category.as_str());
        // Category first so a search for the department name finds the document.
        let tags = classification.map(|c| {
            std::iter::once(c.category.as_str())
                .chain(c.tags.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        });

        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE documents SET status = ?1, extracted_text = ?2, category = ?3,
             tags = ?4, classification = ?5, error = NULL WHERE id = ?6",
            params![
                ProcessingStatus::Completed.as_str(),
                text,
                category,
                tags,
                classification_json,
                id
            ],
        )?;
        if changed == 0 {
            bail!("document {id} not found");
        }
        Ok(())
    }

    /// Mark the document `error`. The blob is discarded with it, so the path
    /// is cleared.
    pub fn fail(&self, id: &str, message: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE documents SET status = ?1, error = ?2, blob_path = NULL WHERE id = ?3",
            params![ProcessingStatus::Error.as_str(), message, id],
        )?;
        if changed == 0 {
            bail!("document {id} not found");
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents d WHERE d.id = ?1"
        ))?;
        let record = stmt
            .query_row(params![id], Self::row_to_record)
            .optional()
            .context("Failed to load document")?;
        Ok(record)
    }

    /// Newest first, optionally restricted to one category.
    pub fn list(
        &self,
        offset: usize,
        limit: usize,
        category: Option<&str>,
    ) -> Result<DocumentListResponse> {
        let conn = self.conn.lock();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents d WHERE (?1 IS NULL OR d.category = ?1)",
            params![category],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents d
             WHERE (?1 IS NULL OR d.category = ?1)
             ORDER BY d.uploaded_at DESC, d.rowid DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let documents = stmt
            .query_map(
                params![category, limit as i64, offset as i64],
                Self::row_to_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to list documents")?;

        Ok(DocumentListResponse {
            documents,
            total: total as usize,
            offset,
            limit,
        })
    }

    /// Keyword search over filename, extracted text and tags, best match first.
    /// Every word must match, case-insensitively, as a word prefix. A query
    /// with no searchable words falls back to [`list`](Self::list).
    pub fn search(
        &self,
        query: &str,
        category: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<DocumentListResponse> {
        let Some(fts_query) = fts_query(query) else {
            return self.list(offset, limit, category);
        };
        let conn = self.conn.lock();

        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents_fts
                 JOIN documents d ON d.rowid = documents_fts.rowid
                 WHERE documents_fts MATCH ?1 AND (?2 IS NULL OR d.category = ?2)",
                params![fts_query, category],
                |row| row.get(0),
            )
            .context("Failed to count search results")?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM documents_fts
             JOIN documents d ON d.rowid = documents_fts.rowid
             WHERE documents_fts MATCH ?1 AND (?2 IS NULL OR d.category = ?2)
             ORDER BY rank, d.uploaded_at DESC LIMIT ?3 OFFSET ?4"
        ))?;
        let documents = stmt
            .query_map(
                params![fts_query, category, limit as i64, offset as i64],
                Self::row_to_record,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to search documents")?;

        Ok(DocumentListResponse {
            documents,
            total: total as usize,
            offset,
            limit,
        })
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DocumentRecord> {
        let status: String = row.get(5)?;
        let status = status
            .parse::<ProcessingStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

        let uploaded_at: String = row.get(6)?;
        let uploaded_at = DateTime::parse_from_rfc3339(&uploaded_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

        let classification: Option<String> = row.get(9)?;
        let classification = classification
            .map(|json| serde_json::from_str::<ClassificationResult>(&json))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

        Ok(DocumentRecord {
            id: row.get(0)?,
            filename: row.get(1)?,
            mime_type: row.get(2)?,
            size: row.get::<_, i64>(3)? as u64,
            source: row.get(4)?,
            status,
            uploaded_at,
            blob_path: row.get(7)?,
            extracted_text: row.get(8)?,
            classification,
            error: row.get(10)?,
        })
    }
}

/// Quote each word so user input never reaches FTS5 query syntax, and match
/// it as a prefix. Words without any letter or digit are dropped.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|term| term.chars().any(char::is_alphanumeric))
        .map(|term| format!("\"{}\"*", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

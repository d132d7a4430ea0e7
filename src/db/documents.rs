//! Generic document primitives: get, upsert, insert-if-absent, delete and
//! equality query on a top-level field.

use super::{Database, now_ms};
use anyhow::{Result, anyhow};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Top-level JSON field names are interpolated into a JSON path, so only
/// identifier characters are accepted.
fn field_path(field: &str) -> Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(anyhow!("invalid document field name {field:?}"));
    }
    Ok(format!("$.{field}"))
}

impl Database {
    /// Fetch one document. `None` when absent.
    pub fn get_document<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<T>> {
        let body: Option<String> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Create or fully overwrite a document. Each write bumps its revision.
    pub fn upsert_document<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        record: &T,
    ) -> Result<()> {
        let body = serde_json::to_string(record)?;
        let now = now_ms();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, body, revision, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    body = excluded.body,
                    revision = documents.revision + 1,
                    updated_at = excluded.updated_at",
                params![collection, id, body, now],
            )?;
            Ok(())
        })
    }

    /// Insert a document unless one with the same id exists. Returns whether
    /// it was inserted.
    pub fn upsert_document_if_not_exists<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        record: &T,
    ) -> Result<bool> {
        let body = serde_json::to_string(record)?;
        let now = now_ms();
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO documents (collection, id, body, revision, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                params![collection, id, body, now],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Remove a document. Returns whether one existed.
    pub fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            Ok(deleted > 0)
        })
    }

    /// All documents whose top-level string `field` equals `value`, ordered by id.
    pub fn query_documents_where_equals<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>> {
        let path = field_path(field)?;
        let bodies: Vec<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT body FROM documents
                 WHERE collection = ?1 AND json_extract(body, ?2) = ?3
                 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![collection, path, value], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(rows)
        })?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Into::into))
            .collect()
    }

    /// Write counter of a document; `None` when absent.
    pub fn document_revision(&self, collection: &str, id: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT revision FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }
}

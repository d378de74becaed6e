use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{LawRepository, ReferenceRepository};
use crate::errors::{LawGraphError, Result};
use crate::ids::{LawId, PARAGRAPH_SEPARATOR};
use crate::law::{Era, Law, LawType};
use crate::types::{NodeKind, Reference, ReferenceKind, ReferenceNode};

/// The embedded SQL schema applied when opening a store.
const SCHEMA_SQL: &str = include_str!("schema.sql");

const REFERENCE_COLUMNS: &str = "id, source_kind, source_id, source_label, target_kind, target_id,
     target_label, reference_kind, source_text, confidence, metadata";

const LAW_COLUMNS: &str = "law_id, law_type, law_num, title, title_kana, abbreviation,
     era, year, num, promulgate_date";

/// Upsert that never lowers an existing confidence.
const UPSERT_REFERENCE: &str = "INSERT INTO law_references
        (id, source_kind, source_id, source_label, target_kind, target_id,
         target_label, reference_kind, source_text, confidence, metadata)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
     ON CONFLICT(id) DO UPDATE SET
         source_text = excluded.source_text,
         confidence = excluded.confidence,
         metadata = excluded.metadata
     WHERE excluded.confidence > law_references.confidence";

/// SQLite-backed reference and law store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> LawGraphError {
    move |e| LawGraphError::Database {
        message: e.to_string(),
        operation: operation.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

/// Maps a row from the `law_references` table to a `Reference`.
fn row_to_reference(row: &rusqlite::Row) -> rusqlite::Result<Reference> {
    let source_kind: String = row.get("source_kind")?;
    let target_kind: String = row.get("target_kind")?;
    let reference_kind: String = row.get("reference_kind")?;
    let metadata: String = row.get("metadata")?;

    let node_kind = |column: usize, kind: &str| {
        NodeKind::from_str(kind)
            .ok_or_else(|| conversion_error(column, format!("unknown node kind '{kind}'")))
    };

    Ok(Reference {
        id: row.get("id")?,
        source_node: ReferenceNode {
            kind: node_kind(1, &source_kind)?,
            id: row.get("source_id")?,
            text: row.get("source_label")?,
        },
        target_node: ReferenceNode {
            kind: node_kind(4, &target_kind)?,
            id: row.get("target_id")?,
            text: row.get("target_label")?,
        },
        reference_kind: ReferenceKind::from_str(&reference_kind).ok_or_else(|| {
            conversion_error(7, format!("unknown reference kind '{reference_kind}'"))
        })?,
        source_text: row.get("source_text")?,
        confidence: row.get("confidence")?,
        metadata: serde_json::from_str::<BTreeMap<String, String>>(&metadata)
            .map_err(|e| conversion_error(10, e.to_string()))?,
    })
}

/// Maps a row from the `laws` table to a `Law`.
fn row_to_law(row: &rusqlite::Row) -> rusqlite::Result<Law> {
    let law_id: String = row.get("law_id")?;
    let law_type: String = row.get("law_type")?;
    let era: String = row.get("era")?;
    let promulgate_date: Option<String> = row.get("promulgate_date")?;

    Ok(Law {
        law_id: LawId::new(&law_id).map_err(|e| conversion_error(0, e.to_string()))?,
        law_type: LawType::from_str(&law_type).unwrap_or(LawType::Other),
        law_num: row.get("law_num")?,
        title: row.get("title")?,
        title_kana: row.get("title_kana")?,
        abbreviation: row.get("abbreviation")?,
        era: Era::parse(&era)
            .ok_or_else(|| conversion_error(6, format!("unknown era '{era}'")))?,
        year: row.get("year")?,
        num: row.get("num")?,
        promulgate_date: promulgate_date
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
            .transpose()
            .map_err(|e| conversion_error(9, e.to_string()))?,
    })
}

fn insert_reference(conn: &Connection, reference: &Reference) -> Result<()> {
    let metadata = serde_json::to_string(&reference.metadata)?;
    conn.prepare_cached(UPSERT_REFERENCE)
        .and_then(|mut stmt| {
            stmt.execute(params![
                reference.id,
                reference.source_node.kind.as_str(),
                reference.source_node.id,
                reference.source_node.text,
                reference.target_node.kind.as_str(),
                reference.target_node.id,
                reference.target_node.text,
                reference.reference_kind.as_str(),
                reference.source_text,
                reference.confidence,
                metadata,
            ])
        })
        .map_err(db_error("save"))?;
    Ok(())
}

impl SqliteStore {
    /// Opens (or creates) a store at `db_path`, creating parent directories
    /// if needed, and applies the schema.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LawGraphError::Database {
                message: format!("failed to create database directory: {e}"),
                operation: "open".to_string(),
            })?;
        }
        let conn = Connection::open(db_path).map_err(db_error("open"))?;
        Self::initialize(conn)
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error("open_in_memory"))?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        Self::apply_pragmas(&conn)?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(db_error("apply_schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Applies performance-oriented SQLite pragmas.
    fn apply_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 120000;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -65536;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(db_error("apply_pragmas"))
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| LawGraphError::Database {
            message: "connection lock poisoned".to_string(),
            operation: operation.to_string(),
        })
    }

    /// Number of stored references.
    pub fn reference_count(&self) -> Result<usize> {
        let conn = self.lock("reference_count")?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM law_references", [], |row| row.get(0))
            .map_err(db_error("reference_count"))?;
        Ok(count as usize)
    }

    fn query_references(
        &self,
        operation: &'static str,
        filter: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<Reference>> {
        let conn = self.lock(operation)?;
        let sql = format!(
            "SELECT {REFERENCE_COLUMNS} FROM law_references WHERE {filter}
             ORDER BY source_id, reference_kind, target_id"
        );
        let mut stmt = conn.prepare_cached(&sql).map_err(db_error(operation))?;
        let rows = stmt
            .query_map(args, row_to_reference)
            .map_err(db_error(operation))?;
        let references = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error(operation))?;
        Ok(references)
    }
}

#[async_trait]
impl ReferenceRepository for SqliteStore {
    async fn find_incoming(&self, node_id: &str, min_confidence: f64) -> Result<Vec<Reference>> {
        self.query_references(
            "find_incoming",
            "target_id = ?1 AND confidence >= ?2",
            params![node_id, min_confidence],
        )
    }

    async fn find_incoming_under(
        &self,
        article_id: &str,
        min_confidence: f64,
    ) -> Result<Vec<Reference>> {
        // GLOB, unlike LIKE, treats '_' literally.
        let nested = format!("{article_id}{PARAGRAPH_SEPARATOR}*");
        self.query_references(
            "find_incoming_under",
            "(target_id = ?1 OR target_id GLOB ?2) AND confidence >= ?3",
            params![article_id, nested, min_confidence],
        )
    }

    async fn find_outgoing(&self, node_id: &str) -> Result<Vec<Reference>> {
        self.query_references("find_outgoing", "source_id = ?1", params![node_id])
    }

    async fn save(&self, reference: &Reference) -> Result<()> {
        let conn = self.lock("save")?;
        insert_reference(&conn, reference)
    }

    /// Saves a batch inside a single transaction.
    async fn save_all(&self, references: &[Reference]) -> Result<()> {
        let conn = self.lock("save_all")?;
        let tx = conn
            .unchecked_transaction()
            .map_err(db_error("save_all"))?;
        for reference in references {
            insert_reference(&tx, reference)?;
        }
        tx.commit().map_err(db_error("save_all"))
    }

    async fn delete(&self, reference_id: &str) -> Result<bool> {
        let conn = self.lock("delete")?;
        let deleted = conn
            .execute(
                "DELETE FROM law_references WHERE id = ?1",
                params![reference_id],
            )
            .map_err(db_error("delete"))?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl LawRepository for SqliteStore {
    async fn find_by_id(&self, law_id: &LawId) -> Result<Option<Law>> {
        let conn = self.lock("find_by_id")?;
        conn.query_row(
            &format!("SELECT {LAW_COLUMNS} FROM laws WHERE law_id = ?1"),
            params![law_id.as_str()],
            row_to_law,
        )
        .optional()
        .map_err(db_error("find_by_id"))
    }

    async fn find_all(&self) -> Result<Vec<Law>> {
        let conn = self.lock("find_all")?;
        let mut stmt = conn
            .prepare(&format!("SELECT {LAW_COLUMNS} FROM laws ORDER BY law_id"))
            .map_err(db_error("find_all"))?;
        let rows = stmt.query_map([], row_to_law).map_err(db_error("find_all"))?;
        let laws = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error("find_all"))?;
        Ok(laws)
    }

    async fn save_law(&self, law: &Law) -> Result<()> {
        let conn = self.lock("save_law")?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO laws ({LAW_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                law.law_id.as_str(),
                law.law_type.as_str(),
                law.law_num,
                law.title,
                law.title_kana,
                law.abbreviation,
                law.era.kanji(),
                law.year,
                law.num,
                law.promulgate_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
        )
        .map_err(db_error("save_law"))?;
        Ok(())
    }
}

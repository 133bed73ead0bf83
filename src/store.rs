// 🗄️ Document Store - bulk loader for shaped documents
// JSON documents in named collections, SQLite + WAL underneath
//
// Mirrors what the NDJSON output is imported into:
// - insert order = emission order
// - no dedup, no schema validation
// - every document gets an "_id" unless it already carries one

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Documents committed per SQLite transaction during bulk loads
const BATCH_SIZE: usize = 1_000;

pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    /// Open (or create) a store on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open document store: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_store(&conn)?;
        Ok(DocumentStore { conn })
    }

    /// Insert one document, returning its `_id`
    pub fn insert_one(&self, collection: &str, document: Value) -> Result<String> {
        insert_document(&self.conn, collection, document)
    }

    /// Insert documents in order. Returns how many were inserted.
    ///
    /// Commits every `BATCH_SIZE` documents; a failure part-way leaves the
    /// earlier batches in place.
    pub fn insert_many<I>(&mut self, collection: &str, documents: I) -> Result<usize>
    where
        I: IntoIterator<Item = Value>,
    {
        self.insert_results(collection, documents.into_iter().map(Ok))
    }

    /// Stream a newline-delimited JSON file into a collection
    pub fn load_json_lines<P: AsRef<Path>>(&mut self, collection: &str, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let display = path.display().to_string();

        let documents = BufReader::new(file)
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
            .map(move |(idx, line)| -> Result<Value> {
                let line = line.with_context(|| format!("Failed to read line {} of {}", idx + 1, display))?;
                serde_json::from_str(&line)
                    .with_context(|| format!("Failed to parse JSON on line {} of {}", idx + 1, display))
            });

        let inserted = self.insert_results(collection, documents)?;
        tracing::info!(collection, inserted, file = %path.display(), "loaded NDJSON");
        Ok(inserted)
    }

    /// Load a file holding one JSON array of documents
    pub fn load_json_array<P: AsRef<Path>>(&mut self, collection: &str, path: P) -> Result<usize> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let json: Value = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;

        let Value::Array(documents) = json else {
            bail!("{} does not hold a JSON array", path.display());
        };

        let inserted = self.insert_many(collection, documents)?;
        tracing::info!(collection, inserted, file = %path.display(), "loaded JSON array");
        Ok(inserted)
    }

    fn insert_results<I>(&mut self, collection: &str, documents: I) -> Result<usize>
    where
        I: Iterator<Item = Result<Value>>,
    {
        let mut inserted = 0;
        let mut tx = self.conn.transaction()?;

        for document in documents {
            insert_document(&tx, collection, document?)?;
            inserted += 1;

            if inserted % BATCH_SIZE == 0 {
                tx.commit()?;
                tx = self.conn.transaction()?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    pub fn count(&self, collection: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// First document inserted into a collection
    pub fn find_one(&self, collection: &str) -> Result<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 ORDER BY id LIMIT 1",
                params![collection],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| serde_json::from_str(&b).context("Failed to decode stored document"))
            .transpose()
    }

    /// Every document of a collection, in insertion order
    pub fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY id")?;

        let bodies = stmt
            .query_map(params![collection], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|b| serde_json::from_str(b).context("Failed to decode stored document"))
            .collect()
    }

    /// Look a document up by its `_id`
    pub fn find_by_id(&self, collection: &str, doc_id: &str) -> Result<Option<Value>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2",
                params![collection, doc_id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| serde_json::from_str(&b).context("Failed to decode stored document"))
            .transpose()
    }
}

pub fn setup_store(conn: &Connection) -> Result<()> {
    // In-memory databases stay in "memory" journal mode
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            doc_id TEXT NOT NULL,
            collection TEXT NOT NULL,
            body TEXT NOT NULL,
            inserted_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_doc_id ON documents(collection, doc_id)",
        [],
    )?;

    Ok(())
}

/// Assign an `_id` if missing and insert. Non-object documents are rejected.
fn insert_document(conn: &Connection, collection: &str, mut document: Value) -> Result<String> {
    if !document.is_object() {
        bail!("Only JSON objects can be stored, got: {}", document);
    }

    let existing = match document.get("_id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    let doc_id = match existing {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            document["_id"] = Value::String(id.clone());
            id
        }
    };

    let body = serde_json::to_string(&document)?;
    conn.execute(
        "INSERT INTO documents (doc_id, collection, body, inserted_at) VALUES (?1, ?2, ?3, ?4)",
        params![doc_id, collection, body, Utc::now().to_rfc3339()],
    )?;

    Ok(doc_id)
}

// ============================================================================
// TESTS
// ============================================================================

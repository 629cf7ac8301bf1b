//! Sqlite adapter for the listing store port.
//!
//! Single `listings` table; timestamps are stored as epoch milliseconds,
//! status as text. Row removal is real deletion, not tombstoning.

use std::{path::Path, sync::Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use dmb_core::{
    domain::{Listing, ListingId, ListingStatus, MessageId, NewListing, ThreadId, UserId},
    ports::{ListingPatch, ListingStore},
    Error, Result,
};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS listings (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  thread_id INTEGER NOT NULL,
  starter_message_id INTEGER NOT NULL,
  author_id INTEGER NOT NULL,
  title TEXT NOT NULL,
  category TEXT NOT NULL,
  description TEXT NOT NULL,
  image_url TEXT NOT NULL,
  status TEXT NOT NULL,
  created_at INTEGER NOT NULL,
  archived_at INTEGER,
  last_bump_at INTEGER
)";

pub struct SqliteListingStore {
    conn: Mutex<Connection>,
}

impl SqliteListingStore {
    pub fn open(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "opening listing store");
        let conn = Connection::open(path).map_err(store_err)?;
        Self::init(conn)
    }

    /// In-memory database, for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(store_err)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(store_err)?;
        conn.execute(SCHEMA, []).map_err(store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ListingStore for SqliteListingStore {
    fn insert(&self, rec: &NewListing) -> Result<ListingId> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO listings
               (thread_id, starter_message_id, author_id, title, category,
                description, image_url, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                rec.thread_id.0 as i64,
                rec.starter_message_id.0 as i64,
                rec.author_id.0 as i64,
                rec.title,
                rec.category,
                rec.description,
                rec.image_url,
                rec.status.as_str(),
                rec.created_at.timestamp_millis(),
            ],
        )
        .map_err(store_err)?;
        Ok(ListingId(conn.last_insert_rowid()))
    }

    fn get(&self, id: ListingId) -> Result<Option<Listing>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.query_row(
            "SELECT id, thread_id, starter_message_id, author_id, title, category,
                    description, image_url, status, created_at, archived_at, last_bump_at
             FROM listings WHERE id = ?1",
            params![id.0],
            row_to_listing,
        )
        .optional()
        .map_err(store_err)
    }

    fn update(&self, id: ListingId, patch: &ListingPatch) -> Result<()> {
        // Read-modify-write; the engine already serializes per listing id.
        let conn = self.conn.lock().expect("store mutex poisoned");
        let current = conn
            .query_row(
                "SELECT status, archived_at, last_bump_at FROM listings WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(store_err)?;

        let Some((status, archived_at, last_bump_at)) = current else {
            return Err(Error::Store(format!("no listing {id}")));
        };

        let status = patch
            .status
            .map(|s| s.as_str().to_string())
            .unwrap_or(status);
        let archived_at = match patch.archived_at {
            Some(v) => v.map(|t| t.timestamp_millis()),
            None => archived_at,
        };
        let last_bump_at = match patch.last_bump_at {
            Some(v) => v.map(|t| t.timestamp_millis()),
            None => last_bump_at,
        };

        conn.execute(
            "UPDATE listings SET status = ?2, archived_at = ?3, last_bump_at = ?4 WHERE id = ?1",
            params![id.0, status, archived_at, last_bump_at],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn delete(&self, id: ListingId) -> Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute("DELETE FROM listings WHERE id = ?1", params![id.0])
            .map_err(store_err)?;
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<Listing>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT id, thread_id, starter_message_id, author_id, title, category,
                        description, image_url, status, created_at, archived_at, last_bump_at
                 FROM listings ORDER BY id",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map([], row_to_listing)
            .map_err(store_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(store_err)?;
        Ok(rows)
    }
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<Listing> {
    let status_str: String = row.get(8)?;
    let status = ListingStatus::parse(&status_str).unwrap_or(ListingStatus::Active);

    Ok(Listing {
        id: ListingId(row.get::<_, i64>(0)?),
        thread_id: ThreadId(row.get::<_, i64>(1)? as u64),
        starter_message_id: MessageId(row.get::<_, i64>(2)? as u64),
        author_id: UserId(row.get::<_, i64>(3)? as u64),
        title: row.get(4)?,
        category: row.get(5)?,
        description: row.get(6)?,
        image_url: row.get(7)?,
        status,
        created_at: from_millis(row.get::<_, i64>(9)?),
        archived_at: row.get::<_, Option<i64>>(10)?.map(from_millis),
        last_bump_at: row.get::<_, Option<i64>>(11)?.map(from_millis),
    })
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

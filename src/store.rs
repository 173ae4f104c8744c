//! Read-only access to the message archive.
//!
//! [`MessageStore`] is the seam the engine reads through. [`SqliteStore`]
//! reads the exported archive database:
//!
//! - `contacts(phone_number, email, first_name, last_name, imessage_handle_id, sms_handle_id)`
//! - `messages(text, date_time, handle_id, is_from_me)`
//! - `attachment(filename)`, where `filename` holds the full path

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rusqlite::{Connection, OpenFlags, params, params_from_iter};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::warn;

use crate::contact::{Contact, HandleId};
use crate::error::StoreError;

/// Timestamp format of the `messages.date_time` column.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single message as stored in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: i64,
    pub handle_id: HandleId,
    pub timestamp: NaiveDateTime,
    /// Message body; empty when the archive had none.
    pub text: String,
    pub is_outgoing: bool,
}

/// A file attached to some message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Basename of `full_path`.
    pub filename: String,
    /// Path as stored; may start with `~`.
    pub full_path: String,
}

impl Attachment {
    pub fn from_path(full_path: impl Into<String>) -> Self {
        let full_path = full_path.into();
        let filename = Path::new(&full_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| full_path.clone());
        Self {
            filename,
            full_path,
        }
    }

    /// `full_path` with a leading `~` expanded to the home directory.
    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.full_path, dirs::home_dir())
    }
}

fn expand_home(path: &str, home: Option<PathBuf>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

/// Read interface over the archive.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Attachments whose stored path matches a SQL `LIKE` pattern.
    async fn list_attachments(&self, pattern: &str) -> Result<Vec<Attachment>, StoreError>;

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError>;

    /// Messages on any of `handle_ids`, ascending by timestamp then id.
    async fn list_messages(&self, handle_ids: &[HandleId]) -> Result<Vec<Message>, StoreError>;

    /// Every message with a non-empty body, ascending by timestamp then id.
    async fn list_text_messages(&self) -> Result<Vec<Message>, StoreError>;

    /// The newest message on each handle, newest first.
    async fn latest_per_handle(&self) -> Result<Vec<Message>, StoreError>;
}

/// [`MessageStore`] over an exported SQLite archive, opened read-only.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open the archive at `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the file is missing or cannot
    /// be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Unavailable(format!(
                "database not found at {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn read_messages(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Message>, StoreError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<HandleId>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<bool>>(4)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, handle_id, raw_date, text, is_outgoing) = row?;
            let (Some(handle_id), Some(raw_date)) = (handle_id, raw_date) else {
                warn!(id, "skipping message with missing handle or timestamp");
                continue;
            };
            match NaiveDateTime::parse_from_str(&raw_date, DATE_TIME_FORMAT) {
                Ok(timestamp) => messages.push(Message {
                    id,
                    handle_id,
                    timestamp,
                    text: text.unwrap_or_default(),
                    is_outgoing: is_outgoing.unwrap_or(false),
                }),
                Err(e) => {
                    warn!(id, raw_date = %raw_date, "skipping message with bad timestamp: {e}")
                }
            }
        }
        Ok(messages)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn list_attachments(&self, pattern: &str) -> Result<Vec<Attachment>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT filename FROM attachment
             WHERE filename IS NOT NULL AND filename LIKE ?1
             ORDER BY rowid",
        )?;
        let attachments = stmt
            .query_map(params![pattern], |row| row.get::<_, String>(0))?
            .map(|r| r.map(Attachment::from_path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attachments)
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT rowid, phone_number, email, first_name, last_name,
                    imessage_handle_id, sms_handle_id
             FROM contacts ORDER BY rowid",
        )?;
        let contacts = stmt
            .query_map(params![], |row| {
                let phone: Option<String> = row.get(1)?;
                let email: Option<String> = row.get(2)?;
                let handle_ids = [
                    row.get::<_, Option<HandleId>>(5)?,
                    row.get::<_, Option<HandleId>>(6)?,
                ]
                .into_iter()
                .flatten()
                .collect();
                Ok(Contact {
                    id: row.get(0)?,
                    identifier: phone.or(email),
                    first_name: row.get(3)?,
                    last_name: row.get(4)?,
                    handle_ids,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    async fn list_messages(&self, handle_ids: &[HandleId]) -> Result<Vec<Message>, StoreError> {
        if handle_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; handle_ids.len()].join(", ");
        let sql = format!(
            "SELECT rowid, handle_id, date_time, text, is_from_me
             FROM messages
             WHERE handle_id IN ({placeholders})
             ORDER BY date_time ASC, rowid ASC"
        );
        let conn = self.conn.lock().await;
        Self::read_messages(&conn, &sql, params_from_iter(handle_ids.iter()))
    }

    async fn list_text_messages(&self) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock().await;
        Self::read_messages(
            &conn,
            "SELECT rowid, handle_id, date_time, text, is_from_me
             FROM messages
             WHERE text IS NOT NULL AND text != ''
             ORDER BY date_time ASC, rowid ASC",
            params![],
        )
    }

    async fn latest_per_handle(&self) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock().await;
        Self::read_messages(
            &conn,
            "SELECT m.rowid, m.handle_id, m.date_time, m.text, m.is_from_me
             FROM messages m
             WHERE m.rowid = (
                 SELECT m2.rowid FROM messages m2
                 WHERE m2.handle_id = m.handle_id
                 ORDER BY m2.date_time DESC, m2.rowid DESC
                 LIMIT 1
             )
             ORDER BY m.date_time DESC, m.rowid DESC",
            params![],
        )
    }
}

// ============================================================================
// In-memory store (test only)
// ============================================================================

/// Vector-backed store for tests. `unavailable` makes every read fail.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    pub contacts: Vec<Contact>,
    pub messages: Vec<Message>,
    pub attachments: Vec<Attachment>,
    pub unavailable: bool,
}

#[cfg(test)]
impl MemoryStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Unavailable("test store offline".into()))
        } else {
            Ok(())
        }
    }

    fn sorted(mut messages: Vec<Message>) -> Vec<Message> {
        messages.sort_by_key(|m| (m.timestamp, m.id));
        messages
    }
}

#[cfg(test)]
#[async_trait]
impl MessageStore for MemoryStore {
    async fn list_attachments(&self, pattern: &str) -> Result<Vec<Attachment>, StoreError> {
        self.check()?;
        // Only the `%suffix` form of LIKE is needed here.
        let suffix = pattern.trim_start_matches('%').to_lowercase();
        Ok(self
            .attachments
            .iter()
            .filter(|a| a.full_path.to_lowercase().ends_with(&suffix))
            .cloned()
            .collect())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, StoreError> {
        self.check()?;
        Ok(self.contacts.clone())
    }

    async fn list_messages(&self, handle_ids: &[HandleId]) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        Ok(Self::sorted(
            self.messages
                .iter()
                .filter(|m| handle_ids.contains(&m.handle_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list_text_messages(&self) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        Ok(Self::sorted(
            self.messages
                .iter()
                .filter(|m| !m.text.is_empty())
                .cloned()
                .collect(),
        ))
    }

    async fn latest_per_handle(&self) -> Result<Vec<Message>, StoreError> {
        self.check()?;
        let mut latest: Vec<Message> = Vec::new();
        for m in Self::sorted(self.messages.clone()).into_iter().rev() {
            if !latest.iter().any(|l| l.handle_id == m.handle_id) {
                latest.push(m);
            }
        }
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "CREATE TABLE contacts (phone_number TEXT, email TEXT, first_name TEXT,
                                    last_name TEXT, imessage_handle_id INTEGER,
                                    sms_handle_id INTEGER);
             CREATE TABLE messages (text TEXT, date_time TEXT, handle_id INTEGER,
                                    is_from_me INTEGER);
             CREATE TABLE attachment (filename TEXT);

             INSERT INTO contacts VALUES ('+15551234567', NULL, 'Jane', 'Doe', 3, 4);
             INSERT INTO contacts VALUES (NULL, 'bob@example.com', 'Bob', NULL, NULL, 7);

             INSERT INTO messages VALUES ('second', '2024-02-02 09:00:00', 4, 0);
             INSERT INTO messages VALUES ('first', '2024-02-01 09:00:00', 3, 1);
             INSERT INTO messages VALUES (NULL, '2024-02-03 09:00:00', 3, 0);
             INSERT INTO messages VALUES ('bad date', '2023-13-45 25:00:00', 3, 0);
             INSERT INTO messages VALUES ('bob says hi', '2024-01-05 10:00:00', 7, 0);
             INSERT INTO messages VALUES ('same time a', '2024-02-02 09:00:00', 3, 1);

             INSERT INTO attachment VALUES ('~/Library/Messages/Attachments/aa/notecard biol.pdf');
             INSERT INTO attachment VALUES ('/tmp/photo.jpg');
             INSERT INTO attachment VALUES (NULL);
             INSERT INTO attachment VALUES ('/tmp/syllabus.PDF');",
        )
        .unwrap();
    }

    fn store() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        seed(&conn);
        SqliteStore::from_connection(conn)
    }

    #[test]
    fn test_attachment_from_path() {
        let a = Attachment::from_path("~/Library/Messages/x/notes.pdf");
        assert_eq!(a.filename, "notes.pdf");
        assert_eq!(a.full_path, "~/Library/Messages/x/notes.pdf");
    }

    #[test]
    fn test_expand_home() {
        let home = Some(PathBuf::from("/home/u"));
        assert_eq!(expand_home("~/a/b.pdf", home.clone()), PathBuf::from("/home/u/a/b.pdf"));
        assert_eq!(expand_home("~", home.clone()), PathBuf::from("/home/u"));
        assert_eq!(expand_home("/abs/b.pdf", home.clone()), PathBuf::from("/abs/b.pdf"));
        assert_eq!(expand_home("~other/b.pdf", home), PathBuf::from("~other/b.pdf"));
        assert_eq!(expand_home("~/a.pdf", None), PathBuf::from("~/a.pdf"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteStore::open(&dir.path().join("missing.db"));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_open_file_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.db");
        seed(&Connection::open(&path).unwrap());

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_contacts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_contacts() {
        let contacts = store().list_contacts().await.unwrap();
        assert_eq!(contacts[0].id, 1);
        assert_eq!(contacts[0].identifier.as_deref(), Some("+15551234567"));
        assert_eq!(contacts[0].handle_ids, vec![3, 4]);
        assert_eq!(contacts[1].identifier.as_deref(), Some("bob@example.com"));
        assert_eq!(contacts[1].last_name, None);
        assert_eq!(contacts[1].handle_ids, vec![7]);
    }

    #[tokio::test]
    async fn test_list_messages_orders_and_skips_bad_rows() {
        let messages = store().list_messages(&[3, 4]).await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        // Equal timestamps fall back to rowid; NULL text becomes empty.
        assert_eq!(texts, vec!["first", "second", "same time a", ""]);
        assert!(messages[0].is_outgoing);
        assert!(!messages[1].is_outgoing);
        assert!(store().list_messages(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_null_cells_skip_only_their_row() {
        let conn = Connection::open_in_memory().unwrap();
        seed(&conn);
        conn.execute_batch(
            "INSERT INTO messages VALUES ('no date', NULL, 3, 0);
             INSERT INTO messages VALUES ('no sender flag', '2024-02-04 09:00:00', 3, NULL);
             INSERT INTO messages VALUES ('no handle', '2024-02-05 09:00:00', NULL, 0);",
        )
        .unwrap();
        let store = SqliteStore::from_connection(conn);

        let texts: Vec<String> = store
            .list_messages(&[3, 4])
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "same time a", "", "no sender flag"]);

        let all = store.list_text_messages().await.unwrap();
        assert!(all.iter().all(|m| m.text != "no date" && m.text != "no handle"));
        let flagless = all.iter().find(|m| m.text == "no sender flag").unwrap();
        assert!(!flagless.is_outgoing);
    }

    #[tokio::test]
    async fn test_list_text_messages() {
        let messages = store().list_text_messages().await.unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].text, "bob says hi");
    }

    #[tokio::test]
    async fn test_latest_per_handle() {
        let latest = store().latest_per_handle().await.unwrap();
        let summary: Vec<(HandleId, &str)> =
            latest.iter().map(|m| (m.handle_id, m.text.as_str())).collect();
        assert_eq!(summary, vec![(3, ""), (4, "second"), (7, "bob says hi")]);
    }

    #[tokio::test]
    async fn test_list_attachments_like_pattern() {
        let pdfs = store().list_attachments("%.pdf").await.unwrap();
        let names: Vec<&str> = pdfs.iter().map(|a| a.filename.as_str()).collect();
        // SQLite LIKE is case-insensitive for ASCII.
        assert_eq!(names, vec!["notecard biol.pdf", "syllabus.PDF"]);
    }

    #[tokio::test]
    async fn test_missing_table_is_query_error() {
        let store = SqliteStore::from_connection(Connection::open_in_memory().unwrap());
        assert!(matches!(store.list_contacts().await, Err(StoreError::Query(_))));
    }
}

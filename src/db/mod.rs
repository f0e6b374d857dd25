// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Database module for users, mood entries and calendar events

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::mood::Mood;
use crate::{MindflowError, Result};

/// Database manager for MindFlow (thread-safe wrapper)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// A stored account, including its password hash
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An account as clients see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<UserRecord> for PublicUser {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

/// A timestamped mood label owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodEntry {
    pub id: String,
    pub user_id: String,
    pub mood: Mood,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A scheduled item annotated with the mood it is expected to bring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub time: String,
    pub predicted_mood: Mood,
    pub tag: String,
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub user_count: i64,
    pub mood_count: i64,
    pub event_count: i64,
}

/// Full dump for `db export`; password hashes are left out
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbExport {
    pub users: Vec<PublicUser>,
    pub moods: Vec<MoodEntry>,
    pub events: Vec<CalendarEvent>,
}

impl ToSql for Mood {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Mood {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Timestamps are stored as fixed-width UTC RFC 3339 so text order is time order
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

fn mood_from_row(row: &Row<'_>) -> rusqlite::Result<MoodEntry> {
    Ok(MoodEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        mood: row.get(2)?,
        note: row.get(3)?,
        timestamp: timestamp_column(row, 4)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        time: row.get(3)?,
        predicted_mood: row.get(4)?,
        tag: row.get(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

const USER_COLUMNS: &str = "id, email, password_hash, name, created_at";
const MOOD_COLUMNS: &str = "id, user_id, mood, note, timestamp";
const EVENT_COLUMNS: &str = "id, user_id, title, time, predicted_mood, tag";

impl Database {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.initialize()?;
        Ok(db)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MindflowError::Config("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS moods (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                mood TEXT NOT NULL,
                note TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                time TEXT NOT NULL,
                predicted_mood TEXT NOT NULL,
                tag TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_moods_user_time ON moods(user_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id);
        "#)?;
        Ok(())
    }

    // === Users ===

    /// Insert a new account; a taken email is a conflict
    pub fn insert_user(&self, email: &str, password_hash: &str, name: &str) -> Result<UserRecord> {
        let conn = self.lock_conn()?;
        let user = UserRecord {
            id: new_record_id(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO users (id, email, password_hash, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.id, user.email, user.password_hash, user.name, format_timestamp(&user.created_at)],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                MindflowError::Conflict("Email already registered".to_string())
            } else {
                e.into()
            }
        })?;
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        conn.query_row(&sql, params![email], user_from_row)
            .optional()
            .map_err(Into::into)
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        conn.query_row(&sql, params![id], user_from_row)
            .optional()
            .map_err(Into::into)
    }

    // === Moods ===

    pub fn insert_mood(
        &self,
        user_id: &str,
        mood: Mood,
        note: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<MoodEntry> {
        let conn = self.lock_conn()?;
        let entry = MoodEntry {
            id: new_record_id(),
            user_id: user_id.to_string(),
            mood,
            note: note.map(String::from),
            timestamp,
        };

        conn.execute(
            "INSERT INTO moods (id, user_id, mood, note, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![entry.id, entry.user_id, entry.mood, entry.note, format_timestamp(&entry.timestamp)],
        )?;
        Ok(entry)
    }

    /// All of a user's entries, newest first
    pub fn moods_for_user(&self, user_id: &str) -> Result<Vec<MoodEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM moods WHERE user_id = ?1 ORDER BY timestamp DESC, rowid DESC",
            MOOD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let moods = stmt
            .query_map(params![user_id], mood_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(moods)
    }

    /// A user's entries in `since..=until`, newest first
    pub fn moods_between(&self, user_id: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<MoodEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM moods WHERE user_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3 \
             ORDER BY timestamp DESC, rowid DESC",
            MOOD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let moods = stmt
            .query_map(
                params![user_id, format_timestamp(&since), format_timestamp(&until)],
                mood_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(moods)
    }

    /// Distinct UTC days up to `until` on which the user logged a mood, most recent first
    pub fn mood_days(&self, user_id: &str, until: DateTime<Utc>) -> Result<Vec<NaiveDate>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT substr(timestamp, 1, 10) AS day FROM moods \
             WHERE user_id = ?1 AND timestamp <= ?2 ORDER BY day DESC",
        )?;
        let days = stmt
            .query_map(params![user_id, format_timestamp(&until)], |row| {
                let raw: String = row.get(0)?;
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(days)
    }

    // === Events ===

    pub fn insert_event(
        &self,
        user_id: &str,
        title: &str,
        time: &str,
        predicted_mood: Mood,
        tag: &str,
    ) -> Result<CalendarEvent> {
        let conn = self.lock_conn()?;
        let event = CalendarEvent {
            id: new_record_id(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            time: time.to_string(),
            predicted_mood,
            tag: tag.to_string(),
        };

        conn.execute(
            "INSERT INTO events (id, user_id, title, time, predicted_mood, tag) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![event.id, event.user_id, event.title, event.time, event.predicted_mood, event.tag],
        )?;
        Ok(event)
    }

    /// A user's events in insertion order
    pub fn events_for_user(&self, user_id: &str) -> Result<Vec<CalendarEvent>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM events WHERE user_id = ?1 ORDER BY rowid", EVENT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![user_id], event_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    /// Look up an event only if `user_id` owns it
    pub fn find_event(&self, id: &str, user_id: &str) -> Result<Option<CalendarEvent>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM events WHERE id = ?1 AND user_id = ?2", EVENT_COLUMNS);
        conn.query_row(&sql, params![id, user_id], event_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Overwrite an owned event; false when nothing matched
    pub fn update_event(&self, event: &CalendarEvent) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            r#"UPDATE events SET title = ?3, time = ?4, predicted_mood = ?5, tag = ?6
               WHERE id = ?1 AND user_id = ?2"#,
            params![event.id, event.user_id, event.title, event.time, event.predicted_mood, event.tag],
        )?;
        Ok(changed > 0)
    }

    /// Delete an owned event; false when nothing matched
    pub fn delete_event(&self, id: &str, user_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "DELETE FROM events WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    // === Maintenance ===

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DbStats> {
        let conn = self.lock_conn()?;
        let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        let mood_count: i64 = conn.query_row("SELECT COUNT(*) FROM moods", [], |row| row.get(0))?;
        let event_count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(DbStats { user_count, mood_count, event_count })
    }

    pub fn export_all(&self) -> Result<DbExport> {
        let conn = self.lock_conn()?;

        let sql = format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], user_from_row)?
            .map(|r| r.map(PublicUser::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let sql = format!("SELECT {} FROM moods ORDER BY timestamp DESC, rowid DESC", MOOD_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let moods = stmt.query_map([], mood_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;

        let sql = format!("SELECT {} FROM events ORDER BY rowid", EVENT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt.query_map([], event_from_row)?.collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(DbExport { users, moods, events })
    }

    /// Vacuum database
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

/// Generate a new UUID for stored records
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_user(email: &str) -> (Database, UserRecord) {
        let db = Database::in_memory().unwrap();
        let user = db.insert_user(email, "hash", "Tester").unwrap();
        (db, user)
    }

    #[test]
    fn test_duplicate_email_conflicts() {
        let (db, _) = db_with_user("a@example.com");
        let err = db.insert_user("a@example.com", "other", "Other").unwrap_err();
        assert!(matches!(err, MindflowError::Conflict(_)));
    }

    #[test]
    fn test_find_user() {
        let (db, user) = db_with_user("a@example.com");
        let found = db.find_user_by_email("a@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "hash");
        assert!(db.find_user_by_email("b@example.com").unwrap().is_none());
        assert!(db.find_user_by_id(&user.id).unwrap().is_some());
    }

    #[test]
    fn test_moods_newest_first() {
        let (db, user) = db_with_user("a@example.com");
        let now = Utc::now();
        db.insert_mood(&user.id, Mood::Calm, None, now - Duration::hours(2)).unwrap();
        db.insert_mood(&user.id, Mood::Happy, Some("sunny"), now).unwrap();
        db.insert_mood(&user.id, Mood::Tired, None, now - Duration::days(1)).unwrap();

        let moods = db.moods_for_user(&user.id).unwrap();
        let labels: Vec<Mood> = moods.iter().map(|m| m.mood).collect();
        assert_eq!(labels, vec![Mood::Happy, Mood::Calm, Mood::Tired]);
        assert_eq!(moods[0].note.as_deref(), Some("sunny"));
    }

    #[test]
    fn test_moods_scoped_to_owner() {
        let (db, alice) = db_with_user("alice@example.com");
        let bob = db.insert_user("bob@example.com", "hash", "Bob").unwrap();
        db.insert_mood(&alice.id, Mood::Sad, None, Utc::now()).unwrap();

        assert_eq!(db.moods_for_user(&alice.id).unwrap().len(), 1);
        assert!(db.moods_for_user(&bob.id).unwrap().is_empty());
    }

    #[test]
    fn test_mood_requires_existing_user() {
        let db = Database::in_memory().unwrap();
        assert!(db.insert_mood("ghost", Mood::Calm, None, Utc::now()).is_err());
    }

    #[test]
    fn test_mood_days_distinct() {
        let (db, user) = db_with_user("a@example.com");
        let day = Utc::now();
        db.insert_mood(&user.id, Mood::Calm, None, day).unwrap();
        db.insert_mood(&user.id, Mood::Happy, None, day).unwrap();
        db.insert_mood(&user.id, Mood::Happy, None, day - Duration::days(3)).unwrap();

        db.insert_mood(&user.id, Mood::Sad, None, day + Duration::days(2)).unwrap();

        let days = db.mood_days(&user.id, day).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0], day.date_naive());

        let window = db.moods_between(&user.id, day - Duration::days(7), day).unwrap();
        assert_eq!(window.len(), 3);
        assert!(window.iter().all(|m| m.mood != Mood::Sad));
    }

    #[test]
    fn test_event_update_and_delete_are_owner_scoped() {
        let (db, alice) = db_with_user("alice@example.com");
        let bob = db.insert_user("bob@example.com", "hash", "Bob").unwrap();
        let mut event = db
            .insert_event(&alice.id, "Standup", "09:30", Mood::Neutral, Mood::Neutral.event_tag())
            .unwrap();

        assert!(db.find_event(&event.id, &bob.id).unwrap().is_none());
        assert!(!db.delete_event(&event.id, &bob.id).unwrap());

        event.title = "Retro".to_string();
        assert!(db.update_event(&event).unwrap());
        let stored = db.find_event(&event.id, &alice.id).unwrap().unwrap();
        assert_eq!(stored.title, "Retro");

        assert!(db.delete_event(&event.id, &alice.id).unwrap());
        assert!(db.events_for_user(&alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_events_keep_insertion_order() {
        let (db, user) = db_with_user("a@example.com");
        for title in ["first", "second", "third"] {
            db.insert_event(&user.id, title, "10:00", Mood::Calm, "Peaceful Time").unwrap();
        }
        let titles: Vec<String> = db.events_for_user(&user.id).unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_stats_and_export() {
        let (db, user) = db_with_user("a@example.com");
        db.insert_mood(&user.id, Mood::Calm, None, Utc::now()).unwrap();
        db.insert_event(&user.id, "Gym", "18:00", Mood::Energetic, "High Energy").unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!((stats.user_count, stats.mood_count, stats.event_count), (1, 1, 1));

        let export = db.export_all().unwrap();
        let json = serde_json::to_string(&export).unwrap();
        assert!(!json.contains("password"));
        assert_eq!(export.users[0].email, "a@example.com");
    }
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::categorizer::CategoryMapping;
use crate::error::{Result, TallyError};
use crate::models::{
    ActivityFilters, ActivityPage, ActivityPatch, ActivityRecord, Credential, FileUploadRecord,
    PageCursor,
};
use crate::store::ActivityStore;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS activities (
    id TEXT PRIMARY KEY,
    user TEXT NOT NULL,
    date TEXT NOT NULL,
    account TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    amount REAL NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_activities_user_date ON activities (user, date, id);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    user TEXT NOT NULL,
    checksum TEXT NOT NULL,
    start_date TEXT NOT NULL DEFAULT '',
    end_date TEXT NOT NULL DEFAULT '',
    import_date TEXT DEFAULT (datetime('now')),
    UNIQUE (user, checksum)
);

CREATE TABLE IF NOT EXISTS mappings (
    id INTEGER PRIMARY KEY,
    user TEXT NOT NULL,
    pattern TEXT NOT NULL,
    category TEXT NOT NULL,
    match_type TEXT NOT NULL DEFAULT 'contains',
    created_at TEXT DEFAULT (datetime('now'))
);
";

/// Days either side of a record searched for related activities.
pub const RELATED_ACTIVITY_DAYS: i64 = 7;

/// Separates the date and id halves of a page cursor.
const CURSOR_SEP: char = '\u{1f}';

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityRecord> {
    Ok(ActivityRecord::new(
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, f64>(4)?,
        row.get::<_, String>(5)?,
    ))
}

/// Activity store backed by a local SQLite file. Rows are partitioned by the credential's user.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = get_connection(db_path)?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_record(conn: &Connection, user: &str, id: &str) -> Result<ActivityRecord> {
        conn.query_row(
            "SELECT id, date, account, category, amount, description FROM activities \
             WHERE user = ?1 AND id = ?2",
            rusqlite::params![user, id],
            row_to_record,
        )
        .optional()?
        .ok_or_else(|| TallyError::NotFound(format!("activity {id}")))
    }

    pub fn add_mapping(&self, credential: &Credential, mapping: &CategoryMapping) -> Result<()> {
        self.conn().execute(
            "INSERT INTO mappings (user, pattern, category, match_type) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                credential.as_str(),
                mapping.pattern,
                mapping.category,
                mapping.match_type
            ],
        )?;
        Ok(())
    }

    /// Mappings in the order they were added; earlier ones take precedence.
    pub fn list_mappings(&self, credential: &Credential) -> Result<Vec<CategoryMapping>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT pattern, category, match_type FROM mappings WHERE user = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([credential.as_str()], |row| {
                Ok(CategoryMapping {
                    pattern: row.get(0)?,
                    category: row.get(1)?,
                    match_type: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn filter_clause(
        conn: &Connection,
        user: &str,
        filters: &ActivityFilters,
    ) -> Result<(String, Vec<Value>)> {
        let mut clauses = vec!["user = ?".to_string()];
        let mut params = vec![Value::Text(user.to_string())];

        if let Some(category) = &filters.category {
            clauses.push("category = ?".to_string());
            params.push(Value::Text(category.clone()));
        }
        if let Some(start) = &filters.start_date {
            clauses.push("date >= ?".to_string());
            params.push(Value::Text(start.clone()));
        }
        if let Some(end) = &filters.end_date {
            clauses.push("date <= ?".to_string());
            params.push(Value::Text(end.clone()));
        }
        if let Some(search) = &filters.description {
            clauses.push("instr(lower(description), ?) > 0".to_string());
            params.push(Value::Text(search.to_lowercase()));
        }
        if let Some(related_id) = &filters.related_to {
            let anchor = Self::get_record(conn, user, related_id)?;
            let date = NaiveDate::parse_from_str(&anchor.date, "%Y-%m-%d").map_err(|_| {
                TallyError::InvalidFilter(format!("activity {related_id} has no usable date"))
            })?;
            let from = date - Duration::days(RELATED_ACTIVITY_DAYS);
            let to = date + Duration::days(RELATED_ACTIVITY_DAYS);
            clauses.push("date BETWEEN ? AND ?".to_string());
            params.push(Value::Text(from.format("%Y-%m-%d").to_string()));
            params.push(Value::Text(to.format("%Y-%m-%d").to_string()));
            clauses.push("(amount = ? OR amount = ?)".to_string());
            params.push(Value::Real(anchor.amount));
            params.push(Value::Real(-anchor.amount));
            clauses.push("id <> ?".to_string());
            params.push(Value::Text(anchor.id));
        }
        Ok((clauses.join(" AND "), params))
    }

    fn query_page(
        &self,
        credential: &Credential,
        filters: &ActivityFilters,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<ActivityPage> {
        let conn = self.conn();
        let (mut clause, mut params) = Self::filter_clause(&conn, credential.as_str(), filters)?;
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            let (date, id) = cursor
                .as_str()
                .split_once(CURSOR_SEP)
                .ok_or_else(|| TallyError::InvalidFilter(format!("bad page cursor {cursor}")))?;
            clause.push_str(" AND (date < ? OR (date = ? AND id < ?))");
            params.push(Value::Text(date.to_string()));
            params.push(Value::Text(date.to_string()));
            params.push(Value::Text(id.to_string()));
        }
        let limit = if page_size == 0 {
            String::new()
        } else {
            // one extra row tells us whether another page exists
            format!(" LIMIT {}", page_size + 1)
        };
        let sql = format!(
            "SELECT id, date, account, category, amount, description FROM activities \
             WHERE {clause} ORDER BY date DESC, id DESC{limit}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut records = stmt
            .query_map(rusqlite::params_from_iter(params), row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let next_cursor = if page_size > 0 && records.len() > page_size {
            records.truncate(page_size);
            records
                .last()
                .map(|r| PageCursor::new(format!("{}{CURSOR_SEP}{}", r.date, r.id)))
        } else {
            None
        };
        debug!(
            "retrieved {} activities (more: {})",
            records.len(),
            next_cursor.is_some()
        );
        Ok(ActivityPage {
            records,
            next_cursor,
        })
    }
}

#[async_trait]
impl ActivityStore for SqliteStore {
    async fn retrieve_activities(
        &self,
        credential: &Credential,
        filters: &ActivityFilters,
        cursor: Option<&PageCursor>,
        page_size: usize,
    ) -> Result<ActivityPage> {
        self.query_page(credential, filters, cursor, page_size)
            .map_err(|e| match e {
                TallyError::Db(e) => TallyError::FetchFailed(e.to_string()),
                other => other,
            })
    }

    async fn submit_records(
        &self,
        credential: &Credential,
        records: &[ActivityRecord],
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO activities (id, user, date, account, category, amount, description) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                // ids only order records that share a date
                let id = format!("{}{}", record.date, Uuid::new_v4());
                stmt.execute(rusqlite::params![
                    id,
                    credential.as_str(),
                    record.date,
                    record.account,
                    record.category,
                    record.amount,
                    record.description,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    async fn delete_record(&self, credential: &Credential, id: &str) -> Result<()> {
        let deleted = self.conn().execute(
            "DELETE FROM activities WHERE user = ?1 AND id = ?2",
            rusqlite::params![credential.as_str(), id],
        )?;
        if deleted == 0 {
            return Err(TallyError::NotFound(format!("activity {id}")));
        }
        Ok(())
    }

    async fn update_record(
        &self,
        credential: &Credential,
        id: &str,
        patch: &ActivityPatch,
    ) -> Result<()> {
        let conn = self.conn();
        let updated = Self::get_record(&conn, credential.as_str(), id)?.with_patch(patch);
        conn.execute(
            "UPDATE activities \
             SET date = ?1, account = ?2, category = ?3, amount = ?4, description = ?5 \
             WHERE user = ?6 AND id = ?7",
            rusqlite::params![
                updated.date,
                updated.account,
                updated.category,
                updated.amount,
                updated.description,
                credential.as_str(),
                id,
            ],
        )?;
        Ok(())
    }

    async fn list_uploads(&self, credential: &Credential) -> Result<Vec<FileUploadRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT checksum, start_date, end_date FROM uploads WHERE user = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([credential.as_str()], |row| {
                Ok(FileUploadRecord {
                    checksum: row.get(0)?,
                    start_date: row.get(1)?,
                    end_date: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn record_upload(
        &self,
        credential: &Credential,
        upload: &FileUploadRecord,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO uploads (user, checksum, start_date, end_date) \
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                credential.as_str(),
                upload.checksum,
                upload.start_date,
                upload.end_date
            ],
        )?;
        Ok(())
    }
}

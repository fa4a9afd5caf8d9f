//! SQLite-backed stores for profiles and named batch jobs.
//!
//! Each store owns one connection behind a mutex, so every operation on a
//! store is linearized. Mutations additionally run in an immediate
//! transaction, and `profiles.name` carries a `UNIQUE` constraint, so two
//! processes sharing a database file cannot both create the same name.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::normalize;
use super::profile::{Profile, ProfileDraft};
use super::script::{BatchJobConfig, ProfileLookup};
use crate::error::{MappingError, Resource, Result, ValidationIssue};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const PROFILE_COLUMNS: &str = "id, name, description, fields, created_at, updated_at";

/// Durable collection of mapping profiles.
pub struct ProfileStore {
    conn: Mutex<Connection>,
}

impl ProfileStore {
    /// Open (or create) a profile database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(open_connection(path.as_ref())?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT NOT NULL UNIQUE,
                name         TEXT NOT NULL UNIQUE,
                description  TEXT,
                fields       TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persist a new profile, assigning its id and timestamps.
    pub fn create(&self, draft: ProfileDraft) -> Result<Profile> {
        let draft = draft.validated()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if name_taken(&tx, &draft.name, None)? {
            tracing::warn!(name = %draft.name, "rejected duplicate profile name");
            return Err(MappingError::DuplicateName(draft.name));
        }

        let now = timestamp();
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            name: draft.name,
            description: draft.description,
            fields: draft.fields,
            created_at: now,
            updated_at: now,
        };

        tx.execute(
            "INSERT INTO profiles (id, name, description, fields, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.id,
                profile.name,
                profile.description,
                serde_json::to_string(&profile.fields)?,
                format_ts(&profile.created_at),
                format_ts(&profile.updated_at),
            ],
        )
        .map_err(|e| duplicate_or(e, &profile.name))?;
        tx.commit()?;

        tracing::info!(id = %profile.id, name = %profile.name, "created profile");
        Ok(profile)
    }

    pub fn get(&self, id: &str) -> Result<Profile> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            params![id],
            row_to_profile,
        )
        .optional()?
        .ok_or_else(|| MappingError::not_found(Resource::Profile, id))
    }

    /// Replace a profile's content in place, keeping its id and creation time.
    pub fn update(&self, id: &str, draft: ProfileDraft) -> Result<Profile> {
        let draft = draft.validated()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let created_at = tx
            .query_row(
                "SELECT created_at FROM profiles WHERE id = ?1",
                params![id],
                |row| parse_ts(row, 0),
            )
            .optional()?
            .ok_or_else(|| MappingError::not_found(Resource::Profile, id))?;

        if name_taken(&tx, &draft.name, Some(id))? {
            tracing::warn!(name = %draft.name, "rejected duplicate profile name");
            return Err(MappingError::DuplicateName(draft.name));
        }

        let profile = Profile {
            id: id.to_string(),
            name: draft.name,
            description: draft.description,
            fields: draft.fields,
            created_at,
            updated_at: timestamp().max(created_at),
        };

        tx.execute(
            "UPDATE profiles
             SET name = ?2, description = ?3, fields = ?4, updated_at = ?5
             WHERE id = ?1",
            params![
                profile.id,
                profile.name,
                profile.description,
                serde_json::to_string(&profile.fields)?,
                format_ts(&profile.updated_at),
            ],
        )
        .map_err(|e| duplicate_or(e, &profile.name))?;
        tx.commit()?;

        tracing::info!(id = %profile.id, name = %profile.name, "updated profile");
        Ok(profile)
    }

    /// Remove a profile. Deleting an unknown or already-deleted id is an error.
    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let deleted = conn.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(MappingError::not_found(Resource::Profile, id));
        }
        tracing::info!(id, "deleted profile");
        Ok(())
    }

    /// All profiles in creation order.
    pub fn list(&self) -> Result<Vec<Profile>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY seq ASC"))?;
        let rows = stmt.query_map([], row_to_profile)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Case- and accent-insensitive substring search over name and description.
    pub fn search(&self, query: &str) -> Result<Vec<Profile>> {
        let needle = normalize::fold(query.trim());
        Ok(self
            .list()?
            .into_iter()
            .filter(|p| {
                normalize::fold(&p.name).contains(&needle)
                    || p.description
                        .as_deref()
                        .is_some_and(|d| normalize::fold(d).contains(&needle))
            })
            .collect())
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Profile>> {
        let conn = self.conn.lock();
        let profile = conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE name = ?1"),
                params![name.trim()],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }
}

impl ProfileLookup for ProfileStore {
    fn find_profile(&self, name: &str) -> Result<Option<Profile>> {
        self.find_by_name(name)
    }
}

/// A named batch job as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedJob {
    pub name: String,
    pub config: BatchJobConfig,
    pub saved_at: DateTime<Utc>,
}

/// Keyed store of batch job configurations, separate from profiles.
pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(open_connection(path.as_ref())?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS batch_jobs (
                name      TEXT PRIMARY KEY,
                config    TEXT NOT NULL,
                saved_at  TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Save (upsert) a job under `name`.
    pub fn save_job(&self, name: &str, config: &BatchJobConfig) -> Result<SavedJob> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MappingError::Validation(ValidationIssue::EmptyJobName));
        }
        let saved = SavedJob {
            name: name.to_string(),
            config: config.clone(),
            saved_at: timestamp(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO batch_jobs (name, config, saved_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name)
             DO UPDATE SET config = excluded.config,
                           saved_at = excluded.saved_at",
            params![
                saved.name,
                serde_json::to_string(&saved.config)?,
                format_ts(&saved.saved_at),
            ],
        )?;

        tracing::info!(job = %saved.name, profile = %saved.config.profile_name, "saved batch job");
        Ok(saved)
    }

    pub fn get_job(&self, name: &str) -> Result<SavedJob> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT name, config, saved_at FROM batch_jobs WHERE name = ?1",
            params![name.trim()],
            row_to_job,
        )
        .optional()?
        .ok_or_else(|| MappingError::not_found(Resource::Job, name))
    }

    /// All jobs ordered by name.
    pub fn list_jobs(&self) -> Result<Vec<SavedJob>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT name, config, saved_at FROM batch_jobs ORDER BY name ASC")?;
        let rows = stmt.query_map([], row_to_job)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;
    tracing::debug!(path = %path.display(), "opened database");
    Ok(conn)
}

fn name_taken(conn: &Connection, name: &str, except_id: Option<&str>) -> Result<bool> {
    let taken = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM profiles WHERE name = ?1 AND id IS NOT ?2)",
        params![name, except_id],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// A unique-constraint failure on insert/update means another writer won
/// the name.
fn duplicate_or(err: rusqlite::Error, name: &str) -> MappingError {
    if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
        MappingError::DuplicateName(name.to_string())
    } else {
        MappingError::Storage(err)
    }
}

/// Current time at microsecond precision, matching what storage keeps.
fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        fields: parse_json(row, 3)?,
        created_at: parse_ts(row, 4)?,
        updated_at: parse_ts(row, 5)?,
    })
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<SavedJob> {
    Ok(SavedJob {
        name: row.get(0)?,
        config: parse_json(row, 1)?,
        saved_at: parse_ts(row, 2)?,
    })
}

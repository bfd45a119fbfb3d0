//! SQLite adapter: accounts, sessions and prediction history.
//!
//! One append-only table per domain (`diabetes_predictions`,
//! `heart_disease_predictions`) plus `accounts`. Feature vectors are stored as
//! a keyed JSON object, votes as one integer column per model family.
//! Session tokens are stored as SHA-256 digests, never in clear.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex (from a panic
//! in another thread) causes a panic here as well; storage fails fast rather
//! than continuing on a connection in an unknown state.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::adapters::artifacts::sha256_hex;
use crate::domain::{
    Account, Domain, FeatureVector, ModelTag, NewAccount, PredictionRecord, RiskLevel,
    SessionToken, UserId, Votes,
};
use crate::ports::{AccountStore, PredictionPage, PredictionStore};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

fn table_for(domain: Domain) -> &'static str {
    match domain {
        Domain::Diabetes => "diabetes_predictions",
        Domain::HeartDisease => "heart_disease_predictions",
    }
}

fn timestamp(at: &DateTime<Utc>) -> String {
    // Fixed width so that text ordering matches time ordering.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp {raw:?}: {e}")))
}

fn session_digest(token: &SessionToken) -> String {
    sha256_hex(token.as_str().as_bytes())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Columns of one prediction row, before domain decoding.
struct RawPrediction {
    id: String,
    user_id: i64,
    domain: String,
    features: String,
    tabpfn: i64,
    xgb: i64,
    lgb: i64,
    risk: String,
    created_at: String,
}

impl RawPrediction {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            domain: row.get(2)?,
            features: row.get(3)?,
            tabpfn: row.get(4)?,
            xgb: row.get(5)?,
            lgb: row.get(6)?,
            risk: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_record(self) -> Result<PredictionRecord, StorageError> {
        let domain: Domain = self.domain.parse().map_err(StorageError::Serialization)?;
        let features: serde_json::Value = serde_json::from_str(&self.features)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let object = features.as_object().ok_or_else(|| {
            StorageError::Serialization(format!("features of {} are not an object", self.id))
        })?;
        let risk: RiskLevel = self.risk.parse().map_err(StorageError::Serialization)?;

        let votes: Votes = [
            (ModelTag::Tabpfn, self.tabpfn),
            (ModelTag::Xgb, self.xgb),
            (ModelTag::Lgb, self.lgb),
        ]
        .into_iter()
        .map(|(tag, v)| (tag, u8::from(v != 0)))
        .collect();

        Ok(PredictionRecord {
            id: self.id,
            user_id: UserId(self.user_id),
            domain,
            features: FeatureVector::from_json(domain, object),
            votes,
            risk,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// `SELECT` over one domain table, or over both when `domain` is `None`.
fn select_predictions(domain: Option<Domain>) -> String {
    let select_one = |d: Domain| {
        format!(
            "SELECT id, user_id, '{}' AS domain, features, tabpfn, xgb, lgb, risk, created_at \
             FROM {} WHERE user_id = ?1",
            d.as_str(),
            table_for(d)
        )
    };
    match domain {
        Some(d) => select_one(d),
        None => Domain::ALL
            .iter()
            .map(|d| select_one(*d))
            .collect::<Vec<_>>()
            .join(" UNION ALL "),
    }
}

impl SqliteStorage {
    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().expect("Lock failed");

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                session_digest TEXT UNIQUE,
                created_at TEXT NOT NULL
            );
            ",
        )?;

        for domain in Domain::ALL {
            let table = table_for(domain);
            conn.execute_batch(&format!(
                r"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    features TEXT NOT NULL,
                    tabpfn INTEGER NOT NULL,
                    xgb INTEGER NOT NULL,
                    lgb INTEGER NOT NULL,
                    risk TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_{table}_user_created
                    ON {table}(user_id, created_at DESC);
                "
            ))?;
        }

        Ok(())
    }
}

impl PredictionStore for SqliteStorage {
    type Error = StorageError;

    fn record(&self, record: &PredictionRecord) -> Result<(), Self::Error> {
        let features = serde_json::to_string(&record.features.to_json())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let vote = |tag| i64::from(record.votes.get(tag).unwrap_or(0));

        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            &format!(
                "INSERT INTO {} (id, user_id, features, tabpfn, xgb, lgb, risk, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                table_for(record.domain)
            ),
            params![
                record.id,
                record.user_id.0,
                features,
                vote(ModelTag::Tabpfn),
                vote(ModelTag::Xgb),
                vote(ModelTag::Lgb),
                record.risk.as_str(),
                timestamp(&record.created_at),
            ],
        )?;

        tracing::debug!(domain = %record.domain, risk = %record.risk, "Saved prediction {}", record.id);
        Ok(())
    }

    fn history(&self, user: UserId) -> Result<Vec<PredictionRecord>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let sql = format!("{} ORDER BY created_at ASC, id ASC", select_predictions(None));
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![user.0], RawPrediction::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawPrediction::into_record).collect()
    }

    fn history_page(
        &self,
        user: UserId,
        domain: Option<Domain>,
        offset: usize,
        limit: usize,
    ) -> Result<PredictionPage, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let base = select_predictions(domain);

        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM ({base})"),
            params![user.0],
            |row| row.get(0),
        )?;

        // Offsets past i64::MAX select nothing either way.
        let sql_offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let sql_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!("{base} ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![user.0, sql_limit, sql_offset],
                RawPrediction::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        let items = rows
            .into_iter()
            .map(RawPrediction::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PredictionPage::new(items, total_count as usize, offset, limit))
    }
}

impl AccountStore for SqliteStorage {
    type Error = StorageError;

    fn create_account(&self, account: &NewAccount) -> Result<UserId, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let inserted = conn.execute(
            "INSERT INTO accounts (email, name, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                account.email,
                account.name,
                account.password_hash,
                timestamp(&Utc::now()),
            ],
        );
        match inserted {
            Ok(_) => {
                let id = UserId(conn.last_insert_rowid());
                tracing::info!(user = %id, "Created account");
                Ok(id)
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StorageError::Conflict("email already registered".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        let row = conn
            .query_row(
                "SELECT id, email, name, password_hash, created_at FROM accounts WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, email, name, password_hash, created_at)| {
            Ok(Account {
                id: UserId(id),
                email,
                name,
                password_hash,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    fn set_session(&self, user: UserId, token: &SessionToken) -> Result<(), Self::Error> {
        let conn = self.conn.lock().expect("Lock failed");
        conn.execute(
            "UPDATE accounts SET session_digest = ?1 WHERE id = ?2",
            params![session_digest(token), user.0],
        )?;
        Ok(())
    }

    fn resolve_session(&self, token: &SessionToken) -> Result<Option<UserId>, Self::Error> {
        if token.as_str().is_empty() {
            return Ok(None);
        }
        let conn = self.conn.lock().expect("Lock failed");
        let id = conn
            .query_row(
                "SELECT id FROM accounts WHERE session_digest = ?1",
                params![session_digest(token)],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(UserId))
    }
}

//! SQLite storage backend built on `sqlx`.
//!
//! Timestamps are stored as Unix milliseconds and ids as hyphenated UUID text.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use uuid::Uuid;

use super::{CandidateStore, StoreError, TokenStore};
use crate::validation::phone_key;
use crate::models::{
    AuthToken, Candidate, CandidateId, ConsumeOutcome, NewAuthToken, NewCandidate, TokenId,
    TokenPurpose,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS candidates (
        id TEXT PRIMARY KEY NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        phone TEXT NOT NULL,
        phone_key TEXT NOT NULL UNIQUE,
        email TEXT UNIQUE,
        password_hash TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        experience_level TEXT,
        confidence_score INTEGER,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS auth_tokens (
        id TEXT PRIMARY KEY NOT NULL,
        candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
        token TEXT NOT NULL UNIQUE,
        purpose TEXT NOT NULL,
        expires_at INTEGER NOT NULL,
        consumed INTEGER NOT NULL DEFAULT 0,
        consumed_at INTEGER,
        metadata TEXT NOT NULL DEFAULT '{}',
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_auth_tokens_candidate_purpose
        ON auth_tokens(candidate_id, purpose, consumed)",
];

const CANDIDATE_COLUMNS: &str = "id, first_name, last_name, phone, email, password_hash, \
     is_active, experience_level, confidence_score, created_at, updated_at";

const TOKEN_COLUMNS: &str =
    "id, candidate_id, token, purpose, expires_at, consumed, consumed_at, metadata, created_at";

type CandidateRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    bool,
    Option<String>,
    Option<i64>,
    i64,
    i64,
);

type TokenRow = (
    String,
    String,
    String,
    String,
    i64,
    bool,
    Option<i64>,
    String,
    i64,
);

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Private in-memory database. A single connection keeps every query on
    /// the same database.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be opened or the schema fails.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open_with_pool_size("sqlite::memory:", 1).await
    }

    /// Open (creating if missing) the database at `url`, e.g. `sqlite://pocketsend.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be opened or the schema fails.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        Self::open_with_pool_size(url, 5).await
    }

    async fn open_with_pool_size(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives only as long as its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(backend)?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(backend)?;
        }

        info!("🗄️  SQLite store ready ({max_connections} connection(s))");
        Ok(Self { pool })
    }

    /// Number of candidate rows
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn candidate_count(&self) -> Result<usize, StoreError> {
        let (count,) = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM candidates")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        usize::try_from(count).map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn insert_token_in(
        tx: &mut Transaction<'_, Sqlite>,
        token: NewAuthToken,
    ) -> Result<TokenId, StoreError> {
        let id = TokenId::new();
        sqlx::query(
            "INSERT INTO auth_tokens(id,candidate_id,token,purpose,expires_at,consumed,metadata,created_at)
             VALUES(?,?,?,?,?,0,?,?)",
        )
        .bind(id.0.to_string())
        .bind(token.candidate_id.0.to_string())
        .bind(&token.token)
        .bind(token.purpose.as_str())
        .bind(token.expires_at.timestamp_millis())
        .bind(token.metadata.to_string())
        .bind(Utc::now().timestamp_millis())
        .execute(&mut **tx)
        .await
        .map_err(map_token_insert_error)?;
        Ok(id)
    }

    async fn invalidate_in(
        tx: &mut Transaction<'_, Sqlite>,
        candidate_id: CandidateId,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM auth_tokens WHERE candidate_id=? AND purpose=? AND consumed=0",
        )
        .bind(candidate_id.0.to_string())
        .bind(purpose.as_str())
        .execute(&mut **tx)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn fetch_candidate(
        &self,
        column: &str,
        value: String,
    ) -> Result<Option<Candidate>, StoreError> {
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE {column}=?");
        let row = sqlx::query_as::<_, CandidateRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(candidate_from_row).transpose()
    }
}

#[async_trait]
impl CandidateStore for SqliteStore {
    async fn find_candidate_by_id(&self, id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        self.fetch_candidate("id", id.0.to_string()).await
    }

    async fn find_candidate_by_phone(&self, phone: &str) -> Result<Option<Candidate>, StoreError> {
        self.fetch_candidate("phone_key", phone_key(phone)).await
    }

    async fn find_candidate_by_email(&self, email: &str) -> Result<Option<Candidate>, StoreError> {
        self.fetch_candidate("email", email.to_string()).await
    }

    async fn insert_candidate(&self, new: NewCandidate) -> Result<Candidate, StoreError> {
        let now = from_millis(Utc::now().timestamp_millis())?;
        let candidate = Candidate {
            id: CandidateId::new(),
            first_name: new.first_name,
            last_name: new.last_name,
            phone: new.phone,
            email: new.email,
            password_hash: new.password_hash,
            is_active: new.is_active,
            experience_level: None,
            confidence_score: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO candidates(id,first_name,last_name,phone,phone_key,email,password_hash,is_active,created_at,updated_at)
             VALUES(?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(candidate.id.0.to_string())
        .bind(&candidate.first_name)
        .bind(&candidate.last_name)
        .bind(&candidate.phone)
        .bind(phone_key(&candidate.phone))
        .bind(&candidate.email)
        .bind(&candidate.password_hash)
        .bind(candidate.is_active)
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
            _ => backend(e),
        })?;

        debug!("Inserted candidate {}", candidate.id);
        Ok(candidate)
    }

    async fn set_candidate_active(
        &self,
        id: CandidateId,
        active: bool,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE candidates SET is_active=?, updated_at=? WHERE id=?")
            .bind(active)
            .bind(Utc::now().timestamp_millis())
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn invalidate_unconsumed(
        &self,
        candidate_id: CandidateId,
        purpose: TokenPurpose,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let removed = Self::invalidate_in(&mut tx, candidate_id, purpose).await?;
        tx.commit().await.map_err(backend)?;
        Ok(removed)
    }

    async fn insert_token(&self, token: NewAuthToken) -> Result<TokenId, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let id = Self::insert_token_in(&mut tx, token).await?;
        tx.commit().await.map_err(backend)?;
        Ok(id)
    }

    async fn find_token_by_value(&self, value: &str) -> Result<Option<AuthToken>, StoreError> {
        let sql = format!("SELECT {TOKEN_COLUMNS} FROM auth_tokens WHERE token=?");
        let row = sqlx::query_as::<_, TokenRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(token_from_row).transpose()
    }

    async fn mark_consumed(
        &self,
        id: TokenId,
        consumed_at: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, StoreError> {
        let result =
            sqlx::query("UPDATE auth_tokens SET consumed=1, consumed_at=? WHERE id=? AND consumed=0")
                .bind(consumed_at.timestamp_millis())
                .bind(id.0.to_string())
                .execute(&self.pool)
                .await
                .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(ConsumeOutcome::Consumed);
        }

        // Lost the race or the row is gone; tell the two apart.
        let exists = sqlx::query_as::<_, (i64,)>("SELECT 1 FROM auth_tokens WHERE id=?")
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(if exists.is_some() {
            ConsumeOutcome::AlreadyConsumed
        } else {
            ConsumeOutcome::NotFound
        })
    }

    async fn issue(&self, token: NewAuthToken) -> Result<TokenId, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let removed = Self::invalidate_in(&mut tx, token.candidate_id, token.purpose).await?;
        let id = Self::insert_token_in(&mut tx, token).await?;
        tx.commit().await.map_err(backend)?;
        if removed > 0 {
            debug!("Issued token {id}, retired {removed} earlier token(s)");
        }
        Ok(id)
    }
}

#[allow(clippy::needless_pass_by_value)]
fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn map_token_insert_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateToken,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StoreError::NotFound,
        _ => backend(e),
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Backend(format!("timestamp out of range: {ms}")))
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn candidate_from_row(row: CandidateRow) -> Result<Candidate, StoreError> {
    let (
        id,
        first_name,
        last_name,
        phone,
        email,
        password_hash,
        is_active,
        experience_level,
        confidence_score,
        created_at,
        updated_at,
    ) = row;

    Ok(Candidate {
        id: CandidateId(parse_uuid(&id)?),
        first_name,
        last_name,
        phone,
        email,
        password_hash,
        is_active,
        experience_level,
        confidence_score: confidence_score.and_then(|s| i32::try_from(s).ok()),
        created_at: from_millis(created_at)?,
        updated_at: from_millis(updated_at)?,
    })
}

fn token_from_row(row: TokenRow) -> Result<AuthToken, StoreError> {
    let (id, candidate_id, token, purpose, expires_at, consumed, consumed_at, metadata, created_at) =
        row;

    let purpose = TokenPurpose::parse(&purpose)
        .ok_or_else(|| StoreError::Backend(format!("unknown token purpose: {purpose}")))?;
    let metadata =
        serde_json::from_str(&metadata).map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(AuthToken {
        id: TokenId(parse_uuid(&id)?),
        candidate_id: CandidateId(parse_uuid(&candidate_id)?),
        token,
        purpose,
        expires_at: from_millis(expires_at)?,
        consumed,
        consumed_at: consumed_at.map(from_millis).transpose()?,
        metadata,
        created_at: from_millis(created_at)?,
    })
}

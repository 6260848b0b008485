//! User persistence.
//!
//! Handlers talk to a [`UserStore`] so the Postgres pool can be swapped for an
//! in-memory store in router tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::io::ErrorKind;
use thiserror::Error;
use tracing::{Instrument, info_span};
use uuid::Uuid;

const UNDEFINED_DATABASE: &str = "3D000";
const UNDEFINED_TABLE: &str = "42P01";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database does not exist")]
    MissingDatabase,
    #[error("table does not exist")]
    MissingTable,
    #[error("database connection refused")]
    ConnectionRefused,
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
            sqlx::Error::Io(io) if io.kind() == ErrorKind::ConnectionRefused => {
                return Self::ConnectionRefused;
            }
            // the pool keeps retrying refused connections until the acquire timeout
            sqlx::Error::PoolTimedOut => return Self::ConnectionRefused,
            _ => None,
        };

        match code.as_deref() {
            Some(UNDEFINED_DATABASE) => Self::MissingDatabase,
            Some(UNDEFINED_TABLE) => Self::MissingTable,
            Some(UNIQUE_VIOLATION) => Self::DuplicateEmail,
            _ => Self::Other(err),
        }
    }
}

/// A user row ready to be inserted. `password_hash` is a PHC string.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Round-trip to the database and return its clock.
    async fn database_time(&self) -> Result<DateTime<Utc>, StoreError>;

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Insert a user. Fails with [`StoreError::DuplicateEmail`] if the email is
    /// already taken, even when a concurrent insert won the race.
    async fn insert_user(&self, user: NewUser<'_>) -> Result<UserRecord, StoreError>;
}

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn database_time(&self) -> Result<DateTime<Utc>, StoreError> {
        let query = "SELECT NOW() AS now";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.try_get("now")?)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS exists";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.try_get("exists")?)
    }

    async fn insert_user(&self, user: NewUser<'_>) -> Result<UserRecord, StoreError> {
        let query = "INSERT INTO users (email, password, first_name, last_name, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, NOW(), NOW()) \
                     RETURNING id, email, first_name, last_name, created_at";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.first_name)
            .bind(user.last_name)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(UserRecord::from_row(&row)?)
    }
}

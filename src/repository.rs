use crate::{
    models::{AccountKind, AccountRecord},
    password::{PasswordError, PasswordHasher},
};
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The credential store. Each account kind lives in its own table with its
/// own id space, so every method takes the kind alongside the id or username.
///
/// `Send + Sync + async_trait` lets the store be shared as `Arc<dyn Repository>`
/// across request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Existence lookup used by the access guard.
    async fn lookup(
        &self,
        kind: AccountKind,
        id: i32,
    ) -> Result<Option<AccountRecord>, RepositoryError>;

    /// Login lookup. Usernames are unique within a kind.
    async fn find_by_username(
        &self,
        kind: AccountKind,
        username: &str,
    ) -> Result<Option<AccountRecord>, RepositoryError>;

    /// Inserts an account and returns it with its assigned id.
    async fn create_account(
        &self,
        kind: AccountKind,
        username: &str,
        password_hash: &str,
    ) -> Result<AccountRecord, RepositoryError>;

    /// Replaces the stored hash. Returns false when no such account exists.
    async fn update_password(
        &self,
        kind: AccountKind,
        id: i32,
        password_hash: &str,
    ) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the credential store across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// `Repository` backed by the `students`, `staff` and `admins` tables, each
/// with columns `id SERIAL PRIMARY KEY, username TEXT UNIQUE, password TEXT`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn lookup(
        &self,
        kind: AccountKind,
        id: i32,
    ) -> Result<Option<AccountRecord>, RepositoryError> {
        // Table names come from a closed enum, never from input.
        let sql = format!("SELECT id, username, password FROM {} WHERE id = $1", kind.table());
        let record = sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_by_username(
        &self,
        kind: AccountKind,
        username: &str,
    ) -> Result<Option<AccountRecord>, RepositoryError> {
        let sql = format!(
            "SELECT id, username, password FROM {} WHERE username = $1",
            kind.table()
        );
        let record = sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn create_account(
        &self,
        kind: AccountKind,
        username: &str,
        password_hash: &str,
    ) -> Result<AccountRecord, RepositoryError> {
        let sql = format!(
            "INSERT INTO {} (username, password) VALUES ($1, $2) RETURNING id, username, password",
            kind.table()
        );
        let record = sqlx::query_as::<_, AccountRecord>(&sql)
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn update_password(
        &self,
        kind: AccountKind,
        id: i32,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let sql = format!("UPDATE {} SET password = $1 WHERE id = $2", kind.table());
        let result = sqlx::query(&sql)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// MemoryRepository
///
/// In-process `Repository` used by the test suites and by local runs without
/// `DATABASE_URL`. Ids are assigned per kind starting at 1.
#[derive(Default)]
pub struct MemoryRepository {
    accounts: RwLock<HashMap<AccountKind, Vec<AccountRecord>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record with a caller-chosen id, replacing any record with that id.
    pub fn insert(&self, kind: AccountKind, record: AccountRecord) {
        let mut accounts = self.accounts.write();
        let table = accounts.entry(kind).or_default();
        table.retain(|existing| existing.id != record.id);
        table.push(record);
    }

    /// Deletes an account. Returns false if it was not present.
    pub fn remove(&self, kind: AccountKind, id: i32) -> bool {
        let mut accounts = self.accounts.write();
        let Some(table) = accounts.get_mut(&kind) else {
            return false;
        };
        let before = table.len();
        table.retain(|existing| existing.id != id);
        table.len() != before
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn lookup(
        &self,
        kind: AccountKind,
        id: i32,
    ) -> Result<Option<AccountRecord>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .get(&kind)
            .and_then(|table| table.iter().find(|r| r.id == id).cloned()))
    }

    async fn find_by_username(
        &self,
        kind: AccountKind,
        username: &str,
    ) -> Result<Option<AccountRecord>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .get(&kind)
            .and_then(|table| table.iter().find(|r| r.username == username).cloned()))
    }

    async fn create_account(
        &self,
        kind: AccountKind,
        username: &str,
        password_hash: &str,
    ) -> Result<AccountRecord, RepositoryError> {
        let mut accounts = self.accounts.write();
        let table = accounts.entry(kind).or_default();
        let id = table.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let record = AccountRecord {
            id,
            username: username.to_string(),
            password: password_hash.to_string(),
        };
        table.push(record.clone());
        Ok(record)
    }

    async fn update_password(
        &self,
        kind: AccountKind,
        id: i32,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut accounts = self.accounts.write();
        let record = accounts
            .get_mut(&kind)
            .and_then(|table| table.iter_mut().find(|r| r.id == id));
        match record {
            Some(record) => {
                record.password = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// seed_admin
///
/// Creates the bootstrap admin account unless an admin with that username
/// already exists. Returns the existing or newly created record.
pub async fn seed_admin(
    repo: &dyn Repository,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<AccountRecord, SeedError> {
    if let Some(existing) = repo.find_by_username(AccountKind::Admin, username).await? {
        tracing::debug!(username, "bootstrap admin already present");
        return Ok(existing);
    }

    let hash = hasher.hash(password)?;
    let record = repo
        .create_account(AccountKind::Admin, username, &hash)
        .await?;
    tracing::info!(username, id = record.id, "bootstrap admin created");
    Ok(record)
}

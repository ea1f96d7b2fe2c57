//! User persistence on top of `PoolManager::execute`.

use std::sync::Arc;

use thiserror::Error;

use crate::db::{PoolManager, SqlValue};
use crate::error::DbError;
use crate::users::model::{NewUser, User};
use crate::users::password;

const SELECT_BY_EMAIL: &str =
    "SELECT id, username, email, password, created_at FROM users WHERE email = ?";
const SELECT_ALL: &str = "SELECT id, username, email, created_at FROM users ORDER BY id DESC";
const INSERT_USER: &str = "INSERT INTO users (username, email, password) VALUES (?, ?, ?)";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("A user with these details already exists")]
    Duplicate,

    #[error("{0}")]
    Invalid(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, UserError>;

#[derive(Clone)]
pub struct UserRepository {
    pool: Arc<PoolManager>,
}

impl UserRepository {
    pub fn new(pool: Arc<PoolManager>) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one(SELECT_BY_EMAIL, email.into()).await
    }

    /// All users, newest first, without password hashes.
    pub async fn list(&self) -> Result<Vec<User>> {
        let rows = self.pool.execute(SELECT_ALL, &[]).await?;
        Ok(rows.rows.iter().filter_map(User::from_row).collect())
    }

    pub async fn create(&self, input: NewUser) -> Result<User> {
        input.validate().map_err(UserError::Invalid)?;

        if self.find_by_email(&input.email).await?.is_some() {
            return Err(UserError::EmailTaken);
        }

        let plain = input.password.clone();
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain))
            .await
            .map_err(|e| UserError::Hashing(e.to_string()))?
            .map_err(UserError::Hashing)?;

        let params: [SqlValue; 3] = [
            (&input.username).into(),
            (&input.email).into(),
            hash.into(),
        ];
        let done = match self.pool.execute(INSERT_USER, &params).await {
            Ok(done) => done,
            Err(DbError::Duplicate(msg)) if msg.contains("email") => {
                return Err(UserError::EmailTaken)
            }
            Err(DbError::Duplicate(_)) => return Err(UserError::Duplicate),
            Err(e) => return Err(e.into()),
        };

        let id = done
            .last_insert_id
            .and_then(|id| i64::try_from(id).ok())
            .ok_or_else(|| DbError::query("Failed to insert user into database"))?;

        tracing::info!(user_id = id, "User created");
        Ok(User {
            id,
            username: input.username,
            email: input.email,
            password_hash: None,
            created_at: None,
        })
    }

    /// The user whose email and password match, if any.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Option<User>> {
        let Some(mut user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        let Some(stored) = user.password_hash.take() else {
            return Ok(None);
        };

        let plain = password.to_string();
        let matches = tokio::task::spawn_blocking(move || password::verify_password(&plain, &stored))
            .await
            .map_err(|e| UserError::Hashing(e.to_string()))?;

        Ok(matches.then_some(user))
    }

    async fn find_one(&self, sql: &str, key: SqlValue) -> Result<Option<User>> {
        let rows = self.pool.execute(sql, &[key]).await?;
        Ok(rows.first().and_then(User::from_row))
    }
}

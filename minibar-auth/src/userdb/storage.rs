use sqlx::{Pool, Postgres, Row, Sqlite};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;

use super::errors::UserError;
use super::types::User;
use crate::storage::{DB_TABLE_USERS, GENERIC_DATA_STORE};

pub(crate) struct UserStore;

impl UserStore {
    pub(crate) async fn init() -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            create_tables_sqlite(pool).await
        } else if let Some(pool) = store.as_postgres() {
            create_tables_postgres(pool).await
        } else {
            Err(UserError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn get_user(id: &str) -> Result<Option<User>, UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_user_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            get_user_postgres(pool, id).await
        } else {
            Err(UserError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn get_user_by_username(username: &str) -> Result<Option<User>, UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_user_by_username_sqlite(pool, username).await
        } else if let Some(pool) = store.as_postgres() {
            get_user_by_username_postgres(pool, username).await
        } else {
            Err(UserError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn upsert_user(user: &User) -> Result<(), UserError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            upsert_user_sqlite(pool, user).await
        } else if let Some(pool) = store.as_postgres() {
            upsert_user_postgres(pool, user).await
        } else {
            Err(UserError::Storage("Unsupported database type".into()))
        }
    }
}

fn map_row_sqlite(row: &SqliteRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_row_postgres(row: &PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        created_at: row.try_get("created_at")?,
    })
}

// SQLite implementations

async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), UserError> {
    let table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY NOT NULL,
            username TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn get_user_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<Option<User>, UserError> {
    let table = DB_TABLE_USERS.as_str();

    let row = sqlx::query(&format!("SELECT * FROM {table} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| UserError::Storage(e.to_string()))?;

    row.map(|r| map_row_sqlite(&r))
        .transpose()
        .map_err(|e| UserError::Storage(e.to_string()))
}

async fn get_user_by_username_sqlite(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, UserError> {
    let table = DB_TABLE_USERS.as_str();

    let row = sqlx::query(&format!("SELECT * FROM {table} WHERE username = ?"))
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(|e| UserError::Storage(e.to_string()))?;

    row.map(|r| map_row_sqlite(&r))
        .transpose()
        .map_err(|e| UserError::Storage(e.to_string()))
}

async fn upsert_user_sqlite(pool: &Pool<Sqlite>, user: &User) -> Result<(), UserError> {
    let table = DB_TABLE_USERS.as_str();

    // Conflict resolution on the id only; a username collision must surface
    // as an error, not replace the other account's row
    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (id, username, created_at)
        VALUES (?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username
        "#
    ))
    .bind(&user.id)
    .bind(&user.username)
    .bind(user.created_at)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

// PostgreSQL implementations

async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), UserError> {
    let table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY NOT NULL,
            username TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

async fn get_user_postgres(pool: &Pool<Postgres>, id: &str) -> Result<Option<User>, UserError> {
    let table = DB_TABLE_USERS.as_str();

    let row = sqlx::query(&format!("SELECT * FROM {table} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| UserError::Storage(e.to_string()))?;

    row.map(|r| map_row_postgres(&r))
        .transpose()
        .map_err(|e| UserError::Storage(e.to_string()))
}

async fn get_user_by_username_postgres(
    pool: &Pool<Postgres>,
    username: &str,
) -> Result<Option<User>, UserError> {
    let table = DB_TABLE_USERS.as_str();

    let row = sqlx::query(&format!("SELECT * FROM {table} WHERE username = $1"))
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(|e| UserError::Storage(e.to_string()))?;

    row.map(|r| map_row_postgres(&r))
        .transpose()
        .map_err(|e| UserError::Storage(e.to_string()))
}

async fn upsert_user_postgres(pool: &Pool<Postgres>, user: &User) -> Result<(), UserError> {
    let table = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (id, username, created_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username
        "#
    ))
    .bind(&user.id)
    .bind(&user.username)
    .bind(user.created_at)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

use sqlx::{Pool, Postgres, Row, Sqlite};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;

use crate::passkey::errors::PasskeyError;
use crate::passkey::types::{PasskeyCredential, Subject};
use crate::storage::{DB_TABLE_PASSKEY_CREDENTIALS, GENERIC_DATA_STORE};

pub(crate) struct CredentialStore;

impl CredentialStore {
    pub(crate) async fn init() -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            create_tables_sqlite(pool).await
        } else if let Some(pool) = store.as_postgres() {
            create_tables_postgres(pool).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Insert a credential, replacing any existing row with the same id.
    pub(crate) async fn upsert_credential(
        credential: &PasskeyCredential,
    ) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            upsert_credential_sqlite(pool, credential).await
        } else if let Some(pool) = store.as_postgres() {
            upsert_credential_postgres(pool, credential).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Look up a credential by its stored id. Exact match only; tolerant
    /// matching lives in the authentication path.
    pub(crate) async fn get_credential(
        credential_id: &str,
    ) -> Result<Option<PasskeyCredential>, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credential_sqlite(pool, credential_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_credential_postgres(pool, credential_id).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn get_credentials_for(
        subject: &Subject,
    ) -> Result<Vec<PasskeyCredential>, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_credentials_for_sqlite(pool, &subject.storage_key()).await
        } else if let Some(pool) = store.as_postgres() {
            get_credentials_for_postgres(pool, &subject.storage_key()).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn get_all_credentials() -> Result<Vec<PasskeyCredential>, PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_all_credentials_sqlite(pool).await
        } else if let Some(pool) = store.as_postgres() {
            get_all_credentials_postgres(pool).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    pub(crate) async fn update_credential_counter(
        credential_id: &str,
        counter: u32,
    ) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            update_counter_sqlite(pool, credential_id, counter).await
        } else if let Some(pool) = store.as_postgres() {
            update_counter_postgres(pool, credential_id, counter).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    /// Rewrite a stored credential id in place. Used to migrate rows written
    /// in a legacy encoding to the canonical form.
    pub(crate) async fn rewrite_credential_id(
        old_id: &str,
        new_id: &str,
    ) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            rewrite_credential_id_sqlite(pool, old_id, new_id).await
        } else if let Some(pool) = store.as_postgres() {
            rewrite_credential_id_postgres(pool, old_id, new_id).await
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }

    #[cfg(test)]
    pub(crate) async fn delete_credentials_for(subject: &Subject) -> Result<(), PasskeyError> {
        let store = GENERIC_DATA_STORE.lock().await;
        let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

        if let Some(pool) = store.as_sqlite() {
            sqlx::query(&format!("DELETE FROM {table} WHERE subject = ?"))
                .bind(subject.storage_key())
                .execute(pool)
                .await
                .map_err(|e| PasskeyError::Storage(e.to_string()))?;
            Ok(())
        } else if let Some(pool) = store.as_postgres() {
            sqlx::query(&format!("DELETE FROM {table} WHERE subject = $1"))
                .bind(subject.storage_key())
                .execute(pool)
                .await
                .map_err(|e| PasskeyError::Storage(e.to_string()))?;
            Ok(())
        } else {
            Err(PasskeyError::Storage("Unsupported database type".into()))
        }
    }
}

fn map_row_sqlite(row: &SqliteRow) -> Result<PasskeyCredential, sqlx::Error> {
    Ok(PasskeyCredential {
        credential_id: row.try_get("credential_id")?,
        subject: row.try_get("subject")?,
        public_key: row.try_get("public_key")?,
        counter: row.try_get::<i64, _>("counter")? as u32,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_row_postgres(row: &PgRow) -> Result<PasskeyCredential, sqlx::Error> {
    Ok(PasskeyCredential {
        credential_id: row.try_get("credential_id")?,
        subject: row.try_get("subject")?,
        public_key: row.try_get("public_key")?,
        counter: row.try_get::<i64, _>("counter")? as u32,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// SQLite implementations

async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            subject TEXT NOT NULL,
            public_key TEXT NOT NULL,
            counter BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_subject ON {table}(subject)"
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn upsert_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT OR REPLACE INTO {table}
        (credential_id, subject, public_key, counter, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#
    ))
    .bind(&credential.credential_id)
    .bind(&credential.subject)
    .bind(&credential.public_key)
    .bind(credential.counter as i64)
    .bind(credential.created_at)
    .bind(credential.updated_at)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn get_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<Option<PasskeyCredential>, PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let row = sqlx::query(&format!(
        "SELECT * FROM {table} WHERE credential_id = ?"
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    row.map(|r| map_row_sqlite(&r))
        .transpose()
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_credentials_for_sqlite(
    pool: &Pool<Sqlite>,
    subject_key: &str,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let rows = sqlx::query(&format!("SELECT * FROM {table} WHERE subject = ?"))
        .bind(subject_key)
        .fetch_all(pool)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    rows.iter()
        .map(map_row_sqlite)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_all_credentials_sqlite(
    pool: &Pool<Sqlite>,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let rows = sqlx::query(&format!("SELECT * FROM {table}"))
        .fetch_all(pool)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    rows.iter()
        .map(map_row_sqlite)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn update_counter_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
    counter: u32,
) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {table}
        SET counter = ?, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = ?
        "#
    ))
    .bind(counter as i64)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn rewrite_credential_id_sqlite(
    pool: &Pool<Sqlite>,
    old_id: &str,
    new_id: &str,
) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {table}
        SET credential_id = ?, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = ?
        "#
    ))
    .bind(new_id)
    .bind(old_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

// PostgreSQL implementations

async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            subject TEXT NOT NULL,
            public_key TEXT NOT NULL,
            counter BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_subject ON {table}(subject)"
    ))
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn upsert_credential_postgres(
    pool: &Pool<Postgres>,
    credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table}
        (credential_id, subject, public_key, counter, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (credential_id) DO UPDATE SET
            subject = EXCLUDED.subject,
            public_key = EXCLUDED.public_key,
            counter = EXCLUDED.counter,
            updated_at = EXCLUDED.updated_at
        "#
    ))
    .bind(&credential.credential_id)
    .bind(&credential.subject)
    .bind(&credential.public_key)
    .bind(credential.counter as i64)
    .bind(credential.created_at)
    .bind(credential.updated_at)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn get_credential_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<Option<PasskeyCredential>, PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let row = sqlx::query(&format!(
        "SELECT * FROM {table} WHERE credential_id = $1"
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    row.map(|r| map_row_postgres(&r))
        .transpose()
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_credentials_for_postgres(
    pool: &Pool<Postgres>,
    subject_key: &str,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let rows = sqlx::query(&format!("SELECT * FROM {table} WHERE subject = $1"))
        .bind(subject_key)
        .fetch_all(pool)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    rows.iter()
        .map(map_row_postgres)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn get_all_credentials_postgres(
    pool: &Pool<Postgres>,
) -> Result<Vec<PasskeyCredential>, PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    let rows = sqlx::query(&format!("SELECT * FROM {table}"))
        .fetch_all(pool)
        .await
        .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    rows.iter()
        .map(map_row_postgres)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PasskeyError::Storage(e.to_string()))
}

async fn update_counter_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
    counter: u32,
) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {table}
        SET counter = $1, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = $2
        "#
    ))
    .bind(counter as i64)
    .bind(credential_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

async fn rewrite_credential_id_postgres(
    pool: &Pool<Postgres>,
    old_id: &str,
    new_id: &str,
) -> Result<(), PasskeyError> {
    let table = DB_TABLE_PASSKEY_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {table}
        SET credential_id = $1, updated_at = CURRENT_TIMESTAMP
        WHERE credential_id = $2
        "#
    ))
    .bind(new_id)
    .bind(old_id)
    .execute(pool)
    .await
    .map_err(|e| PasskeyError::Storage(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use chrono::Utc;

    fn sample_credential(id: &str, subject: &Subject) -> PasskeyCredential {
        let now = Utc::now();
        PasskeyCredential {
            credential_id: id.to_string(),
            subject: subject.storage_key(),
            public_key: "BPublicKey".to_string(),
            counter: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_credential() {
        init_test_environment().await;

        let subject = Subject::User("store-user-1".to_string());
        let credential = sample_credential("store-cred-1", &subject);
        CredentialStore::upsert_credential(&credential).await.unwrap();

        let fetched = CredentialStore::get_credential("store-cred-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.subject, subject.storage_key());
        assert_eq!(fetched.counter, 0);

        assert!(
            CredentialStore::get_credential("no-such-cred")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_row() {
        init_test_environment().await;

        let subject = Subject::User("store-user-2".to_string());
        let mut credential = sample_credential("store-cred-2", &subject);
        CredentialStore::upsert_credential(&credential).await.unwrap();

        credential.public_key = "BOtherKey".to_string();
        CredentialStore::upsert_credential(&credential).await.unwrap();

        let fetched = CredentialStore::get_credential("store-cred-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.public_key, "BOtherKey");

        let all_for_subject = CredentialStore::get_credentials_for(&subject).await.unwrap();
        assert_eq!(all_for_subject.len(), 1);
    }

    #[tokio::test]
    async fn test_update_counter() {
        init_test_environment().await;

        let subject = Subject::User("store-user-3".to_string());
        let credential = sample_credential("store-cred-3", &subject);
        CredentialStore::upsert_credential(&credential).await.unwrap();

        CredentialStore::update_credential_counter("store-cred-3", 7)
            .await
            .unwrap();

        let fetched = CredentialStore::get_credential("store-cred-3")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.counter, 7);
    }

    #[tokio::test]
    async fn test_rewrite_credential_id() {
        init_test_environment().await;

        let subject = Subject::User("store-user-4".to_string());
        let credential = sample_credential("store-cred-4-old", &subject);
        CredentialStore::upsert_credential(&credential).await.unwrap();

        CredentialStore::rewrite_credential_id("store-cred-4-old", "store-cred-4-new")
            .await
            .unwrap();

        assert!(
            CredentialStore::get_credential("store-cred-4-old")
                .await
                .unwrap()
                .is_none()
        );
        let fetched = CredentialStore::get_credential("store-cred-4-new")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.subject, subject.storage_key());
    }
}

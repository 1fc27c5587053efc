use std::str::FromStr;
use std::{env, sync::LazyLock};
use tokio::sync::Mutex;

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::types::DataStore;

pub static GENERIC_DATA_STORE_TYPE: LazyLock<String> = LazyLock::new(|| {
    env::var("GENERIC_DATA_STORE_TYPE").unwrap_or_else(|_| "sqlite".to_string())
});

pub static GENERIC_DATA_STORE_URL: LazyLock<String> = LazyLock::new(|| {
    env::var("GENERIC_DATA_STORE_URL").unwrap_or_else(|_| "sqlite:minibar.db".to_string())
});

pub(crate) static DB_TABLE_PASSKEY_CREDENTIALS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_PASSKEY_CREDENTIALS").unwrap_or_else(|_| "passkey_credentials".to_string())
});

pub(crate) static DB_TABLE_USERS: LazyLock<String> =
    LazyLock::new(|| env::var("DB_TABLE_USERS").unwrap_or_else(|_| "users".to_string()));

pub(crate) static GENERIC_DATA_STORE: LazyLock<Mutex<DataStore>> = LazyLock::new(|| {
    let store_type = GENERIC_DATA_STORE_TYPE.as_str();
    let store_url = GENERIC_DATA_STORE_URL.as_str();

    tracing::info!(
        "Initializing data store with type: {}, url: {}",
        store_type,
        store_url
    );

    let store = match store_type {
        "sqlite" => {
            let options = SqliteConnectOptions::from_str(store_url)
                .unwrap_or_else(|e| panic!("Invalid SQLite URL {store_url}: {e}"))
                .create_if_missing(true);

            // An in-memory SQLite database exists per connection, so the pool
            // must be pinned to a single connection for it to behave as one store.
            let max_connections = if store_url.contains(":memory:") { 1 } else { 5 };

            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect_lazy_with(options);
            DataStore::Sqlite(pool)
        }
        "postgres" => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(store_url)
                .unwrap_or_else(|e| panic!("Invalid Postgres URL {store_url}: {e}"));
            DataStore::Postgres(pool)
        }
        t => {
            panic!("Unsupported data store type: {t}. Supported types are 'sqlite' and 'postgres'")
        }
    };

    Mutex::new(store)
});

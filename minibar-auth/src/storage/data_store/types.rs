use sqlx::{Pool, Postgres, Sqlite};

/// The relational store backing credentials and users.
pub(crate) enum DataStore {
    Sqlite(Pool<Sqlite>),
    Postgres(Pool<Postgres>),
}

impl DataStore {
    pub(crate) fn as_sqlite(&self) -> Option<&Pool<Sqlite>> {
        match self {
            DataStore::Sqlite(pool) => Some(pool),
            _ => None,
        }
    }

    pub(crate) fn as_postgres(&self) -> Option<&Pool<Postgres>> {
        match self {
            DataStore::Postgres(pool) => Some(pool),
            _ => None,
        }
    }
}

mod config;
mod types;

pub(crate) use config::{DB_TABLE_PASSKEY_CREDENTIALS, DB_TABLE_USERS, GENERIC_DATA_STORE};
pub use config::{GENERIC_DATA_STORE_TYPE, GENERIC_DATA_STORE_URL};

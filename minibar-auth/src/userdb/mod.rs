mod errors;
mod storage;
mod types;

pub use errors::UserError;
pub use types::User;

pub(crate) use storage::UserStore;

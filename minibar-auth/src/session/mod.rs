mod config;
mod errors;
mod session;
mod types;

pub use config::{ADMIN_SESSION_COOKIE_NAME, USER_SESSION_COOKIE_NAME};
pub use errors::SessionError;
pub use session::{
    delete_session, get_session_id_from_headers, session_cookie_name, validate_session,
};

pub(crate) use session::{append_session_cookie, append_session_removal_cookie, create_session};

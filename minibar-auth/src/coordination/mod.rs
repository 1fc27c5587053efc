mod admin;
mod errors;
mod user;

pub use admin::{
    admin_logout, finish_admin_authentication, finish_admin_registration, is_admin_authenticated,
    start_admin_authentication, start_admin_registration,
};
pub use errors::CoordinationError;
pub use user::{
    current_user, finish_user_authentication, finish_user_registration, start_user_authentication,
    start_user_registration, user_logout,
};

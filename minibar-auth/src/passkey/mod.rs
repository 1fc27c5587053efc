mod config;
mod errors;
mod main;
mod storage;
mod types;

pub use errors::PasskeyError;
pub use main::{
    AuthenticationOptions, AuthenticatorResponse, CredentialId, RegisterCredential,
    RegistrationOptions, RpContext,
};
pub use types::{AuthVariant, PasskeyCredential, Subject};

pub(crate) use main::{
    finish_authentication, finish_registration, start_authentication, start_registration,
};
pub(crate) use storage::CredentialStore;

mod auth;
mod codec;
mod flow;
mod register;
mod rp;
mod types;

pub use codec::CredentialId;
pub use rp::RpContext;
pub use types::{
    AuthenticationOptions, AuthenticatorResponse, RegisterCredential, RegistrationOptions,
};

pub(crate) use auth::{finish_authentication, start_authentication};
pub(crate) use register::{finish_registration, start_registration};

//! Axum HTTP boundary for the minibar passkey core.
//!
//! Exposes the four endpoints of each authentication variant
//! (`/options`, `/verify`, `/session`, `/logout`) and maps
//! operation-layer errors onto HTTP status codes.

mod admin;
mod error;
mod router;
mod types;
mod user;

pub use router::minibar_auth_router;

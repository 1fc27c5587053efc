use axum::routing::Router;

/// All passkey endpoints: the admin variant under `/admin`, the multi-user
/// variant under `/user`. Nest this wherever the host application mounts
/// authentication.
pub fn minibar_auth_router() -> Router {
    Router::new()
        .nest("/admin", crate::admin::router())
        .nest("/user", crate::user::router())
}

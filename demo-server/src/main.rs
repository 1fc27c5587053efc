use axum::routing::{Router, get};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use minibar_auth_axum::minibar_auth_router;

async fn index() -> &'static str {
    "minibar: passkey endpoints under /auth/admin and /auth/user\n"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    minibar_auth::init().await?;

    let app = Router::new()
        .route("/", get(index))
        .nest("/auth", minibar_auth_router())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Starting server on http://localhost:3000");
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    axum::serve(listener, app).await?;
    Ok(())
}

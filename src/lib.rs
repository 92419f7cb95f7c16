//! Book review server.
//!
//! Users sign up, log in, keep a personal list of books and attach reviews to
//! pages of those books.
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | Auth |
//! |---|---|---|
//! | POST | `/user/signup` | no |
//! | POST | `/user/login` | no |
//! | GET | `/user/google` | no |
//! | GET | `/user/google/callback` | no |
//! | GET | `/user/me` | yes |
//! | GET | `/book` | yes |
//! | POST | `/book` | yes |
//! | GET | `/book/{book_id}` | yes |
//! | POST | `/book/{book_id}/review` | yes |
//! | PATCH | `/review/{review_id}` | yes |
//! | DELETE | `/review/{review_id}` | yes |
//!
//! Every response is `{ "message": ..., "data"?: ... }`.
//!
//!
//!
//! # Reviews
//!
//! `GET /book/{book_id}` answers with the book summary and the reviews grouped
//! by page, pages in the order they were first reviewed. See [`reviews`].
//!
//!
//!
//! # Setup
//!
//! Environment
//! - `RUST_PORT`: listen port, default 1111
//! - `DATABASE_PATH`: SQLite file, default `books.db`
//! - `TOKEN_TTL_SECS`: token lifetime, default 3600
//! - `RUST_LOG`: tracing filter
//!
//! - `GOOGLE_CLIENT_ID`: enables Google sign-in, see [`google`]
//! - `GOOGLE_REDIRECT_URI`: where Google sends the user back, required with the client id
//!
//! Secrets
//! - `/run/secrets/ACCESS_SECRET` (or the `ACCESS_SECRET` variable): token signing key
//! - `/run/secrets/GOOGLE_CLIENT_SECRET` (or the variable): only with Google sign-in
//!
//! Run.
//! ```sh
//! ACCESS_SECRET=dev RUST_LOG=info cargo run
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, patch, post},
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod google;
pub mod models;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod user;

use config::Config;
use routes::{
    create_book_handler, create_review_handler, delete_review_handler, google_callback_handler,
    google_login_handler, list_books_handler, login_handler, me_handler, reviews_handler,
    signup_handler, update_review_handler,
};
use state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/user/signup", post(signup_handler))
        .route("/user/login", post(login_handler))
        .route("/user/google", get(google_login_handler))
        .route("/user/google/callback", get(google_callback_handler))
        .route("/user/me", get(me_handler))
        .route("/book", get(list_books_handler).post(create_book_handler))
        .route("/book/{book_id}", get(reviews_handler))
        .route("/book/{book_id}/review", post(create_review_handler))
        .route(
            "/review/{review_id}",
            patch(update_review_handler).delete(delete_review_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config)?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

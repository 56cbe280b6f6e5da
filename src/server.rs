//!
//! financy HTTP server
//! -------------------
//! Axum router for the finance tracker.
//!
//! Responsibilities:
//! - Login/logout endpoints backed by the `identity` verifier and session gate.
//! - A gate middleware in front of every route: anything outside the public
//!   allow-list needs a valid session cookie or is redirected to `/login`.
//! - Ledger endpoints (balance, paginated history, create).
//! - Server-rendered pages for the same operations.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::identity::{require_session, SessionGate};
use crate::storage::{SharedStore, Store};

pub mod api;
pub mod pages;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub sessions: Arc<SessionGate>,
}

impl AppState {
    pub fn new(store: SharedStore, sessions: SessionGate) -> Self {
        Self { store, sessions: Arc::new(sessions) }
    }
}

/// Run `f` against the locked store on a blocking thread.
pub(crate) async fn blocking<T, F>(store: &SharedStore, f: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> AppResult<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || {
        let guard = store.lock();
        f(&guard)
    })
    .await?
}

pub fn router(state: AppState) -> Router {
    let gate = state.sessions.clone();
    Router::new()
        .route("/", get(pages::dashboard))
        .route("/movimientos", get(pages::history))
        .route("/agregar", get(pages::add_form))
        .route("/login", get(pages::login_page))
        .route("/assets/app.css", get(pages::stylesheet))
        .route("/favicon.ico", get(pages::favicon))
        .route("/api/login", post(api::login))
        .route("/api/logout", post(api::logout))
        .route("/api/movimientos", get(api::list_transactions).post(api::create_transaction))
        .layer(axum::middleware::from_fn_with_state(gate, require_session))
        .with_state(state)
}

/// Serve on an already-bound listener. Tests bind port 0 and call this.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Open the store, build the session gate and serve until the process exits.
pub async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "financy starting: http_port={}, db_path={:?}, production={}, session={:?}",
        config.http_port, config.db_path, config.production, config.session
    );
    let store = SharedStore::open(&config.db_path)
        .with_context(|| format!("While opening database {:?}", config.db_path))?;
    let sessions = SessionGate::new(config.session.clone()).context("While building session gate")?;
    let state = AppState::new(store, sessions);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

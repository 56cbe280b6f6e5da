use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::debug;

use super::model::SessionUser;
use super::session::SessionGate;

pub const LOGIN_PATH: &str = "/login";

/// Reachable without a session. An entry matches itself and anything below it.
pub const PUBLIC_PATHS: &[&str] = &["/login", "/api/login", "/favicon.ico", "/assets"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Path is on the public allow-list; no session was consulted.
    Public,
    Proceed(SessionUser),
    Redirect(&'static str),
}

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.iter().any(|p| {
        path == *p || (path.starts_with(p) && path.as_bytes().get(p.len()) == Some(&b'/'))
    })
}

pub fn decide(gate: &SessionGate, path: &str, headers: &HeaderMap) -> GateDecision {
    if is_public(path) {
        return GateDecision::Public;
    }
    match gate.read(headers) {
        Some(user) => GateDecision::Proceed(user),
        None => GateDecision::Redirect(LOGIN_PATH),
    }
}

/// Middleware run in front of every route. Pages and submissions alike are
/// bounced to the login page when no valid session cookie is present.
pub async fn require_session(State(gate): State<Arc<SessionGate>>, req: Request, next: Next) -> Response {
    match decide(&gate, req.uri().path(), req.headers()) {
        GateDecision::Public | GateDecision::Proceed(_) => next.run(req).await,
        GateDecision::Redirect(target) => {
            debug!(method = %req.method(), path = %req.uri().path(), "no session, redirecting to login");
            Redirect::to(target).into_response()
        }
    }
}

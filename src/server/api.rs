//! JSON endpoints: login, logout and the transaction list/create API.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info};

use super::{blocking, AppState};
use crate::error::{AppError, AppResult};
use crate::identity::{CredentialVerifier, LoginRequest, SessionUser};
use crate::ledger::{self, CreatePayload, PageRequest};

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"msg": "No autorizado"}))).into_response()
}

/// POST /api/login
///
/// An unparsable body is treated like an empty form, which the verifier
/// rejects as missing fields.
pub async fn login(State(state): State<AppState>, body: Bytes) -> AppResult<Response> {
    let req: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();
    let identity = blocking(&state.store, move |store| {
        CredentialVerifier::new(store).verify(&req).map_err(AppError::from)
    })
    .await?;

    let user = SessionUser::from(&identity);
    let cookie = state.sessions.issue(&user).map_err(|e| {
        error!("session issue failed: {e}");
        AppError::internal("session_error", "Error interno")
    })?;
    info!(id = %user.id, rut = %user.rut, "login ok");

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok((StatusCode::OK, headers, Json(json!({"ok": true}))).into_response())
}

/// POST /api/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(user) = state.sessions.read(&headers) {
        info!(id = %user.id, "logout");
    }
    let cleared = state.sessions.destroy().map_err(|e| {
        error!("session destroy failed: {e}");
        AppError::internal("session_error", "Error interno")
    })?;
    let mut h = HeaderMap::new();
    h.insert(header::SET_COOKIE, cleared);
    Ok((StatusCode::OK, h, Json(json!({"ok": true}))).into_response())
}

/// GET /api/movimientos?page=&pageSize=
pub async fn list_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(paging): Query<PageRequest>,
) -> AppResult<Response> {
    let Some(user) = state.sessions.read(&headers) else { return Ok(unauthorized()); };
    let (page, page_size) = paging.normalize();
    let result = blocking(&state.store, move |store| {
        Ok(ledger::list_page(store, &user.id, page, page_size)?)
    })
    .await?;
    Ok(Json(result).into_response())
}

/// POST /api/movimientos
pub async fn create_transaction(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> AppResult<Response> {
    let Some(user) = state.sessions.read(&headers) else { return Ok(unauthorized()); };
    let payload: CreatePayload = serde_json::from_slice(&body).unwrap_or_default();
    let new = match payload.validate() {
        Ok(new) => new,
        Err(issues) => {
            return Ok((StatusCode::BAD_REQUEST, Json(json!({"msg": "Datos inválidos", "issues": issues}))).into_response());
        }
    };
    let tx = blocking(&state.store, move |store| Ok(ledger::record(store, &user.id, new)?)).await?;
    Ok(Json(json!({"ok": true, "id": tx.id})).into_response())
}

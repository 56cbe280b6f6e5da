//! Server-rendered pages. Markup is kept deliberately plain; the stylesheet
//! lives at `/assets/app.css` and forms post JSON through a small inline script.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::{blocking, AppState};
use crate::error::AppResult;
use crate::format::{fmt_date, fmt_money};
use crate::identity::{SessionUser, LOGIN_PATH};
use crate::ledger::{self, Transaction, TxKind, DEFAULT_PAGE_SIZE};

const STYLESHEET: &str = r#"
*{box-sizing:border-box}
body{margin:0;font-family:system-ui,sans-serif;background:#fff7f5;color:#1f2937}
header{display:flex;gap:1rem;align-items:center;padding:1rem 1.5rem;background:#d32f2f;color:#fff}
header a,header button{color:#fff;text-decoration:none;font-weight:600;background:none;border:0;font-size:1rem;cursor:pointer}
header .brand{font-size:1.4rem;margin-right:auto}
main{max-width:48rem;margin:0 auto;padding:1.5rem}
h1{color:#d32f2f;text-align:center}
.card{background:#fff;border:2px solid #e5e7eb;border-radius:1.5rem;padding:1.5rem;margin-bottom:1rem}
.balance{font-size:3rem;font-weight:700;margin:.5rem 0}
.actions{display:flex;gap:1rem;flex-wrap:wrap}
.actions a{flex:1;text-align:center;padding:1rem;border-radius:1rem;font-size:1.3rem;font-weight:700;text-decoration:none}
.primary{background:#059669;color:#fff}
.secondary{border:2px solid #d1d5db;color:#111827;background:#fff}
.row{display:flex;justify-content:space-between;align-items:center;gap:1rem}
.in{color:#059669}.out{color:#e11d48}
.muted{color:#6b7280}
form{display:grid;gap:1rem}
label{font-weight:600;font-size:1.2rem}
input{width:100%;padding:.9rem 1rem;font-size:1.2rem;border:2px solid #d1d5db;border-radius:1rem}
.kinds{display:grid;grid-template-columns:1fr 1fr;gap:1rem}
.kinds label{border:2px solid #d1d5db;border-radius:1rem;padding:1rem;text-align:center}
button.submit{padding:1.1rem;font-size:1.3rem;font-weight:700;color:#fff;background:#ff6f00;border:0;border-radius:1rem}
.error{color:#d32f2f;font-weight:600;text-align:center;min-height:1.5rem}
"#;

/// Minimal HTML escaping for text and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, with_header: bool, body: &str) -> Html<String> {
    let header = if with_header {
        r#"<header>
  <a class="brand" href="/">Financy</a>
  <a href="/">Inicio</a>
  <a href="/agregar">Agregar</a>
  <a href="/movimientos">Movimientos</a>
  <button id="logout" type="button">Salir</button>
</header>
<script>
document.getElementById('logout').addEventListener('click', async () => {
  await fetch('/api/logout', { method: 'POST' });
  window.location.replace('/login');
});
</script>"#
    } else {
        ""
    };
    Html(format!(
        r#"<!doctype html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Financy</title>
<link rel="stylesheet" href="/assets/app.css">
</head>
<body>
{header}
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    ))
}

fn transaction_row(tx: &Transaction) -> String {
    let (class, sign) = match tx.kind {
        TxKind::In => ("in", "+"),
        TxKind::Out => ("out", "−"),
    };
    let detail = match &tx.note {
        Some(note) => format!("{} — {}", fmt_date(&tx.date), escape(note)),
        None => fmt_date(&tx.date),
    };
    let category = tx
        .category
        .as_deref()
        .map(|c| format!(r#"<span class="muted"> · {}</span>"#, escape(c)))
        .unwrap_or_default();
    format!(
        r#"<article class="card row">
  <div><strong>{label}</strong>{category}<div class="muted">{detail}</div></div>
  <strong class="{class}">{sign} {amount}</strong>
</article>"#,
        label = tx.kind.label(),
        amount = fmt_money(tx.amount),
    )
}

fn session_or_login(state: &AppState, headers: &HeaderMap) -> Result<SessionUser, Response> {
    state.sessions.read(headers).ok_or_else(|| Redirect::to(LOGIN_PATH).into_response())
}

/// GET /
pub async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let user = match session_or_login(&state, &headers) { Ok(u) => u, Err(r) => return Ok(r) };
    let saldo = blocking(&state.store, move |store| Ok(ledger::balance(store, &user.id)?)).await?;
    let body = format!(
        r#"<h1>Tu efectivo</h1>
<section class="card">
  <p class="muted">Saldo actual</p>
  <p class="balance">{}</p>
  <p class="muted">Actualizado ahora</p>
</section>
<div class="actions">
  <a class="primary" href="/agregar">Agregar movimiento</a>
  <a class="secondary" href="/movimientos">Ver historial</a>
</div>"#,
        fmt_money(saldo)
    );
    Ok(layout("Inicio", true, &body).into_response())
}

/// GET /movimientos
pub async fn history(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let user = match session_or_login(&state, &headers) { Ok(u) => u, Err(r) => return Ok(r) };
    let (saldo, rows) = blocking(&state.store, move |store| {
        let saldo = ledger::balance(store, &user.id)?;
        let rows = ledger::recent(store, &user.id, DEFAULT_PAGE_SIZE)?;
        Ok((saldo, rows))
    })
    .await?;

    let list = if rows.is_empty() {
        r#"<div class="card" style="text-align:center">
  <p>Aún no hay movimientos.</p>
  <div class="actions"><a class="primary" href="/agregar">Agregar uno</a></div>
</div>"#
            .to_string()
    } else {
        rows.iter().map(transaction_row).collect::<Vec<_>>().join("\n")
    };
    let body = format!(
        r#"<h1>Movimientos</h1>
<section class="card">
  <p class="muted">Saldo actual</p>
  <p class="balance">{}</p>
</section>
<section>
{list}
</section>"#,
        fmt_money(saldo)
    );
    Ok(layout("Movimientos", true, &body).into_response())
}

/// GET /agregar
pub async fn add_form(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(r) = session_or_login(&state, &headers) {
        return r;
    }
    let body = r#"<form id="add" class="card">
  <h1>Agregar movimiento</h1>
  <p class="muted" style="text-align:center">La fecha y hora se registrarán automáticamente</p>
  <div class="kinds">
    <label><input type="radio" name="type" value="IN" checked> Ingreso</label>
    <label><input type="radio" name="type" value="OUT"> Egreso</label>
  </div>
  <label for="amount">Monto</label>
  <input id="amount" inputmode="numeric" placeholder="Ejemplo: 50000" required>
  <label for="category">Categoría (opcional)</label>
  <input id="category" maxlength="50" placeholder="Ejemplo: Sueldo, Comida, Transporte...">
  <label for="note">Nota (opcional)</label>
  <input id="note" maxlength="200" placeholder="Ejemplo: Pago mensual...">
  <p id="err" class="error"></p>
  <button class="submit" type="submit">Guardar</button>
</form>
<script>
const amount = document.getElementById('amount');
amount.addEventListener('input', () => { amount.value = amount.value.replace(/[^0-9]/g, ''); });
document.getElementById('add').addEventListener('submit', async (e) => {
  e.preventDefault();
  const err = document.getElementById('err');
  err.textContent = '';
  const body = {
    type: document.querySelector('input[name=type]:checked').value,
    amount: Number(amount.value),
    category: document.getElementById('category').value || null,
    note: document.getElementById('note').value || null,
  };
  try {
    const res = await fetch('/api/movimientos', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify(body),
    });
    if (!res.ok) {
      const data = await res.json().catch(() => ({}));
      err.textContent = data.msg || 'Error al guardar';
      return;
    }
    window.location.assign('/movimientos');
  } catch (_) {
    err.textContent = 'Error de conexión. Por favor intenta nuevamente.';
  }
});
</script>"#;
    layout("Agregar", true, body).into_response()
}

/// GET /login
pub async fn login_page() -> Html<String> {
    let body = r#"<form id="login" class="card">
  <h1>Financy</h1>
  <p class="muted" style="text-align:center">Inicia sesión en tu cuenta</p>
  <label for="rut">RUT</label>
  <input id="rut" autocomplete="username" placeholder="Ejemplo: 12.345.678-9" required>
  <label for="password">Contraseña</label>
  <input id="password" type="password" autocomplete="current-password" required>
  <p id="err" class="error"></p>
  <button class="submit" type="submit">Ingresar</button>
</form>
<script>
document.getElementById('login').addEventListener('submit', async (e) => {
  e.preventDefault();
  const err = document.getElementById('err');
  err.textContent = '';
  try {
    const res = await fetch('/api/login', {
      method: 'POST',
      headers: { 'Content-Type': 'application/json' },
      body: JSON.stringify({
        identifier: document.getElementById('rut').value,
        password: document.getElementById('password').value,
      }),
    });
    if (res.ok) { window.location.replace('/'); return; }
    const data = await res.json().catch(() => ({}));
    err.textContent = data.msg || 'Error al iniciar sesión';
  } catch (_) {
    err.textContent = 'Error de conexión. Por favor intenta nuevamente.';
  }
});
</script>"#;
    layout("Ingresar", false, body)
}

/// GET /assets/app.css
pub async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}

/// GET /favicon.ico
pub async fn favicon() -> StatusCode { StatusCode::NO_CONTENT }

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::session::{SessionInfo, SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
    /// Name of the active scoring rule, shown on the status page
    pub scoring_rule: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    scoring_rule: String,
    sessions: Vec<SessionInfo>,
}

/// Build the Axum router for the status dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/sessions", get(sessions_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn index_handler() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

/// GET /health
async fn health_handler() -> &'static str {
    "ok"
}

/// GET /api/sessions
async fn sessions_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(StatusResponse {
        scoring_rule: state.scoring_rule.clone(),
        sessions: state.registry.active(),
    })
}

/// Embedded single-file status page (HTML + CSS + JS)
const DASHBOARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>HLTV Watch Bot</title>
<style>
  :root { --bg: #0f1117; --card: #1a1d27; --border: #2a2d3a; --text: #e0e0e0; --muted: #8888aa; --green: #00c896; }
  * { box-sizing: border-box; margin: 0; padding: 0; }
  body { background: var(--bg); color: var(--text); font-family: 'Segoe UI', system-ui, sans-serif; }
  header { padding: 1rem 2rem; border-bottom: 1px solid var(--border); display: flex; gap: 1rem; align-items: center; }
  header h1 { font-size: 1.4rem; }
  .muted { color: var(--muted); font-size: .85rem; }
  main { padding: 1.5rem 2rem; }
  .panel { background: var(--card); border: 1px solid var(--border); border-radius: 10px; overflow: hidden; }
  table { width: 100%; border-collapse: collapse; }
  th { padding: .7rem 1rem; text-align: left; font-size: .75rem; text-transform: uppercase; color: var(--muted); border-bottom: 1px solid var(--border); }
  td { padding: .65rem 1rem; font-size: .88rem; border-bottom: 1px solid #1e2130; }
  .polling { color: var(--green); }
</style>
</head>
<body>
<header><h1>HLTV Watch Bot</h1><span class="muted" id="rule"></span></header>
<main>
  <div class="panel">
    <table>
      <thead><tr><th>Chat</th><th>Match</th><th>State</th><th>Started</th></tr></thead>
      <tbody id="sessions"><tr><td colspan="4" class="muted">Loading…</td></tr></tbody>
    </table>
  </div>
</main>
<script>
async function refresh() {
  const r = await fetch('/api/sessions');
  const data = await r.json();
  document.getElementById('rule').textContent = 'scoring rule: ' + data.scoring_rule;
  const rows = data.sessions.map(s =>
    `<tr><td>${s.subscriber}</td><td><a href="https://www.hltv.org/matches/${s.match_id}/_">${s.match_id}</a></td>` +
    `<td class="${s.state}">${s.state}</td><td>${new Date(s.started_at).toLocaleString()}</td></tr>`);
  document.getElementById('sessions').innerHTML =
    rows.length ? rows.join('') : '<tr><td colspan="4" class="muted">No active sessions</td></tr>';
}
refresh();
setInterval(refresh, 5000);
</script>
</body>
</html>
"#;

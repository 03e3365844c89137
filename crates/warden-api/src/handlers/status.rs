//! HTML session dashboard.
//!
//! The one endpoint that renders HTML: the full session table with a
//! client-side search filter, for administrators deciding which slot to
//! revoke.

use axum::{extract::State, response::Html};
use std::sync::Arc;
use warden_pool::Session;

use crate::state::AppState;

pub async fn status_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let sessions = state.pool.sessions();
    let record = state.store.record();
    let capacity = record.number_of_users.max(0);

    let mut rows = String::new();
    for session in &sessions {
        rows.push_str(&render_row(session));
    }
    if sessions.is_empty() {
        rows.push_str(r#"<tr><td colspan="8" class="empty">no sessions assigned</td></tr>"#);
    }

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{name} — sessions</title>
<style>
body {{ font-family: sans-serif; margin: 2em; color: #222; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 6px 10px; text-align: left; font-size: 14px; }}
th {{ background: #f0f0f0; }}
.active {{ color: #0a7a0a; font-weight: bold; }}
.inactive {{ color: #888; }}
.empty {{ text-align: center; color: #888; }}
#search {{ padding: 6px; width: 320px; margin-bottom: 1em; }}
</style>
</head>
<body>
<h1>{name}</h1>
<p>license {key} — {used} of {capacity} slots in use, {active} active</p>
<input type="text" id="search" placeholder="filter by host, user, client...">
<table id="sessions">
<thead><tr>
<th>Session key</th><th>Client</th><th>UUID</th><th>MAC</th>
<th>Hostname</th><th>User</th><th>Assigned</th><th>State</th>
</tr></thead>
<tbody>
{rows}
</tbody>
</table>
<script>
document.getElementById('search').addEventListener('input', function () {{
  var needle = this.value.toLowerCase();
  var rows = document.querySelectorAll('#sessions tbody tr');
  rows.forEach(function (row) {{
    row.style.display = row.textContent.toLowerCase().includes(needle) ? '' : 'none';
  }});
}});
</script>
</body>
</html>"#,
        name = escape(&state.settings.server_name),
        key = record.masked_key(),
        used = sessions.len(),
        capacity = capacity,
        active = state.pool.active_count(),
        rows = rows,
    ))
}

fn render_row(session: &Session) -> String {
    let state_class = if session.active { "active" } else { "inactive" };
    let state_label = if session.active { "active" } else { "inactive" };
    format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
         <td class=\"{}\">{}</td></tr>",
        escape(&session.session_key[..session.session_key.len().min(16)]),
        escape(&session.client_id),
        escape(&session.uuid),
        escape(&session.mac_address),
        escape(&session.hostname),
        escape(&session.username),
        session.assigned_at.format("%Y-%m-%d %H:%M:%S"),
        state_class,
        state_label,
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

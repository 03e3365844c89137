//! Liveness handler.

use axum::response::Html;

pub async fn health() -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><body><h1>Warden license server</h1>\
         <p>status: running</p><p>version: {}</p></body></html>",
        env!("CARGO_PKG_VERSION")
    ))
}

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde_json::json;

use crate::{render, services::session::Session, AppState};

// GET /  -> wherever the stored credential points
pub async fn root(Extension(session): Extension<Session>) -> Response {
    let target = if session.is_present() { "/dashboard" } else { "/login" };
    Redirect::to(target).into_response()
}

pub async fn not_found(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let body = render::render_page(&state, "pages/not_found", &json!({}));
    render::respond_page(&state, &headers, StatusCode::NOT_FOUND, "404", body)
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Html("ok".to_string()))
}

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    render::{self, HxTrigger, ToastLevel},
    services::{session::Session, stocks_service},
    AppState,
};

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

// GET /search/results?query=
pub async fn get_search_results(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(q): Query<SearchQuery>,
) -> Response {
    let query = q.query.unwrap_or_default();

    let outcome = match stocks_service::search(&state, &session, &query).await {
        Ok(Some(o)) => o,
        Ok(None) => return (StatusCode::OK, Html(String::new())).into_response(),
        Err(e) => {
            tracing::warn!("stock search failed: {}", e);
            return render::toast_only(ToastLevel::Error, e.user_message("Failed to search stocks"));
        }
    };

    let html = render::render_page(&state, "partials/search_results", &outcome.ctx());
    let res = (StatusCode::OK, Html(html)).into_response();

    let trigger = if outcome.is_mock_data {
        HxTrigger::new().toast(ToastLevel::Info, stocks_service::MOCK_TOAST)
    } else if let Some(err) = &outcome.error {
        HxTrigger::new().toast(ToastLevel::Error, err.clone())
    } else {
        HxTrigger::new()
    };
    trigger.apply(res)
}

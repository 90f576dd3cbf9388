use axum::{
    extract::{Extension, Form, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    render::{self, HxTrigger, ToastLevel},
    services::{
        alerts_service::{self, AlertForm, AlertsError, AlertsView},
        dashboard_service::normalize_symbol,
        session::Session,
    },
    AppState,
};

const ALERTS_UPDATED: &str = "alertsUpdated";

// ---------------- Pages ----------------

#[derive(Deserialize, Default)]
pub struct AlertsPageQuery {
    // prefills the create form when arriving from a dashboard card
    pub symbol: Option<String>,
}

pub async fn get_alerts_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<AlertsPageQuery>,
) -> Response {
    let symbol = q.symbol.as_deref().and_then(normalize_symbol);
    let body = render::render_page(&state, "pages/alerts", &json!({ "symbol": symbol }));
    render::respond_protected(&state, &headers, "Price Alerts", "alerts", body)
}

// ---------------- Partials ----------------

// GET /alerts/lists
pub async fn get_alerts_lists(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Response {
    let (view, failed) = match alerts_service::load_alerts(&state, &session).await {
        Ok(v) => (v, false),
        Err(e) => {
            tracing::warn!("alerts fetch failed: {}", e);
            (AlertsView::default(), true)
        }
    };

    let html = render::render_page(
        &state,
        "partials/alerts_lists",
        &json!({
            "alerts": view.alerts,
            "history": view.history,
            "failed": failed,
        }),
    );
    let res = (StatusCode::OK, Html(html)).into_response();

    if failed {
        return HxTrigger::new()
            .toast(ToastLevel::Error, "Failed to fetch alerts")
            .apply(res);
    }
    res
}

// ---------------- Mutations ----------------

// POST /alerts
pub async fn post_create_alert(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<AlertForm>,
) -> Response {
    match alerts_service::create_alert(&state, &session, &form).await {
        Ok(_) => {
            let res = (StatusCode::OK, Html(String::new())).into_response();
            HxTrigger::new()
                .event(ALERTS_UPDATED)
                .toast(ToastLevel::Success, "Alert created successfully")
                .apply(res)
        }
        Err(AlertsError::Invalid(msg)) => render::toast_only(ToastLevel::Error, msg),
        Err(AlertsError::Backend(e)) => {
            tracing::warn!("alert create failed: {}", e);
            render::toast_only(ToastLevel::Error, e.user_message("Failed to create alert"))
        }
    }
}

// POST /alerts/:id/delete
pub async fn post_delete_alert(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Response {
    match alerts_service::delete_alert(&state, &session, &id).await {
        Ok(()) => {
            let res = (StatusCode::OK, Html(String::new())).into_response();
            HxTrigger::new()
                .event(ALERTS_UPDATED)
                .toast(ToastLevel::Success, "Alert deleted")
                .apply(res)
        }
        Err(e) => {
            tracing::warn!("alert delete failed: {}", e);
            render::toast_only(ToastLevel::Error, "Failed to delete alert")
        }
    }
}

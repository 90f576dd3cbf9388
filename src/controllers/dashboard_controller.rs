use axum::{
    extract::{Extension, Form, Path, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    models::Price,
    render::{self, HxTrigger, ToastLevel},
    services::{
        dashboard_service::{self, DashboardView, PriceCard, Watchlist, WatchlistError},
        session::Session,
    },
    AppState,
};

fn watchlist_ctx(view: &DashboardView) -> serde_json::Value {
    json!({
        "cards": view.cards(),
        "watched": view.watchlist.joined(),
        "empty": view.watchlist.is_empty(),
    })
}

// ---------------- Pages ----------------

pub async fn get_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Extension(session): Extension<Session>,
) -> Response {
    let (watchlist, load_failed) = match dashboard_service::load_watchlist(&state, &session).await {
        Ok(w) => (w, false),
        Err(e) => {
            tracing::warn!("watchlist fetch failed: {}", e);
            (Watchlist::default(), true)
        }
    };

    let view = DashboardView::new(watchlist);
    let body = render::render_page(&state, "pages/dashboard", &watchlist_ctx(&view));
    let res = render::respond_protected(&state, &headers, "Dashboard", "dashboard", body);

    if load_failed {
        return HxTrigger::new()
            .toast(ToastLevel::Error, "Failed to load watchlist")
            .apply(res);
    }
    res
}

// ---------------- Partials ----------------

// GET /dashboard/watchlist
pub async fn get_watchlist(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Response {
    match dashboard_service::load_watchlist(&state, &session).await {
        Ok(w) => {
            let view = DashboardView::new(w);
            let html = render::render_page(&state, "partials/watchlist", &watchlist_ctx(&view));
            (StatusCode::OK, Html(html)).into_response()
        }
        Err(e) => {
            tracing::warn!("watchlist fetch failed: {}", e);
            render::toast_only(ToastLevel::Error, "Failed to load watchlist")
        }
    }
}

#[derive(Deserialize)]
pub struct AddForm {
    #[serde(default)]
    pub symbol: String,
    // comma-joined symbols the page currently shows
    #[serde(default)]
    pub watched: String,
}

// POST /watchlist
pub async fn post_add(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Form(form): Form<AddForm>,
) -> Response {
    let mut watchlist = Watchlist::from_symbols(dashboard_service::parse_symbols(&form.watched));

    let symbol = match dashboard_service::add_symbol(&state, &session, &mut watchlist, &form.symbol).await {
        Ok(s) => s,
        Err(WatchlistError::Backend(e)) => {
            tracing::warn!("add to watchlist failed: {}", e);
            return render::toast_only(ToastLevel::Error, e.user_message("Failed to add stock"));
        }
        Err(e) => return render::toast_only(ToastLevel::Error, e.to_string()),
    };

    let card = PriceCard::new(&symbol, Price::Pending);
    let html = render::render_page(&state, "partials/price_card", &json!(card));

    HxTrigger::new()
        .event_with(
            "watchlist:added",
            json!({ "symbol": symbol, "watched": watchlist.joined() }),
        )
        .toast(ToastLevel::Success, format!("{symbol} added to watchlist"))
        .apply((StatusCode::OK, Html(html)).into_response())
}

#[derive(Deserialize, Default)]
pub struct RemoveForm {
    #[serde(default)]
    pub watched: String,
}

// POST /watchlist/:symbol/delete
pub async fn post_remove(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(symbol): Path<String>,
    form: Option<Form<RemoveForm>>,
) -> Response {
    let watched = form.map(|Form(f)| f.watched).unwrap_or_default();
    let mut watchlist = Watchlist::from_symbols(dashboard_service::parse_symbols(&watched));

    if let Err(e) = dashboard_service::remove_symbol(&state, &session, &mut watchlist, &symbol).await {
        tracing::warn!("remove from watchlist failed: {}", e);
        return render::toast_only(ToastLevel::Error, "Failed to remove stock");
    }

    HxTrigger::new()
        .event_with(
            "watchlist:removed",
            json!({ "symbol": symbol, "watched": watchlist.joined() }),
        )
        .toast(ToastLevel::Success, format!("{symbol} removed from watchlist"))
        .apply((StatusCode::OK, Html(String::new())).into_response())
}

use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::dashboard_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/dashboard", get(dashboard_controller::get_dashboard))
        .route("/dashboard/watchlist", get(dashboard_controller::get_watchlist))
        .route("/watchlist", post(dashboard_controller::post_add))
        .route("/watchlist/:symbol/delete", post(dashboard_controller::post_remove))
}

use axum::{
    extract::{MatchedPath, State},
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;

use crate::{
    render,
    services::{api_client::ApiClient, session::Session},
    AppState,
};

/// Where a guarded navigation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Authenticated,
    Unauthenticated(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoCredential,
    Expired,
    Rejected,
}

impl DenyReason {
    /// Whether the stored credential must be discarded.
    pub fn clears_credential(&self) -> bool {
        !matches!(self, DenyReason::NoCredential)
    }
}

/// Decides whether a session may see protected content.
///
/// The check runs fresh on every navigation: presence, then the embedded
/// expiry, then `GET /auth/verify`. Nothing is cached between requests.
#[derive(Clone)]
pub struct RouteGuard {
    api: ApiClient,
}

impl RouteGuard {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Local steps only. Yields `Checking` when the backend still has to be
    /// asked.
    pub fn check_local(&self, session: &Session, now: i64) -> GuardState {
        match session.credential() {
            None => GuardState::Unauthenticated(DenyReason::NoCredential),
            Some(c) if c.is_expired_at(now) => GuardState::Unauthenticated(DenyReason::Expired),
            Some(_) => GuardState::Checking,
        }
    }

    /// The full algorithm; never returns `Checking`.
    pub async fn resolve(&self, session: &Session, now: i64) -> GuardState {
        let local = self.check_local(session, now);
        let (GuardState::Checking, Some(credential)) = (local, session.credential()) else {
            return local;
        };

        match self.api.verify(credential).await {
            Ok(()) => GuardState::Authenticated,
            Err(err) => {
                tracing::info!("credential verification failed: {}", err);
                GuardState::Unauthenticated(DenyReason::Rejected)
            }
        }
    }
}

pub async fn inject_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let session = state.sessions.get(&jar);
    req.extensions_mut().insert(session);
    next.run(req).await
}

fn is_public_path(path: &str) -> bool {
    path == "/"
        || path == "/health"
        || path == "/login"
        || path == "/register"
        || path == "/logout"
        || path == "/favicon.ico"
        || path.starts_with("/static/")
}

pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    // no matched route means the 404 fallback, which needs no session
    let routed = req.extensions().get::<MatchedPath>().is_some();
    if !routed || is_public_path(req.uri().path()) {
        return next.run(req).await;
    }

    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .unwrap_or_else(|| state.sessions.get(&jar));

    let headers = req.headers();
    let websocket = render::is_websocket(headers);
    let full_navigation =
        req.method() == Method::GET && !render::is_htmx(headers) && !websocket;

    let guard = RouteGuard::new(state.api.clone());
    let now = Utc::now().timestamp();

    let outcome = if full_navigation {
        guard.check_local(&session, now)
    } else {
        guard.resolve(&session, now).await
    };

    match outcome {
        GuardState::Authenticated => next.run(req).await,

        // Plain page load: answer with the loading shell, which fetches the
        // real page as an htmx request that runs the whole check.
        GuardState::Checking => {
            let target = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| req.uri().path().to_string());

            match render::render_shell(&state, &target) {
                Ok(page) => (StatusCode::OK, Html(page)).into_response(),
                Err(e) => render::template_error(e),
            }
        }

        GuardState::Unauthenticated(reason) => {
            tracing::debug!("guard denied {}: {:?}", req.uri().path(), reason);

            let jar = if reason.clears_credential() {
                state.sessions.clear(jar)
            } else {
                jar
            };

            if websocket {
                return (jar, StatusCode::UNAUTHORIZED).into_response();
            }
            (jar, render::redirect(req.headers(), "/login")).into_response()
        }
    }
}

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::{
    render,
    services::auth_service::{self, FieldErrors},
    AppState,
};

fn form_page(
    state: &AppState,
    headers: &HeaderMap,
    tpl: &str,
    title: &str,
    ctx: serde_json::Value,
) -> Response {
    let body = render::render_page(state, tpl, &ctx);
    render::respond_page(state, headers, StatusCode::OK, title, body)
}

// ---------------- LOGIN ----------------

#[derive(Deserialize, Default)]
pub struct LoginQuery {
    #[serde(default)]
    pub registered: Option<String>,
}

pub async fn get_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<LoginQuery>,
) -> Response {
    let notice = q
        .registered
        .is_some()
        .then_some("Registration successful! Please login");

    form_page(&state, &headers, "pages/login", "Login", json!({ "notice": notice }))
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub async fn post_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let email = form.email.trim().to_string();
    let password = form.password;

    let errors = auth_service::validate_login(&email, &password);
    if !errors.is_empty() {
        return login_with_errors(&state, &headers, &email, errors);
    }

    let credential = match auth_service::login_user(&state, &email, &password).await {
        Ok(c) => c,
        Err(errs) => return login_with_errors(&state, &headers, &email, errs),
    };

    tracing::info!("login succeeded");
    let jar = state.sessions.set(jar, &credential);
    (jar, render::redirect(&headers, "/dashboard")).into_response()
}

fn login_with_errors(state: &AppState, headers: &HeaderMap, email: &str, errors: FieldErrors) -> Response {
    form_page(
        state,
        headers,
        "pages/login",
        "Login",
        json!({
            "values": { "email": email },
            "errors": errors,
        }),
    )
}

// ---------------- REGISTER ----------------

pub async fn get_register(State(state): State<AppState>, headers: HeaderMap) -> Response {
    form_page(&state, &headers, "pages/register", "Register", json!({}))
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, rename = "confirmPassword")]
    pub confirm_password: String,
}

pub async fn post_register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Response {
    let email = form.email.trim().to_string();

    let errors = auth_service::validate_register(&email, &form.password, &form.confirm_password);
    if !errors.is_empty() {
        return register_with_errors(&state, &headers, &email, errors);
    }

    if let Err(errs) = auth_service::register_user(&state, &email, &form.password).await {
        return register_with_errors(&state, &headers, &email, errs);
    }

    render::redirect(&headers, "/login?registered=1")
}

fn register_with_errors(state: &AppState, headers: &HeaderMap, email: &str, errors: FieldErrors) -> Response {
    form_page(
        state,
        headers,
        "pages/register",
        "Register",
        json!({
            "values": { "email": email },
            "errors": errors,
        }),
    )
}

// ---------------- LOGOUT ----------------

// Always a full page load so no protected markup survives in the browser.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    let jar = state.sessions.clear(jar);
    (jar, render::redirect(&headers, "/login")).into_response()
}

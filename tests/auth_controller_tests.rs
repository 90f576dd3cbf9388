mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;
use stockwatch::{routes, AppState};
use tower::ServiceExt;

#[tokio::test]
async fn post_login_missing_fields_renders_errors() {
    let mock = MockBackend::spawn().await;
    let app = routes::app(test_state(&mock));

    let res = app.oneshot(post_form("/login", None, "email=&password=")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = body_string(res).await;
    assert!(body.contains("Email is required"));
    assert!(body.contains("Password is required"));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn post_login_short_password_is_rejected_locally() {
    let mock = MockBackend::spawn().await;
    let app = routes::app(test_state(&mock));

    let res = app
        .oneshot(post_form("/login", None, "email=a%40b.com&password=abc"))
        .await
        .unwrap();

    let body = body_string(res).await;
    assert!(body.contains("Password must be at least 6 characters"));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn successful_login_stores_the_credential_and_uses_it() {
    let mock = MockBackend::spawn().await;
    let token = mint_token(3600);
    mock.respond(Method::POST, "/auth/login", StatusCode::OK, json!({ "access_token": token }));
    mock.respond(Method::GET, "/watchlist", StatusCode::OK, json!(["AAPL"]));
    let app = routes::app(test_state(&mock));

    let res = app
        .clone()
        .oneshot(post_form("/login", None, "email=a%40b.com&password=secret1"))
        .await
        .unwrap();

    assert_eq!(header_str(&res, "HX-Redirect").as_deref(), Some("/dashboard"));
    let cookies = set_cookies(&res);
    assert!(cookies.iter().any(|c| c.starts_with(&format!("token={token}"))));
    assert!(cookies.iter().any(|c| c.contains("HttpOnly")));

    let login = mock.calls_to(Method::POST, "/auth/login");
    assert_eq!(login.len(), 1);
    assert_eq!(login[0].body, json!({ "email": "a@b.com", "password": "secret1" }));
    assert!(login[0].authorization.is_none());

    // next dashboard mount
    let res = app.oneshot(get("/dashboard", Some(&token), true)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let fetches = mock.calls_to(Method::GET, "/watchlist");
    assert_eq!(fetches.len(), 1);
    assert_eq!(fetches[0].authorization.as_deref(), Some(format!("Bearer {token}").as_str()));
}

#[tokio::test]
async fn rejected_login_shows_backend_message() {
    let mock = MockBackend::spawn().await;
    mock.respond(
        Method::POST,
        "/auth/login",
        StatusCode::UNAUTHORIZED,
        json!({ "error": "Invalid credentials" }),
    );
    let app = routes::app(test_state(&mock));

    let res = app
        .oneshot(post_form("/login", None, "email=a%40b.com&password=wrong12"))
        .await
        .unwrap();

    assert!(set_cookies(&res).is_empty());
    assert!(header_str(&res, "HX-Redirect").is_none());
    let body = body_string(res).await;
    assert!(body.contains("Invalid credentials"));
}

#[tokio::test]
async fn post_register_password_mismatch_renders_error() {
    let mock = MockBackend::spawn().await;
    let app = routes::app(test_state(&mock));

    let res = app
        .oneshot(post_form(
            "/register",
            None,
            "email=test%40example.com&password=123456&confirmPassword=654321",
        ))
        .await
        .unwrap();

    let body = body_string(res).await;
    assert!(body.contains("Passwords do not match"));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn successful_register_goes_to_login_with_notice() {
    let mock = MockBackend::spawn().await;
    mock.respond(
        Method::POST,
        "/auth/register",
        StatusCode::CREATED,
        json!({ "message": "User created successfully" }),
    );
    let app = routes::app(test_state(&mock));

    let res = app
        .clone()
        .oneshot(post_form(
            "/register",
            None,
            "email=new%40example.com&password=secret1&confirmPassword=secret1",
        ))
        .await
        .unwrap();

    let target = header_str(&res, "HX-Redirect").expect("redirect");
    assert_eq!(target, "/login?registered=1");
    assert!(set_cookies(&res).is_empty());

    let res = app.oneshot(get(&target, None, false)).await.unwrap();
    let body = body_string(res).await;
    assert!(body.contains("Registration successful! Please login"));
}

#[tokio::test]
async fn register_conflict_reports_existing_user() {
    let mock = MockBackend::spawn().await;
    mock.respond(
        Method::POST,
        "/auth/register",
        StatusCode::CONFLICT,
        json!({ "error": "User already exists" }),
    );
    let app = routes::app(test_state(&mock));

    let res = app
        .oneshot(post_form(
            "/register",
            None,
            "email=a%40b.com&password=secret1&confirmPassword=secret1",
        ))
        .await
        .unwrap();

    let body = body_string(res).await;
    assert!(body.contains("User already exists with this email"));
}

#[tokio::test]
async fn register_network_failure_is_reported() {
    let base = dead_base().await;
    let state = AppState::new(settings_for(&base, "ws://127.0.0.1:9/ws")).unwrap();
    let app = routes::app(state);

    let res = app
        .oneshot(post_form(
            "/register",
            None,
            "email=a%40b.com&password=secret1&confirmPassword=secret1",
        ))
        .await
        .unwrap();

    let body = body_string(res).await;
    assert!(body.contains("Network error. Please try again."));
}

#[tokio::test]
async fn logout_clears_the_credential() {
    let mock = MockBackend::spawn().await;
    let app = routes::app(test_state(&mock));

    let res = app
        .oneshot(get("/logout", Some(&mint_token(3600)), false))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&res, "location").as_deref(), Some("/login"));
    assert!(set_cookies(&res).iter().any(|c| c.starts_with("token=;") && c.contains("Max-Age=0")));
}

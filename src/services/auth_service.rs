use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use reqwest::StatusCode;

use crate::{error::ApiError, services::session::Credential, AppState};

pub type FieldErrors = HashMap<String, String>;

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"))
        .is_match(email)
}

fn check_email(errs: &mut FieldErrors, email: &str) {
    if email.is_empty() {
        errs.insert("email".into(), "Email is required".into());
    } else if !is_valid_email(email) {
        errs.insert("email".into(), "Please enter a valid email".into());
    }
}

fn check_password(errs: &mut FieldErrors, password: &str) {
    if password.is_empty() {
        errs.insert("password".into(), "Password is required".into());
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errs.insert(
            "password".into(),
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
}

pub fn validate_login(email: &str, password: &str) -> FieldErrors {
    let mut errs = FieldErrors::new();
    check_email(&mut errs, email);
    check_password(&mut errs, password);
    errs
}

pub fn validate_register(email: &str, password: &str, confirm_password: &str) -> FieldErrors {
    let mut errs = FieldErrors::new();
    check_email(&mut errs, email);
    check_password(&mut errs, password);

    if confirm_password.is_empty() {
        errs.insert("confirmPassword".into(), "Please confirm your password".into());
    } else if password != confirm_password {
        errs.insert("confirmPassword".into(), "Passwords do not match".into());
    }
    errs
}

fn form_error(message: impl Into<String>) -> FieldErrors {
    let mut errs = FieldErrors::new();
    errs.insert("_form".into(), message.into());
    errs
}

pub async fn login_user(state: &AppState, email: &str, password: &str) -> Result<Credential, FieldErrors> {
    match state.api.login(email, password).await {
        Ok(credential) => Ok(credential),
        Err(ApiError::Transport(err)) => {
            tracing::warn!("login request failed: {}", err);
            Err(form_error("Network error. Please try again."))
        }
        Err(err) => {
            tracing::info!("login rejected: {}", err);
            Err(form_error(err.user_message("Login failed")))
        }
    }
}

pub async fn register_user(state: &AppState, email: &str, password: &str) -> Result<(), FieldErrors> {
    match state.api.register(email, password).await {
        Ok(()) => Ok(()),
        Err(err) if err.status() == Some(StatusCode::CONFLICT) => {
            let mut errs = FieldErrors::new();
            errs.insert("email".into(), "User already exists with this email".into());
            Err(errs)
        }
        Err(ApiError::Transport(err)) => {
            tracing::warn!("register request failed: {}", err);
            Err(form_error("Network error. Please try again."))
        }
        Err(err) => {
            tracing::info!("register rejected: {}", err);
            Err(form_error(err.user_message("Registration failed")))
        }
    }
}

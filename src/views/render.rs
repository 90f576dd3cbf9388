use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::{json, ser::Formatter};
use std::io;

use crate::AppState;

pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn is_websocket(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

pub fn htmx_redirect(path: &str) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(path) {
        headers.insert("HX-Redirect", v);
    }
    (StatusCode::OK, headers, Html(String::new())).into_response()
}

/// Full page load for plain requests, `HX-Redirect` for htmx ones.
pub fn redirect(headers: &HeaderMap, path: &str) -> Response {
    if is_htmx(headers) {
        return htmx_redirect(path);
    }
    Redirect::to(path).into_response()
}

pub fn template_error(e: impl std::fmt::Display) -> Response {
    tracing::error!("template error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("template error: {e}")),
    )
        .into_response()
}

pub fn render_page(state: &AppState, tpl: &str, ctx: &serde_json::Value) -> String {
    state
        .hbs
        .render(tpl, ctx)
        .unwrap_or_else(|e| format!("template error: {e}"))
}

pub fn render_full(state: &AppState, title: &str, body_html: String) -> Result<String, String> {
    let ctx = json!({
        "title": title,
        "body": body_html,
    });

    state
        .hbs
        .render("layouts/base", &ctx)
        .map_err(|e| e.to_string())
}

/// The page shown while a protected navigation is still being checked.
/// It carries nothing but a loading indicator that fetches `initial_path`.
pub fn render_shell(state: &AppState, initial_path: &str) -> Result<String, String> {
    let ctx = json!({
        "title": "Loading",
        "checking": true,
        "initial_path": initial_path,
    });

    state
        .hbs
        .render("layouts/base", &ctx)
        .map_err(|e| e.to_string())
}

/// Wraps protected content in the navigation chrome.
pub fn render_protected(state: &AppState, active: &str, body_html: String) -> Result<String, String> {
    let ctx = json!({
        "body": body_html,
        "active_dashboard": active == "dashboard",
        "active_alerts": active == "alerts",
    });

    state
        .hbs
        .render("layouts/protected", &ctx)
        .map_err(|e| e.to_string())
}

/// htmx requests get the fragment, everything else the whole document.
pub fn respond_page(
    state: &AppState,
    headers: &HeaderMap,
    status: StatusCode,
    title: &str,
    body_html: String,
) -> Response {
    if is_htmx(headers) {
        return (status, Html(body_html)).into_response();
    }

    match render_full(state, title, body_html) {
        Ok(page) => (status, Html(page)).into_response(),
        Err(e) => template_error(e),
    }
}

pub fn respond_protected(
    state: &AppState,
    headers: &HeaderMap,
    title: &str,
    active: &str,
    body_html: String,
) -> Response {
    match render_protected(state, active, body_html) {
        Ok(fragment) => respond_page(state, headers, StatusCode::OK, title, fragment),
        Err(e) => template_error(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
    Info,
}

impl ToastLevel {
    fn as_str(&self) -> &'static str {
        match self {
            ToastLevel::Success => "success",
            ToastLevel::Error => "error",
            ToastLevel::Info => "info",
        }
    }
}

/// Builder for the `HX-Trigger` response header.
///
/// Events fire on the client's `<body>`; the layout shows `toast` events as
/// transient notifications.
#[derive(Debug, Default)]
pub struct HxTrigger {
    events: serde_json::Map<String, serde_json::Value>,
}

impl HxTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, name: &str) -> Self {
        self.events.insert(name.to_string(), serde_json::Value::Bool(true));
        self
    }

    pub fn event_with(mut self, name: &str, detail: serde_json::Value) -> Self {
        self.events.insert(name.to_string(), detail);
        self
    }

    pub fn toast(self, level: ToastLevel, message: impl Into<String>) -> Self {
        let message: String = message.into();
        self.event_with("toast", json!({ "level": level.as_str(), "message": message }))
    }

    /// JSON with every non-ASCII character `\u`-escaped; header bytes are
    /// read as Latin-1 by browsers.
    pub fn header_value(&self) -> HeaderValue {
        let mut raw = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut raw, AsciiFormatter);
        if serde_json::Value::Object(self.events.clone())
            .serialize(&mut ser)
            .is_err()
        {
            return HeaderValue::from_static("");
        }
        HeaderValue::from_bytes(&raw).unwrap_or_else(|_| HeaderValue::from_static(""))
    }

    pub fn apply(&self, mut res: Response) -> Response {
        if !self.events.is_empty() {
            res.headers_mut().insert("HX-Trigger", self.header_value());
        }
        res
    }
}

struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() && ch != '\x7f' {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// A toast and nothing else; the swap target is left untouched.
pub fn toast_only(level: ToastLevel, message: impl Into<String>) -> Response {
    let mut res = (StatusCode::OK, Html(String::new())).into_response();
    res.headers_mut()
        .insert("HX-Reswap", HeaderValue::from_static("none"));
    HxTrigger::new().toast(level, message).apply(res)
}

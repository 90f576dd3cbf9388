use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub environment: Environment,

    // where the browser reaches this front-end
    pub public_origin: String,
    pub api_base_url: String,
    pub push_url: String,

    pub session_cookie_name: String,
    pub cookie_secure: bool,

    pub request_timeout: Duration,
    pub channel_max_attempts: u32,
    pub channel_reconnect_delay: Duration,
}

pub const DEV_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEV_PUSH_URL: &str = "ws://localhost:5000";

/// Picks the backend REST address for an environment.
///
/// Development talks to the backend directly; production goes through the
/// same origin the browser already uses, under `/api`.
pub fn api_base_for(environment: Environment, public_origin: &str) -> String {
    match environment {
        Environment::Development => DEV_API_BASE_URL.to_string(),
        Environment::Production => format!("{}/api", public_origin.trim_end_matches('/')),
    }
}

/// Socket.IO server address for the push channel; the Engine.IO path is
/// added when connecting.
pub fn push_url_for(environment: Environment, public_origin: &str) -> String {
    match environment {
        Environment::Development => DEV_PUSH_URL.to_string(),
        Environment::Production => {
            let origin = public_origin.trim_end_matches('/');
            if let Some(rest) = origin.strip_prefix("https://") {
                format!("wss://{rest}")
            } else if let Some(rest) = origin.strip_prefix("http://") {
                format!("ws://{rest}")
            } else {
                origin.to_string()
            }
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let environment = Environment::parse(&env::var("APP_ENV").unwrap_or_default());

    let public_origin =
        env::var("PUBLIC_ORIGIN").unwrap_or_else(|_| format!("http://{}:{}", host, port));

    let api_base_url = env::var("API_BASE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| api_base_for(environment, &public_origin));

    let push_url = env::var("PUSH_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| push_url_for(environment, &public_origin));

    let session_cookie_name =
        env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "token".to_string());

    let channel_max_attempts = env_u64("CHANNEL_MAX_ATTEMPTS", 5) as u32;

    Settings {
        host,
        port,
        environment,
        public_origin,
        api_base_url,
        push_url,
        session_cookie_name,
        cookie_secure: env_flag("COOKIE_SECURE"),
        request_timeout: Duration::from_secs(env_u64("REQUEST_TIMEOUT_SECS", 10)),
        channel_max_attempts,
        channel_reconnect_delay: Duration::from_millis(env_u64("CHANNEL_RECONNECT_DELAY_MS", 1000)),
    }
}

use reqwest::{header::AUTHORIZATION, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::{
    config::Settings,
    error::ApiError,
    models::{AlertHistoryRecord, AlertRule, NewAlert, SearchResponse},
    services::session::Credential,
};

/// HTTP client for the watchlist backend.
///
/// Every request goes through [`ApiClient::request`], which attaches the
/// session credential as a bearer token when one is present. Nothing is
/// retried; errors reach the caller as they happened.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(settings.request_timeout).build()?;
        Ok(Self::new(settings.api_base_url.clone(), http))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Builds a request against the backend, authorised with `credential`.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
    ) -> Result<RequestBuilder, ApiError> {
        let mut req = self.http.request(method, self.url(path));
        if let Some(c) = credential {
            let value = reqwest::header::HeaderValue::from_str(&c.bearer())
                .map_err(|_| ApiError::InvalidHeader)?;
            req = req.header(AUTHORIZATION, value);
        }
        Ok(req)
    }

    async fn send(req: RequestBuilder) -> Result<Response, ApiError> {
        let res = req.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .unwrap_or_default();

        tracing::debug!("backend call failed: {} {}", status, message);
        Err(ApiError::Status { status, message })
    }

    async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, ApiError> {
        let res = Self::send(req).await?;
        let bytes = res.bytes().await?;
        serde_json::from_slice::<T>(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    // ---------------- auth ----------------

    /// `POST /auth/login`; yields the issued credential.
    pub async fn login(&self, email: &str, password: &str) -> Result<Credential, ApiError> {
        let req = self
            .request(Method::POST, "/auth/login", None)?
            .json(&CredentialsBody { email, password });

        let body: LoginResponse = Self::send_json(req).await?;
        body.access_token
            .and_then(Credential::new)
            .ok_or_else(|| ApiError::Decode("login response has no access_token".to_string()))
    }

    /// `POST /auth/register`; only 201 counts as success.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let req = self
            .request(Method::POST, "/auth/register", None)?
            .json(&CredentialsBody { email, password });

        let res = Self::send(req).await?;
        if res.status() != StatusCode::CREATED {
            return Err(ApiError::Status {
                status: res.status(),
                message: String::new(),
            });
        }
        Ok(())
    }

    pub async fn verify(&self, credential: &Credential) -> Result<(), ApiError> {
        let req = self.request(Method::GET, "/auth/verify", Some(credential))?;
        Self::send(req).await.map(|_| ())
    }

    // ---------------- watchlist ----------------

    pub async fn watchlist(&self, credential: Option<&Credential>) -> Result<Vec<String>, ApiError> {
        let req = self.request(Method::GET, "/watchlist", credential)?;
        Self::send_json(req).await
    }

    pub async fn add_to_watchlist(
        &self,
        credential: Option<&Credential>,
        symbol: &str,
    ) -> Result<(), ApiError> {
        let req = self
            .request(Method::POST, "/watchlist", credential)?
            .json(&json!({ "symbol": symbol }));
        Self::send(req).await.map(|_| ())
    }

    pub async fn remove_from_watchlist(
        &self,
        credential: Option<&Credential>,
        symbol: &str,
    ) -> Result<(), ApiError> {
        let req = self
            .request(Method::DELETE, "/watchlist", credential)?
            .json(&json!({ "symbol": symbol }));
        Self::send(req).await.map(|_| ())
    }

    // ---------------- search ----------------

    pub async fn search(
        &self,
        credential: Option<&Credential>,
        query: &str,
    ) -> Result<SearchResponse, ApiError> {
        let req = self
            .request(Method::GET, "/stocks/search", credential)?
            .query(&[("query", query)]);
        Self::send_json(req).await
    }

    // ---------------- alerts ----------------

    pub async fn alerts(&self, credential: Option<&Credential>) -> Result<Vec<AlertRule>, ApiError> {
        let req = self.request(Method::GET, "/alerts", credential)?;
        Self::send_json(req).await
    }

    pub async fn alert_history(
        &self,
        credential: Option<&Credential>,
    ) -> Result<Vec<AlertHistoryRecord>, ApiError> {
        let req = self.request(Method::GET, "/alert-history", credential)?;
        Self::send_json(req).await
    }

    pub async fn create_alert(
        &self,
        credential: Option<&Credential>,
        alert: &NewAlert,
    ) -> Result<(), ApiError> {
        let req = self.request(Method::POST, "/alerts", credential)?.json(alert);
        Self::send(req).await.map(|_| ())
    }

    pub async fn delete_alert(
        &self,
        credential: Option<&Credential>,
        alert_id: &str,
    ) -> Result<(), ApiError> {
        let req = self
            .request(Method::DELETE, "/alerts", credential)?
            .json(&json!({ "alert_id": alert_id }));
        Self::send(req).await.map(|_| ())
    }
}

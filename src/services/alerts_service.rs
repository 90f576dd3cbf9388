use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::ApiError,
    models::{AlertCondition, AlertHistoryRecord, AlertRule, NewAlert},
    services::{dashboard_service::normalize_symbol, session::Session},
    AppState,
};

#[derive(Error, Debug)]
pub enum AlertsError {
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Backend(#[from] ApiError),
}

/// Raw create form as posted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertForm {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub target_price: String,
    #[serde(default)]
    pub condition: String,
}

/// Checks a create form without touching the network.
pub fn validate(form: &AlertForm) -> Result<NewAlert, AlertsError> {
    let symbol = form.symbol.trim();
    let target = form.target_price.trim();

    if symbol.is_empty() || target.is_empty() {
        return Err(AlertsError::Invalid("Please fill all fields".into()));
    }

    let symbol = normalize_symbol(symbol)
        .map(|s| s.to_uppercase())
        .ok_or_else(|| AlertsError::Invalid("Please enter a valid stock symbol".into()))?;

    let target_price = match target.parse::<f64>() {
        Ok(p) if p.is_finite() && p >= 0.0 => p,
        _ => return Err(AlertsError::Invalid("Please enter a valid target price".into())),
    };

    let condition = AlertCondition::parse(&form.condition)
        .ok_or_else(|| AlertsError::Invalid("Please choose above or below".into()))?;

    Ok(NewAlert {
        symbol,
        target_price,
        condition,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertRow {
    pub id: String,
    pub symbol: String,
    pub condition: String,
    pub target_price: String,
    pub triggered: bool,
}

impl From<AlertRule> for AlertRow {
    fn from(a: AlertRule) -> Self {
        Self {
            id: a.id,
            symbol: a.symbol,
            condition: a.condition.into(),
            target_price: format!("{:.2}", a.target_price),
            triggered: a.triggered,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub symbol: String,
    pub condition: String,
    pub target_price: String,
    pub actual_price: String,
    pub triggered_at: String,
}

impl From<AlertHistoryRecord> for HistoryRow {
    fn from(h: AlertHistoryRecord) -> Self {
        Self {
            symbol: h.symbol,
            condition: h.condition.into(),
            target_price: format!("{:.2}", h.target_price),
            actual_price: format!("{:.2}", h.actual_price),
            triggered_at: format_timestamp(&h.triggered_at),
        }
    }
}

/// Active rules and trigger history, always fetched together.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertsView {
    pub alerts: Vec<AlertRow>,
    pub history: Vec<HistoryRow>,
}

/// Renders backend timestamps as `YYYY-MM-DD HH:MM:SS` UTC; text that does
/// not parse is shown as-is.
pub fn format_timestamp(raw: &str) -> String {
    const OUT: &str = "%Y-%m-%d %H:%M:%S";
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc).format(OUT).to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.with_timezone(&Utc).format(OUT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format(OUT).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return dt.format(OUT).to_string();
    }
    if let Ok(n) = s.parse::<i64>() {
        // seconds or milliseconds since the epoch
        let secs = if n > 100_000_000_000 { n / 1000 } else { n };
        if let Some(dt) = Utc.timestamp_opt(secs, 0).single() {
            return dt.format(OUT).to_string();
        }
    }

    raw.to_string()
}

pub async fn load_alerts(state: &AppState, session: &Session) -> Result<AlertsView, ApiError> {
    let credential = session.credential();
    let (alerts, history) = tokio::try_join!(
        state.api.alerts(credential),
        state.api.alert_history(credential),
    )?;

    Ok(AlertsView {
        alerts: alerts.into_iter().map(AlertRow::from).collect(),
        history: history.into_iter().map(HistoryRow::from).collect(),
    })
}

pub async fn create_alert(
    state: &AppState,
    session: &Session,
    form: &AlertForm,
) -> Result<NewAlert, AlertsError> {
    let alert = validate(form)?;
    state.api.create_alert(session.credential(), &alert).await?;
    tracing::info!(
        "alert created: {} {} {}",
        alert.symbol,
        alert.condition.as_str(),
        alert.target_price
    );
    Ok(alert)
}

pub async fn delete_alert(state: &AppState, session: &Session, alert_id: &str) -> Result<(), AlertsError> {
    let id = alert_id.trim();
    if id.is_empty() {
        return Err(AlertsError::Invalid("Missing alert id".into()));
    }
    state.api.delete_alert(session.credential(), id).await?;
    Ok(())
}

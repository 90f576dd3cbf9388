use serde::{Deserialize, Serialize};

use super::de;

/// Trigger direction of an alert. The backend stores whatever a client
/// posted, so anything unrecognised is carried through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertCondition {
    Above,
    Below,
    Other(String),
}

impl AlertCondition {
    /// Strict parse for form input: only above and below are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "above" => Some(AlertCondition::Above),
            "below" => Some(AlertCondition::Below),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AlertCondition::Above => "above",
            AlertCondition::Below => "below",
            AlertCondition::Other(raw) => raw,
        }
    }
}

impl Default for AlertCondition {
    fn default() -> Self {
        AlertCondition::Other(String::new())
    }
}

impl From<String> for AlertCondition {
    fn from(raw: String) -> Self {
        AlertCondition::parse(&raw).unwrap_or(AlertCondition::Other(raw))
    }
}

impl From<AlertCondition> for String {
    fn from(condition: AlertCondition) -> Self {
        condition.as_str().to_string()
    }
}

/// A price alert rule as the backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub symbol: String,
    #[serde(deserialize_with = "de::number_or_string")]
    pub target_price: f64,
    #[serde(default)]
    pub condition: AlertCondition,
    #[serde(default)]
    pub triggered: bool,
}

/// One past trigger of an alert. Read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertHistoryRecord {
    pub symbol: String,
    #[serde(default)]
    pub condition: AlertCondition,
    #[serde(deserialize_with = "de::number_or_string")]
    pub target_price: f64,
    #[serde(deserialize_with = "de::number_or_string")]
    pub actual_price: f64,
    #[serde(default, deserialize_with = "de::text_or_number")]
    pub triggered_at: String,
}

/// Body of `POST /alerts`.
#[derive(Debug, Clone, Serialize)]
pub struct NewAlert {
    pub symbol: String,
    pub target_price: f64,
    pub condition: AlertCondition,
}

use serde::{Deserialize, Serialize};

use super::de;

/// Payload of a `stock_update` push event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    #[serde(deserialize_with = "de::number_or_string")]
    pub price: f64,
}

/// Latest known price of a watched symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Price {
    Pending,
    Quoted(f64),
}

impl Price {
    pub const PENDING_TEXT: &'static str = "Loading...";

    pub fn is_pending(&self) -> bool {
        matches!(self, Price::Pending)
    }

    pub fn display(&self) -> String {
        match self {
            Price::Pending => Self::PENDING_TEXT.to_string(),
            Price::Quoted(p) => format!("${:.2}", p),
        }
    }
}

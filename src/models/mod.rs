pub mod alert;
pub mod price;
pub mod stock;

pub use alert::{AlertCondition, AlertHistoryRecord, AlertRule, NewAlert};
pub use price::{Price, PriceUpdate};
pub use stock::{SearchMatch, SearchResponse};

/// Lenient field decoders for backend JSON, which is not strict about
/// numbers vs. strings.
pub(crate) mod de {
    use serde::{Deserialize, Deserializer, de::Error};
    use serde_json::Value;

    pub fn number_or_string<'de, D>(d: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| D::Error::custom("number out of range")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("not a number: {s}"))),
            other => Err(D::Error::custom(format!("expected number, got {other}"))),
        }
    }

    pub fn text_or_number<'de, D>(d: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Null => Ok(String::new()),
            other => Err(D::Error::custom(format!("expected text, got {other}"))),
        }
    }
}

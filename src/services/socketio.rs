//! Socket.IO (protocol 5) over Engine.IO 4, websocket transport only.
//!
//! Every websocket text message is one Engine.IO packet: a type digit
//! followed by a payload. Socket.IO packets ride inside Engine.IO `4`
//! (message) packets, so an event on the default namespace looks like
//! `42["stock_update",{"symbol":"AAPL","price":187.5}]`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace connect request for `/`.
pub const CONNECT: &str = "40";
pub const PONG: &str = "3";

/// Query the server expects on the websocket upgrade.
pub const TRANSPORT_QUERY: &str = "EIO=4&transport=websocket";

/// Payload of the Engine.IO open packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    #[serde(default)]
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl OpenInfo {
    /// How long the connection may stay silent before it counts as dead:
    /// the server pings every `ping_interval` and waits `ping_timeout`.
    pub fn idle_limit(&self) -> Duration {
        Duration::from_millis(self.ping_interval.saturating_add(self.ping_timeout))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Connect,
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(String),
    Other,
}

pub fn decode(raw: &str) -> Option<Packet> {
    let mut chars = raw.chars();
    let packet = match chars.next()? {
        '0' => Packet::Open(serde_json::from_str(chars.as_str()).ok()?),
        '1' => Packet::Close,
        '2' => Packet::Ping,
        '3' => Packet::Pong,
        '4' => decode_message(chars.as_str())?,
        _ => Packet::Other,
    };
    Some(packet)
}

// Socket.IO packet inside an Engine.IO message.
fn decode_message(raw: &str) -> Option<Packet> {
    let mut chars = raw.chars();
    let kind = chars.next()?;
    let body = skip_namespace_and_ack(chars.as_str());

    let packet = match kind {
        '0' => Packet::Connect,
        '1' => Packet::Disconnect,
        '2' => {
            let mut parts: Vec<Value> = serde_json::from_str(body).ok()?;
            if parts.is_empty() {
                return None;
            }
            let name = match parts.remove(0) {
                Value::String(name) => name,
                _ => return None,
            };
            let data = parts.into_iter().next().unwrap_or(Value::Null);
            Packet::Event { name, data }
        }
        '4' => {
            let message = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| body.to_string());
            Packet::ConnectError(message)
        }
        _ => Packet::Other,
    };
    Some(packet)
}

// `/admin,12[...]` -> `[...]`
fn skip_namespace_and_ack(raw: &str) -> &str {
    let mut rest = raw;
    if rest.starts_with('/') {
        rest = match rest.find(',') {
            Some(i) => &rest[i + 1..],
            None => "",
        };
    }
    rest.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Encodes an event on the default namespace.
pub fn encode_event<T: Serialize>(name: &str, data: &T) -> Result<String, serde_json::Error> {
    Ok(format!("42{}", serde_json::to_string(&(name, data))?))
}

/// Adds the Engine.IO path and query to a push URL that names only a host.
pub fn endpoint(url: &str) -> String {
    let base = url.trim_end_matches('/');
    if base.contains('?') {
        return base.to_string();
    }
    let base = if base.ends_with("/socket.io") {
        base.to_string()
    } else {
        format!("{base}/socket.io")
    };
    format!("{base}/?{TRANSPORT_QUERY}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_engine_packets() {
        let open = decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#);
        let Some(Packet::Open(info)) = open else {
            panic!("expected open packet, got {open:?}");
        };
        assert_eq!(info.sid, "abc");
        assert_eq!(info.idle_limit(), Duration::from_secs(45));

        assert_eq!(decode("2"), Some(Packet::Ping));
        assert_eq!(decode("1"), Some(Packet::Close));
        assert_eq!(decode(""), None);
    }

    #[test]
    fn decodes_socket_packets() {
        assert_eq!(decode(r#"40{"sid":"xyz"}"#), Some(Packet::Connect));
        assert_eq!(decode("41"), Some(Packet::Disconnect));
        assert_eq!(
            decode(r#"44{"message":"Not authorized"}"#),
            Some(Packet::ConnectError("Not authorized".into()))
        );
        assert_eq!(
            decode(r#"42["stock_update",{"symbol":"AAPL","price":187.5}]"#),
            Some(Packet::Event {
                name: "stock_update".into(),
                data: json!({ "symbol": "AAPL", "price": 187.5 }),
            })
        );
        assert_eq!(
            decode(r#"42/prices,7["tick"]"#),
            Some(Packet::Event { name: "tick".into(), data: Value::Null })
        );
        assert_eq!(decode("42not json"), None);
    }

    #[test]
    fn encodes_events_as_arrays() {
        let frame = encode_event("subscribe_stocks", &json!({ "symbols": ["AAPL"] })).unwrap();
        assert_eq!(frame, r#"42["subscribe_stocks",{"symbols":["AAPL"]}]"#);
    }

    #[test]
    fn endpoint_adds_engine_path_once() {
        assert_eq!(
            endpoint("ws://localhost:5000"),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint("wss://watch.example.com/socket.io/"),
            "wss://watch.example.com/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(endpoint("ws://h/socket.io/?EIO=4&transport=websocket"), "ws://h/socket.io/?EIO=4&transport=websocket");
    }
}

use std::time::Duration;

use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time::{sleep, timeout, Instant},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        protocol::Message as TMessage,
    },
    MaybeTlsStream, WebSocketStream,
};

use crate::{
    config::Settings,
    error::ChannelError,
    models::PriceUpdate,
    services::{
        session::Credential,
        socketio::{self, Packet},
    },
};

type PushStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_GRACE: Duration = Duration::from_secs(2);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How the channel retries after the push connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.channel_max_attempts,
            base_delay: settings.channel_reconnect_delay,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): doubles each time,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Price(PriceUpdate),
    Reconnecting { attempt: u32, delay: Duration },
    GaveUp,
}

/// Events this client emits on the push connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    SubscribeStocks { symbols: Vec<String> },
    UnsubscribeStocks { symbols: Vec<String> },
}

impl ClientFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let (name, symbols) = match self {
            ClientFrame::SubscribeStocks { symbols } => ("subscribe_stocks", symbols),
            ClientFrame::UnsubscribeStocks { symbols } => ("unsubscribe_stocks", symbols),
        };
        socketio::encode_event(name, &json!({ "symbols": symbols }))
    }
}

/// Extracts a price from a Socket.IO text frame; anything else yields `None`.
pub fn parse_update(raw: &str) -> Option<PriceUpdate> {
    match socketio::decode(raw)? {
        Packet::Event { name, data } => price_update(&name, data),
        _ => None,
    }
}

fn price_update(event: &str, data: Value) -> Option<PriceUpdate> {
    if event != "stock_update" {
        return None;
    }
    let mut update: PriceUpdate = serde_json::from_value(data).ok()?;
    update.symbol = update.symbol.trim().to_string();
    if update.symbol.is_empty() || !update.price.is_finite() {
        return None;
    }
    Some(update)
}

#[derive(Debug)]
enum Command {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Close,
}

enum Exit {
    Closed,
    Dropped,
}

/// Live price subscription over the backend push connection.
///
/// Opening spawns a task that owns the socket. Events arrive on the
/// receiver returned by [`PriceChannel::open`]. The set of subscribed
/// symbols is replayed on every (re)connect. Closing is done once via
/// [`PriceChannel::close`]; dropping the handle aborts the task.
pub struct PriceChannel {
    commands: mpsc::UnboundedSender<Command>,
    task: Option<JoinHandle<()>>,
}

impl PriceChannel {
    pub fn open(
        url: impl Into<String>,
        credential: Option<Credential>,
        symbols: Vec<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();

        let mut worker = ChannelTask {
            url: url.into(),
            credential,
            symbols: Vec::new(),
            policy,
            events: evt_tx,
            commands: cmd_rx,
        };
        worker.track_subscribe(symbols);

        let task = tokio::spawn(worker.run());

        (
            Self {
                commands: cmd_tx,
                task: Some(task),
            },
            evt_rx,
        )
    }

    pub fn subscribe(&self, symbols: Vec<String>) {
        let _ = self.commands.send(Command::Subscribe(symbols));
    }

    pub fn unsubscribe(&self, symbols: Vec<String>) {
        let _ = self.commands.send(Command::Unsubscribe(symbols));
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn close(mut self) {
        let _ = self.commands.send(Command::Close);

        if let Some(mut task) = self.task.take() {
            if timeout(CLOSE_GRACE, &mut task).await.is_err() {
                tracing::warn!("price channel did not close in time; aborting");
                task.abort();
            }
        }
    }
}

impl Drop for PriceChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ChannelTask {
    url: String,
    credential: Option<Credential>,
    symbols: Vec<String>,
    policy: ReconnectPolicy,
    events: mpsc::UnboundedSender<ChannelEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl ChannelTask {
    async fn run(mut self) {
        let mut failures: u32 = 0;

        loop {
            match self.connect().await {
                Ok((ws, idle_limit)) => {
                    failures = 0;
                    tracing::info!("push channel connected: {} symbols", self.symbols.len());
                    if self.events.send(ChannelEvent::Connected).is_err() {
                        return;
                    }
                    if let Exit::Closed = self.pump(ws, idle_limit).await {
                        return;
                    }
                    tracing::warn!("push channel dropped");
                }
                Err(err) => {
                    tracing::warn!("push channel connect failed: {}", err);
                }
            }

            failures += 1;
            if failures > self.policy.max_attempts {
                tracing::error!("push channel gave up after {} attempts", self.policy.max_attempts);
                let _ = self.events.send(ChannelEvent::GaveUp);
                return;
            }

            let delay = self.policy.delay_for(failures);
            let reconnecting = ChannelEvent::Reconnecting {
                attempt: failures,
                delay,
            };
            if self.events.send(reconnecting).is_err() {
                return;
            }

            if let Exit::Closed = self.backoff(delay).await {
                return;
            }
        }
    }

    // Opens the websocket and joins the default namespace. Yields the
    // silence allowed before the connection counts as dead.
    async fn connect(&self) -> Result<(PushStream, Duration), ChannelError> {
        let mut request = socketio::endpoint(&self.url).into_client_request()?;

        if let Some(c) = &self.credential {
            let value = HeaderValue::from_str(&c.bearer())
                .map_err(|e| ChannelError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (mut ws, _) = connect_async(request).await?;

        let open = match next_packet(&mut ws).await? {
            Packet::Open(info) => info,
            other => {
                return Err(ChannelError::Handshake(format!("expected open packet, got {other:?}")));
            }
        };
        ws.send(TMessage::Text(socketio::CONNECT.to_string())).await?;

        loop {
            match next_packet(&mut ws).await? {
                Packet::Connect => break,
                Packet::ConnectError(message) => return Err(ChannelError::Handshake(message)),
                Packet::Ping => ws.send(TMessage::Text(socketio::PONG.to_string())).await?,
                Packet::Close => return Err(ChannelError::Handshake("closed by server".into())),
                _ => {}
            }
        }

        tracing::debug!("push session {} joined", open.sid);
        Ok((ws, open.idle_limit()))
    }

    // Waits out a reconnect delay while still honouring commands.
    async fn backoff(&mut self, delay: Duration) -> Exit {
        let wait = sleep(delay);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                _ = &mut wait => return Exit::Dropped,
                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Close) => return Exit::Closed,
                    Some(Command::Subscribe(s)) => {
                        self.track_subscribe(s);
                    }
                    Some(Command::Unsubscribe(s)) => {
                        self.track_unsubscribe(s);
                    }
                },
            }
        }
    }

    async fn pump(&mut self, ws: PushStream, idle_limit: Duration) -> Exit {
        let (mut write, mut read) = ws.split();

        if !self.symbols.is_empty() {
            let frame = ClientFrame::SubscribeStocks {
                symbols: self.symbols.clone(),
            };
            if let Err(err) = send_frame(&mut write, &frame).await {
                tracing::warn!("subscribe failed: {}", err);
                return Exit::Dropped;
            }
        }

        let idle = sleep(idle_limit);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                _ = &mut idle => {
                    tracing::warn!("push channel silent for {:?}", idle_limit);
                    return Exit::Dropped;
                }

                msg = read.next() => {
                    idle.as_mut().reset(Instant::now() + idle_limit);
                    match msg {
                        Some(Ok(TMessage::Text(txt))) => match socketio::decode(&txt) {
                            Some(Packet::Ping) => {
                                let pong = TMessage::Text(socketio::PONG.to_string());
                                if write.send(pong).await.is_err() {
                                    return Exit::Dropped;
                                }
                            }
                            Some(Packet::Event { name, data }) => {
                                if let Some(update) = price_update(&name, data) {
                                    if self.events.send(ChannelEvent::Price(update)).is_err() {
                                        shutdown(&mut write).await;
                                        return Exit::Closed;
                                    }
                                }
                            }
                            Some(Packet::Close) | Some(Packet::Disconnect) => return Exit::Dropped,
                            _ => {}
                        },
                        Some(Ok(TMessage::Ping(payload))) => {
                            let _ = write.send(TMessage::Pong(payload)).await;
                        }
                        Some(Ok(TMessage::Close(_))) | None => return Exit::Dropped,
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            tracing::debug!("push channel read error: {}", err);
                            return Exit::Dropped;
                        }
                    }
                }

                cmd = self.commands.recv() => match cmd {
                    None | Some(Command::Close) => {
                        shutdown(&mut write).await;
                        return Exit::Closed;
                    }
                    Some(Command::Subscribe(s)) => {
                        let added = self.track_subscribe(s);
                        if !added.is_empty() {
                            let frame = ClientFrame::SubscribeStocks { symbols: added };
                            if send_frame(&mut write, &frame).await.is_err() {
                                return Exit::Dropped;
                            }
                        }
                    }
                    Some(Command::Unsubscribe(s)) => {
                        let removed = self.track_unsubscribe(s);
                        if !removed.is_empty() {
                            let frame = ClientFrame::UnsubscribeStocks { symbols: removed };
                            if send_frame(&mut write, &frame).await.is_err() {
                                return Exit::Dropped;
                            }
                        }
                    }
                },
            }
        }
    }

    // Returns the symbols that were not subscribed yet.
    fn track_subscribe(&mut self, symbols: Vec<String>) -> Vec<String> {
        let mut added = Vec::new();
        for s in symbols {
            let s = s.trim().to_string();
            if s.is_empty() || self.symbols.contains(&s) || added.contains(&s) {
                continue;
            }
            added.push(s);
        }
        self.symbols.extend(added.iter().cloned());
        added
    }

    fn track_unsubscribe(&mut self, symbols: Vec<String>) -> Vec<String> {
        let mut removed = Vec::new();
        for s in symbols {
            let s = s.trim().to_string();
            if let Some(pos) = self.symbols.iter().position(|x| *x == s) {
                self.symbols.remove(pos);
                removed.push(s);
            }
        }
        removed
    }
}

// Next Engine.IO packet during the handshake; other websocket traffic is
// skipped.
async fn next_packet(ws: &mut PushStream) -> Result<Packet, ChannelError> {
    loop {
        let msg = timeout(HANDSHAKE_TIMEOUT, ws.next())
            .await
            .map_err(|_| ChannelError::Handshake("timed out".into()))?;

        match msg {
            Some(Ok(TMessage::Text(txt))) => {
                if let Some(packet) = socketio::decode(&txt) {
                    return Ok(packet);
                }
            }
            Some(Ok(TMessage::Close(_))) | None => {
                return Err(ChannelError::Handshake("closed by server".into()));
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

async fn send_frame(
    write: &mut SplitSink<PushStream, TMessage>,
    frame: &ClientFrame,
) -> Result<(), ChannelError> {
    write.send(TMessage::Text(frame.encode()?)).await?;
    Ok(())
}

// Leaves the namespace, then closes the websocket.
async fn shutdown(write: &mut SplitSink<PushStream, TMessage>) {
    let _ = write.send(TMessage::Text("41".to_string())).await;
    let _ = write.send(TMessage::Close(None)).await;
}

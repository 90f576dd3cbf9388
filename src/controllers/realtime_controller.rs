use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query, State,
    },
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration};

use crate::{
    services::{
        dashboard_service::{self, DashboardView, Watchlist},
        price_channel::{ChannelEvent, PriceChannel, ReconnectPolicy},
        session::{Credential, Session},
    },
    AppState,
};

#[derive(Deserialize)]
pub struct PricesWsQuery {
    #[serde(default)]
    pub symbols: String,
}

/// Messages the dashboard page sends over `/ws/prices`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BrowserCommand {
    Subscribe { symbols: Vec<String> },
    Unsubscribe { symbols: Vec<String> },
}

/// Messages the dashboard page receives.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BrowserFrame {
    Price {
        symbol: String,
        price: f64,
        display: String,
    },
    Status {
        state: &'static str,
    },
}

// GET /ws/prices?symbols=AAPL,MSFT
pub async fn ws_prices(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(q): Query<PricesWsQuery>,
) -> impl IntoResponse {
    let symbols = dashboard_service::parse_symbols(&q.symbols);
    let credential = session.credential().cloned();

    ws.on_upgrade(move |socket| handle_prices_socket(socket, state, credential, symbols))
}

async fn send_frame(ws: &mut WebSocket, frame: &BrowserFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(txt) => ws.send(Message::Text(txt)).await.is_ok(),
        Err(_) => true,
    }
}

fn clean(symbols: Vec<String>) -> Vec<String> {
    symbols
        .iter()
        .filter_map(|s| dashboard_service::normalize_symbol(s))
        .collect()
}

async fn handle_prices_socket(
    mut client_ws: WebSocket,
    state: AppState,
    credential: Option<Credential>,
    symbols: Vec<String>,
) {
    tracing::info!("price socket opened: {} symbols", symbols.len());

    let mut view = DashboardView::new(Watchlist::from_symbols(&symbols));
    let (channel, mut events) = PriceChannel::open(
        state.settings.push_url.clone(),
        credential,
        symbols,
        ReconnectPolicy::from_settings(&state.settings),
    );

    let mut ping = interval(Duration::from_secs(25));
    let mut channel_live = true;

    loop {
        tokio::select! {
            _ = ping.tick() => {
                if client_ws.send(Message::Ping(b"ping".to_vec())).await.is_err() {
                    break;
                }
            }

            evt = events.recv(), if channel_live => {
                let frame = match evt {
                    Some(ChannelEvent::Price(update)) => match view.apply(&update) {
                        Some(card) => BrowserFrame::Price {
                            symbol: card.symbol,
                            price: update.price,
                            display: card.price,
                        },
                        None => continue,
                    },
                    Some(ChannelEvent::Connected) => BrowserFrame::Status { state: "connected" },
                    Some(ChannelEvent::Reconnecting { attempt, delay }) => {
                        tracing::debug!("push channel retry {} in {:?}", attempt, delay);
                        BrowserFrame::Status { state: "reconnecting" }
                    }
                    Some(ChannelEvent::GaveUp) | None => {
                        channel_live = false;
                        BrowserFrame::Status { state: "offline" }
                    }
                };

                if !send_frame(&mut client_ws, &frame).await {
                    break;
                }
            }

            client_msg = client_ws.recv() => {
                match client_msg {
                    Some(Ok(Message::Text(txt))) => match serde_json::from_str::<BrowserCommand>(&txt) {
                        Ok(BrowserCommand::Subscribe { symbols }) => {
                            let symbols = clean(symbols);
                            for s in &symbols {
                                view.watch(s.clone());
                            }
                            channel.subscribe(symbols);
                        }
                        Ok(BrowserCommand::Unsubscribe { symbols }) => {
                            let symbols = clean(symbols);
                            for s in &symbols {
                                view.unwatch(s);
                            }
                            channel.unsubscribe(symbols);
                        }
                        Err(e) => tracing::debug!("ignoring browser message: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    channel.close().await;
    let _ = client_ws.close().await;
    tracing::info!("price socket closed");
}

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::{
    error::ApiError,
    models::{Price, PriceUpdate},
    services::session::Session,
    AppState,
};

/// Trims a user-typed symbol; `None` when nothing is left. Case and
/// punctuation are kept, the backend matches symbols exactly.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Parses the comma-joined list a page carries, keeping first-seen order.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for s in raw.split(',').filter_map(normalize_symbol) {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

/// The user's watched symbols, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    symbols: Vec<String>,
}

impl Watchlist {
    /// Mirrors a list as the backend returned it; only exact duplicates
    /// are dropped.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Watchlist::default();
        for s in symbols {
            list.push(s.as_ref().to_string());
        }
        list
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Appends unless already present.
    pub fn push(&mut self, symbol: String) -> bool {
        if self.contains(&symbol) {
            return false;
        }
        self.symbols.push(symbol);
        true
    }

    pub fn remove(&mut self, symbol: &str) -> bool {
        match self.symbols.iter().position(|s| s == symbol) {
            Some(pos) => {
                self.symbols.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn joined(&self) -> String {
        self.symbols.join(",")
    }
}

/// Latest price per symbol; last write wins.
#[derive(Debug, Clone, Default)]
pub struct PriceBoard {
    prices: HashMap<String, f64>,
}

impl PriceBoard {
    pub fn apply(&mut self, update: &PriceUpdate) {
        self.prices.insert(update.symbol.clone(), update.price);
    }

    pub fn price(&self, symbol: &str) -> Price {
        match self.prices.get(symbol) {
            Some(p) => Price::Quoted(*p),
            None => Price::Pending,
        }
    }

    pub fn forget(&mut self, symbol: &str) {
        self.prices.remove(symbol);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceCard {
    pub symbol: String,
    pub price: String,
    pub pending: bool,
}

impl PriceCard {
    pub fn new(symbol: &str, price: Price) -> Self {
        Self {
            symbol: symbol.to_string(),
            price: price.display(),
            pending: price.is_pending(),
        }
    }
}

/// Dashboard view state: what is watched and what each symbol costs.
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub watchlist: Watchlist,
    pub prices: PriceBoard,
}

impl DashboardView {
    pub fn new(watchlist: Watchlist) -> Self {
        Self {
            watchlist,
            prices: PriceBoard::default(),
        }
    }

    /// Records a pushed price. Updates for symbols that are not watched are
    /// kept on the board but never shown.
    pub fn apply(&mut self, update: &PriceUpdate) -> Option<PriceCard> {
        self.prices.apply(update);
        if self.watchlist.contains(&update.symbol) {
            Some(self.card(&update.symbol))
        } else {
            None
        }
    }

    pub fn watch(&mut self, symbol: String) -> bool {
        self.watchlist.push(symbol)
    }

    pub fn unwatch(&mut self, symbol: &str) -> bool {
        self.prices.forget(symbol);
        self.watchlist.remove(symbol)
    }

    pub fn card(&self, symbol: &str) -> PriceCard {
        PriceCard::new(symbol, self.prices.price(symbol))
    }

    pub fn cards(&self) -> Vec<PriceCard> {
        self.watchlist
            .symbols()
            .iter()
            .map(|s| self.card(s))
            .collect()
    }
}

#[derive(Error, Debug)]
pub enum WatchlistError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0} is already in your watchlist")]
    AlreadyWatched(String),

    #[error(transparent)]
    Backend(#[from] ApiError),
}

pub async fn load_watchlist(state: &AppState, session: &Session) -> Result<Watchlist, ApiError> {
    let symbols = state.api.watchlist(session.credential()).await?;
    Ok(Watchlist::from_symbols(symbols))
}

/// Persists `raw_symbol` and appends it locally. Validation happens before
/// any network call.
pub async fn add_symbol(
    state: &AppState,
    session: &Session,
    watchlist: &mut Watchlist,
    raw_symbol: &str,
) -> Result<String, WatchlistError> {
    let symbol = normalize_symbol(raw_symbol)
        .ok_or_else(|| WatchlistError::Invalid("Please enter a valid stock symbol".into()))?;

    if watchlist.contains(&symbol) {
        return Err(WatchlistError::AlreadyWatched(symbol));
    }

    state
        .api
        .add_to_watchlist(session.credential(), &symbol)
        .await?;

    watchlist.push(symbol.clone());
    Ok(symbol)
}

/// Deletes on the backend first; the local list only changes on success.
/// `symbol` goes out exactly as shown on the card.
pub async fn remove_symbol(
    state: &AppState,
    session: &Session,
    watchlist: &mut Watchlist,
    symbol: &str,
) -> Result<(), WatchlistError> {
    if symbol.trim().is_empty() {
        return Err(WatchlistError::Invalid("Please enter a valid stock symbol".into()));
    }

    state
        .api
        .remove_from_watchlist(session.credential(), symbol)
        .await?;

    watchlist.remove(symbol);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_symbols_dedups_and_keeps_case() {
        assert_eq!(parse_symbols(" aapl,MSFT,,aapl , tsla"), vec!["aapl", "MSFT", "tsla"]);
        assert!(parse_symbols("").is_empty());
    }

    #[test]
    fn parse_symbols_has_no_upper_bound() {
        let raw = (0..60).map(|i| format!("S{i}")).collect::<Vec<_>>().join(",");
        let symbols = parse_symbols(&raw);

        assert_eq!(symbols.len(), 60);
        assert_eq!(symbols[59], "S59");
    }

    #[test]
    fn normalize_only_trims() {
        assert_eq!(normalize_symbol(" brk.b "), Some("brk.b".to_string()));
        assert_eq!(normalize_symbol("M&M.NS"), Some("M&M.NS".to_string()));
        assert_eq!(normalize_symbol("   "), None);
    }

    #[test]
    fn backend_symbols_are_mirrored_verbatim() {
        let list = Watchlist::from_symbols(["aapl", "M&M.NS", "BAJAJ-AUTO.NSE.X", "MSFT", "aapl"]);

        assert_eq!(list.symbols(), ["aapl", "M&M.NS", "BAJAJ-AUTO.NSE.X", "MSFT"]);
        assert_eq!(list.joined(), "aapl,M&M.NS,BAJAJ-AUTO.NSE.X,MSFT");
    }

    #[test]
    fn add_then_remove_restores_the_list() {
        let mut list = Watchlist::from_symbols(["AAPL", "MSFT"]);
        let before = list.clone();

        assert!(list.push("TSLA".into()));
        assert!(!list.push("TSLA".into()));
        assert!(list.remove("TSLA"));

        assert_eq!(list, before);
    }

    #[test]
    fn cards_start_pending() {
        let view = DashboardView::new(Watchlist::from_symbols(["AAPL", "MSFT"]));
        let cards = view.cards();

        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|c| c.pending && c.price == "Loading..."));
    }

    #[test]
    fn unwatched_update_leaves_cards_alone() {
        let mut view = DashboardView::new(Watchlist::from_symbols(["AAPL"]));

        let shown = view.apply(&PriceUpdate { symbol: "GOOG".into(), price: 10.0 });
        assert!(shown.is_none());

        let shown = view.apply(&PriceUpdate { symbol: "AAPL".into(), price: 187.5 });
        assert_eq!(shown.map(|c| c.price), Some("$187.50".to_string()));

        let cards = view.cards();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].symbol, "AAPL");
    }

    #[test]
    fn latest_price_wins() {
        let mut board = PriceBoard::default();
        board.apply(&PriceUpdate { symbol: "AAPL".into(), price: 1.0 });
        board.apply(&PriceUpdate { symbol: "AAPL".into(), price: 2.0 });
        assert_eq!(board.price("AAPL"), Price::Quoted(2.0));
        assert_eq!(board.price("MSFT"), Price::Pending);
    }
}

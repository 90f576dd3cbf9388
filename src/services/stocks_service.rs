use serde_json::json;

use crate::{error::ApiError, models::SearchMatch, services::session::Session, AppState};

pub const MOCK_NOTE: &str = "Note: Showing mock data as API limit reached";
pub const MOCK_TOAST: &str = "Showing mock data as API is unavailable";
const MAX_RESULTS: usize = 10;

/// What a search produced, ready for the `partials/search_results` template.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub query: String,
    pub results: Vec<SearchMatch>,
    pub is_mock_data: bool,
    // backend-reported problem; not shown when mock data was served
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn ctx(&self) -> serde_json::Value {
        let results: Vec<_> = self
            .results
            .iter()
            .map(|m| json!({ "symbol": m.symbol, "name": m.name }))
            .collect();

        json!({
            "query": self.query,
            "results": if results.is_empty() { serde_json::Value::Null } else { serde_json::Value::Array(results) },
            "mock_note": if self.is_mock_data { Some(MOCK_NOTE) } else { None },
            "searched": true,
        })
    }
}

/// Runs a symbol search. An empty query returns `None` without calling the
/// backend.
pub async fn search(state: &AppState, session: &Session, query: &str) -> Result<Option<SearchOutcome>, ApiError> {
    let q = query.trim();
    if q.is_empty() {
        return Ok(None);
    }

    let resp = state.api.search(session.credential(), q).await?;

    let results = resp
        .best_matches
        .into_iter()
        .filter(|m| !m.symbol.trim().is_empty())
        .take(MAX_RESULTS)
        .collect();

    let error = if resp.is_mock_data {
        None
    } else {
        resp.error.filter(|e| !e.trim().is_empty())
    };

    if let Some(notice) = resp.notice.as_deref() {
        tracing::debug!("search notice: {}", notice);
    }

    Ok(Some(SearchOutcome {
        query: q.to_string(),
        results,
        is_mock_data: resp.is_mock_data,
        error,
    }))
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    // upstream provider keys are numbered ("1. symbol"), plain keys also accepted
    #[serde(alias = "1. symbol")]
    pub symbol: String,
    #[serde(default, alias = "2. name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "bestMatches", default)]
    pub best_matches: Vec<SearchMatch>,

    // backend fell back to canned results because its data provider is down
    #[serde(rename = "isMockData", default)]
    pub is_mock_data: bool,

    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub notice: Option<String>,
}

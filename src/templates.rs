use handlebars::{handlebars_helper, Handlebars};
use reqwest::Url;
use std::sync::Arc;

pub type Hbs = Arc<Handlebars<'static>>;

const SCRATCH_URL: &str = "http://local.invalid/";

/// Percent-encodes one path segment, so `BRK/B` stays a single segment.
pub fn encode_path_segment(raw: &str) -> String {
    let Ok(mut url) = Url::parse(SCRATCH_URL) else {
        return raw.to_string();
    };
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.clear().push(raw);
        }
        Err(()) => return raw.to_string(),
    }
    url.path().trim_start_matches('/').to_string()
}

/// Form-encodes a query value, so `M&M.NS` is not split at the `&`.
pub fn encode_query_value(raw: &str) -> String {
    let Ok(mut url) = Url::parse(SCRATCH_URL) else {
        return raw.to_string();
    };
    url.query_pairs_mut().append_pair("v", raw);
    url.query()
        .and_then(|q| q.strip_prefix("v="))
        .unwrap_or(raw)
        .to_string()
}

handlebars_helper!(path_segment: |raw: str| encode_path_segment(raw));
handlebars_helper!(query_value: |raw: str| encode_query_value(raw));

pub fn build_handlebars() -> Hbs {
    let mut hb = Handlebars::new();

    hb.register_helper("path_segment", Box::new(path_segment));
    hb.register_helper("query_value", Box::new(query_value));

    // Layouts
    hb.register_template_file("layouts/base", "templates/layouts/base.hbs")
        .expect("template layouts/base");
    hb.register_template_file("layouts/protected", "templates/layouts/protected.hbs")
        .expect("template layouts/protected");

    // Pages
    hb.register_template_file("pages/login", "templates/pages/login.hbs")
        .expect("template pages/login");
    hb.register_template_file("pages/register", "templates/pages/register.hbs")
        .expect("template pages/register");
    hb.register_template_file("pages/dashboard", "templates/pages/dashboard.hbs")
        .expect("template pages/dashboard");
    hb.register_template_file("pages/alerts", "templates/pages/alerts.hbs")
        .expect("template pages/alerts");
    hb.register_template_file("pages/not_found", "templates/pages/not_found.hbs")
        .expect("template pages/not_found");

    // Partial endpoints
    hb.register_template_file("partials/watchlist", "templates/partials/watchlist.hbs")
        .expect("template partials/watchlist");
    hb.register_template_file("partials/price_card", "templates/partials/price_card.hbs")
        .expect("template partials/price_card");
    hb.register_template_file("partials/search_results", "templates/partials/search_results.hbs")
        .expect("template partials/search_results");
    hb.register_template_file("partials/alerts_lists", "templates/partials/alerts_lists.hbs")
        .expect("template partials/alerts_lists");

    let price_card = std::fs::read_to_string("templates/partials/price_card.hbs")
        .expect("partials/price_card.hbs");
    hb.register_partial("price_card", price_card)
        .expect("register price_card partial");

    let navbar = std::fs::read_to_string("templates/partials/navbar.hbs")
        .expect("partials/navbar.hbs");
    hb.register_partial("navbar", navbar).expect("register navbar partial");

    Arc::new(hb)
}

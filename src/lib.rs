//! Library entrypoint for the StockWatch web client.
//!
//! Integration tests under `tests/` import the app state and router from here.

pub mod config;
pub mod error;
pub mod models;

#[path = "middleware/auth.rs"]
pub mod auth;

pub mod services;

#[path = "views/render.rs"]
pub mod render;
pub mod templates;

pub mod controllers;
pub mod routes;

use services::{api_client::ApiClient, session::SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub hbs: templates::Hbs,
    pub settings: config::Settings,
    pub api: ApiClient,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(settings: config::Settings) -> Result<Self, error::ApiError> {
        Ok(Self {
            hbs: templates::build_handlebars(),
            api: ApiClient::from_settings(&settings)?,
            sessions: SessionStore::from_settings(&settings),
            settings,
        })
    }
}

pub mod api_client;
pub mod price_channel;
pub mod session;
pub mod socketio;

pub mod alerts_service;
pub mod auth_service;
pub mod dashboard_service;
pub mod stocks_service;

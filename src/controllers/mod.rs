pub mod alerts_controller;
pub mod auth_controller;
pub mod dashboard_controller;
pub mod home_controller;
pub mod realtime_controller;
pub mod stocks_controller;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod subject;
pub mod ui;

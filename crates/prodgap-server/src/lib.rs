pub mod api;
pub mod app;
pub mod config;
pub mod logging;
pub mod seed;
pub mod service;
pub mod state;

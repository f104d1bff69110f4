pub mod actions;
pub mod api;
pub mod config;
pub mod context;
pub mod deploy;
pub mod errors;
pub mod logging;
pub mod session;
pub mod storage;
pub mod tasks;
pub mod ui;

mod app;
mod cli;
mod config;
mod logging;
mod manifest;

pub use app::run_app;

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod state;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use error::{DeskError, DeskResult};
pub use state::AppState;

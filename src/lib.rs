pub mod config;
pub mod error;
pub mod gemini;
pub mod http_client;
pub mod logging;
pub mod prompt;
pub mod provider;
pub mod state;

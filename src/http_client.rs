use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

const USER_AGENT: &str = concat!("custombet_terminal/", env!("CARGO_PKG_VERSION"));

/// Blocking client with a hard upper bound on every request.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build http client")
}

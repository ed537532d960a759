use crate::error::{ConfigError, Result};
use reqwest::Client;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("dagscope/", env!("CARGO_PKG_VERSION"));

/// Appends a trailing slash so relative paths join under the base.
pub fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

pub(crate) fn require(value: &str, what: &'static str) -> std::result::Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Missing(what))
    } else {
        Ok(())
    }
}

/// Shared HTTP client. `None` leaves requests without a deadline.
pub fn build_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout).connect_timeout(timeout / 2);
    }
    Ok(builder.build()?)
}

//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

const USER_AGENT: &str = concat!("relay/", env!("CARGO_PKG_VERSION"));

/// Create the HTTP client used for model requests.
///
/// Config: 30s connect timeout, 120s request timeout (tool-heavy responses
/// can take a while), rustls TLS, `relay/{version}` user-agent, redirect limit 10.
/// If the builder is rejected, a plain `reqwest::Client` is returned instead.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(120))
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("falling back to a default HTTP client: {e}");
            reqwest::Client::new()
        })
}

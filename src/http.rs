//! HTTP client helper with native-tls support.
//!
//! The remote renderer is the only network consumer. Requests are blocking
//! `ureq` calls and must be driven from `spawn_blocking`.

use std::time::Duration;
use ureq::Agent;
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};

/// Maximum accepted body size for service responses and fetched images (10 MB).
pub const MAX_RESPONSE_SIZE: u64 = 10 * 1024 * 1024;

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tikz-render/", env!("CARGO_PKG_VERSION"));

/// Create an agent that uses the platform TLS stack and bounds every request
/// by `timeout`.
///
/// Non-2xx statuses are surfaced as `ureq::Error::StatusCode`.
pub fn agent(timeout: Duration) -> Agent {
    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .build();

    Agent::config_builder()
        .tls_config(tls_config)
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Check that a locator returned by a service is a plain http(s) URL.
pub fn validate_fetch_url(raw: &str) -> Result<url::Url, String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("Invalid URL '{}': {}", raw, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(format!(
            "URL scheme '{}' rejected; only http and https are allowed. URL: {}",
            scheme, raw
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fetch_url() {
        assert!(validate_fetch_url("https://quicklatex.com/cache3/ab/ql_x.png").is_ok());
        assert!(validate_fetch_url("http://127.0.0.1:8080/a.svg").is_ok());
        assert!(validate_fetch_url("file:///etc/passwd").is_err());
        assert!(validate_fetch_url("not a url").is_err());
    }
}

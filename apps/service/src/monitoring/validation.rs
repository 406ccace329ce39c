//! Sanity checks applied to configured targets and timing settings.
//!
//! Unlike a shared monitoring network, a local agent legitimately watches
//! loopback and private hosts, so only the URL shape is enforced here.

use anyhow::{Result, anyhow};
use std::time::Duration;
use url::Url;

/// Validate and parse an HTTP/HTTPS target
pub fn validate_http_target(target: &str) -> Result<Url> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Unsupported scheme: {}", other)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("URL has no host"));
    }

    if let Some(port) = url.port() {
        validate_port(port)?;
    }

    Ok(url)
}

/// Validate port is in valid range
fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }
    Ok(())
}

/// Validate the per-probe timeout
pub fn validate_timeout(timeout: Duration) -> Result<()> {
    const MIN_TIMEOUT: Duration = Duration::from_millis(100);
    const MAX_TIMEOUT: Duration = Duration::from_secs(300);

    if timeout < MIN_TIMEOUT {
        return Err(anyhow!("Timeout too short: {:?} (minimum: {:?})", timeout, MIN_TIMEOUT));
    }

    if timeout > MAX_TIMEOUT {
        return Err(anyhow!("Timeout too long: {:?} (maximum: {:?})", timeout, MAX_TIMEOUT));
    }

    Ok(())
}

/// Validate the dispatcher pacing interval
pub fn validate_pacing_interval(interval: Duration) -> Result<()> {
    const MAX_INTERVAL: Duration = Duration::from_secs(60);

    if interval.is_zero() {
        return Err(anyhow!("Pacing interval must be greater than zero"));
    }

    if interval > MAX_INTERVAL {
        return Err(anyhow!(
            "Pacing interval too long: {:?} (maximum: {:?})",
            interval,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_target() {
        // Valid
        assert!(validate_http_target("https://example.com").is_ok());
        assert!(validate_http_target("http://example.com:8080/health").is_ok());
        assert!(validate_http_target("http://127.0.0.1:9000/").is_ok());
        assert!(validate_http_target("http://localhost/status").is_ok());

        // Invalid - wrong scheme
        assert!(validate_http_target("ftp://example.com").is_err());
        assert!(validate_http_target("mailto:ops@example.com").is_err());

        // Invalid - not a URL
        assert!(validate_http_target("example.com/health").is_err());
        assert!(validate_http_target("").is_err());
    }

    #[test]
    fn test_validate_timeout() {
        assert!(validate_timeout(Duration::from_millis(100)).is_ok()); // Min
        assert!(validate_timeout(Duration::from_secs(10)).is_ok()); // Normal
        assert!(validate_timeout(Duration::from_secs(300)).is_ok()); // Max

        assert!(validate_timeout(Duration::ZERO).is_err()); // Too short
        assert!(validate_timeout(Duration::from_secs(301)).is_err()); // Too long
    }

    #[test]
    fn test_validate_pacing_interval() {
        assert!(validate_pacing_interval(Duration::from_millis(200)).is_ok());
        assert!(validate_pacing_interval(Duration::ZERO).is_err());
        assert!(validate_pacing_interval(Duration::from_secs(61)).is_err());
    }
}

//! API endpoint configuration and client construction.

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;

/// Default request timeout, matching the portal gateway's limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "portalctl";

/// Endpoint roots for the portal API.
///
/// The security endpoints (token, logout, password change) may live on a
/// separate domain from the resource API; deployments that serve both from one
/// host leave `security` equal to `root`.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub root: String,
    pub security: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(root: impl Into<String>, security: Option<String>) -> Self {
        let root = root.into();
        let security = security.unwrap_or_else(|| root.clone());
        Self {
            root,
            security,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Joins a request path onto the API root, or onto an explicit host
    /// override when a caller targets another service.
    pub fn request_url(&self, path: &str, host: Option<&str>) -> String {
        join_url(host.unwrap_or(&self.root), path)
    }

    /// Joins a request path onto the security domain.
    pub fn security_url(&self, path: &str) -> String {
        join_url(&self.security, path)
    }

    /// Builds the underlying reqwest client with the configured timeout.
    pub fn build_client(&self) -> Result<Client> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()?;
        Ok(client)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_defaults_to_root() {
        let config = ApiConfig::new("https://api.example.com", None);
        assert_eq!(config.security, "https://api.example.com");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_separate_security_domain() {
        let config = ApiConfig::new(
            "https://api.example.com",
            Some("https://auth.example.com".to_string()),
        );
        assert_eq!(config.security_url("token"), "https://auth.example.com/token");
    }

    #[test]
    fn test_request_url_joins_single_slash() {
        let config = ApiConfig::new("https://api.example.com/", None);
        assert_eq!(
            config.request_url("/api/items", None),
            "https://api.example.com/api/items"
        );
        assert_eq!(
            config.request_url("api/items", None),
            "https://api.example.com/api/items"
        );
    }

    #[test]
    fn test_request_url_host_override() {
        let config = ApiConfig::new("https://api.example.com", None);
        assert_eq!(
            config.request_url("reports/1", Some("https://reports.example.com")),
            "https://reports.example.com/reports/1"
        );
    }

    #[test]
    fn test_build_client() {
        let config = ApiConfig::new("https://api.example.com", None);
        assert!(config.build_client().is_ok());
    }
}

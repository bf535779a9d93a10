//! Client configuration.
//!
//! Configuration is resolved once at process startup and passed into the
//! client, so no environment variable is read while a session is running.

use crate::{ClientError, ClientResult};

/// Default collaborator base URL when none is configured.
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Collaborator connection settings resolved at startup.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: String,
    api_key: Option<String>,
}

impl ClientConfig {
    /// Creates a new `ClientConfig`.
    ///
    /// The base URL is stored without a trailing slash so paths can be
    /// appended uniformly.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if the base URL is empty or
    /// not an http(s) URL, or if a provided API key is blank.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> ClientResult<Self> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');

        if trimmed.is_empty() {
            return Err(ClientError::InvalidConfig("base URL cannot be empty".into()));
        }
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                trimmed
            )));
        }
        if let Some(key) = &api_key {
            if key.trim().is_empty() {
                return Err(ClientError::InvalidConfig("API key cannot be blank".into()));
            }
        }

        Ok(Self {
            base_url: trimmed.to_string(),
            api_key,
        })
    }

    /// Builds a config from optional environment values, applying the
    /// default base URL when none is set. Blank values are treated as
    /// absent.
    pub fn from_env_values(
        base_url: Option<String>,
        api_key: Option<String>,
    ) -> ClientResult<Self> {
        let base_url = base_url
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = api_key
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self::new(base_url, api_key)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_strips_trailing_slash() {
        let config = ClientConfig::new("http://localhost:3000/", None).unwrap();
        assert_eq!(config.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_config_rejects_empty_base_url() {
        let err = ClientConfig::new("   ", None).expect_err("should reject empty");
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_rejects_non_http_scheme() {
        let err = ClientConfig::new("ftp://example.org", None).expect_err("should reject ftp");
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_rejects_blank_api_key() {
        let err = ClientConfig::new("http://localhost:3000", Some("  ".into()))
            .expect_err("should reject blank key");
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_env_values_applies_defaults() {
        let config = ClientConfig::from_env_values(None, Some(String::new())).unwrap();
        assert_eq!(config.base_url(), "http://localhost:3000");
        assert!(config.api_key().is_none());
    }
}

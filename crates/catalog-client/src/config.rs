//! Client configuration and builder pattern.

use std::fmt;
use std::time::Duration;

use crate::error::{ClientError, Result};

const MEGABYTE: usize = 1024 * 1024;

/// Configuration for the Atlas client.
///
/// # Security
///
/// The `Debug` implementation masks the bearer token to prevent accidental
/// exposure in logs. The token is shown as `"***REDACTED***"` in debug output.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the Atlas API gateway (e.g. "https://atlas.example.com/api")
    pub base_url: String,
    /// Optional bearer token for authentication
    pub token: Option<String>,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
    /// Maximum number of retries for transient failures on idempotent
    /// requests (default: 3). Mutating requests are never retried.
    pub max_retries: u32,
    /// Initial retry delay for exponential backoff (default: 100ms)
    pub retry_initial_delay: Duration,
    /// Maximum retry delay (default: 10 seconds)
    pub retry_max_delay: Duration,
    /// Fixed interval between concatenation-task status polls (default: 500ms)
    pub concat_poll_interval: Duration,
    /// Fixed interval between query status polls (default: 1 second)
    pub query_poll_interval: Duration,
    /// Upper bound on status poll attempts. `None` (the default) polls
    /// until a terminal status is observed; callers wanting a time bound
    /// should set this or apply an outer timeout.
    pub max_poll_attempts: Option<u32>,
    /// Chunk size for chunked file uploads (default: 50 MiB)
    pub upload_chunk_size: usize,
    /// Whether to verify TLS certificates (default: true)
    pub tls_verify: bool,
    /// User-Agent header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            token: None,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_initial_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(10),
            concat_poll_interval: Duration::from_millis(500),
            query_poll_interval: Duration::from_secs(1),
            max_poll_attempts: None,
            upload_chunk_size: 50 * MEGABYTE,
            tls_verify: true,
            user_agent: format!("atlas-catalog-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***REDACTED***"))
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_initial_delay", &self.retry_initial_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("concat_poll_interval", &self.concat_poll_interval)
            .field("query_poll_interval", &self.query_poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("upload_chunk_size", &self.upload_chunk_size)
            .field("tls_verify", &self.tls_verify)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Minimum allowed timeout value.
    pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ClientError::Config("base_url cannot be empty".to_string()));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("invalid base_url: {e}")))?;

        if self.retry_initial_delay > self.retry_max_delay {
            return Err(ClientError::Config(format!(
                "retry_initial_delay ({:?}) must be <= retry_max_delay ({:?})",
                self.retry_initial_delay, self.retry_max_delay
            )));
        }

        if self.timeout < Self::MIN_TIMEOUT {
            return Err(ClientError::Config(format!(
                "timeout ({:?}) must be >= {:?}",
                self.timeout,
                Self::MIN_TIMEOUT
            )));
        }

        if self.upload_chunk_size == 0 {
            return Err(ClientError::Config(
                "upload_chunk_size must be > 0".to_string(),
            ));
        }

        if self.max_poll_attempts == Some(0) {
            return Err(ClientError::Config(
                "max_poll_attempts must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for client configuration.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
        }
    }

    /// Set the bearer token for authentication.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the maximum number of retries for idempotent requests.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the initial retry delay for exponential backoff.
    pub fn retry_initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry_initial_delay = delay;
        self
    }

    /// Set the maximum retry delay.
    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.config.retry_max_delay = delay;
        self
    }

    /// Set the fixed interval between concatenation status polls.
    pub fn concat_poll_interval(mut self, interval: Duration) -> Self {
        self.config.concat_poll_interval = interval;
        self
    }

    /// Set the fixed interval between query status polls.
    pub fn query_poll_interval(mut self, interval: Duration) -> Self {
        self.config.query_poll_interval = interval;
        self
    }

    /// Bound the number of status poll attempts.
    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.max_poll_attempts = Some(attempts);
        self
    }

    /// Set the chunk size for chunked file uploads.
    pub fn upload_chunk_size(mut self, bytes: usize) -> Self {
        self.config.upload_chunk_size = bytes;
        self
    }

    /// Set whether to verify TLS certificates.
    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.config.tls_verify = verify;
        self
    }

    /// Set a custom User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert!(config.token.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.concat_poll_interval, Duration::from_millis(500));
        assert_eq!(config.query_poll_interval, Duration::from_secs(1));
        assert_eq!(config.max_poll_attempts, None);
        assert_eq!(config.upload_chunk_size, 50 * 1024 * 1024);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::builder("https://atlas.example.com")
            .token("at_test_token")
            .timeout(Duration::from_secs(60))
            .max_retries(5)
            .concat_poll_interval(Duration::from_millis(20))
            .max_poll_attempts(10)
            .upload_chunk_size(8)
            .build()
            .unwrap();

        assert_eq!(config.base_url, "https://atlas.example.com");
        assert_eq!(config.token, Some("at_test_token".to_string()));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.concat_poll_interval, Duration::from_millis(20));
        assert_eq!(config.max_poll_attempts, Some(10));
        assert_eq!(config.upload_chunk_size, 8);
    }

    #[test]
    fn test_invalid_url() {
        assert!(ClientConfig::builder("not a valid url").build().is_err());
        assert!(ClientConfig::builder("").build().is_err());
    }

    #[test]
    fn test_retry_delay_validation() {
        let result = ClientConfig::builder("http://localhost:3000")
            .retry_initial_delay(Duration::from_secs(10))
            .retry_max_delay(Duration::from_secs(1))
            .build();
        assert!(result.is_err());

        let result = ClientConfig::builder("http://localhost:3000")
            .retry_initial_delay(Duration::from_secs(1))
            .retry_max_delay(Duration::from_secs(1))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_timeout_too_small() {
        let result = ClientConfig::builder("http://localhost:3000")
            .timeout(Duration::from_millis(50))
            .build();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("timeout"));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = ClientConfig::builder("http://localhost:3000")
            .upload_chunk_size(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_poll_bound_rejected() {
        let result = ClientConfig::builder("http://localhost:3000")
            .max_poll_attempts(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_token_masked_in_debug() {
        let config = ClientConfig::builder("http://localhost:3000")
            .token("at_super_secret_token_12345")
            .build()
            .unwrap();

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("at_super_secret_token_12345"));
        assert!(!debug_output.contains("super_secret"));
        assert!(debug_output.contains("REDACTED"));
    }
}

//! Client configuration.

use std::time::Duration;

/// Production XML gateway endpoint.
pub const DEFAULT_API_URL: &str = "https://api.intacct.com/ia/xml/xmlgw.phtml";

/// Sender and user credentials carried in every request envelope.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Web services sender ID.
    pub sender_id: String,
    /// Web services sender password.
    pub sender_password: String,
    /// Company user ID.
    pub user_id: String,
    /// Company ID.
    pub company_id: String,
    /// Company user password.
    pub user_password: String,
}

/// Configuration for the gateway client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway endpoint.
    pub api_url: String,
    /// Credentials for the control and operation blocks.
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Creates a configuration against the production endpoint.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credentials,
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the gateway endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a configuration with the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay to wait after the given zero-based failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt as i32);
        self.initial_delay.mul_f64(factor)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }
}

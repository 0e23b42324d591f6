//! HTTP client tuning and task polling policy.
//!
//! This module provides the connection settings applied when building the underlying
//! HTTP client, and the caller-supplied [`PollPolicy`] that drives task waiting.
//! Requests are never retried automatically.

use std::time::Duration;

/// Default timeout for Prism requests, in seconds
pub const PRISM_DEFAULT_TIMEOUT: u64 = 30;

/// Default connect timeout, in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

/// Value of the client-identifying header.
pub const CLIENT_TYPE: &str = concat!("prism-rs/", env!("CARGO_PKG_VERSION"));

/// Name of the client-identifying header.
pub const CLIENT_TYPE_HEADER: &str = "X-Nutanix-Client-Type";

/// How a task is polled until it reaches a terminal state.
///
/// There is no default: the caller decides how often to poll and how long to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between successive polls
    pub interval: Duration,

    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    /// Poll every `interval` with no deadline.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    /// Set the overall deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remove the overall deadline.
    #[must_use]
    pub const fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Delay before the next poll, clipped to the time remaining before the deadline.
    #[must_use]
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        match self.timeout {
            Some(timeout) => std::cmp::min(self.interval, timeout.saturating_sub(elapsed)),
            None => self.interval,
        }
    }

    /// Whether the deadline has passed after `elapsed`.
    #[must_use]
    pub fn is_expired(&self, elapsed: Duration) -> bool {
        self.timeout.is_some_and(|timeout| elapsed >= timeout)
    }
}

/// HTTP client configuration.
///
/// Configures HTTP client behavior including timeouts and connection pooling.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable request/response logging
    pub enable_logging: bool,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(PRISM_DEFAULT_TIMEOUT),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_logging: true,
            enable_compression: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable logging.
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_policy_new() {
        let policy = PollPolicy::new(Duration::from_secs(2));
        assert_eq!(policy.interval, Duration::from_secs(2));
        assert!(policy.timeout.is_none());
        assert!(!policy.is_expired(Duration::from_secs(3600)));
    }

    #[test]
    fn test_poll_policy_timeout() {
        let policy = PollPolicy::new(Duration::from_secs(2)).with_timeout(Duration::from_secs(5));
        assert!(!policy.is_expired(Duration::from_secs(4)));
        assert!(policy.is_expired(Duration::from_secs(5)));
        assert!(policy.without_timeout().timeout.is_none());
    }

    #[test]
    fn test_poll_policy_next_delay_clipped_to_deadline() {
        let policy = PollPolicy::new(Duration::from_secs(2)).with_timeout(Duration::from_secs(5));
        assert_eq!(policy.next_delay(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(policy.next_delay(Duration::from_secs(4)), Duration::from_secs(1));
        assert_eq!(policy.next_delay(Duration::from_secs(9)), Duration::ZERO);

        let open = PollPolicy::new(Duration::from_millis(250));
        assert_eq!(open.next_delay(Duration::from_secs(100)), Duration::from_millis(250));
    }

    #[test]
    fn test_poll_policy_zero_timeout_is_expired_immediately() {
        let policy = PollPolicy::new(Duration::from_secs(1)).with_timeout(Duration::ZERO);
        assert!(policy.is_expired(Duration::ZERO));
    }

    #[test]
    fn test_client_config_new() {
        let config = ClientConfig::new();
        assert_eq!(config.timeout, Duration::from_secs(PRISM_DEFAULT_TIMEOUT));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.enable_logging);
        assert!(config.enable_compression);
    }

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_connect_timeout(Duration::from_secs(3))
            .with_pool_idle_timeout(Duration::from_secs(120))
            .with_pool_max_idle(20)
            .with_logging(false)
            .with_compression(false);

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(120));
        assert_eq!(config.pool_max_idle_per_host, 20);
        assert!(!config.enable_logging);
        assert!(!config.enable_compression);
    }

    #[test]
    fn test_client_type_header_value() {
        assert!(CLIENT_TYPE.starts_with("prism-rs/"));
        assert_eq!(CLIENT_TYPE_HEADER, "X-Nutanix-Client-Type");
    }

    #[test]
    fn test_pool_constants() {
        assert_eq!(DEFAULT_POOL_IDLE_TIMEOUT, 90);
        assert_eq!(DEFAULT_POOL_MAX_IDLE_PER_HOST, 10);
    }
}

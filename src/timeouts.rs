//! Timeout configuration for pylon-link operations.
//!
//! Centralizes the deadlines for connection establishment, one-shot requests,
//! and keepalive probing. Subscriptions deliberately have no timeout of their
//! own: a subscription that the gateway never acknowledges stays pending until
//! a reconnect replays it.

use std::time::Duration;

/// Timeout configuration for pylon-link operations.
///
/// # Examples
///
/// ```rust
/// use pylon_link::PylonLinkTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = PylonLinkTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = PylonLinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(60))
///     .request_timeout(Duration::from_secs(30))
///     .build();
///
/// // Aggressive timeouts for local development
/// let timeouts = PylonLinkTimeouts::fast();
/// ```
#[derive(Debug, Clone)]
pub struct PylonLinkTimeouts {
    /// Timeout for establishing the WebSocket connection (TCP + handshake).
    /// Default: 10 seconds.
    pub connection_timeout: Duration,

    /// Timeout for the HTTP gateway-URL lookup call.
    /// Default: 10 seconds.
    pub lookup_timeout: Duration,

    /// Deadline for each one-shot request (command send / publish).
    /// A request with no response within this window rejects with
    /// [`RequestTimeoutError`](crate::error::PylonLinkError::RequestTimeoutError).
    /// Default: 15 seconds.
    pub request_timeout: Duration,

    /// Keep-alive ping interval for the WebSocket connection.
    /// Set to 0 to disable keep-alive pings.
    /// Default: 10 seconds.
    pub keepalive_interval: Duration,

    /// Maximum time to wait for a Pong after a keepalive Ping. If nothing
    /// arrives within this window the connection is considered dead and torn
    /// down for reconnect. Set to 0 to disable.
    /// Default: 5 seconds.
    pub pong_timeout: Duration,
}

impl Default for PylonLinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            lookup_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(5),
        }
    }
}

impl PylonLinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> PylonLinkTimeoutsBuilder {
        PylonLinkTimeoutsBuilder::new()
    }

    /// Timeouts optimized for fast local development.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            lookup_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(5),
        }
    }

    /// Timeouts optimized for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            keepalive_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }

    /// Check if a duration represents "no timeout" (zero or very large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365) // > 1 year
    }
}

/// Builder for creating custom [`PylonLinkTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct PylonLinkTimeoutsBuilder {
    timeouts: PylonLinkTimeouts,
}

impl PylonLinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: PylonLinkTimeouts::default(),
        }
    }

    /// Set the connection timeout (TCP + WebSocket handshake).
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the connection timeout in seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the gateway-URL lookup timeout.
    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.lookup_timeout = timeout;
        self
    }

    /// Set the gateway-URL lookup timeout in seconds.
    pub fn lookup_timeout_secs(self, secs: u64) -> Self {
        self.lookup_timeout(Duration::from_secs(secs))
    }

    /// Set the per-request deadline for one-shot commands.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    /// Set the per-request deadline in seconds.
    pub fn request_timeout_secs(self, secs: u64) -> Self {
        self.request_timeout(Duration::from_secs(secs))
    }

    /// Set the keepalive ping interval. Set to 0 to disable.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.timeouts.keepalive_interval = interval;
        self
    }

    /// Set the keepalive ping interval in seconds. Set to 0 to disable.
    pub fn keepalive_interval_secs(self, secs: u64) -> Self {
        self.keepalive_interval(Duration::from_secs(secs))
    }

    /// Set the pong timeout. Set to 0 to disable dead-connection detection.
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.pong_timeout = timeout;
        self
    }

    /// Set the pong timeout in seconds. Set to 0 to disable.
    pub fn pong_timeout_secs(self, secs: u64) -> Self {
        self.pong_timeout(Duration::from_secs(secs))
    }

    /// Build the timeout configuration.
    pub fn build(self) -> PylonLinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = PylonLinkTimeouts::default();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.request_timeout, Duration::from_secs(15));
        assert_eq!(timeouts.keepalive_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let timeouts = PylonLinkTimeouts::builder()
            .connection_timeout_secs(60)
            .request_timeout_secs(120)
            .keepalive_interval_secs(0)
            .build();

        assert_eq!(timeouts.connection_timeout, Duration::from_secs(60));
        assert_eq!(timeouts.request_timeout, Duration::from_secs(120));
        assert!(timeouts.keepalive_interval.is_zero());
    }

    #[test]
    fn test_fast_preset() {
        let timeouts = PylonLinkTimeouts::fast();
        assert!(timeouts.connection_timeout <= Duration::from_secs(5));
        assert!(timeouts.request_timeout <= Duration::from_secs(5));
    }

    #[test]
    fn test_relaxed_preset() {
        let timeouts = PylonLinkTimeouts::relaxed();
        assert!(timeouts.connection_timeout >= Duration::from_secs(30));
        assert!(timeouts.request_timeout >= Duration::from_secs(60));
    }

    #[test]
    fn test_is_no_timeout() {
        assert!(PylonLinkTimeouts::is_no_timeout(Duration::ZERO));
        assert!(!PylonLinkTimeouts::is_no_timeout(Duration::from_secs(1)));
        assert!(!PylonLinkTimeouts::is_no_timeout(Duration::from_secs(3600)));
    }
}

//! Configuration for the ADS client.

use crate::client::retry::RetryPolicy;
use crate::message::Node;

/// Configuration for the ADS client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Node identification sent to the management server.
    pub node: Node,

    /// URI of the management server, e.g. `http://127.0.0.1:18000`.
    pub server_uri: String,

    /// Retry policy used when a supervised session re-opens its stream.
    pub retry_policy: RetryPolicy,

    /// Reject (NACK) responses that contain malformed resources.
    ///
    /// Valid resources from such a response are applied either way. When
    /// false, the response is acknowledged and malformed entries are only
    /// logged.
    pub nack_on_invalid: bool,
}

impl ClientConfig {
    /// Create a new configuration with the given node identification and server URI.
    ///
    /// Uses the default retry policy and acknowledges partially valid responses.
    ///
    /// # Example
    ///
    /// ```
    /// use ads_client::{ClientConfig, Node};
    ///
    /// let node = Node::new("dns", "1.0").with_id("dns-1");
    /// let config = ClientConfig::new(node, "http://127.0.0.1:18000");
    /// assert!(!config.nack_on_invalid);
    /// ```
    pub fn new(node: Node, server_uri: impl Into<String>) -> Self {
        Self {
            node,
            server_uri: server_uri.into(),
            retry_policy: RetryPolicy::default(),
            nack_on_invalid: false,
        }
    }

    /// Set the retry policy.
    ///
    /// # Example
    ///
    /// ```
    /// use ads_client::{ClientConfig, Node, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default()
    ///     .with_initial_backoff(Duration::from_millis(500)).unwrap()
    ///     .with_max_backoff(Duration::from_secs(60)).unwrap();
    ///
    /// let config = ClientConfig::new(Node::new("dns", "1.0"), "http://127.0.0.1:18000")
    ///     .with_retry_policy(policy);
    /// ```
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// NACK responses that contain malformed resources instead of acknowledging them.
    pub fn with_nack_on_invalid(mut self, nack: bool) -> Self {
        self.nack_on_invalid = nack;
        self
    }
}

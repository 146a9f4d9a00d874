//! Mock publisher for testing
//!
//! Simulates accepted, rejected, unreachable and slow publish endpoints and
//! records every request it receives.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PublishError, Result};
use crate::publisher::{PublishOutcome, PublishRequest, Publisher};

/// Configuration for mock publisher behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Whether the remote side accepts the post
    pub accepts: bool,

    /// Error reported by the remote side on rejection
    pub rejection: Option<String>,

    /// Transport failure to return instead of any reply
    pub network_error: Option<String>,

    /// Delay before replying (simulates network latency)
    pub delay: Duration,

    /// Requests received, in order
    pub requests: Arc<Mutex<Vec<PublishRequest>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            accepts: true,
            rejection: None,
            network_error: None,
            delay: Duration::from_millis(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

pub struct MockPublisher {
    config: MockConfig,
}

impl MockPublisher {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A publisher that accepts everything
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// A publisher whose remote side refuses the post
    pub fn rejection(error: &str) -> Self {
        Self::new(MockConfig {
            accepts: false,
            rejection: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// A remote side that refuses without saying why
    pub fn silent_rejection() -> Self {
        Self::new(MockConfig {
            accepts: false,
            ..Default::default()
        })
    }

    /// A publisher whose endpoint cannot be reached
    pub fn network_failure(error: &str) -> Self {
        Self::new(MockConfig {
            network_error: Some(error.to_string()),
            ..Default::default()
        })
    }

    /// A publisher that accepts after `delay`
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<PublishRequest> {
        self.config
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        if let Ok(mut requests) = self.config.requests.lock() {
            requests.push(request.clone());
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        if let Some(error) = &self.config.network_error {
            return Err(PublishError::Network(error.clone()).into());
        }

        if self.config.accepts {
            Ok(PublishOutcome::succeeded())
        } else {
            Ok(PublishOutcome {
                success: false,
                error: self.config.rejection.clone(),
            })
        }
    }
}

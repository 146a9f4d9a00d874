//! HTTP publisher
//!
//! POSTs `{postId, imageUrl, caption}` as JSON to the configured endpoint and
//! reads back `{success, error?}`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::config::PublisherConfig;
use crate::error::{PublishError, Result};
use crate::publisher::{PublishOutcome, PublishRequest, Publisher};

/// Longest slice of an unexpected response body kept in error messages
const BODY_EXCERPT_LEN: usize = 200;

pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl HttpPublisher {
    /// Build from configuration; the token comes from [`PublisherConfig::token`]
    pub fn new(config: &PublisherConfig) -> Result<Self> {
        Self::with_token(
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
            config.token(),
        )
    }

    pub fn with_token(
        endpoint: impl Into<String>,
        timeout: Duration,
        token: Option<SecretString>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    fn name(&self) -> &str {
        "http"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        tracing::debug!(post_id = %request.post_id, endpoint = %self.endpoint, "Calling publish endpoint");

        let response = builder
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        match serde_json::from_str::<PublishOutcome>(&body) {
            Ok(outcome) if status.is_success() => Ok(outcome),
            Ok(outcome) => Ok(PublishOutcome::rejected(
                outcome
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            )),
            Err(_) if status.is_success() => Err(PublishError::Network(format!(
                "Unexpected response from publish endpoint: {}",
                excerpt(&body)
            ))
            .into()),
            Err(_) => Err(PublishError::Rejected(format!("HTTP {}: {}", status, excerpt(&body))).into()),
        }
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LEN).collect()
}

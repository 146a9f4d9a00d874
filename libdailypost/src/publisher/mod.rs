//! Remote publishing boundary
//!
//! The scheduler hands a fully composed [`PublishRequest`] to a [`Publisher`]
//! and only learns whether the remote side accepted it. How the image and
//! caption become a published media item is the remote service's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Post;

pub mod http;
// Available outside tests so integration tests and embedders can use it
pub mod mock;

pub use http::HttpPublisher;
pub use mock::MockPublisher;

/// What the remote publish call receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub post_id: String,
    pub image_url: String,
    pub caption: String,
}

impl PublishRequest {
    pub fn from_post(post: &Post) -> Self {
        Self {
            post_id: post.id.clone(),
            image_url: post.image_url.clone(),
            caption: compose_caption(post),
        }
    }
}

/// What the remote publish call reports back.
///
/// A transport failure is an `Err` from [`Publisher::publish`]; a business
/// rejection (expired token, refused media...) is `success: false` here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublishOutcome {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Lowercase identifier used in logs
    fn name(&self) -> &str;

    /// Publish one post remotely
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Network` when the endpoint cannot be reached or
    /// answers with something that is not a publish outcome.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome>;
}

/// Caption, call to action and hashtags, separated by blank lines.
/// Empty sections are left out.
pub fn compose_caption(post: &Post) -> String {
    let hashtags = post.hashtags.join(" ");
    [post.caption.as_str(), post.cta.as_str(), hashtags.as_str()]
        .into_iter()
        .filter(|section| !section.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

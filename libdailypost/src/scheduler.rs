//! Scheduled publication run
//!
//! One run walks a single post through select, validate, publish and mark
//! published, and leaves exactly one audit entry behind (none in dry-run
//! mode). Expected outcomes (nothing due, post not publishable, remote side
//! refused) are ordinary responses. Store failures and malformed input are
//! caught here and turned into an `error` response.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libdailypost::publisher::MockPublisher;
//! use libdailypost::store::MemoryStore;
//! use libdailypost::{ScheduledPublishRequest, ScheduledPublisher};
//!
//! # async fn example() {
//! let scheduler = ScheduledPublisher::new(Arc::new(MemoryStore::new(vec![])))
//!     .with_publisher(Arc::new(MockPublisher::success()));
//!
//! let response = scheduler
//!     .run(ScheduledPublishRequest {
//!         target_date: Some("05/12".to_string()),
//!         dry_run: true,
//!     })
//!     .await;
//! println!("{}: {}", response.action, response.message);
//! # }
//! ```

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{ConfigError, DailypostError, PublishError, Result};
use crate::history::create_history_entry;
use crate::publisher::{PublishRequest, Publisher};
use crate::scheduling::{mark_post_as_published, parse_target_date, select_post_for_date, today_date};
use crate::store::PostStore;
use crate::types::{Post, PublicationAction};
use crate::validation::validate_post;

const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters of the caption echoed in dry-run messages
const DRY_RUN_CAPTION_PREVIEW: usize = 50;

/// Parameters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPublishRequest {
    /// `DD/MM`; defaults to today in the scheduler's timezone
    #[serde(default)]
    pub target_date: Option<String>,
    /// Select and validate only: no publish call, no writes
    #[serde(default)]
    pub dry_run: bool,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAction {
    Published,
    Skipped,
    NoPost,
    Error,
    DryRun,
}

impl RunAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Skipped => "skipped",
            Self::NoPost => "no_post",
            Self::Error => "error",
            Self::DryRun => "dry_run",
        }
    }
}

impl From<PublicationAction> for RunAction {
    fn from(action: PublicationAction) -> Self {
        match action {
            PublicationAction::Published => Self::Published,
            PublicationAction::Skipped => Self::Skipped,
            PublicationAction::NoPost => Self::NoPost,
            PublicationAction::Error => Self::Error,
        }
    }
}

impl std::fmt::Display for RunAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one run, reported back to whatever triggered it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledPublishResponse {
    pub success: bool,
    pub action: RunAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    pub target_date: String,
    pub message: String,
    /// The selected post, returned for inspection in dry-run mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
}

/// A failure that aborts the run, with the post it concerned if one was selected
struct RunFailure {
    post_id: Option<String>,
    error: DailypostError,
}

impl RunFailure {
    fn before_selection(error: DailypostError) -> Self {
        Self {
            post_id: None,
            error,
        }
    }

    fn for_post(post_id: &str, error: DailypostError) -> Self {
        Self {
            post_id: Some(post_id.to_string()),
            error,
        }
    }
}

pub struct ScheduledPublisher {
    store: Arc<dyn PostStore>,
    publisher: Option<Arc<dyn Publisher>>,
    timezone: Tz,
    publish_timeout: Duration,
}

impl ScheduledPublisher {
    /// A scheduler over `store` with no publisher yet; only dry runs succeed
    /// until one is attached.
    pub fn new(store: Arc<dyn PostStore>) -> Self {
        Self {
            store,
            publisher: None,
            timezone: chrono_tz::Europe::Paris,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Timezone used to work out "today" when no target date is given
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Upper bound on the remote publish call; running out counts as a
    /// publish failure.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Execute one run. Never retries; the next scheduled run picks up
    /// anything left unpublished.
    pub async fn run(&self, request: ScheduledPublishRequest) -> ScheduledPublishResponse {
        let target_date = request
            .target_date
            .clone()
            .unwrap_or_else(|| today_date(self.timezone));
        let dry_run = request.dry_run;

        let span = info_span!("scheduled_publish", target_date = %target_date, dry_run);
        async {
            info!(store = self.store.name(), "Scheduled publish started");
            match self.execute(&target_date, dry_run).await {
                Ok(response) => response,
                Err(failure) => self.abort(failure, &target_date, dry_run).await,
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        target_date: &str,
        dry_run: bool,
    ) -> std::result::Result<ScheduledPublishResponse, RunFailure> {
        parse_target_date(target_date).map_err(RunFailure::before_selection)?;

        let posts = self
            .store
            .load_posts()
            .await
            .map_err(RunFailure::before_selection)?;
        debug!(catalog_size = posts.len(), "Loaded catalog");

        let Some(post) = select_post_for_date(&posts, target_date) else {
            let message = format!("No unpublished post found for date {}", target_date);
            info!("{}", message);
            self.record(None, PublicationAction::NoPost, &message, target_date, dry_run)
                .await
                .map_err(RunFailure::before_selection)?;
            return Ok(self.respond(PublicationAction::NoPost, None, target_date, message));
        };
        let post_id = post.id.as_str();
        info!(post_id, "Found matching post");

        let validation = validate_post(post);
        if !validation.valid {
            let reason = validation.reason.unwrap_or_default();
            let message = format!("Post {} skipped: {}", post_id, reason);
            warn!("{}", message);
            self.record(Some(post_id), PublicationAction::Skipped, &message, target_date, dry_run)
                .await
                .map_err(|e| RunFailure::for_post(post_id, e))?;

            let mut response =
                self.respond(PublicationAction::Skipped, Some(post_id), target_date, message);
            if dry_run {
                response.post = Some(post.clone());
            }
            return Ok(response);
        }

        if dry_run {
            let preview: String = post.caption.chars().take(DRY_RUN_CAPTION_PREVIEW).collect();
            let message = format!("[DRY RUN] Would publish post {} - \"{}...\"", post_id, preview);
            info!("{}", message);
            return Ok(ScheduledPublishResponse {
                success: true,
                action: RunAction::DryRun,
                post_id: Some(post_id.to_string()),
                target_date: target_date.to_string(),
                message,
                post: Some(post.clone()),
            });
        }

        let publisher = self.publisher.as_ref().ok_or_else(|| {
            RunFailure::for_post(
                post_id,
                ConfigError::MissingField("publisher.endpoint".to_string()).into(),
            )
        })?;

        if let Some(reason) = self.publish(publisher.as_ref(), post).await {
            let message = format!("Publication failed for post {}: {}", post_id, reason);
            error!("{}", message);
            self.record(Some(post_id), PublicationAction::Error, &message, target_date, false)
                .await
                .map_err(|e| RunFailure::for_post(post_id, e))?;
            return Ok(self.respond(PublicationAction::Error, Some(post_id), target_date, message));
        }

        let published = mark_post_as_published(post);
        self.store
            .save_post(&published)
            .await
            .map_err(|e| RunFailure::for_post(post_id, e))?;

        let message = format!("Successfully published post {}", post_id);
        info!("{}", message);
        self.record(Some(post_id), PublicationAction::Published, &message, target_date, false)
            .await
            .map_err(|e| RunFailure::for_post(post_id, e))?;

        Ok(self.respond(PublicationAction::Published, Some(post_id), target_date, message))
    }

    /// Call the remote side once. Returns the failure reason, or `None` when
    /// the post went out.
    async fn publish(&self, publisher: &dyn Publisher, post: &Post) -> Option<String> {
        let request = PublishRequest::from_post(post);
        info!(post_id = %post.id, publisher = publisher.name(), "Publishing post");

        match tokio::time::timeout(self.publish_timeout, publisher.publish(&request)).await {
            Ok(Ok(outcome)) if outcome.success => None,
            Ok(Ok(outcome)) => Some(outcome.error.unwrap_or_else(|| "Unknown error".to_string())),
            Ok(Err(DailypostError::Publish(e))) => Some(e.to_string()),
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(PublishError::Timeout(self.publish_timeout).to_string()),
        }
    }

    async fn record(
        &self,
        post_id: Option<&str>,
        action: PublicationAction,
        message: &str,
        target_date: &str,
        dry_run: bool,
    ) -> Result<()> {
        if dry_run {
            debug!(%action, "Dry run, history not written");
            return Ok(());
        }
        let entry = create_history_entry(post_id, action, message, target_date);
        self.store.append_history(&entry).await
    }

    fn respond(
        &self,
        action: PublicationAction,
        post_id: Option<&str>,
        target_date: &str,
        message: String,
    ) -> ScheduledPublishResponse {
        ScheduledPublishResponse {
            success: action != PublicationAction::Error,
            action: action.into(),
            post_id: post_id.map(str::to_string),
            target_date: target_date.to_string(),
            message,
            post: None,
        }
    }

    async fn abort(
        &self,
        failure: RunFailure,
        target_date: &str,
        dry_run: bool,
    ) -> ScheduledPublishResponse {
        let message = format!("Scheduler error: {}", failure.error);
        error!("{}", message);

        // Best effort: the store may be what failed
        if let Err(log_error) = self
            .record(
                failure.post_id.as_deref(),
                PublicationAction::Error,
                &message,
                target_date,
                dry_run,
            )
            .await
        {
            error!("Failed to log error to history: {}", log_error);
        }

        ScheduledPublishResponse {
            success: false,
            action: RunAction::Error,
            post_id: failure.post_id,
            target_date: target_date.to_string(),
            message,
            post: None,
        }
    }
}

//! Dailypost - scheduled publication for a planned content calendar
//!
//! This library picks the post planned for a given calendar day, checks that
//! it can be published automatically, hands it to a remote publisher and
//! keeps an audit log of every attempt.

pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod publisher;
pub mod scheduler;
pub mod scheduling;
pub mod store;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{DailypostError, Result};
pub use history::create_history_entry;
pub use scheduler::{ScheduledPublishRequest, ScheduledPublishResponse, ScheduledPublisher};
pub use scheduling::{mark_post_as_published, select_post_for_date};
pub use store::PostStore;
pub use types::{Post, PublicationAction, PublicationHistoryEntry, ValidationResult};
pub use validation::validate_post;

//! Audit records for scheduling attempts

use crate::types::{PublicationAction, PublicationHistoryEntry};

/// Build the history entry for one scheduling attempt.
///
/// `post_id` is `None` when no candidate existed for the day.
pub fn create_history_entry(
    post_id: Option<&str>,
    action: PublicationAction,
    message: impl Into<String>,
    target_date: impl Into<String>,
) -> PublicationHistoryEntry {
    PublicationHistoryEntry {
        post_id: post_id.map(str::to_string),
        action,
        message: message.into(),
        target_date: target_date.into(),
    }
}

//! Date-based selection and calendar helpers
//!
//! Posts are keyed by a `DD/MM` calendar day with no year. This module picks
//! the post due on a given day, produces its published variant, and computes
//! "today" and the next daily fire time in the operative timezone.

use chrono::{DateTime, Days, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::types::Post;
use crate::{DailypostError, Result};

/// Pick the first post due on `target_date` that is still eligible for
/// automatic publication.
///
/// Catalog order decides between several candidates; nothing is sorted here.
/// Content checks are left to [`crate::validation::validate_post`] so that a
/// selected-but-invalid post can be reported apart from an empty day.
pub fn select_post_for_date<'a>(posts: &'a [Post], target_date: &str) -> Option<&'a Post> {
    posts
        .iter()
        .find(|post| post.date == target_date && !post.published && !post.is_client_managed())
}

/// Return a copy of `post` flagged as published
pub fn mark_post_as_published(post: &Post) -> Post {
    Post {
        published: true,
        ..post.clone()
    }
}

/// Check that `value` is a zero-padded `DD/MM` calendar day
pub fn is_valid_date_key(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b'/' {
        return false;
    }
    if ![0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit()) {
        return false;
    }

    let day = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    let month = (bytes[3] - b'0') * 10 + (bytes[4] - b'0');
    (1..=31).contains(&day) && (1..=12).contains(&month)
}

/// Validate a caller-supplied target date
pub fn parse_target_date(value: &str) -> Result<String> {
    if is_valid_date_key(value) {
        Ok(value.to_string())
    } else {
        Err(DailypostError::InvalidInput(format!(
            "Target date must be in DD/MM format, got '{}'",
            value
        )))
    }
}

/// Format an instant as the `DD/MM` day it falls on in `tz`
pub fn date_key_for(instant: DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%d/%m").to_string()
}

/// Today's `DD/MM` key in `tz`
pub fn today_date(tz: Tz) -> String {
    date_key_for(Utc::now(), tz)
}

/// Parse an `HH:MM` time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
        DailypostError::InvalidInput(format!("Time must be in HH:MM format, got '{}': {}", value, e))
    })
}

/// Next instant strictly after `now` at which the local clock in `tz` reads `at`
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();

    for offset in 0..=2 {
        let Some(day) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = resolve_local(tz, day.and_time(at)) {
            if candidate > now {
                return candidate;
            }
        }
    }

    now + chrono::Duration::days(1)
}

/// Map a local wall-clock time to UTC. Times skipped by a DST jump resolve to
/// one hour later.
fn resolve_local(tz: Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(local + chrono::Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}

//! Core types for Dailypost

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// A single planned post, as stored in the content calendar.
///
/// Documents carry more keys than the scheduler cares about (title, theme,
/// format...). Those are kept in `extra` so that writing a post back never
/// drops data owned by other tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    /// Calendar day in `DD/MM` form
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub caption: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_client_managed: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hashtags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cta: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Post {
    pub fn new(id: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date: date.into(),
            caption: String::new(),
            image_url: String::new(),
            published: false,
            is_client_managed: None,
            hashtags: Vec::new(),
            cta: String::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// True when a human partner publishes this post by hand
    pub fn is_client_managed(&self) -> bool {
        self.is_client_managed.unwrap_or(false)
    }
}

/// Dashboard documents sometimes hold `null` where a value was never filled in
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Outcome of checking a post against the automated publication rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// What happened during one scheduling attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationAction {
    Published,
    Skipped,
    NoPost,
    Error,
}

impl PublicationAction {
    pub const ALL: [PublicationAction; 4] = [
        PublicationAction::Published,
        PublicationAction::Skipped,
        PublicationAction::NoPost,
        PublicationAction::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Skipped => "skipped",
            Self::NoPost => "no_post",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for PublicationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PublicationAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "published" => Ok(Self::Published),
            "skipped" => Ok(Self::Skipped),
            "no_post" => Ok(Self::NoPost),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "Invalid action: '{}'. Valid options: published, skipped, no_post, error",
                s
            )),
        }
    }
}

/// Audit record for one scheduling attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationHistoryEntry {
    pub post_id: Option<String>,
    pub action: PublicationAction,
    pub message: String,
    pub target_date: String,
}

/// A history entry read back from a store, with the time it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHistoryEntry {
    #[serde(flatten)]
    pub entry: PublicationHistoryEntry,
    pub recorded_at: DateTime<Utc>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    movie_model::Movie, validate_external_id, validate_max_chars, Patch, ValidationError,
};

pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_PRIORITY: u8 = 5;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    #[default]
    WantToWatch,
    Watching,
    Watched,
}

impl WatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchStatus::WantToWatch => "want_to_watch",
            WatchStatus::Watching => "watching",
            WatchStatus::Watched => "watched",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WatchlistItem {
    pub id: String,
    pub user_id: String,
    pub movie_id: String,
    pub status: WatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchlistItem {
    pub fn new(id: String, user_id: &str, add: &WatchlistAdd, now: DateTime<Utc>) -> Self {
        let status = add.status.unwrap_or_default();
        WatchlistItem {
            id,
            user_id: user_id.to_string(),
            movie_id: add.movie_id.clone(),
            status,
            notes: add.notes.clone(),
            priority: add.priority.unwrap_or(0),
            watched_at: (status == WatchStatus::Watched).then_some(now),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: &WatchlistUpdate, now: DateTime<Utc>) {
        if let Patch::Value(status) = update.status {
            if status != self.status {
                self.watched_at = (status == WatchStatus::Watched).then_some(now);
            }
            self.status = status;
        }
        update.notes.apply_to(&mut self.notes);
        update.priority.apply_required(&mut self.priority);
        self.updated_at = now;
    }
}

/// Watchlist item joined with its movie.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WatchlistEntry {
    #[serde(flatten)]
    pub item: WatchlistItem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<Movie>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WatchlistAdd {
    pub movie_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WatchStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl WatchlistAdd {
    pub fn for_movie(movie_id: impl Into<String>) -> Self {
        WatchlistAdd {
            movie_id: movie_id.into(),
            status: None,
            notes: None,
            priority: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_external_id(&self.movie_id)?;
        validate_max_chars("notes", self.notes.as_ref(), MAX_NOTES_LEN)?;
        validate_priority(self.priority)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct WatchlistUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub status: Patch<WatchStatus>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub notes: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub priority: Patch<u8>,
}

impl WatchlistUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.status.is_null() {
            return Err(ValidationError::new("status cannot be null"));
        }
        if self.priority.is_null() {
            return Err(ValidationError::new("priority cannot be null"));
        }
        validate_max_chars("notes", self.notes.value(), MAX_NOTES_LEN)?;
        validate_priority(self.priority.value().copied())
    }
}

fn validate_priority(priority: Option<u8>) -> Result<(), ValidationError> {
    match priority {
        Some(p) if p > MAX_PRIORITY => Err(ValidationError::new(format!(
            "priority must be between 0 and {MAX_PRIORITY}"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WatchlistCheck {
    pub in_watchlist: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<WatchlistItem>,
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::{
    error::ErrorBody,
    models::{watchlist_model::WatchStatus, Page, PageRequest, ValidationError},
};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("{error} ({status}): {message}")]
    Api {
        status: u16,
        error: String,
        message: String,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("local store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub type MirrorResult<T> = Result<T, MirrorError>;

impl MirrorError {
    /// Maps an API error envelope onto the variant matching its status.
    pub fn from_api(status: u16, body: ErrorBody) -> Self {
        match status {
            400 => MirrorError::Invalid(ValidationError::new(body.message)),
            404 => MirrorError::NotFound(body.message),
            409 => MirrorError::Conflict(body.message),
            _ => MirrorError::Api {
                status,
                error: body.error,
                message: body.message,
            },
        }
    }
}

/// Which slice of a list to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub page: PageRequest,
    pub status: Option<WatchStatus>,
    pub movie_id: Option<String>,
}

impl ListQuery {
    pub fn new(page: u64, limit: u64) -> Self {
        ListQuery {
            page: PageRequest { page, limit },
            status: None,
            movie_id: None,
        }
    }

    pub fn with_status(mut self, status: WatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn for_movie(mut self, movie_id: impl Into<String>) -> Self {
        self.movie_id = Some(movie_id.into());
        self
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery::new(1, 20)
    }
}

/// A record that can live in a mirrored list.
pub trait MirrorItem: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Body of an add request.
    type Draft: Clone + Serialize + Send + Sync;
    /// Body of a partial update.
    type Patch: Clone + Serialize + Send + Sync;

    fn key(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;

    /// Builds the record a draft turns into before any backing has seen it.
    fn from_draft(key: String, owner: &str, draft: &Self::Draft, now: DateTime<Utc>) -> Self;

    fn apply_patch(&mut self, patch: &Self::Patch, now: DateTime<Utc>);

    fn matches(&self, query: &ListQuery) -> bool;

    /// True when adding `draft` for `owner` would duplicate this record.
    fn conflicts_with(&self, owner: &str, draft: &Self::Draft) -> bool;

    fn validate_draft(draft: &Self::Draft) -> Result<(), ValidationError>;

    fn validate_patch(patch: &Self::Patch) -> Result<(), ValidationError>;
}

/// Durable side of a mirrored list.
#[async_trait]
pub trait Backing<T: MirrorItem>: Send + Sync {
    /// Id of the user whose records this backing holds.
    fn owner(&self) -> &str;

    async fn fetch(&self, query: &ListQuery) -> MirrorResult<Page<T>>;

    async fn add(&self, draft: &T::Draft) -> MirrorResult<T>;

    async fn update(&self, key: &str, patch: &T::Patch) -> MirrorResult<T>;

    async fn remove(&self, key: &str) -> MirrorResult<()>;
}

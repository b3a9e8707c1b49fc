//! Third-party movie metadata.

mod omdb;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::movie_model::MovieMetadata;

pub use omdb::OmdbClient;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("{0}")]
    NotFound(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Upstream(String),
}

/// Metadata found for one movie, keyed by its external catalogue id.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataMatch {
    pub external_id: String,
    pub metadata: MovieMetadata,
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_by_id(&self, external_id: &str) -> Result<MetadataMatch, MetadataError>;
    async fn fetch_by_title(&self, title: &str) -> Result<MetadataMatch, MetadataError>;
}

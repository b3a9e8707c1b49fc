//! Persistence for movies, reviews, watchlists and users.
//!
//! Handlers only see [`CatalogStore`]. [`MongoStore`] is the production
//! backend and [`MemoryStore`] keeps everything in process, which is what
//! the tests and the database-less standalone mode run on.

mod memory_store;
mod mongo_store;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    movie_model::{Movie, MovieMetadata, MovieUpdate, ReviewStats},
    review_model::{Review, ReviewEntry, ReviewSubmission, ReviewUpdate},
    user_model::{NewUser, ProfileUpdate, User},
    watchlist_model::{WatchStatus, WatchlistAdd, WatchlistEntry, WatchlistItem, WatchlistUpdate},
    Page, PageRequest,
};

pub use memory_store::MemoryStore;
pub use mongo_store::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("failed to decode document: {0}")]
    Decode(#[from] mongodb::bson::de::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct MovieQuery {
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ReviewScope {
    Movie(String),
    User(String),
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns the movie with `external_id`, inserting a placeholder when it is missing.
    /// The flag is true when this call created the record.
    async fn get_or_create_movie(&self, external_id: &str) -> StoreResult<(Movie, bool)>;
    async fn find_movie(&self, external_id: &str) -> StoreResult<Option<Movie>>;
    /// Fails with [`StoreError::Conflict`] when the external id is taken.
    async fn insert_movie(&self, movie: Movie) -> StoreResult<Movie>;
    /// Field-level merge of `metadata` into an existing movie.
    async fn enrich_movie(&self, external_id: &str, metadata: &MovieMetadata) -> StoreResult<Movie>;
    async fn update_movie(&self, external_id: &str, update: &MovieUpdate) -> StoreResult<Movie>;
    async fn list_movies(&self, query: &MovieQuery, page: PageRequest) -> StoreResult<Page<Movie>>;
    /// Recomputes `average_rating` and `total_reviews` from the movie's reviews.
    async fn refresh_movie_stats(&self, external_id: &str) -> StoreResult<ReviewStats>;

    async fn find_review(&self, id: &str) -> StoreResult<Option<Review>>;
    async fn find_user_review(&self, user_id: &str, movie_id: &str) -> StoreResult<Option<Review>>;
    /// Fails with [`StoreError::Conflict`] when the user already reviewed the movie.
    async fn insert_review(&self, user_id: &str, submission: &ReviewSubmission) -> StoreResult<Review>;
    async fn update_review(&self, id: &str, update: &ReviewUpdate) -> StoreResult<Review>;
    async fn delete_review(&self, id: &str) -> StoreResult<()>;
    async fn review_entry(&self, id: &str) -> StoreResult<Option<ReviewEntry>>;
    async fn list_reviews(&self, scope: &ReviewScope, page: PageRequest) -> StoreResult<Page<ReviewEntry>>;

    async fn find_watchlist_item(&self, id: &str) -> StoreResult<Option<WatchlistItem>>;
    async fn find_watchlist_entry_for_movie(
        &self,
        user_id: &str,
        movie_id: &str,
    ) -> StoreResult<Option<WatchlistItem>>;
    /// Fails with [`StoreError::Conflict`] when (user, movie) is already present.
    async fn insert_watchlist_item(&self, user_id: &str, add: &WatchlistAdd) -> StoreResult<WatchlistItem>;
    async fn update_watchlist_item(&self, id: &str, update: &WatchlistUpdate) -> StoreResult<WatchlistItem>;
    async fn delete_watchlist_item(&self, id: &str) -> StoreResult<()>;
    async fn watchlist_entry(&self, id: &str) -> StoreResult<Option<WatchlistEntry>>;
    async fn list_watchlist(
        &self,
        user_id: &str,
        status: Option<WatchStatus>,
        page: PageRequest,
    ) -> StoreResult<Page<WatchlistEntry>>;

    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> StoreResult<User>;
}

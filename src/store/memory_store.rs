use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use tokio::sync::Mutex;

use super::{CatalogStore, MovieQuery, ReviewScope, StoreError, StoreResult};
use crate::models::{
    movie_model::{Movie, MovieMetadata, MovieUpdate, ReviewStats},
    review_model::{Review, ReviewAuthor, ReviewEntry, ReviewSubmission, ReviewUpdate},
    user_model::{NewUser, ProfileUpdate, User},
    watchlist_model::{WatchStatus, WatchlistAdd, WatchlistEntry, WatchlistItem, WatchlistUpdate},
    Page, PageRequest,
};

struct StoredUser {
    user: User,
    token_hash: String,
}

#[derive(Default)]
struct Tables {
    movies: Vec<Movie>,
    reviews: Vec<Review>,
    watchlist: Vec<WatchlistItem>,
    users: Vec<StoredUser>,
}

impl Tables {
    fn movie(&self, external_id: &str) -> Option<&Movie> {
        self.movies.iter().find(|m| m.external_id == external_id)
    }

    fn movie_mut(&mut self, external_id: &str) -> Option<&mut Movie> {
        self.movies.iter_mut().find(|m| m.external_id == external_id)
    }

    fn author(&self, user_id: &str) -> Option<ReviewAuthor> {
        self.users
            .iter()
            .find(|u| u.user.id == user_id)
            .map(|u| ReviewAuthor {
                id: u.user.id.clone(),
                username: u.user.username.clone(),
                display_name: u.user.display_name.clone(),
            })
    }

    fn review_entry(&self, review: &Review) -> ReviewEntry {
        ReviewEntry {
            review: review.clone(),
            author: self.author(&review.user_id),
            movie: self.movie(&review.movie_id).cloned(),
        }
    }

    fn watchlist_entry(&self, item: &WatchlistItem) -> WatchlistEntry {
        WatchlistEntry {
            item: item.clone(),
            movie: self.movie(&item.movie_id).cloned(),
        }
    }
}

/// Keeps every collection in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_id() -> String {
    ObjectId::new().to_hex()
}

/// Later insertions win ties on `created_at`.
fn newest_first<T, F>(items: impl DoubleEndedIterator<Item = T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut items: Vec<T> = items.rev().collect();
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_or_create_movie(&self, external_id: &str) -> StoreResult<(Movie, bool)> {
        let mut tables = self.tables.lock().await;
        if let Some(movie) = tables.movie(external_id) {
            return Ok((movie.clone(), false));
        }
        let movie = Movie::placeholder(external_id, Utc::now());
        tables.movies.push(movie.clone());
        Ok((movie, true))
    }

    async fn find_movie(&self, external_id: &str) -> StoreResult<Option<Movie>> {
        Ok(self.tables.lock().await.movie(external_id).cloned())
    }

    async fn insert_movie(&self, movie: Movie) -> StoreResult<Movie> {
        let mut tables = self.tables.lock().await;
        if tables.movie(&movie.external_id).is_some() {
            return Err(StoreError::Conflict(format!(
                "movie {} already exists",
                movie.external_id
            )));
        }
        tables.movies.push(movie.clone());
        Ok(movie)
    }

    async fn enrich_movie(&self, external_id: &str, metadata: &MovieMetadata) -> StoreResult<Movie> {
        let mut tables = self.tables.lock().await;
        let movie = tables
            .movie_mut(external_id)
            .ok_or(StoreError::NotFound("movie"))?;
        movie.apply_metadata(metadata, Utc::now());
        Ok(movie.clone())
    }

    async fn update_movie(&self, external_id: &str, update: &MovieUpdate) -> StoreResult<Movie> {
        let mut tables = self.tables.lock().await;
        let movie = tables
            .movie_mut(external_id)
            .ok_or(StoreError::NotFound("movie"))?;
        movie.apply_update(update, Utc::now());
        Ok(movie.clone())
    }

    async fn list_movies(&self, query: &MovieQuery, page: PageRequest) -> StoreResult<Page<Movie>> {
        let tables = self.tables.lock().await;
        let needle = query.search.as_ref().map(|s| s.to_lowercase());
        let matching = tables.movies.iter().filter(|m| match &needle {
            Some(needle) => m.title.to_lowercase().contains(needle),
            None => true,
        });
        let ordered = newest_first(matching.cloned().collect::<Vec<_>>().into_iter(), |m| m.created_at);
        Ok(Page::slice(ordered, page))
    }

    async fn refresh_movie_stats(&self, external_id: &str) -> StoreResult<ReviewStats> {
        let mut tables = self.tables.lock().await;
        let stats = ReviewStats::from_ratings(
            tables
                .reviews
                .iter()
                .filter(|r| r.movie_id == external_id)
                .map(|r| r.rating),
        );
        let movie = tables
            .movie_mut(external_id)
            .ok_or(StoreError::NotFound("movie"))?;
        movie.set_review_stats(stats);
        Ok(stats)
    }

    async fn find_review(&self, id: &str) -> StoreResult<Option<Review>> {
        let tables = self.tables.lock().await;
        Ok(tables.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn find_user_review(&self, user_id: &str, movie_id: &str) -> StoreResult<Option<Review>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .find(|r| r.user_id == user_id && r.movie_id == movie_id)
            .cloned())
    }

    async fn insert_review(&self, user_id: &str, submission: &ReviewSubmission) -> StoreResult<Review> {
        let mut tables = self.tables.lock().await;
        if tables
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.movie_id == submission.movie_id)
        {
            return Err(StoreError::Conflict(
                "you have already reviewed this movie".to_string(),
            ));
        }
        let review = Review::new(new_id(), user_id, submission, Utc::now());
        tables.reviews.push(review.clone());
        Ok(review)
    }

    async fn update_review(&self, id: &str, update: &ReviewUpdate) -> StoreResult<Review> {
        let mut tables = self.tables.lock().await;
        let review = tables
            .reviews
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound("review"))?;
        review.apply_update(update, Utc::now());
        Ok(review.clone())
    }

    async fn delete_review(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.reviews.len();
        tables.reviews.retain(|r| r.id != id);
        if tables.reviews.len() == before {
            return Err(StoreError::NotFound("review"));
        }
        Ok(())
    }

    async fn review_entry(&self, id: &str) -> StoreResult<Option<ReviewEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reviews
            .iter()
            .find(|r| r.id == id)
            .map(|r| tables.review_entry(r)))
    }

    async fn list_reviews(&self, scope: &ReviewScope, page: PageRequest) -> StoreResult<Page<ReviewEntry>> {
        let tables = self.tables.lock().await;
        let matching: Vec<&Review> = tables
            .reviews
            .iter()
            .filter(|r| match scope {
                ReviewScope::Movie(movie_id) => &r.movie_id == movie_id,
                ReviewScope::User(user_id) => &r.user_id == user_id,
            })
            .collect();
        let ordered = newest_first(matching.into_iter(), |r| r.created_at);
        let page = Page::slice(ordered, page);
        Ok(Page {
            items: page.items.into_iter().map(|r| tables.review_entry(r)).collect(),
            pagination: page.pagination,
        })
    }

    async fn find_watchlist_item(&self, id: &str) -> StoreResult<Option<WatchlistItem>> {
        let tables = self.tables.lock().await;
        Ok(tables.watchlist.iter().find(|i| i.id == id).cloned())
    }

    async fn find_watchlist_entry_for_movie(
        &self,
        user_id: &str,
        movie_id: &str,
    ) -> StoreResult<Option<WatchlistItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .watchlist
            .iter()
            .find(|i| i.user_id == user_id && i.movie_id == movie_id)
            .cloned())
    }

    async fn insert_watchlist_item(&self, user_id: &str, add: &WatchlistAdd) -> StoreResult<WatchlistItem> {
        let mut tables = self.tables.lock().await;
        if tables
            .watchlist
            .iter()
            .any(|i| i.user_id == user_id && i.movie_id == add.movie_id)
        {
            return Err(StoreError::Conflict(
                "movie is already in your watchlist".to_string(),
            ));
        }
        let item = WatchlistItem::new(new_id(), user_id, add, Utc::now());
        tables.watchlist.push(item.clone());
        Ok(item)
    }

    async fn update_watchlist_item(&self, id: &str, update: &WatchlistUpdate) -> StoreResult<WatchlistItem> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .watchlist
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound("watchlist item"))?;
        item.apply_update(update, Utc::now());
        Ok(item.clone())
    }

    async fn delete_watchlist_item(&self, id: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.watchlist.len();
        tables.watchlist.retain(|i| i.id != id);
        if tables.watchlist.len() == before {
            return Err(StoreError::NotFound("watchlist item"));
        }
        Ok(())
    }

    async fn watchlist_entry(&self, id: &str) -> StoreResult<Option<WatchlistEntry>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .watchlist
            .iter()
            .find(|i| i.id == id)
            .map(|i| tables.watchlist_entry(i)))
    }

    async fn list_watchlist(
        &self,
        user_id: &str,
        status: Option<WatchStatus>,
        page: PageRequest,
    ) -> StoreResult<Page<WatchlistEntry>> {
        let tables = self.tables.lock().await;
        let matching: Vec<&WatchlistItem> = tables
            .watchlist
            .iter()
            .filter(|i| i.user_id == user_id && status.map_or(true, |s| i.status == s))
            .collect();
        let ordered = newest_first(matching.into_iter(), |i| i.created_at);
        let page = Page::slice(ordered, page);
        Ok(Page {
            items: page.items.into_iter().map(|i| tables.watchlist_entry(i)).collect(),
            pagination: page.pagination,
        })
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.token_hash == token_hash)
            .map(|u| u.user.clone()))
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.user.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username {} is taken",
                user.username
            )));
        }
        let stored = StoredUser {
            user: User {
                id: new_id(),
                username: user.username,
                email: user.email,
                display_name: None,
                bio: None,
                avatar_url: None,
                is_admin: user.is_admin,
                created_at: Utc::now(),
            },
            token_hash: user.token_hash,
        };
        let created = stored.user.clone();
        tables.users.push(stored);
        Ok(created)
    }

    async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        let stored = tables
            .users
            .iter_mut()
            .find(|u| u.user.id == user_id)
            .ok_or(StoreError::NotFound("user"))?;
        stored.user.apply_profile(update);
        Ok(stored.user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::review_model::ReviewSubmission;

    fn page(page: u64, limit: u64) -> PageRequest {
        PageRequest { page, limit }
    }

    fn submission(movie_id: &str, rating: u8) -> ReviewSubmission {
        ReviewSubmission {
            movie_id: movie_id.to_string(),
            rating,
            review_text: None,
            is_spoiler: false,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let (first, created) = store.get_or_create_movie("tt1234567").await.unwrap();
        assert!(created);
        let (second, created) = store.get_or_create_movie("tt1234567").await.unwrap();
        assert!(!created);
        assert_eq!(first, second);

        let movies = store.list_movies(&MovieQuery::default(), page(1, 20)).await.unwrap();
        assert_eq!(movies.pagination.total_items, 1);
    }

    #[tokio::test]
    async fn enrich_missing_movie_fails() {
        let store = MemoryStore::new();
        let err = store
            .enrich_movie("tt0000001", &MovieMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("movie")));
    }

    #[tokio::test]
    async fn duplicate_watchlist_item_conflicts() {
        let store = MemoryStore::new();
        let add = WatchlistAdd::for_movie("tt1234567");
        store.insert_watchlist_item("u1", &add).await.unwrap();
        let err = store.insert_watchlist_item("u1", &add).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        store.insert_watchlist_item("u2", &add).await.unwrap();
    }

    #[tokio::test]
    async fn watchlist_lists_newest_first_with_status_filter() {
        let store = MemoryStore::new();
        for (i, status) in [WatchStatus::Watched, WatchStatus::WantToWatch, WatchStatus::Watched]
            .into_iter()
            .enumerate()
        {
            let mut add = WatchlistAdd::for_movie(format!("tt000000{i}"));
            add.status = Some(status);
            store.insert_watchlist_item("u1", &add).await.unwrap();
        }
        let all = store.list_watchlist("u1", None, page(1, 10)).await.unwrap();
        let ids: Vec<&str> = all.items.iter().map(|e| e.item.movie_id.as_str()).collect();
        assert_eq!(ids, vec!["tt0000002", "tt0000001", "tt0000000"]);

        let watched = store
            .list_watchlist("u1", Some(WatchStatus::Watched), page(1, 10))
            .await
            .unwrap();
        assert_eq!(watched.pagination.total_items, 2);
        assert!(watched.items.iter().all(|e| e.item.status == WatchStatus::Watched));
    }

    #[tokio::test]
    async fn review_stats_follow_reviews() {
        let store = MemoryStore::new();
        store.get_or_create_movie("tt1").await.unwrap();
        let first = store.insert_review("u1", &submission("tt1", 8)).await.unwrap();
        store.insert_review("u2", &submission("tt1", 5)).await.unwrap();
        let stats = store.refresh_movie_stats("tt1").await.unwrap();
        assert_eq!(stats.total_reviews, 2);
        assert_eq!(stats.average_rating, 6.5);

        store.delete_review(&first.id).await.unwrap();
        store.refresh_movie_stats("tt1").await.unwrap();
        let movie = store.find_movie("tt1").await.unwrap().unwrap();
        assert_eq!(movie.total_reviews, 1);
        assert_eq!(movie.average_rating, 5.0);
    }

    #[tokio::test]
    async fn second_review_for_same_movie_conflicts() {
        let store = MemoryStore::new();
        store.insert_review("u1", &submission("tt1", 8)).await.unwrap();
        let err = store.insert_review("u1", &submission("tt1", 3)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}

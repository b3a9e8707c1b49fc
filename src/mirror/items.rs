use chrono::{DateTime, Utc};

use super::backing::{ListQuery, MirrorItem};
use crate::models::{
    review_model::{Review, ReviewEntry, ReviewSubmission, ReviewUpdate},
    watchlist_model::{WatchlistAdd, WatchlistEntry, WatchlistItem, WatchlistUpdate},
    ValidationError,
};

impl MirrorItem for WatchlistEntry {
    type Draft = WatchlistAdd;
    type Patch = WatchlistUpdate;

    fn key(&self) -> &str {
        &self.item.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.item.created_at
    }

    fn from_draft(key: String, owner: &str, draft: &WatchlistAdd, now: DateTime<Utc>) -> Self {
        WatchlistEntry {
            item: WatchlistItem::new(key, owner, draft, now),
            movie: None,
        }
    }

    fn apply_patch(&mut self, patch: &WatchlistUpdate, now: DateTime<Utc>) {
        self.item.apply_update(patch, now);
    }

    fn matches(&self, query: &ListQuery) -> bool {
        query.status.map_or(true, |s| self.item.status == s)
            && query
                .movie_id
                .as_deref()
                .map_or(true, |m| self.item.movie_id == m)
    }

    fn conflicts_with(&self, owner: &str, draft: &WatchlistAdd) -> bool {
        self.item.user_id == owner && self.item.movie_id == draft.movie_id
    }

    fn validate_draft(draft: &WatchlistAdd) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn validate_patch(patch: &WatchlistUpdate) -> Result<(), ValidationError> {
        patch.validate()
    }
}

impl MirrorItem for ReviewEntry {
    type Draft = ReviewSubmission;
    type Patch = ReviewUpdate;

    fn key(&self) -> &str {
        &self.review.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.review.created_at
    }

    fn from_draft(key: String, owner: &str, draft: &ReviewSubmission, now: DateTime<Utc>) -> Self {
        ReviewEntry {
            review: Review::new(key, owner, draft, now),
            author: None,
            movie: None,
        }
    }

    fn apply_patch(&mut self, patch: &ReviewUpdate, now: DateTime<Utc>) {
        self.review.apply_update(patch, now);
    }

    // Reviews have no status; a status filter never excludes them.
    fn matches(&self, query: &ListQuery) -> bool {
        query
            .movie_id
            .as_deref()
            .map_or(true, |m| self.review.movie_id == m)
    }

    fn conflicts_with(&self, owner: &str, draft: &ReviewSubmission) -> bool {
        self.review.user_id == owner && self.review.movie_id == draft.movie_id
    }

    fn validate_draft(draft: &ReviewSubmission) -> Result<(), ValidationError> {
        draft.validate()
    }

    fn validate_patch(patch: &ReviewUpdate) -> Result<(), ValidationError> {
        patch.validate()
    }
}

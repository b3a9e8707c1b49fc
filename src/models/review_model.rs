use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    movie_model::Movie, validate_external_id, validate_max_chars, Patch, ValidationError,
};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;
pub const MAX_REVIEW_TEXT_LEN: usize = 5000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub movie_id: String,
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
    pub is_spoiler: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn new(id: String, user_id: &str, submission: &ReviewSubmission, now: DateTime<Utc>) -> Self {
        Review {
            id,
            user_id: user_id.to_string(),
            movie_id: submission.movie_id.clone(),
            rating: submission.rating,
            review_text: submission.review_text.clone(),
            is_spoiler: submission.is_spoiler,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: &ReviewUpdate, now: DateTime<Utc>) {
        update.rating.apply_required(&mut self.rating);
        update.review_text.apply_to(&mut self.review_text);
        update.is_spoiler.apply_required(&mut self.is_spoiler);
        self.updated_at = now;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReviewAuthor {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Review joined with its author and movie.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReviewEntry {
    #[serde(flatten)]
    pub review: Review,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<ReviewAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<Movie>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReviewSubmission {
    pub movie_id: String,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_text: Option<String>,
    #[serde(default)]
    pub is_spoiler: bool,
}

impl ReviewSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_external_id(&self.movie_id)?;
        validate_rating(self.rating)?;
        validate_max_chars("review_text", self.review_text.as_ref(), MAX_REVIEW_TEXT_LEN)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ReviewUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub rating: Patch<u8>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub review_text: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub is_spoiler: Patch<bool>,
}

impl ReviewUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rating.is_null() {
            return Err(ValidationError::new("rating cannot be null"));
        }
        if self.is_spoiler.is_null() {
            return Err(ValidationError::new("is_spoiler cannot be null"));
        }
        if let Some(rating) = self.rating.value() {
            validate_rating(*rating)?;
        }
        validate_max_chars("review_text", self.review_text.value(), MAX_REVIEW_TEXT_LEN)
    }
}

fn validate_rating(rating: u8) -> Result<(), ValidationError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "rating must be an integer between {MIN_RATING} and {MAX_RATING}"
        )))
    }
}

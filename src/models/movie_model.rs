use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{validate_external_id, Patch, ValidationError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Movie {
    pub external_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cast: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Rating reported by the external catalogue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    pub average_rating: f64,
    pub total_reviews: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Movie {
    pub fn placeholder(external_id: &str, now: DateTime<Utc>) -> Self {
        Movie {
            external_id: external_id.to_string(),
            title: placeholder_title(external_id),
            year: None,
            genre: None,
            director: None,
            cast: None,
            plot: None,
            runtime: None,
            rating: None,
            poster: None,
            average_rating: 0.0,
            total_reviews: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites the fields present in `metadata` and keeps the rest.
    pub fn apply_metadata(&mut self, metadata: &MovieMetadata, now: DateTime<Utc>) {
        if let Some(title) = &metadata.title {
            self.title = title.clone();
        }
        fill(&mut self.year, &metadata.year);
        fill(&mut self.genre, &metadata.genre);
        fill(&mut self.director, &metadata.director);
        fill(&mut self.cast, &metadata.cast);
        fill(&mut self.plot, &metadata.plot);
        fill(&mut self.runtime, &metadata.runtime);
        fill(&mut self.rating, &metadata.rating);
        fill(&mut self.poster, &metadata.poster);
        self.updated_at = now;
    }

    /// Applies an admin edit. Unlike metadata merges, `null` clears a field.
    pub fn apply_update(&mut self, update: &MovieUpdate, now: DateTime<Utc>) {
        update.title.apply_required(&mut self.title);
        update.year.apply_to(&mut self.year);
        update.genre.apply_to(&mut self.genre);
        update.director.apply_to(&mut self.director);
        update.cast.apply_to(&mut self.cast);
        update.plot.apply_to(&mut self.plot);
        update.runtime.apply_to(&mut self.runtime);
        update.rating.apply_to(&mut self.rating);
        update.poster.apply_to(&mut self.poster);
        self.updated_at = now;
    }

    pub fn set_review_stats(&mut self, stats: ReviewStats) {
        self.average_rating = stats.average_rating;
        self.total_reviews = stats.total_reviews;
    }
}

fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(v) = source {
        *target = Some(v.clone());
    }
}

pub fn placeholder_title(external_id: &str) -> String {
    format!("Movie {external_id}")
}

/// Descriptive movie fields. Every `None` field is left untouched when merged.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct MovieMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
}

impl MovieMetadata {
    pub fn is_empty(&self) -> bool {
        *self == MovieMetadata::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::new("title must not be empty"));
            }
        }
        if let Some(rating) = self.rating {
            if !(0.0..=10.0).contains(&rating) {
                return Err(ValidationError::new("rating must be between 0 and 10"));
            }
        }
        Ok(())
    }
}

/// Admin request body for editing a movie.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct MovieUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub title: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub year: Patch<i32>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub genre: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub director: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub cast: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub plot: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub runtime: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub rating: Patch<f64>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub poster: Patch<String>,
}

impl MovieUpdate {
    pub fn is_empty(&self) -> bool {
        *self == MovieUpdate::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.title {
            Patch::Null => return Err(ValidationError::new("title cannot be null")),
            Patch::Value(title) if title.trim().is_empty() => {
                return Err(ValidationError::new("title must not be empty"))
            }
            _ => {}
        }
        if let Some(rating) = self.rating.value() {
            if !(0.0..=10.0).contains(rating) {
                return Err(ValidationError::new("rating must be between 0 and 10"));
            }
        }
        Ok(())
    }
}

/// Admin request body for creating a movie.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewMovie {
    pub external_id: String,
    #[serde(flatten)]
    pub metadata: MovieMetadata,
}

impl NewMovie {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_external_id(&self.external_id)?;
        if self.metadata.title.is_none() {
            return Err(ValidationError::new("title is required"));
        }
        self.metadata.validate()
    }

    pub fn into_movie(self, now: DateTime<Utc>) -> Movie {
        let mut movie = Movie::placeholder(&self.external_id, now);
        movie.apply_metadata(&self.metadata, now);
        movie
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReviewStats {
    pub average_rating: f64,
    pub total_reviews: u64,
}

impl ReviewStats {
    pub fn from_ratings<I: IntoIterator<Item = u8>>(ratings: I) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0u64), |(sum, count), r| (sum + r as u64, count + 1));
        if count == 0 {
            return ReviewStats::default();
        }
        Self::from_mean(sum as f64 / count as f64, count)
    }

    pub fn from_mean(mean: f64, count: u64) -> Self {
        if count == 0 {
            return ReviewStats::default();
        }
        ReviewStats {
            average_rating: (mean * 10.0).round() / 10.0,
            total_reviews: count,
        }
    }
}

pub mod movie_model;
pub mod pagination;
pub mod patch;
pub mod review_model;
pub mod user_model;
pub mod watchlist_model;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use pagination::{Page, PageRequest, Pagination};
pub use patch::Patch;

/// A request that breaks a field rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }
}

pub const MAX_EXTERNAL_ID_LEN: usize = 32;

/// External catalogue ids look like `tt1234567`.
pub fn validate_external_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_EXTERNAL_ID_LEN {
        return Err(ValidationError::new(format!(
            "movie_id must be between 1 and {MAX_EXTERNAL_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::new(
            "movie_id may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

pub(crate) fn validate_max_chars(
    field: &str,
    value: Option<&String>,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::new(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: String,
}
